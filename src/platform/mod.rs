//! Dyno management for the application under test
//!
//! The search only needs two things from the platform: ask for N instances of
//! a process, and list the instances that currently exist with their state.
//!
//! - [`heroku`]: the Heroku Platform API implementation

pub mod heroku;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// State a dyno reports once it is serving traffic
pub const UP_STATE: &str = "up";

/// Process type that receives HTTP traffic
pub const WEB_PROCESS: &str = "web";

/// Ask the platform to run `quantity` instances of `process` for `app`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleRequest {
    pub app: String,
    pub process: String,
    pub quantity: u32,
}

impl ScaleRequest {
    pub fn web(app: impl Into<String>, quantity: u32) -> Self {
        ScaleRequest {
            app: app.into(),
            process: WEB_PROCESS.to_string(),
            quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dyno {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub state: String,
    #[serde(rename = "type", default)]
    pub process_type: String,
}

impl Dyno {
    pub fn is_up(&self) -> bool {
        self.state == UP_STATE
    }
}

/// True once the platform reports exactly `expected` dynos and every one is up
pub fn all_up(dynos: &[Dyno], expected: u32) -> bool {
    dynos.len() == expected as usize && dynos.iter().all(Dyno::is_up)
}

#[async_trait]
pub trait DynoManager: Send + Sync {
    /// Fire-and-forget: returns once the platform accepted the request
    async fn scale(&self, request: &ScaleRequest) -> Result<()>;

    /// Every dyno the platform currently reports for `app`
    async fn dynos(&self, app: &str) -> Result<Vec<Dyno>>;
}
