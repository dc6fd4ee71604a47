//! Startup check that both collaborators are reachable in principle
//!
//! Nothing is sent over the network here. The check makes sure the
//! credentials for Heroku and blitz.io are present and that every endpoint is
//! an http(s) URL, and turns each gap into a hint the user can act on.

use reqwest::Url;
use std::fmt;

use crate::config::Config;

/// Everything needed to talk to both services
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub heroku_api_key: String,
    pub blitz_user: String,
    pub blitz_api_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("blitz_user", &self.blitz_user)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingCapability {
    HerokuApiKey,
    BlitzUser,
    BlitzApiKey,
    InvalidEndpoint { name: &'static str, url: String },
}

impl MissingCapability {
    pub fn hint(&self) -> String {
        match self {
            MissingCapability::HerokuApiKey => {
                "Pass your Heroku API key (from the accounts page) as the first argument".into()
            }
            MissingCapability::BlitzUser => {
                "Set BLITZ_API_USER (or --blitz-user) to your blitz.io account email".into()
            }
            MissingCapability::BlitzApiKey => {
                "Set BLITZ_API_KEY (or --blitz-key) to your blitz.io API key".into()
            }
            MissingCapability::InvalidEndpoint { name, url } => {
                format!("{name} must be an http(s) URL, got {url:?}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preflight {
    Ready(Credentials),
    Missing(Vec<MissingCapability>),
}

fn present(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn valid_endpoint(url: &str) -> bool {
    Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false)
}

pub fn check(config: &Config) -> Preflight {
    let mut missing = Vec::new();

    let heroku_api_key = present(Some(config.heroku_api_key.as_str()));
    if heroku_api_key.is_none() {
        missing.push(MissingCapability::HerokuApiKey);
    }
    let blitz_user = present(config.settings.blitz_user.as_deref());
    if blitz_user.is_none() {
        missing.push(MissingCapability::BlitzUser);
    }
    let blitz_api_key = present(config.settings.blitz_api_key.as_deref());
    if blitz_api_key.is_none() {
        missing.push(MissingCapability::BlitzApiKey);
    }

    let endpoints = [
        ("heroku_api_url", config.settings.heroku_api_url.clone()),
        ("blitz_api_url", config.settings.blitz_api_url.clone()),
        ("app_url", config.app_url()),
    ];
    for (name, url) in endpoints {
        if !valid_endpoint(&url) {
            missing.push(MissingCapability::InvalidEndpoint { name, url });
        }
    }

    match (heroku_api_key, blitz_user, blitz_api_key) {
        (Some(heroku_api_key), Some(blitz_user), Some(blitz_api_key)) if missing.is_empty() => {
            Preflight::Ready(Credentials {
                heroku_api_key,
                blitz_user,
                blitz_api_key,
            })
        }
        _ => Preflight::Missing(missing),
    }
}
