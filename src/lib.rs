//! Find the smallest number of Heroku dynos that sustains a target
//! concurrency.
//!
//! The [`search::CapacitySearch`] loop scales an app through a fixed dyno
//! sequence and rushes it with blitz.io at each step, stopping at the first
//! dyno count whose error rate stays under the tolerance.

pub mod config;
pub mod error;
pub mod pattern;
pub mod platform;
pub mod preflight;
pub mod progress;
pub mod rush;
pub mod search;


pub use error::{BlitzerError, Result};
pub use pattern::LoadPattern;
pub use platform::{DynoManager, heroku::HerokuClient};
pub use rush::{RushControl, RushExecutor, RushStatus, TimelinePoint, blitz::BlitzClient};
pub use search::{CapacitySearch, Outcome, SearchParams, SearchReport};
