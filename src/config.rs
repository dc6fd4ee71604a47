//! Configuration and CLI argument parsing
//!
//! Settings come from three layers:
//! - Command-line arguments and flags
//! - Environment variables (`BLITZER_` prefix, plus `BLITZ_API_USER` and
//!   `BLITZ_API_KEY` for the blitz.io account)
//! - An optional settings file passed with `--config` (TOML, JSON or YAML)
//!
//! # Configuration Priority
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Settings file
//! 4. Default values (lowest priority)
//!
//! # Example Usage
//!
//! ```bash
//! # Heroku key and app are positional, target defaults to 250
//! blitzer $HEROKU_API_KEY my-app 500
//!
//! # Tighter readiness timeout from the environment
//! export BLITZER_READINESS_TIMEOUT_SECS=120
//! blitzer $HEROKU_API_KEY my-app
//!
//! # Tunables from a file, tolerance overridden on the command line
//! blitzer --config blitzer.toml --tolerance 5 $HEROKU_API_KEY my-app
//! ```

use anyhow::{Result, anyhow};
use clap::Parser;
use clap::error::ErrorKind;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::search::{ReadinessPolicy, SearchParams};

pub const DEFAULT_TARGET: u64 = 250;

const ENV_PREFIX: &str = "BLITZER";

const USAGE: &str = "\
Usage: blitzer api_key heroku_app [target]
api_key - Heroku API key (from the accounts page)
app     - The name of your heroku app
target  - How many users do you want to get to? default = 250";

/// Tunables that can come from a settings file or `BLITZER_*` variables
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// blitz.io region the rush is launched from
    pub region: String,
    /// Error percentage at which a rush counts as failed
    pub tolerance: u64,
    /// Length of the 1-to-target ramp (seconds)
    pub ramp_secs: u64,
    /// Status code the application must answer with
    pub expected_status: u16,
    /// Delay between dyno readiness checks (milliseconds)
    pub readiness_interval_ms: u64,
    /// Give up on dynos coming up after this long (seconds)
    pub readiness_timeout_secs: u64,
    /// Delay between rush status polls (milliseconds)
    pub rush_poll_interval_ms: u64,
    pub heroku_api_url: String,
    pub blitz_api_url: String,
    /// Public URL to rush, defaults to `http://<app>.herokuapp.com`
    pub app_url: Option<String>,
    pub blitz_user: Option<String>,
    pub blitz_api_key: Option<String>,
    /// Logging level (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            region: "virginia".to_string(),
            tolerance: 2,
            ramp_secs: 30,
            expected_status: 200,
            readiness_interval_ms: 1_000,
            readiness_timeout_secs: 600,
            rush_poll_interval_ms: 2_000,
            heroku_api_url: "https://api.heroku.com".to_string(),
            blitz_api_url: "https://www.blitz.io".to_string(),
            app_url: None,
            blitz_user: None,
            blitz_api_key: None,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Defaults, overlaid with `file` (if any) and then `BLITZER_*` variables
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_with(file, config::Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with(file: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}

/// Resolved configuration for one run
#[derive(Debug, Clone)]
pub struct Config {
    pub heroku_api_key: String,
    pub app: String,
    /// Concurrent users the application must sustain
    pub target: u64,
    pub settings: Settings,
}

#[derive(Parser, Debug)]
#[command(
    name = "blitzer",
    version,
    about = "Find how many Heroku dynos an app needs for a target concurrency",
    long_about = "Scales the app through 1, 2, 4, 8, 16 and 32 web dynos, rushes it with blitz.io at each step, and reports the first dyno count that keeps the error rate under the tolerance.\n\nEnvironment variables with the BLITZER_ prefix are supported. CLI arguments take precedence over environment variables."
)]
pub struct Args {
    /// Heroku API key (from the accounts page)
    #[arg(required_unless_present = "list_env_vars")]
    pub api_key: Option<String>,

    /// The name of your Heroku app
    #[arg(required_unless_present = "list_env_vars")]
    pub app: Option<String>,

    /// How many concurrent users to reach
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    pub target: Option<u64>,

    #[arg(
        long,
        value_name = "FILE",
        help = "Settings file (TOML, JSON or YAML)",
        env = "BLITZER_CONFIG"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        value_name = "USER",
        help = "blitz.io API user",
        env = "BLITZ_API_USER"
    )]
    pub blitz_user: Option<String>,
    #[arg(
        long,
        value_name = "KEY",
        help = "blitz.io API key",
        env = "BLITZ_API_KEY",
        hide_env_values = true
    )]
    pub blitz_key: Option<String>,

    #[arg(long, value_name = "PCT", help = "Error percentage that fails a rush [default: 2]")]
    pub tolerance: Option<u64>,
    #[arg(long, value_name = "REGION", help = "blitz.io region [default: virginia]")]
    pub region: Option<String>,
    #[arg(
        long,
        value_name = "SECS",
        help = "How long to wait for dynos to come up [default: 600]"
    )]
    pub readiness_timeout: Option<u64>,
    #[arg(long, value_name = "URL", help = "URL to rush [default: http://<app>.herokuapp.com]")]
    pub app_url: Option<String>,
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace [default: info]"
    )]
    pub log_level: Option<String>,

    #[arg(
        long,
        help = "List all environment variables and exit",
        action = clap::ArgAction::SetTrue
    )]
    pub list_env_vars: bool,
}

impl Args {
    /// Parse the process arguments.
    ///
    /// Missing positionals print the classic usage text to stdout and exit
    /// with status 1; help, version and other parse errors go through clap.
    pub fn parse_or_usage() -> Self {
        match Args::try_parse() {
            Ok(args) => args,
            Err(e) if e.kind() == ErrorKind::MissingRequiredArgument => {
                println!("{USAGE}");
                std::process::exit(1);
            }
            Err(e) => e.exit(),
        }
    }
}

impl Config {
    /// Build configuration from parsed arguments, the environment and the
    /// optional settings file
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file cannot be read or the resolved
    /// values are out of range.
    pub fn from_args(args: Args) -> Result<Self> {
        if args.list_env_vars {
            Self::print_env_vars();
            std::process::exit(0);
        }

        let settings = Settings::load(args.config.as_deref())?;
        Self::resolve(args, settings)
    }

    /// Apply CLI overrides on top of already loaded settings
    pub fn resolve(args: Args, mut settings: Settings) -> Result<Self> {
        let heroku_api_key = args
            .api_key
            .ok_or_else(|| anyhow!("missing Heroku API key"))?;
        let app = args.app.ok_or_else(|| anyhow!("missing app name"))?;

        if let Some(tolerance) = args.tolerance {
            settings.tolerance = tolerance;
        }
        if let Some(region) = args.region {
            settings.region = region;
        }
        if let Some(secs) = args.readiness_timeout {
            settings.readiness_timeout_secs = secs;
        }
        if args.app_url.is_some() {
            settings.app_url = args.app_url;
        }
        if args.blitz_user.is_some() {
            settings.blitz_user = args.blitz_user;
        }
        if args.blitz_key.is_some() {
            settings.blitz_api_key = args.blitz_key;
        }
        if let Some(level) = args.log_level {
            settings.log_level = level;
        }

        let config = Config {
            heroku_api_key,
            app,
            target: args.target.unwrap_or(DEFAULT_TARGET),
            settings,
        };
        config.validate()?;

        Ok(config)
    }

    /// Public URL the rush is aimed at
    pub fn app_url(&self) -> String {
        self.settings
            .app_url
            .clone()
            .unwrap_or_else(|| format!("http://{}.herokuapp.com", self.app))
    }

    pub fn readiness_policy(&self) -> ReadinessPolicy {
        ReadinessPolicy {
            interval: Duration::from_millis(self.settings.readiness_interval_ms),
            timeout: Duration::from_secs(self.settings.readiness_timeout_secs),
        }
    }

    pub fn rush_poll_interval(&self) -> Duration {
        Duration::from_millis(self.settings.rush_poll_interval_ms)
    }

    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            app: self.app.clone(),
            app_url: self.app_url(),
            target: self.target,
            tolerance: self.settings.tolerance,
            region: self.settings.region.clone(),
            ramp_secs: self.settings.ramp_secs,
            expected_status: self.settings.expected_status,
            readiness: self.readiness_policy(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.app.trim().is_empty() {
            return Err(anyhow!("App name must not be empty"));
        }
        if self.target == 0 {
            return Err(anyhow!("Target must be at least one concurrent user"));
        }
        if !(1..=100).contains(&self.settings.tolerance) {
            return Err(anyhow!(
                "Tolerance must be a percentage between 1 and 100, got {}",
                self.settings.tolerance
            ));
        }
        if self.settings.ramp_secs == 0 {
            return Err(anyhow!("Ramp duration must be at least one second"));
        }
        if self.settings.readiness_interval_ms == 0 || self.settings.rush_poll_interval_ms == 0 {
            return Err(anyhow!("Poll intervals must be greater than zero"));
        }
        if !(100..=599).contains(&self.settings.expected_status) {
            return Err(anyhow!(
                "Expected status must be an HTTP status code, got {}",
                self.settings.expected_status
            ));
        }
        if self.settings.region.trim().is_empty() {
            return Err(anyhow!("Region must not be empty"));
        }

        Ok(())
    }

    fn print_env_vars() {
        println!("Blitzer Environment Variables");
        println!("=============================");
        println!();
        println!("CLI arguments take precedence over environment variables,");
        println!("which take precedence over the settings file.");
        println!();

        println!("Credentials:");
        println!("  BLITZ_API_USER=<user>                     blitz.io API user");
        println!("  BLITZ_API_KEY=<key>                       blitz.io API key");
        println!();

        println!("Search:");
        println!("  BLITZER_REGION=<region>                   Rush region [default: virginia]");
        println!("  BLITZER_TOLERANCE=<pct>                   Failing error percentage [default: 2]");
        println!("  BLITZER_RAMP_SECS=<secs>                  Ramp duration [default: 30]");
        println!("  BLITZER_EXPECTED_STATUS=<code>            Expected HTTP status [default: 200]");
        println!("  BLITZER_APP_URL=<url>                     URL to rush [default: http://<app>.herokuapp.com]");
        println!();

        println!("Polling:");
        println!("  BLITZER_READINESS_INTERVAL_MS=<ms>        Dyno readiness poll [default: 1000]");
        println!("  BLITZER_READINESS_TIMEOUT_SECS=<secs>     Dyno readiness timeout [default: 600]");
        println!("  BLITZER_RUSH_POLL_INTERVAL_MS=<ms>        Rush status poll [default: 2000]");
        println!();

        println!("Endpoints:");
        println!("  BLITZER_HEROKU_API_URL=<url>              [default: https://api.heroku.com]");
        println!("  BLITZER_BLITZ_API_URL=<url>               [default: https://www.blitz.io]");
        println!();

        println!("General:");
        println!("  BLITZER_CONFIG=<file>                     Settings file");
        println!(
            "  BLITZER_LOG_LEVEL=<level>                 Log level: error, warn, info, debug, trace [default: info]"
        );
    }
}
