use anyhow::Result;

use blitzer::config::{Args, Config};
use blitzer::preflight::{self, Preflight};
use blitzer::progress::Progress;
use blitzer::search::{CapacitySearch, Outcome};
use blitzer::{BlitzClient, HerokuClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Missing positionals print usage and exit 1 before anything else runs
    let args = Args::parse_or_usage();
    let config = Config::from_args(args)?;

    // Logs go to stderr, stdout is the progress channel
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("blitzer={}", config.settings.log_level).parse()?),
        )
        .init();

    let credentials = match preflight::check(&config) {
        Preflight::Ready(credentials) => credentials,
        Preflight::Missing(missing) => {
            println!("Blitzer cannot talk to Heroku and blitz.io yet:");
            for capability in &missing {
                println!("  - {}", capability.hint());
            }
            std::process::exit(1);
        }
    };

    let params = config.search_params();
    println!(
        "Blitzing {} with a target of {} users",
        params.app_url, params.target
    );
    println!();

    let heroku = HerokuClient::new(&config.settings.heroku_api_url, &credentials.heroku_api_key)?;
    let blitz = BlitzClient::new(
        &config.settings.blitz_api_url,
        credentials.blitz_user,
        credentials.blitz_api_key,
        config.rush_poll_interval(),
    )?;

    let mut search = CapacitySearch::new(heroku, blitz, params, Progress::stdout());
    let report = search.run().await?;

    match report.outcome {
        Outcome::Sufficient { dynos } => {
            tracing::info!(dynos, trials = report.trials.len(), "capacity found")
        }
        Outcome::Exhausted => tracing::info!(
            tried = ?report.candidates_tried(),
            "no dyno count held the target"
        ),
    }

    Ok(())
}
