use std::thread;

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use matchweights::config::EngineConfig;
use matchweights::runner::run_cycle;
use matchweights::status::fetch_market_status;
use matchweights::store::open_db;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env();
    let mut conn = open_db(&config.db_path)?;
    info!(
        db = %config.db_path.display(),
        interval_secs = config.interval.as_secs(),
        "engine started"
    );

    // Delay-after-completion loop: the next cycle starts a fixed interval
    // after the previous one finished, regardless of how long it ran.
    loop {
        match fetch_market_status(&config.status_url) {
            Ok(status) if status.is_open() => {
                info!(round = status.current_round, "market open");
                if let Err(err) = run_cycle(&mut conn, &config, status.current_round) {
                    error!(error = %err, "cycle failed");
                }
            }
            Ok(status) => {
                info!(
                    state = status.market_state,
                    "market closed, skipping weight computation"
                );
            }
            Err(err) => {
                error!(error = %err, "could not fetch market status");
            }
        }

        info!(secs = config.interval.as_secs(), "sleeping until next cycle");
        thread::sleep(config.interval);
    }
}
