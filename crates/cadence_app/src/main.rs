use cadence_app::app::{log_subscriber, run, AppConfig};
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    log_subscriber().init();
    let config = AppConfig::from_env().unwrap_or_default();
    if let Err(err) = run(config) {
        eprintln!("Failed to start Cadence: {err:#}");
    }
}
