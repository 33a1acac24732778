use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global subscriber; `RUST_LOG` wins over the config level
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tickflow=debug", config.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}
