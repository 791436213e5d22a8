use std::io::Write;

use chrono::Local;
use env_logger::{Builder, Env};
use log::LevelFilter;

/// Initialises the global logger.
///
/// `RUST_LOG` overrides `default_level`. Lines are prefixed with a local
/// RFC 3339 timestamp, since the bridge runs headless under a service manager.
pub fn init(default_level: LevelFilter) -> Result<(), log::SetLoggerError> {
    Builder::from_env(Env::default().default_filter_or(default_level.as_str()))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}: {}",
                Local::now().to_rfc3339(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init()
}
