use log::LevelFilter;
use std::io::Write;

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level for the application (default: INFO)
    pub level: LevelFilter,
    /// Whether to prefix each line with a local timestamp (default: true)
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            timestamps: true,
        }
    }
}

impl LoggingConfig {
    /// Builds a config from an optional level name; unknown names fall back to info.
    pub fn from_level_name(level: Option<&str>) -> Self {
        let level = level
            .and_then(|l| l.parse::<LevelFilter>().ok())
            .unwrap_or(LevelFilter::Info);
        Self {
            level,
            ..Default::default()
        }
    }
}

/// Initialize the global logger.
///
/// `RUST_LOG` overrides the configured level. Calling this more than once is
/// harmless; later calls leave the first logger in place.
pub fn init_logging(config: LoggingConfig) {
    let timestamps = config.timestamps;
    let mut builder = env_logger::Builder::new();
    builder
        .format(move |buf, record| {
            if timestamps {
                write!(
                    buf,
                    "{} - ",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
                )?;
            }
            writeln!(buf, "{} - {}", record.level(), record.args())
        })
        .filter(None, config.level)
        .parse_default_env();

    let _ = builder.try_init();
}
