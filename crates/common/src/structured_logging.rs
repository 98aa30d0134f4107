use std::env;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Logging configuration shared by the binaries of the workspace.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level when `RUST_LOG` is not set
    pub level: Level,
    /// Emit one JSON object per event instead of human readable lines
    pub json_output: bool,
    /// ANSI colors (ignored for JSON output)
    pub color_output: bool,
    pub include_target: bool,
    pub include_line_numbers: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_output: false,
            color_output: true,
            include_target: false,
            include_line_numbers: cfg!(debug_assertions),
        }
    }
}

impl LoggingConfig {
    /// Reads `LOG_FORMAT` (`json` | `text`) and `NO_COLOR` on top of the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(format) = env::var("LOG_FORMAT") {
            config.json_output = format.trim().eq_ignore_ascii_case("json");
        }
        if env::var_os("NO_COLOR").is_some() {
            config.color_output = false;
        }

        config
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_json_output(mut self, json_output: bool) -> Self {
        self.json_output = json_output;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.to_string().to_lowercase()))
    }
}

/// Install the global tracing subscriber. Events go to stdout.
pub fn init_structured_logging(config: LoggingConfig) -> anyhow::Result<()> {
    let env_filter = config.env_filter();

    if config.json_output {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(false)
            .with_writer(std::io::stdout);

        let subscriber = Registry::default().with(env_filter).with(json_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let fmt_layer = fmt::layer()
            .with_target(config.include_target)
            .with_line_number(config.include_line_numbers)
            .with_ansi(config.color_output)
            .with_writer(std::io::stdout);

        let subscriber = Registry::default().with(env_filter).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}
