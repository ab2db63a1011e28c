//! Setup logging subsystem.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

pub use tracing::{debug, error, info, warn};

#[derive(Clone, Debug, serde::Deserialize)]
pub struct LogConfig {
    pub console: ConsoleLogConfig,
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct ConsoleLogConfig {
    pub enabled: bool,
    pub level: LogLevel,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Overrides the derived env-filter directive when set.
    #[serde(default)]
    pub filtering_directive: Option<String>,
}

#[derive(Clone, Copy, Debug, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn into_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Default,
    Json,
}

/// Contains guards necessary for logging; logs flush until it is dropped.
#[derive(Debug)]
pub struct TelemetryGuard {
    _log_guard: Option<WorkerGuard>,
}

/// Setup the logging sub-system specifying the logging configuration, the
/// service (binary) name, and a list of external crates for which more
/// verbose logging must be enabled. All crates within this workspace are
/// automatically considered for verbose logging.
pub fn setup(
    config: &LogConfig,
    service_name: &str,
    crates_to_filter: impl AsRef<[&'static str]>,
) -> TelemetryGuard {
    if !config.console.enabled {
        return TelemetryGuard { _log_guard: None };
    }

    let directive = config
        .console
        .filtering_directive
        .clone()
        .unwrap_or_else(|| {
            get_envfilter_directive(
                tracing::Level::WARN,
                config.console.level.into_level(),
                crates_to_filter.as_ref(),
            )
        });
    let filter = tracing_subscriber::EnvFilter::builder().parse_lossy(&directive);

    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    match config.console.log_format {
        LogFormat::Default => {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_filter(filter),
                )
                .init();
        }
        LogFormat::Json => {
            // Disable color or emphasis related ANSI escape codes for JSON
            error_stack::Report::set_color_mode(error_stack::fmt::ColorMode::None);
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_writer(writer)
                        .with_filter(filter),
                )
                .init();
        }
    }

    tracing::info!(
        service = %service_name,
        build_version = env!("CARGO_PKG_VERSION"),
        "Logging subsystem initialized"
    );

    TelemetryGuard {
        _log_guard: Some(guard),
    }
}

const WORKSPACE_MEMBERS: [&str; 6] = [
    "http-server",
    "gateway-integration",
    "external-services",
    "storage",
    "domain_types",
    "votepay_common_utils",
];

fn get_envfilter_directive(
    default_log_level: tracing::Level,
    filter_log_level: tracing::Level,
    crates_to_filter: impl AsRef<[&'static str]>,
) -> String {
    WORKSPACE_MEMBERS
        .iter()
        .chain(crates_to_filter.as_ref().iter())
        .map(|crate_name| crate_name.replace('-', "_"))
        .fold(
            vec![default_log_level.to_string()],
            |mut directives, target| {
                directives.push(format!("{target}={filter_log_level}"));
                directives
            },
        )
        .join(",")
}
