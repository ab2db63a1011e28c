use std::path::PathBuf;

use common_utils::consts;
use gateway_integration::fonepay::verification::MerchantApiParams;
use rust_decimal::Decimal;

use crate::logger;

#[derive(Clone, serde::Deserialize, Debug)]
pub struct Config {
    pub common: Common,
    pub server: Server,
    pub metrics: MetricsServer,
    pub log: logger::LogConfig,
    pub gateway: GatewayConfig,
    pub voting: VotingConfig,
}

#[derive(Clone, serde::Deserialize, Debug)]
pub struct Common {
    pub environment: String,
}

impl Common {
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        match self.environment.as_str() {
            "development" | "production" => Ok(()),
            _ => Err(config::ConfigError::Message(format!(
                "Invalid environment '{}'. Must be 'development' or 'production'",
                self.environment
            ))),
        }
    }
}

#[derive(Clone, serde::Deserialize, Debug)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, serde::Deserialize, Debug)]
pub struct MetricsServer {
    pub host: String,
    pub port: u16,
}

/// The gateway capability handed to the handlers. Confirmation behavior is
/// decided from these fields, never from ambient environment variables.
#[derive(Clone, serde::Deserialize)]
pub struct GatewayConfig {
    /// Browser-facing payment endpoint the redirect URL is built on.
    pub base_url: String,
    pub merchant_id: String,
    /// Shared secret for the redirect DV digest.
    pub secret_key: String,
    /// Sandbox mode: trust the redirect, skip S2S confirmation outright.
    pub sandbox: bool,
    /// This service's own public base; the return URL is derived from it.
    pub public_base_url: String,
    /// Frontend page the callback redirects the browser to.
    pub status_page_url: String,
    pub currency: String,
    /// Merchant-API credentials; `None` switches the live flow to the
    /// redirect-trust bypass.
    pub api: Option<MerchantApiParams>,
}

impl GatewayConfig {
    pub fn return_url(&self) -> String {
        format!(
            "{}/api/payments/return",
            self.public_base_url.trim_end_matches('/')
        )
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("merchant_id", &self.merchant_id)
            .field("secret_key", &"***")
            .field("sandbox", &self.sandbox)
            .field("public_base_url", &self.public_base_url)
            .field("status_page_url", &self.status_page_url)
            .field("currency", &self.currency)
            .field("api", &self.api)
            .finish()
    }
}

#[derive(Clone, serde::Deserialize, Debug)]
pub struct VotingConfig {
    pub unit_price_per_vote: Decimal,
    #[serde(default)]
    pub contestants: Vec<ContestantSeed>,
}

#[derive(Clone, serde::Deserialize, Debug)]
pub struct ContestantSeed {
    pub id: String,
    pub name: String,
}

impl Config {
    /// Function to build the configuration by picking it from default locations
    pub fn new() -> Result<Self, config::ConfigError> {
        Self::new_with_config_path(None)
    }

    /// Function to build the configuration by picking it from default locations
    pub fn new_with_config_path(
        explicit_config_path: Option<PathBuf>,
    ) -> Result<Self, config::ConfigError> {
        let env = consts::Env::current_env();
        let config_path = Self::config_path(&env, explicit_config_path);

        let config = Self::builder(&env)?
            .add_source(config::File::from(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("VP")
                    .try_parsing(true)
                    .separator("__"),
            )
            .build()?;

        #[allow(clippy::print_stderr)]
        let config: Self = serde_path_to_error::deserialize(config).map_err(|error| {
            eprintln!("Unable to deserialize application configuration: {error}");
            error.into_inner()
        })?;

        config.common.validate()?;

        Ok(config)
    }

    pub fn builder(
        environment: &consts::Env,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        config::Config::builder()
            // Here, it should be `set_override()` not `set_default()`.
            // "env" can't be altered by config field.
            .set_override("env", environment.to_string())
    }

    /// Config path.
    pub fn config_path(
        environment: &consts::Env,
        explicit_config_path: Option<PathBuf>,
    ) -> PathBuf {
        let mut config_path = PathBuf::new();
        if let Some(explicit_config_path_val) = explicit_config_path {
            config_path.push(explicit_config_path_val);
        } else {
            let config_directory: String = "config".into();
            let config_file_name = environment.config_path();

            config_path.push(workspace_path());
            config_path.push(config_directory);
            config_path.push(config_file_name);
        }
        config_path
    }
}

impl Server {
    pub async fn tcp_listener(
        &self,
    ) -> Result<tokio::net::TcpListener, crate::error::ConfigurationError> {
        let loc = format!("{}:{}", self.host, self.port);

        tracing::info!(loc = %loc, "binding the server");

        Ok(tokio::net::TcpListener::bind(loc).await?)
    }
}

impl MetricsServer {
    pub async fn tcp_listener(
        &self,
    ) -> Result<tokio::net::TcpListener, crate::error::ConfigurationError> {
        let loc = format!("{}:{}", self.host, self.port);

        tracing::info!(loc = %loc, "binding the metrics server");

        Ok(tokio::net::TcpListener::bind(loc).await?)
    }
}

pub fn workspace_path() -> PathBuf {
    if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
        let mut path = PathBuf::from(manifest_dir);
        path.pop();
        path.pop();
        path
    } else {
        PathBuf::from(".")
    }
}
