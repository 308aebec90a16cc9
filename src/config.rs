//! # Configuration
//!
//! Sources, lowest to highest precedence:
//! 1. built-in defaults
//! 2. a TOML file, `--config` or `promptform.toml` in the working directory
//! 3. `PROMPTFORM_` environment variables, `__` separating sections (`PROMPTFORM_LM__MODEL=llama3.2:3b`)
//! 4. command line flags

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::dispatch::DispatchOptions;

pub const DEFAULT_CONFIG_FILE: &str = "promptform.toml";
pub const ENV_PREFIX: &str = "PROMPTFORM_";

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "promptform", version, about = "A web form in front of a language model")]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<String>,

    /// Address to listen on, e.g. 0.0.0.0:5000
    #[arg(long, value_name = "ADDR")]
    pub addr: Option<SocketAddr>,

    /// Model name passed to the prediction backend
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, value_name = "URL")]
    pub api_base: Option<String>,

    /// Upper bound on one request to the backend, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Log level or env_logger filter, e.g. `debug` or `promptform=trace`
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub lm: LmConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { addr: SocketAddr::from(([127, 0, 0, 1], 5000)) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LmConfig {
    pub model: String,
    pub api_base: String,
    /// Empty for a local Ollama.
    pub api_key: String,
    pub temperature: f32,
    pub max_tokens: u16,
    pub timeout_secs: u64,
    /// Prompts longer than this many tokens are logged as likely to be truncated. `None` disables counting.
    pub context_window: Option<usize>,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            model: "llama3.2:3b".to_string(),
            api_base: "http://localhost:11434/v1".to_string(),
            api_key: String::new(),
            temperature: 0.0,
            max_tokens: 1000,
            timeout_secs: 60,
            context_window: Some(2048),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl AppConfig {
    /// Load the layered configuration, `cli` being the top layer.
    pub fn load_with_cli(cli: &CliArgs) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        figment = match &cli.config {
            Some(path) => {
                if !Path::new(path).is_file() {
                    bail!("config file {} does not exist", path);
                }
                figment.merge(Toml::file(path))
            }
            None => figment.merge(Toml::file(DEFAULT_CONFIG_FILE)),
        };
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        if let Some(addr) = cli.addr {
            figment = figment.merge(Serialized::default("server.addr", addr));
        }
        if let Some(model) = &cli.model {
            figment = figment.merge(Serialized::default("lm.model", model));
        }
        if let Some(api_base) = &cli.api_base {
            figment = figment.merge(Serialized::default("lm.api_base", api_base));
        }
        if let Some(timeout_secs) = cli.timeout_secs {
            figment = figment.merge(Serialized::default("lm.timeout_secs", timeout_secs));
        }
        if let Some(level) = &cli.log_level {
            figment = figment.merge(Serialized::default("log.level", level));
        }
        figment.extract().context("failed to load configuration")
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.lm.api_base).with_context(|| format!("invalid lm.api_base {:?}", self.lm.api_base))?;
        if self.lm.model.trim().is_empty() {
            bail!("lm.model must not be empty");
        }
        if self.lm.timeout_secs == 0 {
            bail!("lm.timeout_secs must be greater than 0");
        }
        Ok(())
    }

    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions { timeout: Duration::from_secs(self.lm.timeout_secs), ..DispatchOptions::default() }
    }
}

/// Install env_logger. `RUST_LOG` wins over the configured level.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.level.as_str()))
        .format_timestamp_millis()
        .try_init()
        .context("failed to initialise logging")
}

#[cfg(test)]
mod test_config {
    use std::net::SocketAddr;
    use std::time::Duration;

    use clap::Parser;
    use figment::Jail;

    use super::{AppConfig, CliArgs, LmConfig};

    fn load(args: &[&str]) -> Result<AppConfig, figment::Error> {
        let cli = CliArgs::parse_from(args);
        AppConfig::load_with_cli(&cli).map_err(|e| figment::Error::from(format!("{:#}", e)))
    }

    #[test]
    fn test_defaults() {
        Jail::expect_with(|_| {
            let config = load(&["promptform"])?;
            assert_eq!(AppConfig::default(), config);
            assert_eq!("127.0.0.1:5000".parse::<SocketAddr>().unwrap(), config.server.addr);
            assert_eq!("http://localhost:11434/v1", config.lm.api_base);
            assert_eq!(Duration::from_secs(60), config.dispatch_options().timeout);
            config.validate().unwrap();
            Ok(())
        });
    }

    #[test]
    fn test_layers() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "promptform.toml",
                r#"
                [server]
                addr = "0.0.0.0:8000"

                [lm]
                model = "from-file"
                timeout_secs = 10
                "#,
            )?;
            let config = load(&["promptform"])?;
            assert_eq!("0.0.0.0:8000".parse::<SocketAddr>().unwrap(), config.server.addr);
            assert_eq!("from-file", config.lm.model);
            assert_eq!(10, config.lm.timeout_secs);
            assert_eq!(LmConfig::default().api_base, config.lm.api_base);

            jail.set_env("PROMPTFORM_LM__MODEL", "from-env");
            jail.set_env("PROMPTFORM_LOG__LEVEL", "debug");
            let config = load(&["promptform"])?;
            assert_eq!("from-env", config.lm.model);
            assert_eq!("debug", config.log.level);

            let config =
                load(&["promptform", "--model", "from-cli", "--timeout-secs", "5", "--addr", "127.0.0.1:9000"])?;
            assert_eq!("from-cli", config.lm.model);
            assert_eq!(5, config.lm.timeout_secs);
            assert_eq!(9000, config.server.addr.port());
            Ok(())
        });
    }

    #[test]
    fn test_explicit_config_file() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "[lm]\napi_base = \"http://10.0.0.2:11434/v1\"\n")?;
            let config = load(&["promptform", "--config", "custom.toml"])?;
            assert_eq!("http://10.0.0.2:11434/v1", config.lm.api_base);
            assert!(load(&["promptform", "--config", "missing.toml"]).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_validate() {
        let mut config = AppConfig::default();
        config.lm.api_base = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.lm.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.lm.model = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
