use clap::Parser;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;

use crate::proxy::RewriteConfig;
use crate::theme::ThemeMode;

/// Prefix for environment overrides, e.g. `AUTO_LEDGER_SERVER__PORT=8000`.
pub const ENV_PREFIX: &str = "AUTO_LEDGER";

/// Config file picked up from the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Base URL of the backend API that `/api` requests are forwarded to
    #[arg(long, env = "BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Verify identity-provider sessions (disable for local development)
    #[arg(long, env = "IDENTITY_ENABLED")]
    pub identity_enabled: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub proxy: ProxyConfig,
    pub identity: IdentityConfig,
    pub theme: ThemeConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub static_dir: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProxyConfig {
    pub backend_url: String,
    /// Explicit rewrite rules. Empty means the single `/api/:path*` rule.
    #[serde(default)]
    pub rewrites: Vec<RewriteConfig>,
    pub timeout_secs: u64,
    pub forward_session_as_bearer: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IdentityConfig {
    pub enabled: bool,
    /// Issuer URI; JWKS is fetched from `{issuer}/.well-known/jwks.json`.
    pub issuer: String,
    /// Expected `aud` claim. Not checked when unset.
    pub audience: Option<String>,
    pub session_cookie: String,
    pub leeway_secs: u64,
    pub require_sign_in: bool,
    pub sign_in_url: String,
    pub sign_out_url: String,
    pub account_url: Option<String>,
    pub publishable_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ThemeConfig {
    pub default_mode: ThemeMode,
    pub enable_system: bool,
    pub disable_transition_on_change: bool,
    pub cookie: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl ProxyConfig {
    /// Rewrite rules in effect: the configured list, or the backend default.
    pub fn effective_rewrites(&self) -> Vec<RewriteConfig> {
        if self.rewrites.is_empty() {
            vec![RewriteConfig::backend_default(&self.backend_url)]
        } else {
            self.rewrites.clone()
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    /// Priority: CLI flag (or its env var) > `AUTO_LEDGER_*` env > config file > defaults.
    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder()
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.static_dir", "static")?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("proxy.backend_url", "http://localhost:9090")?
            .set_default("proxy.timeout_secs", 30)?
            .set_default("proxy.forward_session_as_bearer", false)?
            .set_default("identity.enabled", true)?
            .set_default("identity.issuer", "")?
            .set_default("identity.session_cookie", "__session")?
            .set_default("identity.leeway_secs", 5)?
            .set_default("identity.require_sign_in", false)?
            .set_default("identity.sign_in_url", "/sign-in")?
            .set_default("identity.sign_out_url", "/sign-out")?
            .set_default("theme.default_mode", "system")?
            .set_default("theme.enable_system", true)?
            .set_default("theme.disable_transition_on_change", true)?
            .set_default("theme.cookie", "theme")?
            .set_default("logging.format", "compact")?;

        match &cli.config {
            Some(path) => {
                builder = builder.add_source(File::new(path, format_for(path)).required(true));
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder = builder
                    .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));
            }
            None => {}
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(url) = cli.backend_url {
            builder = builder.set_override("proxy.backend_url", url)?;
        }
        if let Some(enabled) = cli.identity_enabled {
            builder = builder.set_override("identity.enabled", enabled)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.identity.enabled && self.identity.issuer.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "identity.issuer is required when identity.enabled is true".to_string(),
            ));
        }
        if url::Url::parse(&self.proxy.backend_url).is_err() {
            return Err(config::ConfigError::Message(format!(
                "proxy.backend_url is not a valid URL: {}",
                self.proxy.backend_url
            )));
        }
        Ok(())
    }
}

fn format_for(path: &str) -> FileFormat {
    match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some("toml") => FileFormat::Toml,
        Some("json") => FileFormat::Json,
        _ => FileFormat::Yaml,
    }
}
