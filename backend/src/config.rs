//! Configuration management.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variables understood without the `CV_MCP_` prefix, and the
/// config keys they map to.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("PORT", "server.port"),
    ("CORS_ORIGINS", "server.cors_origins"),
    ("EMAIL_HOST", "email.host"),
    ("EMAIL_PORT", "email.port"),
    ("EMAIL_SECURE", "email.secure"),
    ("EMAIL_USER", "email.user"),
    ("EMAIL_PASS", "email.pass"),
    ("EMAIL_FROM", "email.from"),
];

/// Configuration structure that matches the TOML file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    profile: ProfileConfig,
    #[serde(default)]
    email: EmailConfig,
    #[serde(default)]
    mcp: McpConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ServerConfig {
    #[serde(default = "default_port")]
    port: u16,
    /// Allowed CORS origins, as a list or a comma-separated string
    #[serde(default, deserialize_with = "origins_from_list_or_csv")]
    cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ProfileConfig {
    /// Path to the profile JSON document (embedded default if unset)
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct McpConfig {
    #[serde(default = "default_idle_timeout")]
    session_idle_timeout_secs: u64,
    #[serde(default = "default_sweep_interval")]
    sweep_interval_secs: u64,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            session_idle_timeout_secs: default_idle_timeout(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct LoggingConfig {
    /// Path to log file (if set, logs will be written to file in addition to stdout)
    log_file: Option<PathBuf>,
    /// Log level (trace, debug, info, warn, error)
    /// If not set, uses RUST_LOG environment variable or defaults to "info"
    log_level: Option<String>,
}

/// Outbound mail (SMTP) settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// Implicit TLS when true, STARTTLS otherwise
    #[serde(default)]
    pub secure: bool,
    pub user: Option<String>,
    pub pass: Option<String>,
    /// Sender address (defaults to `user`)
    pub from: Option<String>,
    #[serde(default = "default_email_timeout")]
    pub timeout_secs: u64,
    /// Refuse to start without complete credentials
    #[serde(default)]
    pub required: bool,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_smtp_port(),
            secure: false,
            user: None,
            pass: None,
            from: None,
            timeout_secs: default_email_timeout(),
            required: false,
        }
    }
}

impl EmailConfig {
    /// Names of the settings that must be present before mail can be sent.
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.host.as_deref().map_or(true, str::is_empty) {
            missing.push("EMAIL_HOST");
        }
        if self.user.as_deref().map_or(true, str::is_empty) {
            missing.push("EMAIL_USER");
        }
        if self.pass.as_deref().map_or(true, str::is_empty) {
            missing.push("EMAIL_PASS");
        }
        missing
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("user", &self.user)
            .field("pass", &self.pass.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .field("timeout_secs", &self.timeout_secs)
            .field("required", &self.required)
            .finish()
    }
}

fn default_port() -> u16 {
    cv_mcp_types::DEFAULT_PORT
}

fn default_smtp_port() -> u16 {
    587
}

fn default_email_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    30 * 60
}

fn default_sweep_interval() -> u64 {
    60
}

fn origins_from_list_or_csv<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Origins {
        Csv(String),
        List(Vec<String>),
    }

    let origins = match Origins::deserialize(deserializer)? {
        Origins::Csv(s) => s.split(',').map(str::to_string).collect(),
        Origins::List(list) => list,
    };
    Ok(origins
        .into_iter()
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect())
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on
    pub port: u16,
    /// Allowed CORS origins (empty allows any origin)
    pub cors_origins: Vec<String>,
    /// Profile document path (embedded default if None)
    pub profile_path: Option<PathBuf>,
    /// SMTP settings
    pub email: EmailConfig,
    /// Idle time after which an MCP session is closed (0 disables expiry)
    pub session_idle_timeout_secs: u64,
    /// How often idle sessions are swept
    pub sweep_interval_secs: u64,
    /// Path to log file (if set, logs will be written to file in addition to stdout)
    pub log_file: Option<PathBuf>,
    /// Log level (if set, overrides RUST_LOG environment variable)
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with full priority chain:
    /// CLI args > legacy env vars > `CV_MCP_*` env vars > config files > defaults.
    ///
    /// Config files are merged in this order:
    /// 1. `config.toml` in user config directory (~/.config/cv-mcp/ on Linux)
    /// 2. `.cv-mcp.toml` in current directory
    /// 3. `config_file`, when given
    ///
    /// Nested keys are separated by a double underscore in prefixed env vars,
    /// e.g. `CV_MCP_EMAIL__TIMEOUT_SECS=10`.
    pub fn from_figment(
        port: Option<u16>,
        profile_path: Option<PathBuf>,
        config_file: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let local_config = std::env::current_dir()
            .ok()
            .map(|d| d.join(".cv-mcp.toml"));
        let user_config = directories::ProjectDirs::from("", "", "cv-mcp")
            .map(|dirs| dirs.config_dir().join("config.toml"));

        // 1. Start with defaults
        let mut figment = Figment::new().merge(Serialized::defaults(ConfigFile::default()));

        // 2. Merge config files that exist
        for path in [user_config, local_config].into_iter().flatten() {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }
        if let Some(ref path) = config_file {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            figment = figment.merge(Toml::file(path));
        }

        // 3. Merge prefixed environment variables
        figment = figment.merge(Env::prefixed("CV_MCP_").split("__"));

        // 4. Merge the unprefixed variables the service has always read
        figment = figment.merge(
            Env::raw()
                .only(&LEGACY_ENV.iter().map(|(var, _)| *var).collect::<Vec<_>>())
                .map(|key| {
                    LEGACY_ENV
                        .iter()
                        .find(|(var, _)| key.as_str().eq_ignore_ascii_case(var))
                        .map(|(_, path)| (*path).into())
                        .unwrap_or_else(|| key.into())
                }),
        );

        // 5. Merge CLI arguments (highest priority)
        if let Some(p) = port {
            figment = figment.merge(Serialized::default("server.port", p));
        }
        if let Some(ref path) = profile_path {
            figment = figment.merge(Serialized::default("profile.path", path));
        }

        let config_file: ConfigFile = figment.extract()?;

        Ok(Self {
            port: config_file.server.port,
            cors_origins: config_file.server.cors_origins,
            profile_path: config_file.profile.path,
            email: config_file.email,
            session_idle_timeout_secs: config_file.mcp.session_idle_timeout_secs,
            sweep_interval_secs: config_file.mcp.sweep_interval_secs,
            log_file: config_file.logging.log_file,
            log_level: config_file.logging.log_level,
        })
    }

    /// Idle timeout for MCP sessions, or `None` when expiry is disabled.
    pub fn session_idle_timeout(&self) -> Option<Duration> {
        (self.session_idle_timeout_secs > 0)
            .then(|| Duration::from_secs(self.session_idle_timeout_secs))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}
