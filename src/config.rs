//! Task configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. The `--config` command line argument
//! 2. `$MAILHARVEST_CONFIG` (environment variable)
//! 3. `<config_dir>/mailharvest/config.toml`
//!
//! Every task is validated at load time; a task missing required fields,
//! carrying an unsupported auth mode, an unparseable interval, or a broken
//! naming template fails the whole load before any loop starts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{HarvestError, Result};
use crate::harvest::naming::NameTemplate;

/// Fallback run interval used when a task's interval string does not parse.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Top-level configuration: the task list plus process-wide settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Log level: "error", "warn", "info", "debug", "trace".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Harvesting tasks; each drives one independent scheduler loop.
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// One mailbox→store harvesting job with its own schedule.
///
/// Immutable after load; read-only shared with the task's loop.
#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    /// Task name, used as the log prefix.
    pub name: String,

    /// Source mailbox credentials and folder selector.
    pub source: MailboxConfig,

    /// Destination store endpoint and credentials.
    pub destination: StoreConfig,

    /// Base remote path segment under the store root.
    #[serde(default)]
    pub path: String,

    /// Additional remote path segments appended after `path`.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Message and attachment filter rules.
    #[serde(default)]
    pub filter: FilterConfig,

    /// Run interval as a duration string (e.g. "90s", "5m", "1h").
    pub interval: String,

    /// Naming template expanded per attachment (see `harvest::naming`).
    pub format: String,

    /// Flag successfully harvested messages as read after the cycle.
    #[serde(default)]
    pub mark_seen: bool,
}

/// IMAP mailbox endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct MailboxConfig {
    pub host: String,
    #[serde(default = "default_imap_port")]
    pub port: u16,
    pub user: String,
    pub pass: String,
    /// Folder to harvest from.
    #[serde(default = "default_mailbox")]
    pub mailbox: String,
}

/// WebDAV store endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Collection URL all uploads are placed under.
    pub base_url: String,
    /// Auth mode: "basic" (default) or "bearer".
    #[serde(default)]
    pub auth: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: String,
    #[serde(default)]
    pub token: String,
}

/// Per-task filter rules. All lists are allow-lists; empty means "any".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterConfig {
    /// Addresses that must appear in To/Cc/Bcc for a message to qualify.
    #[serde(default)]
    pub recipients: Vec<String>,

    /// Seen-state constraint: unset = any, `true` = only seen,
    /// `false` = only unseen.
    pub seen: Option<bool>,

    /// Attachment extensions to accept (case-insensitive, leading dots
    /// ignored).
    #[serde(default)]
    pub extensions: Vec<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_imap_port() -> u16 {
    993
}

fn default_mailbox() -> String {
    "INBOX".to_string()
}

impl Task {
    /// Parsed run interval, falling back to [`DEFAULT_INTERVAL`] when the
    /// configured string does not parse.
    pub fn interval_or_default(&self) -> Duration {
        humantime::parse_duration(self.interval.trim()).unwrap_or(DEFAULT_INTERVAL)
    }
}

/// Load and validate configuration from `path`.
pub fn load(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| HarvestError::Config(format!("{}: {e}", path.display())))?;
    for task in &config.tasks {
        validate_task(task)?;
    }
    Ok(config)
}

/// Validate one task entry. Errors name the offending task.
fn validate_task(task: &Task) -> Result<()> {
    let fail = |reason: &str| {
        Err(HarvestError::Config(format!(
            "task '{}': {reason}",
            task.name
        )))
    };

    if task.name.trim().is_empty() {
        return Err(HarvestError::Config("task name required".to_string()));
    }
    if task.source.host.trim().is_empty() {
        return fail("source.host required");
    }
    if task.source.user.is_empty() || task.source.pass.is_empty() {
        return fail("source.user and source.pass required");
    }
    if task.source.mailbox.trim().is_empty() {
        return fail("source.mailbox required");
    }
    if task.destination.base_url.trim().is_empty() {
        return fail("destination.base_url required");
    }
    match task.destination.auth.trim().to_lowercase().as_str() {
        "" | "basic" => {
            if task.destination.user.is_empty() || task.destination.pass.is_empty() {
                return fail("destination.user and destination.pass required for basic auth");
            }
        }
        "bearer" => {
            if task.destination.token.is_empty() {
                return fail("destination.token required for bearer auth");
            }
        }
        other => {
            return Err(HarvestError::Config(format!(
                "task '{}': destination.auth must be \"basic\" or \"bearer\", got \"{other}\"",
                task.name
            )));
        }
    }
    if humantime::parse_duration(task.interval.trim()).is_err() {
        return fail("interval must be a valid duration (e.g. \"5m\")");
    }
    if task.format.trim().is_empty() {
        return fail("format template required");
    }
    if let Err(e) = NameTemplate::parse(&task.format) {
        return Err(HarvestError::Config(format!(
            "task '{}': format: {e}",
            task.name
        )));
    }
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILHARVEST_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailharvest").join("config.toml"))
}

/// Return the cache directory used for log files.
pub fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailharvest")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const VALID: &str = r#"
[[tasks]]
name = "invoices"
interval = "5m"
path = "archive"
tags = ["invoices"]
format = "{datetime}-{orig_base}{orig_ext}"
mark_seen = true

[tasks.source]
host = "imap.example.com"
user = "harvest@example.com"
pass = "secret"

[tasks.destination]
base_url = "https://dav.example.com/files/harvest/"
user = "harvest"
pass = "secret"

[tasks.filter]
recipients = ["ops@example.com"]
seen = false
extensions = ["pdf"]
"#;

    fn parse(toml_str: &str) -> Config {
        toml::from_str(toml_str).expect("parse config")
    }

    #[test]
    fn test_valid_config_passes_validation() {
        let config = parse(VALID);
        assert_eq!(config.tasks.len(), 1);
        validate_task(&config.tasks[0]).expect("valid task");
    }

    #[test]
    fn test_defaults() {
        let config = parse(VALID);
        let task = &config.tasks[0];
        assert_eq!(task.source.port, 993);
        assert_eq!(task.source.mailbox, "INBOX");
        assert_eq!(task.destination.auth, "");
        assert_eq!(config.log_level, "info");
        assert_eq!(task.interval_or_default(), Duration::from_secs(300));
    }

    #[test]
    fn test_interval_fallback() {
        let mut config = parse(VALID);
        config.tasks[0].interval = "whenever".to_string();
        assert_eq!(config.tasks[0].interval_or_default(), DEFAULT_INTERVAL);
    }

    #[test]
    fn test_missing_source_user_rejected() {
        let mut config = parse(VALID);
        config.tasks[0].source.user.clear();
        let err = validate_task(&config.tasks[0]).unwrap_err();
        assert!(err.to_string().contains("source.user"));
        assert!(err.to_string().contains("invoices"));
    }

    #[test]
    fn test_unsupported_auth_mode_rejected() {
        let mut config = parse(VALID);
        config.tasks[0].destination.auth = "digest".to_string();
        let err = validate_task(&config.tasks[0]).unwrap_err();
        assert!(err.to_string().contains("digest"));
    }

    #[test]
    fn test_bearer_auth_requires_token() {
        let mut config = parse(VALID);
        config.tasks[0].destination.auth = "bearer".to_string();
        assert!(validate_task(&config.tasks[0]).is_err());

        config.tasks[0].destination.token = "tok".to_string();
        validate_task(&config.tasks[0]).expect("bearer with token");
    }

    #[test]
    fn test_bad_interval_rejected() {
        let mut config = parse(VALID);
        config.tasks[0].interval = "soonish".to_string();
        let err = validate_task(&config.tasks[0]).unwrap_err();
        assert!(err.to_string().contains("interval"));
    }

    #[test]
    fn test_unknown_template_placeholder_rejected() {
        let mut config = parse(VALID);
        config.tasks[0].format = "{nope}".to_string();
        let err = validate_task(&config.tasks[0]).unwrap_err();
        assert!(err.to_string().contains("format"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(VALID.as_bytes()).expect("write config");
        let config = load(file.path()).expect("load config");
        assert_eq!(config.tasks[0].name, "invoices");
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = load(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, HarvestError::Io { .. }));
    }
}
