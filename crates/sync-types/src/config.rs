//! Configuration loading for the sync worker.
//!
//! Layered config: defaults -> config file -> CLI config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/search-sync/config.toml.
//! Environment variables use the `SEARCH_SYNC_` prefix with `__` between
//! nested keys, e.g. `SEARCH_SYNC_CURRENT__URL`.

use std::path::PathBuf;

use config::{Config, Environment, File};
use directories::ProjectDirs;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::SyncError;

/// Connection settings for one search-index cluster.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexTargetSettings {
    /// Cluster base URL
    #[serde(default = "default_index_url")]
    pub url: String,

    /// Index name
    #[serde(default = "default_index_name")]
    pub index: String,

    /// Document type name used in the document path
    #[serde(default = "default_doc_type")]
    pub doc_type: String,

    /// Basic-auth user
    #[serde(default)]
    pub username: Option<String>,

    /// Basic-auth password (never logged)
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,
}

fn default_index_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_index_name() -> String {
    "items".to_string()
}

fn default_doc_type() -> String {
    "_doc".to_string()
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

impl Default for IndexTargetSettings {
    fn default() -> Self {
        Self {
            url: default_index_url(),
            index: default_index_name(),
            doc_type: default_doc_type(),
            username: None,
            password: None,
        }
    }
}

fn default_legacy_index_name() -> String {
    "items-legacy".to_string()
}

fn default_legacy_target() -> IndexTargetSettings {
    IndexTargetSettings {
        index: default_legacy_index_name(),
        ..IndexTargetSettings::default()
    }
}

/// Object store client settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectStoreSettings {
    /// Region override (falls back to the SDK's provider chain)
    #[serde(default)]
    pub region: Option<String>,

    /// Custom endpoint (e.g. a local S3-compatible server)
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

/// Retry queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Queue URL
    #[serde(default)]
    pub url: String,

    /// How long a received envelope stays hidden before redelivery
    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout_secs: u32,
}

fn default_visibility_timeout() -> u32 {
    10
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            visibility_timeout_secs: default_visibility_timeout(),
        }
    }
}

/// Identity used when the drain loop re-invokes itself.
///
/// Unset fields fall back to the runtime's environment
/// (`AWS_LAMBDA_FUNCTION_NAME`, `AWS_LAMBDA_FUNCTION_VERSION`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionSettings {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub qualifier: Option<String>,
}

impl FunctionSettings {
    /// Function name from config or the runtime environment.
    pub fn resolved_name(&self) -> Option<String> {
        self.name
            .clone()
            .or_else(|| std::env::var("AWS_LAMBDA_FUNCTION_NAME").ok())
            .filter(|name| !name.is_empty())
    }

    /// Function version from config or the runtime environment.
    pub fn resolved_qualifier(&self) -> Option<String> {
        self.qualifier
            .clone()
            .or_else(|| std::env::var("AWS_LAMBDA_FUNCTION_VERSION").ok())
            .filter(|qualifier| !qualifier.is_empty())
    }
}

/// Index writer policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriterSettings {
    /// Treat a not-found response on delete as success (default: false)
    #[serde(default)]
    pub tolerate_missing_on_delete: bool,
}

/// How many records of an event document the trigger handler processes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordMode {
    /// Only the first record (one event per invocation)
    #[default]
    First,
    /// Every record, each failure isolated from the others
    Each,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerSettings {
    #[serde(default)]
    pub record_mode: RecordMode,
}

/// Caps for the local bounded drain loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrainSettings {
    /// Maximum envelopes processed per run
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,

    /// Maximum wall-clock time per run
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: u64,
}

fn default_max_hops() -> usize {
    1000
}

fn default_max_duration() -> u64 {
    600
}

impl Default for DrainSettings {
    fn default() -> Self {
        Self {
            max_hops: default_max_hops(),
            max_duration_secs: default_max_duration(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Timeout for each request to an index cluster
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Version-gated index
    #[serde(default)]
    pub current: IndexTargetSettings,

    /// Last-write-wins index
    #[serde(default = "default_legacy_target")]
    pub legacy: IndexTargetSettings,

    #[serde(default)]
    pub object_store: ObjectStoreSettings,

    #[serde(default)]
    pub queue: QueueSettings,

    #[serde(default)]
    pub function: FunctionSettings,

    #[serde(default)]
    pub writer: WriterSettings,

    #[serde(default)]
    pub trigger: TriggerSettings,

    #[serde(default)]
    pub drain: DrainSettings,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            request_timeout_secs: default_request_timeout(),
            current: IndexTargetSettings::default(),
            legacy: default_legacy_target(),
            object_store: ObjectStoreSettings::default(),
            queue: QueueSettings::default(),
            function: FunctionSettings::default(),
            writer: WriterSettings::default(),
            trigger: TriggerSettings::default(),
            drain: DrainSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/search-sync/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (SEARCH_SYNC_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, SyncError> {
        let config_dir = ProjectDirs::from("", "", "search-sync")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("log_level", default_log_level())
            .map_err(|e| SyncError::Config(e.to_string()))?
            .set_default("request_timeout_secs", default_request_timeout())
            .map_err(|e| SyncError::Config(e.to_string()))?
            .set_default("current.url", default_index_url())
            .map_err(|e| SyncError::Config(e.to_string()))?
            .set_default("current.index", default_index_name())
            .map_err(|e| SyncError::Config(e.to_string()))?
            .set_default("current.doc_type", default_doc_type())
            .map_err(|e| SyncError::Config(e.to_string()))?
            .set_default("legacy.url", default_index_url())
            .map_err(|e| SyncError::Config(e.to_string()))?
            .set_default("legacy.index", default_legacy_index_name())
            .map_err(|e| SyncError::Config(e.to_string()))?
            .set_default("legacy.doc_type", default_doc_type())
            .map_err(|e| SyncError::Config(e.to_string()))?
            .set_default(
                "queue.visibility_timeout_secs",
                i64::from(default_visibility_timeout()),
            )
            .map_err(|e| SyncError::Config(e.to_string()))?
            .set_default("drain.max_hops", default_max_hops() as u64)
            .map_err(|e| SyncError::Config(e.to_string()))?
            .set_default("drain.max_duration_secs", default_max_duration())
            .map_err(|e| SyncError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: SEARCH_SYNC_LOG_LEVEL, SEARCH_SYNC_CURRENT__URL, SEARCH_SYNC_QUEUE__URL, ...
        builder = builder.add_source(
            Environment::with_prefix("SEARCH_SYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| SyncError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Check values that would otherwise only fail at the first request.
    pub fn validate(&self) -> Result<(), SyncError> {
        for (name, target) in [("current", &self.current), ("legacy", &self.legacy)] {
            if target.url.trim().is_empty() {
                return Err(SyncError::Config(format!("{name}.url must be set")));
            }
            if target.index.trim().is_empty() {
                return Err(SyncError::Config(format!("{name}.index must be set")));
            }
            if target.doc_type.trim().is_empty() {
                return Err(SyncError::Config(format!("{name}.doc_type must be set")));
            }
        }

        // A shared index would let the ungated legacy write undo the version gate
        if self.current.url.trim_end_matches('/') == self.legacy.url.trim_end_matches('/')
            && self.current.index == self.legacy.index
        {
            return Err(SyncError::Config(format!(
                "current and legacy both point at {}/{}",
                self.current.url, self.current.index
            )));
        }

        if self.queue.visibility_timeout_secs == 0 {
            return Err(SyncError::Config(
                "queue.visibility_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(SyncError::Config(
                "request_timeout_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.current.index, "items");
        assert_eq!(settings.legacy.index, "items-legacy");
        assert_eq!(settings.current.doc_type, "_doc");
        assert_eq!(settings.queue.visibility_timeout_secs, 10);
        assert_eq!(settings.trigger.record_mode, RecordMode::First);
        assert!(!settings.writer.tolerate_missing_on_delete);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_with_defaults() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.queue.visibility_timeout_secs, 10);
        assert_eq!(settings.drain.max_hops, 1000);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
log_level = "debug"

[current]
url = "https://es.example.org:9200"
index = "items-v2"
username = "sync"
password = "hunter2"

[legacy]
url = "https://es-old.example.org:9200"
doc_type = "item"

[queue]
url = "https://sqs.us-east-1.amazonaws.com/123/items-dlq"
visibility_timeout_secs = 30

[writer]
tolerate_missing_on_delete = true

[trigger]
record_mode = "each"
"#
        )
        .unwrap();

        let path = file.path().to_string_lossy().to_string();
        let settings = Settings::load(Some(&path)).unwrap();

        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.current.url, "https://es.example.org:9200");
        assert_eq!(settings.current.index, "items-v2");
        assert_eq!(settings.current.username.as_deref(), Some("sync"));
        assert_eq!(
            settings.current.password.as_ref().map(|p| p.expose_secret()),
            Some("hunter2")
        );
        assert_eq!(settings.legacy.doc_type, "item");
        assert_eq!(settings.legacy.index, "items-legacy");
        assert_eq!(settings.queue.visibility_timeout_secs, 30);
        assert!(settings.writer.tolerate_missing_on_delete);
        assert_eq!(settings.trigger.record_mode, RecordMode::Each);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_legacy_table_keeps_legacy_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[legacy]\ndoc_type = \"item\"").unwrap();

        let path = file.path().to_string_lossy().to_string();
        let settings = Settings::load(Some(&path)).unwrap();

        assert_eq!(settings.legacy.doc_type, "item");
        assert_eq!(settings.legacy.index, "items-legacy");
        assert_eq!(settings.legacy.url, "http://localhost:9200");
        assert_eq!(settings.current.index, "items");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_current_table_keeps_current_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[current]\nusername = \"sync\"").unwrap();

        let path = file.path().to_string_lossy().to_string();
        let settings = Settings::load(Some(&path)).unwrap();

        assert_eq!(settings.current.index, "items");
        assert_eq!(settings.current.doc_type, "_doc");
        assert_eq!(settings.legacy.index, "items-legacy");
    }

    #[test]
    fn test_missing_cli_config_file_fails() {
        let result = Settings::load(Some("/nonexistent/search-sync.toml"));
        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[test]
    fn test_password_not_in_debug_output() {
        let settings = Settings {
            current: IndexTargetSettings {
                password: Some(SecretString::from("hunter2".to_string())),
                ..IndexTargetSettings::default()
            },
            ..Settings::default()
        };
        assert!(!format!("{settings:?}").contains("hunter2"));
    }

    #[test]
    fn test_validate_rejects_shared_index() {
        let mut settings = Settings::default();
        settings.legacy.index = settings.current.index.clone();
        assert!(settings.validate().is_err());

        settings.legacy.url = "http://other:9200".to_string();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_visibility() {
        let mut settings = Settings::default();
        settings.queue.visibility_timeout_secs = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_function_settings_prefer_config() {
        let function = FunctionSettings {
            name: Some("items-dlq".to_string()),
            qualifier: Some("7".to_string()),
        };
        assert_eq!(function.resolved_name().as_deref(), Some("items-dlq"));
        assert_eq!(function.resolved_qualifier().as_deref(), Some("7"));
    }
}
