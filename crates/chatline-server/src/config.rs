//! Daemon configuration loaded from environment variables.
//!
//! All settings have defaults so the daemon can start with zero
//! configuration, reading events from stdin and keeping state in memory
//! plus the default database.

use std::path::PathBuf;

use chatline_shared::crypto::{key_from_slice, SymmetricKey};

use crate::error::ServerError;

/// Where a stream of JSON-lines events comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Stdin,
    File(PathBuf),
}

impl SourceSpec {
    pub fn name(&self) -> String {
        match self {
            SourceSpec::Stdin => "stdin".to_string(),
            SourceSpec::File(path) => path.display().to_string(),
        }
    }
}

/// Daemon configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Event sources, each consumed by its own ordered pipeline.
    /// Env: `EVENT_SOURCES` (comma-separated paths, `-` for stdin)
    /// Default: stdin
    pub sources: Vec<SourceSpec>,

    /// Base directory for stored media.
    /// Env: `MEDIA_PATH`
    /// Default: `./media`
    pub media_path: PathBuf,

    /// Maximum stored media size in bytes (64 MiB).
    /// Env: `MAX_MEDIA_SIZE`
    pub max_media_size: usize,

    /// Directory that media `direct_path`s are confined to.
    /// Env: `MEDIA_SOURCE_ROOT`
    /// Default: unset (only relative paths are read)
    pub media_source_root: Option<PathBuf>,

    /// SQLite file for the write-through mirror.
    /// Env: `DATABASE_PATH`
    /// Default: unset (platform data directory)
    pub database_path: Option<PathBuf>,

    /// Env: `PERSISTENCE` (true/false)
    /// Default: `true`
    pub persistence: bool,

    /// JSON directory of contact and group names.
    /// Env: `CONTACTS_PATH`
    pub contacts_path: Option<PathBuf>,

    /// Master key for encrypted reactions and poll votes.
    /// Env: `PAYLOAD_KEY` (64 hex chars)
    pub payload_key: Option<SymmetricKey>,

    /// Per-subscriber fanout buffer.
    /// Env: `FANOUT_BUFFER`
    /// Default: `256`
    pub fanout_buffer: usize,

    /// Env: `STATS_INTERVAL_SECS`
    /// Default: `60`
    pub stats_interval_secs: u64,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("sources", &self.sources)
            .field("media_path", &self.media_path)
            .field("max_media_size", &self.max_media_size)
            .field("media_source_root", &self.media_source_root)
            .field("database_path", &self.database_path)
            .field("persistence", &self.persistence)
            .field("contacts_path", &self.contacts_path)
            .field("payload_key", &self.payload_key.map(|_| "<redacted>"))
            .field("fanout_buffer", &self.fanout_buffer)
            .field("stats_interval_secs", &self.stats_interval_secs)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            sources: vec![SourceSpec::Stdin],
            media_path: PathBuf::from("./media"),
            max_media_size: 64 * 1024 * 1024, // 64 MiB
            media_source_root: None,
            database_path: None,
            persistence: true,
            contacts_path: None,
            payload_key: None,
            fanout_buffer: 256,
            stats_interval_secs: 60,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(list) = var("EVENT_SOURCES") {
            let sources = parse_sources(&list);
            if sources.is_empty() {
                tracing::warn!(value = %list, "Empty EVENT_SOURCES, reading stdin");
            } else {
                config.sources = sources;
            }
        }

        if let Some(path) = var("MEDIA_PATH") {
            config.media_path = PathBuf::from(path);
        }

        if let Some(val) = var("MAX_MEDIA_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_media_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_MEDIA_SIZE, using default"),
            }
        }

        if let Some(path) = var("MEDIA_SOURCE_ROOT").filter(|p| !p.is_empty()) {
            config.media_source_root = Some(PathBuf::from(path));
        }

        if let Some(path) = var("DATABASE_PATH").filter(|p| !p.is_empty()) {
            config.database_path = Some(PathBuf::from(path));
        }

        if let Some(val) = var("PERSISTENCE") {
            config.persistence = val != "false" && val != "0";
        }

        if let Some(path) = var("CONTACTS_PATH").filter(|p| !p.is_empty()) {
            config.contacts_path = Some(PathBuf::from(path));
        }

        if let Some(hex_key) = var("PAYLOAD_KEY") {
            match parse_hex_key(&hex_key) {
                Ok(key) => config.payload_key = Some(key),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Invalid PAYLOAD_KEY, encrypted reactions and votes will be undecodable"
                    );
                }
            }
        }

        if let Some(val) = var("FANOUT_BUFFER") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.fanout_buffer = n,
                _ => tracing::warn!(value = %val, "Invalid FANOUT_BUFFER, using default"),
            }
        }

        if let Some(val) = var("STATS_INTERVAL_SECS") {
            match val.parse::<u64>() {
                Ok(n) if n > 0 => config.stats_interval_secs = n,
                _ => tracing::warn!(value = %val, "Invalid STATS_INTERVAL_SECS, using default"),
            }
        }

        config
    }
}

fn parse_sources(list: &str) -> Vec<SourceSpec> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s {
            "-" => SourceSpec::Stdin,
            path => SourceSpec::File(PathBuf::from(path)),
        })
        .collect()
}

/// Parse a 64-character hex string into a 32-byte key.
pub fn parse_hex_key(hex_key: &str) -> Result<SymmetricKey, ServerError> {
    let hex_key = hex_key.trim();
    if hex_key.len() != 64 {
        return Err(ServerError::InvalidKey(format!(
            "expected 64 hex chars, got {}",
            hex_key.len()
        )));
    }
    let bytes = hex::decode(hex_key).map_err(|e| ServerError::InvalidKey(e.to_string()))?;
    key_from_slice(&bytes).map_err(|e| ServerError::InvalidKey(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.sources, vec![SourceSpec::Stdin]);
        assert_eq!(config.max_media_size, 64 * 1024 * 1024);
        assert!(config.persistence);
        assert!(config.payload_key.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let key = "ab".repeat(32);
        let config = load(&[
            ("EVENT_SOURCES", "a.jsonl, -, ,b.jsonl"),
            ("PERSISTENCE", "false"),
            ("PAYLOAD_KEY", &key),
            ("FANOUT_BUFFER", "16"),
            ("DATABASE_PATH", "/tmp/x.db"),
        ]);
        assert_eq!(
            config.sources,
            vec![
                SourceSpec::File(PathBuf::from("a.jsonl")),
                SourceSpec::Stdin,
                SourceSpec::File(PathBuf::from("b.jsonl")),
            ]
        );
        assert!(!config.persistence);
        assert_eq!(config.payload_key, Some([0xab; 32]));
        assert_eq!(config.fanout_buffer, 16);
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/x.db")));
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = load(&[
            ("MAX_MEDIA_SIZE", "lots"),
            ("FANOUT_BUFFER", "0"),
            ("PAYLOAD_KEY", "abcd"),
            ("EVENT_SOURCES", " , "),
        ]);
        assert_eq!(config.max_media_size, 64 * 1024 * 1024);
        assert_eq!(config.fanout_buffer, 256);
        assert!(config.payload_key.is_none());
        assert_eq!(config.sources, vec![SourceSpec::Stdin]);
    }

    #[test]
    fn test_parse_hex_key() {
        assert_eq!(parse_hex_key(&"0F".repeat(32)).unwrap(), [0x0f; 32]);
        assert!(parse_hex_key("abcd").is_err());
        assert!(parse_hex_key(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = load(&[("PAYLOAD_KEY", &"ab".repeat(32))]);
        let printed = format!("{config:?}");
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("abab"));
    }
}
