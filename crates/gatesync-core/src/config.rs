//! gatesync.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fallback bound on a single bundle fetch or status report.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    /// Directory holding one deployment store per feed marker.
    pub data_dir: PathBuf,
    /// Local bundle cache. Defaults to `<data_dir>/bundles`.
    pub bundle_dir: Option<PathBuf>,
    /// Base URI that deployment status reports are posted under.
    pub api_server_base: String,
    /// Sent as `Authorization: Bearer <token>` on status reports.
    pub bearer_token: Option<String>,
    /// Duration string, e.g. "30s", "500ms", "2m".
    pub http_timeout: Option<String>,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_filter: Option<String>,
}

impl AgentConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AgentConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a minimal gatesync.toml rooted at `data_dir`.
    pub fn scaffold(data_dir: &Path, api_server_base: &str) -> Self {
        AgentConfig {
            data_dir: data_dir.to_path_buf(),
            bundle_dir: None,
            api_server_base: api_server_base.to_string(),
            bearer_token: None,
            http_timeout: Some("30s".to_string()),
            log_filter: None,
        }
    }

    pub fn bundle_dir(&self) -> PathBuf {
        self.bundle_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("bundles"))
    }

    /// Configured HTTP timeout; unparseable values fall back to 30s.
    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
            .as_deref()
            .and_then(parse_duration)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT)
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaffold_round_trips_through_toml() {
        let config = AgentConfig::scaffold(Path::new("/var/lib/gatesync"), "http://api.local");
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("/var/lib/gatesync"));
        let parsed: AgentConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_parse_minimal() {
        let toml_str = r#"
data_dir = "/tmp/gs"
api_server_base = "http://127.0.0.1:9000"
"#;
        let config: AgentConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bundle_dir(), PathBuf::from("/tmp/gs/bundles"));
        assert_eq!(config.http_timeout(), DEFAULT_HTTP_TIMEOUT);
        assert!(config.bearer_token.is_none());
    }

    #[test]
    fn test_explicit_bundle_dir_and_timeout() {
        let toml_str = r#"
data_dir = "/tmp/gs"
bundle_dir = "/srv/bundles"
api_server_base = "http://127.0.0.1:9000"
http_timeout = "500ms"
"#;
        let config: AgentConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bundle_dir(), PathBuf::from("/srv/bundles"));
        assert_eq!(config.http_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gatesync.toml");
        std::fs::write(
            &path,
            "data_dir = \"/data\"\napi_server_base = \"http://x\"\nbearer_token = \"t0k\"\n",
        )
        .unwrap();
        let config = AgentConfig::from_file(&path).unwrap();
        assert_eq!(config.bearer_token.as_deref(), Some("t0k"));
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("soon"), None);
    }

    #[test]
    fn test_unparseable_timeout_falls_back() {
        let mut config = AgentConfig::scaffold(Path::new("/d"), "http://x");
        config.http_timeout = Some("forever".to_string());
        assert_eq!(config.http_timeout(), DEFAULT_HTTP_TIMEOUT);
    }
}
