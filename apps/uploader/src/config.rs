//! Uploader configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/osvup/uploader.toml`
//! - Windows: `%APPDATA%/osvup/uploader.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use osvup_protocol::ApiEndpoints;
use osvup_protocol::constants::{
    DEFAULT_API_VERSION, DEFAULT_BASE_URL, DEFAULT_RETRY_DELAY, DEFAULT_UPLOAD_SOURCE,
};
use osvup_upload::UploadConfig;
use serde::{Deserialize, Serialize};

/// Uploader configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Service root, without version.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Wait between a failed attempt and the next.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Value sent as `uploadSource`.
    #[serde(default = "default_upload_source")]
    pub upload_source: String,

    /// Whole-request timeout in seconds (0 = none).
    #[serde(default)]
    pub request_timeout_secs: u64,

    /// Used when neither the command line nor the manifest has a token.
    #[serde(default)]
    pub access_token: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.into()
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY.as_millis() as u64
}

fn default_upload_source() -> String {
    DEFAULT_UPLOAD_SOURCE.into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_version: default_api_version(),
            retry_delay_ms: default_retry_delay_ms(),
            upload_source: default_upload_source(),
            request_timeout_secs: 0,
            access_token: String::new(),
        }
    }
}

impl Config {
    /// Loads configuration from `path` (or the per-user location), creating
    /// a default file if none exists.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => config_path()?,
        };
        Self::load_from(&path)
    }

    fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Rejects values the uploader cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.retry_delay_ms == 0 {
            anyhow::bail!("retry_delay_ms must be at least 1");
        }
        Ok(())
    }

    /// Writes the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The file may hold an access token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn upload_config(&self) -> UploadConfig {
        UploadConfig {
            endpoints: ApiEndpoints::new(self.base_url.clone(), self.api_version.clone()),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            upload_source: self.upload_source.clone(),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("osvup")
            .join("uploader.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("osvup").join("uploader.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/osvup/uploader.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osvup_protocol::Command;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.base_url, "https://openstreetcam.org");
        assert_eq!(config.api_version, "1.0");
        assert_eq!(config.retry_delay_ms, 1000);
        assert_eq!(config.upload_source, "osvup");
        assert_eq!(config.request_timeout(), None);
        assert!(config.access_token.is_empty());
    }

    #[test]
    fn config_partial_toml() {
        let config: Config = toml::from_str(r#"base_url = "http://localhost:8080""#).unwrap();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.api_version, "1.0");
        assert_eq!(config.retry_delay_ms, 1000);
    }

    #[test]
    fn upload_config_from_fields() {
        let config = Config {
            base_url: "http://localhost:8080/".into(),
            api_version: "2.0".into(),
            retry_delay_ms: 250,
            request_timeout_secs: 30,
            ..Config::default()
        };

        let upload = config.upload_config();
        assert_eq!(upload.endpoints.url(Command::Photo), "http://localhost:8080/2.0/photo/");
        assert_eq!(upload.retry_delay, Duration::from_millis(250));
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn config_path_not_empty() {
        let path = config_path().unwrap();
        assert!(path.to_string_lossy().contains("osvup"));
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("uploader.toml");

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn config_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("uploader.toml");

        let config = Config {
            access_token: "secret".into(),
            retry_delay_ms: 50,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn invalid_toml_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("uploader.toml");
        std::fs::write(&path, "retry_delay_ms = \"soon\"").unwrap();

        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn zero_retry_delay_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("uploader.toml");
        std::fs::write(&path, "retry_delay_ms = 0").unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("retry_delay_ms"));

        std::fs::write(&path, "retry_delay_ms = 1").unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().retry_delay_ms, 1);
    }
}
