//! Downloader configuration
//!
//! Every field has a default, so a config file only lists what it changes:
//!
//! ```toml
//! default_base_name = "picture"
//! load_timeout_ms = 10000
//! convert_format = "webp"
//!
//! [batch]
//! batch_size = 3
//! delay_ms = 250
//! ```

use crate::batch::BatchOptions;
use crate::error::ConfigError;
use crate::types::{AcquisitionPreference, ConvertFormat, DownloadOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Downloader-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    /// Base name when neither an override nor the locator yields one
    pub default_base_name: String,
    /// Extension when neither the MIME type nor the locator yields one
    pub default_extension: String,
    /// Element load timeout in milliseconds
    pub load_timeout_ms: Option<u64>,
    /// Strategy preference applied to [`DownloaderConfig::download_options`]
    pub prefer: AcquisitionPreference,
    /// Conversion target applied to [`DownloaderConfig::download_options`]
    pub convert_format: Option<ConvertFormat>,
    /// Batch shape for multi-image operations
    pub batch: BatchOptions,
}

impl DownloaderConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` or `ConfigError::Invalid`
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// Returns `ConfigError::Io` if the file cannot be read, otherwise as
    /// [`Self::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded downloader config");
        Ok(config)
    }

    /// Reject values that would produce unusable file names
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` naming the offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_base_name.trim().is_empty() {
            return Err(ConfigError::Invalid("default_base_name is empty".to_string()));
        }
        let extension = self.default_extension.trim_start_matches('.');
        if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric() || c == '+') {
            return Err(ConfigError::Invalid(format!(
                "default_extension '{}' is not a plain extension",
                self.default_extension
            )));
        }
        Ok(())
    }

    /// With default base name
    #[inline]
    #[must_use]
    pub fn with_default_base_name(mut self, name: impl Into<String>) -> Self {
        self.default_base_name = name.into();
        self
    }

    /// With default extension
    #[inline]
    #[must_use]
    pub fn with_default_extension(mut self, extension: impl Into<String>) -> Self {
        self.default_extension = extension.into();
        self
    }

    /// With element load timeout
    #[inline]
    #[must_use]
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    #[inline]
    #[must_use]
    pub fn with_prefer(mut self, prefer: AcquisitionPreference) -> Self {
        self.prefer = prefer;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_convert_format(mut self, format: ConvertFormat) -> Self {
        self.convert_format = Some(format);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_batch(mut self, batch: BatchOptions) -> Self {
        self.batch = batch;
        self
    }

    /// Default extension without a leading dot
    #[must_use]
    pub fn default_extension(&self) -> &str {
        self.default_extension.trim_start_matches('.')
    }

    #[must_use]
    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_ms.map(Duration::from_millis)
    }

    /// Per-call options seeded from this config
    #[must_use]
    pub fn download_options(&self) -> DownloadOptions {
        DownloadOptions {
            prefer: self.prefer,
            convert_format: self.convert_format,
            timeout: self.load_timeout(),
            ..DownloadOptions::default()
        }
    }
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            default_base_name: "image".to_string(),
            default_extension: "png".to_string(),
            load_timeout_ms: None,
            prefer: AcquisitionPreference::Auto,
            convert_format: None,
            batch: BatchOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(DownloaderConfig::from_toml_str("").unwrap(), DownloaderConfig::default());
    }

    #[test]
    fn partial_toml_overrides() {
        let config = DownloaderConfig::from_toml_str(
            r#"
            default_base_name = "picture"
            load_timeout_ms = 2500
            prefer = "network"
            convert_format = "jpg"

            [batch]
            batch_size = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.default_base_name, "picture");
        assert_eq!(config.default_extension, "png");
        assert_eq!(config.load_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(config.batch.batch_size, 3);
        assert_eq!(config.batch.delay_ms, crate::batch::DEFAULT_DELAY_MS);

        let options = config.download_options();
        assert_eq!(options.prefer, AcquisitionPreference::Network);
        assert_eq!(options.convert_format, Some(ConvertFormat::Jpg));
        assert_eq!(options.timeout, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(matches!(
            DownloaderConfig::from_toml_str("default_base_name = \"  \""),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            DownloaderConfig::from_toml_str("default_extension = \"p/ng\""),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            DownloaderConfig::from_toml_str("convert_format = \"gif\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_extension = \".jpg\"").unwrap();

        let config = DownloaderConfig::load(file.path()).unwrap();
        assert_eq!(config.default_extension(), "jpg");

        let missing = DownloaderConfig::load("/nonexistent/picsave.toml").unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }

    #[test]
    fn builder_chain() {
        let config = DownloaderConfig::new()
            .with_default_base_name("shot")
            .with_load_timeout(Duration::from_secs(3))
            .with_batch(BatchOptions::new().with_batch_size(1));
        assert_eq!(config.load_timeout_ms, Some(3000));
        assert_eq!(config.batch.effective_batch_size(), 1);
        assert!(config.validate().is_ok());
    }
}
