//! Configuration files
//!
//! Any [`Config`] type round-trips through TOML or RON. The file extension
//! picks the format; anything else is refused before the file is touched.

use std::path::{Path, PathBuf};

pub use serde::{Deserialize, Serialize};

/// On-disk encodings a config file can use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Toml,
    Ron,
}

impl ConfigFormat {
    fn for_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    fn decode<T: for<'de> Deserialize<'de>>(self, text: &str) -> Result<T, String> {
        match self {
            Self::Toml => toml::from_str(text).map_err(|e| e.to_string()),
            Self::Ron => ron::from_str(text).map_err(|e| e.to_string()),
        }
    }

    fn encode<T: Serialize>(self, value: &T) -> Result<String, String> {
        match self {
            Self::Toml => toml::to_string_pretty(value).map_err(|e| e.to_string()),
            Self::Ron => ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default())
                .map_err(|e| e.to_string()),
        }
    }
}

/// A settings struct stored in a `.toml` or `.ron` file
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Read and decode `path`
    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::for_path(path)?;

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = format.decode(&text).map_err(|reason| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        })?;

        log::debug!("Loaded {:?} config from {}", format, path.display());
        Ok(config)
    }

    /// [`Config::load_from_file`], or the defaults when `path` does not exist
    fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_from_file(path)
        } else {
            log::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Encode by extension and write to `path`
    fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = ConfigFormat::for_path(path)?
            .encode(self)
            .map_err(ConfigError::Serialize)?;

        std::fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Failures loading, saving or validating a config
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be read
    #[error("Cannot read config {}: {source}", .path.display())]
    Read {
        /// File that was opened
        path: PathBuf,
        /// Underlying filesystem error
        source: std::io::Error,
    },

    /// The encoded config could not be written out
    #[error("Cannot write config {}: {source}", .path.display())]
    Write {
        /// Destination file
        path: PathBuf,
        /// Underlying filesystem error
        source: std::io::Error,
    },

    /// The text does not decode into the config type
    #[error("Config {} is malformed: {reason}", .path.display())]
    Parse {
        /// File that was decoded
        path: PathBuf,
        /// Decoder message
        reason: String,
    },

    /// The config type refused to encode
    #[error("Config could not be encoded: {0}")]
    Serialize(String),

    /// Only `.toml` and `.ron` are understood
    #[error("No config format for {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Values parsed but are not usable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    impl Config for Sample {}

    fn scratch_path(extension: &str) -> PathBuf {
        std::env::temp_dir().join(format!("daedalus_sample_{}.{}", std::process::id(), extension))
    }

    #[test]
    fn test_format_follows_extension() {
        assert_eq!(ConfigFormat::for_path(Path::new("a/b.toml")).unwrap(), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::for_path(Path::new("b.ron")).unwrap(), ConfigFormat::Ron);
        assert!(matches!(
            ConfigFormat::for_path(Path::new("toml")),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_unknown_extension_is_refused_before_reading() {
        // The file does not exist; the format check must fail first
        let result = Sample::load_from_file("missing/settings.yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(path)) if path.ends_with("settings.yaml")));
    }

    #[test]
    fn test_ron_round_trip() {
        let path = scratch_path("ron");
        let sample = Sample { name: "ring".to_string(), count: 3 };

        sample.save_to_file(&path).unwrap();
        assert_eq!(Sample::load_from_file(&path).unwrap(), sample);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_malformed_file_names_its_path() {
        let path = scratch_path("toml");
        std::fs::write(&path, "count = \"three\"").unwrap();

        let err = Sample::load_from_file(&path).unwrap_err();
        assert!(matches!(&err, ConfigError::Parse { path: bad, .. } if *bad == path));
        assert!(err.to_string().contains("is malformed"));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_unreadable_file_is_a_read_error() {
        // A directory with a config extension exists but cannot be read as text
        let path = scratch_path("dir.toml");
        std::fs::create_dir_all(&path).unwrap();

        let result = Sample::load_or_default(&path);
        assert!(matches!(result, Err(ConfigError::Read { .. })));

        std::fs::remove_dir(&path).unwrap();
    }
}
