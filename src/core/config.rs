//! Configuration module for the holding verification tool
//!
//! Supports loading configuration from a TOML file.
//! Configuration is stored in a standard location:
//! - Windows: %APPDATA%\holding_verification\config.toml
//! - Linux: ~/.config/holding_verification/config.toml
//! - macOS: ~/Library/Application Support/holding_verification/config.toml

use crate::fixity::DigestAlgorithm;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application name used for config directory
const APP_NAME: &str = "holding_verification";

/// Default config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config files looked up in the working directory before the standard location
const LOCAL_CONFIG_FILES: &[&str] = &["./config.toml", "./holding_verification.toml"];

/// Size of each read when hashing a file
pub const DEFAULT_CHUNK_SIZE: usize = 1_000_000;

/// Files larger than this get a "might take a while" notice before hashing
pub const DEFAULT_LARGE_FILE_THRESHOLD: u64 = 500_000_000;

/// Get the standard configuration directory for the application.
pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME))
}

/// Get the standard configuration file path.
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Ensure the configuration directory exists.
pub fn ensure_config_dir() -> Result<PathBuf, ConfigError> {
    let config_dir = get_config_dir().ok_or(ConfigError::ConfigDirNotFound)?;

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)
            .map_err(|e| ConfigError::WriteError(config_dir.clone(), e.to_string()))?;
    }

    Ok(config_dir)
}

/// Initialize the configuration file if it doesn't exist.
///
/// Creates the config directory and writes the default config template.
/// Returns the path to the config file.
pub fn init_config() -> Result<PathBuf, ConfigError> {
    let config_dir = ensure_config_dir()?;
    let config_path = config_dir.join(CONFIG_FILE_NAME);

    if !config_path.exists() {
        fs::write(&config_path, Config::generate_default_config())
            .map_err(|e| ConfigError::WriteError(config_path.clone(), e.to_string()))?;
    }

    Ok(config_path)
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reference fixity table settings
    pub reference: ReferenceConfig,

    /// Digest matching settings
    pub matching: MatchingConfig,

    /// Report output settings
    pub report: ReportConfig,

    /// Directory walk settings
    pub walk: WalkConfig,

    /// Column names used when importing a fixity CSV export
    pub import: ImportConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Where the recorded fixity values live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// SQLite database holding the fixity table
    pub database: PathBuf,

    /// Name of the fixity table inside the database
    pub table: String,

    /// Remember lookup results for the duration of a run
    pub cache_lookups: bool,
}

/// Digest matching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Algorithm presumed for the first file of a batch
    pub initial_algorithm: DigestAlgorithm,

    /// Compute sha256 for files that matched through md5 or sha1 before
    /// sha256 was tried. Disabling saves one digest for such files but
    /// leaves their report row without a sha256 value.
    pub always_compute_primary: bool,

    /// Bytes read per chunk while hashing
    pub chunk_size: usize,

    /// Files above this size (bytes) trigger a notice before hashing
    pub large_file_threshold: u64,
}

/// Report output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory the CSV report is written to
    pub output_dir: PathBuf,

    /// Title prepended to the report file name (spaces become '_')
    pub prefix: String,

    /// Print a milestone every N files when walking directories (0 = never)
    pub progress_interval: usize,
}

/// Directory walk configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    /// Whether to follow symbolic links while walking directories
    pub follow_symlinks: bool,
}

/// Column names of an archive fixity CSV export
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Column holding the archive file reference
    pub file_ref_column: String,

    /// Column holding the checksum value
    pub fixity_value_column: String,

    /// Column holding the algorithm name
    pub algorithm_name_column: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log to file
    pub log_to_file: bool,

    /// Log file path
    pub log_file: PathBuf,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("checksums.db"),
            table: "fixity_values".to_string(),
            cache_lookups: false,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            initial_algorithm: DigestAlgorithm::PRIMARY,
            always_compute_primary: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            large_file_threshold: DEFAULT_LARGE_FILE_THRESHOLD,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            prefix: String::new(),
            progress_interval: 100,
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            file_ref_column: "file_ref".to_string(),
            fixity_value_column: "fixity_value".to_string(),
            algorithm_name_column: "algorithm_name".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_file: PathBuf::from("./holding_verification.log"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;

        Ok(config)
    }

    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./config.toml
    /// 2. ./holding_verification.toml
    /// 3. Standard config location
    ///
    /// If no config file is found, returns default configuration.
    pub fn load_default() -> Result<Self, ConfigError> {
        for path in LOCAL_CONFIG_FILES.iter().map(PathBuf::from) {
            if path.exists() {
                return Self::load(&path);
            }
        }

        if let Some(config_path) = get_config_path() {
            if config_path.exists() {
                return Self::load(&config_path);
            }
        }

        Ok(Self::default())
    }

    /// Get the path where the config file is (or would be) located.
    pub fn get_active_config_path() -> PathBuf {
        for path in LOCAL_CONFIG_FILES.iter().map(PathBuf::from) {
            if path.exists() {
                return path;
            }
        }

        get_config_path().unwrap_or_else(|| PathBuf::from("./config.toml"))
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(path.as_ref(), content)
            .map_err(|e| ConfigError::WriteError(path.as_ref().to_path_buf(), e.to_string()))?;

        Ok(())
    }

    /// Generate a default config file with comments
    pub fn generate_default_config() -> String {
        include_str!("../../config.example.toml").to_string()
    }

    /// Report file name prefix with spaces made file-name friendly
    pub fn report_prefix(&self) -> String {
        self.report.prefix.trim().replace(' ', "_")
    }
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// Configuration file was not found at the specified path
    FileNotFound(PathBuf),
    /// Failed to read the configuration file
    ReadError(PathBuf, String),
    /// Failed to parse the configuration file (invalid TOML)
    ParseError(PathBuf, String),
    /// Failed to serialize configuration to TOML
    SerializeError(String),
    /// Failed to write configuration file
    WriteError(PathBuf, String),
    /// Could not determine config directory
    ConfigDirNotFound,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ReadError(path, err) => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::ParseError(path, err) => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::SerializeError(err) => {
                write!(f, "Failed to serialize configuration: {}", err)
            }
            ConfigError::WriteError(path, err) => {
                write!(
                    f,
                    "Failed to write config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::ConfigDirNotFound => {
                write!(f, "Could not determine configuration directory")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.reference.database, PathBuf::from("checksums.db"));
        assert_eq!(config.reference.table, "fixity_values");
        assert!(!config.reference.cache_lookups);
        assert_eq!(config.matching.initial_algorithm, DigestAlgorithm::Sha256);
        assert!(config.matching.always_compute_primary);
        assert_eq!(config.matching.chunk_size, 1_000_000);
        assert_eq!(config.matching.large_file_threshold, 500_000_000);
        assert_eq!(config.report.progress_interval, 100);
        assert!(config.report.prefix.is_empty());
        assert!(!config.walk.follow_symlinks);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [reference]
            table = "checksums_of_files_in_dri"

            [matching]
            initial_algorithm = "md5"
            "#,
        )
        .unwrap();

        assert_eq!(config.reference.table, "checksums_of_files_in_dri");
        assert_eq!(config.reference.database, PathBuf::from("checksums.db"));
        assert_eq!(config.matching.initial_algorithm, DigestAlgorithm::Md5);
        assert_eq!(config.matching.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_unknown_algorithm_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[matching]\ninitial_algorithm = \"crc32\"\n").unwrap();

        match Config::load(&path) {
            Err(ConfigError::ParseError(p, _)) => assert_eq!(p, path),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/definitely/not/here/config.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("saved.toml");

        let mut config = Config::default();
        config.report.prefix = "accession 42".to_string();
        config.matching.always_compute_primary = false;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.report.prefix, "accession 42");
        assert!(!loaded.matching.always_compute_primary);
    }

    #[test]
    fn test_default_template_parses() {
        let config: Config = toml::from_str(&Config::generate_default_config()).unwrap();
        assert_eq!(config.reference.table, ReferenceConfig::default().table);
        assert_eq!(config.matching.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_report_prefix_replaces_spaces() {
        let mut config = Config::default();
        config.report.prefix = " my batch title ".to_string();
        assert_eq!(config.report_prefix(), "my_batch_title");
    }
}
