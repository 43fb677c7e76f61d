use std::fs;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::KiraError;
use crate::resolver::SDL_BASE_URL;
use crate::throttle::Throttle;

pub const DEFAULT_CONFIG_FILE: &str = "kira-af.json";
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_FOLDER_SIZE: usize = 5000;
pub const DEFAULT_FOLDER_PREFIX: &str = "X";
pub const DEFAULT_NUM_THREADS: usize = 1;
pub const DEFAULT_THROTTLE_MIN_MS: u64 = 1_000;
pub const DEFAULT_THROTTLE_MAX_MS: u64 = 10_000;

/// Settings file; every field is optional and falls back to the defaults.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub acs: Option<PathBuf>,
    #[serde(default)]
    pub outdir: Option<PathBuf>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub folder_size: Option<usize>,
    #[serde(default)]
    pub folder_prefix: Option<String>,
    #[serde(default)]
    pub sdl_url: Option<String>,
    #[serde(default)]
    pub force: Option<bool>,
    #[serde(default)]
    pub num_threads: Option<usize>,
    #[serde(default)]
    pub throttle_min_ms: Option<u64>,
    #[serde(default)]
    pub throttle_max_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub acs: PathBuf,
    pub outdir: PathBuf,
    pub batch_size: usize,
    pub folder_size: usize,
    pub folder_prefix: String,
    pub sdl_url: String,
    pub force: bool,
    pub num_threads: usize,
    pub throttle: Throttle,
}

impl ResolvedConfig {
    pub fn new(acs: impl Into<PathBuf>, outdir: impl Into<PathBuf>) -> Self {
        Self {
            acs: acs.into(),
            outdir: outdir.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            folder_size: DEFAULT_FOLDER_SIZE,
            folder_prefix: DEFAULT_FOLDER_PREFIX.to_string(),
            sdl_url: SDL_BASE_URL.to_string(),
            force: false,
            num_threads: DEFAULT_NUM_THREADS,
            throttle: Throttle::default(),
        }
    }

    /// Requested thread count capped at the host's available parallelism.
    pub fn worker_threads(&self) -> usize {
        let host = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        self.num_threads.clamp(1, host)
    }

    pub fn validate(&self) -> Result<(), KiraError> {
        if self.batch_size == 0 {
            return Err(KiraError::InvalidConfig("batch size must be positive".to_string()));
        }
        if self.folder_size == 0 {
            return Err(KiraError::InvalidConfig("folder size must be positive".to_string()));
        }
        if self.num_threads == 0 {
            return Err(KiraError::InvalidConfig("thread count must be positive".to_string()));
        }
        if self.folder_prefix.is_empty() || self.folder_prefix.contains(['/', '\\']) {
            return Err(KiraError::InvalidConfig(format!(
                "invalid folder prefix: {:?}",
                self.folder_prefix
            )));
        }
        Ok(())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads the settings file. Without an explicit path a missing
    /// `kira-af.json` simply means "no file settings".
    pub fn load(path: Option<&str>) -> Result<Config, KiraError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| KiraError::ConfigParse(err.to_string()))
    }

    /// Layers `overrides` (command line) on top of `file` on top of defaults.
    pub fn resolve_config(file: Config, overrides: Config) -> Result<ResolvedConfig, KiraError> {
        let acs = overrides
            .acs
            .or(file.acs)
            .ok_or_else(|| KiraError::InvalidConfig("accession file is required".to_string()))?;
        let outdir = overrides
            .outdir
            .or(file.outdir)
            .ok_or_else(|| KiraError::InvalidConfig("output directory is required".to_string()))?;

        let throttle_min = overrides
            .throttle_min_ms
            .or(file.throttle_min_ms)
            .unwrap_or(DEFAULT_THROTTLE_MIN_MS);
        let throttle_max = overrides
            .throttle_max_ms
            .or(file.throttle_max_ms)
            .unwrap_or(DEFAULT_THROTTLE_MAX_MS);
        if throttle_min > throttle_max {
            return Err(KiraError::InvalidConfig(format!(
                "throttle min {throttle_min}ms exceeds max {throttle_max}ms"
            )));
        }

        let resolved = ResolvedConfig {
            acs,
            outdir,
            batch_size: overrides
                .batch_size
                .or(file.batch_size)
                .unwrap_or(DEFAULT_BATCH_SIZE),
            folder_size: overrides
                .folder_size
                .or(file.folder_size)
                .unwrap_or(DEFAULT_FOLDER_SIZE),
            folder_prefix: overrides
                .folder_prefix
                .or(file.folder_prefix)
                .unwrap_or_else(|| DEFAULT_FOLDER_PREFIX.to_string()),
            sdl_url: overrides
                .sdl_url
                .or(file.sdl_url)
                .unwrap_or_else(|| SDL_BASE_URL.to_string()),
            force: overrides.force.or(file.force).unwrap_or(false),
            num_threads: overrides
                .num_threads
                .or(file.num_threads)
                .unwrap_or(DEFAULT_NUM_THREADS),
            throttle: Throttle::from_millis(throttle_min, throttle_max),
        };
        resolved.validate()?;
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn defaults_apply() {
        let overrides = Config {
            acs: Some(PathBuf::from("acs.tsv")),
            outdir: Some(PathBuf::from("out")),
            ..Config::default()
        };
        let resolved = ConfigLoader::resolve_config(Config::default(), overrides).unwrap();
        assert_eq!(resolved.batch_size, 100);
        assert_eq!(resolved.folder_size, 5000);
        assert_eq!(resolved.folder_prefix, "X");
        assert_eq!(resolved.sdl_url, SDL_BASE_URL);
        assert!(!resolved.force);
        assert_eq!(resolved.throttle, Throttle::default());
    }

    #[test]
    fn zero_batch_size_rejected() {
        let overrides = Config {
            acs: Some(PathBuf::from("acs.tsv")),
            outdir: Some(PathBuf::from("out")),
            batch_size: Some(0),
            ..Config::default()
        };
        assert_matches!(
            ConfigLoader::resolve_config(Config::default(), overrides),
            Err(KiraError::InvalidConfig(_))
        );
    }
}
