use anyhow::{Context, Result};
use dermscan_vision::detector::BoxedDetector;
use dermscan_vision::{Classifier, ClassifierError, DetectorHandle, Thresholds, YunetDetector};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub static CONFIG_PATH: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("DERMSCAN_CONFIG_PATH").unwrap_or("/usr/local/etc/dermscan/config.toml"))
});

pub static MODEL_DIR: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("DERMSCAN_MODEL_DIR").unwrap_or("/usr/local/share/dermscan"))
});

/// Overrides `gateway.api_key` so the key can stay out of the config file.
pub const API_KEY_ENV: &str = "DERMSCAN_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model_path: PathBuf,
    /// `0` waits for the model indefinitely.
    pub model_load_timeout_secs: u64,
    pub camera: String,
    /// Defaults to the platform data directory.
    pub history_dir: Option<PathBuf>,
    pub gateway: GatewayConfig,
    pub thresholds: Thresholds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: MODEL_DIR.join(dermscan_vision::model::DETECTOR_MODEL_FILE),
            model_load_timeout_secs: 30,
            camera: "/dev/video0".to_string(),
            history_dir: None,
            gateway: GatewayConfig::default(),
            thresholds: Thresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub language: String,
    /// Whole-request limit; `0` disables it.
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            model: "default".to_string(),
            language: "en".to_string(),
            timeout_secs: 60,
        }
    }
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.timeout_secs)
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl Config {
    pub fn model_load_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.model_load_timeout_secs)
    }

    /// Classifier whose landmark model loads on first use.
    pub fn classifier(&self) -> Classifier {
        let model_path = self.model_path.clone();
        let limits = self.thresholds.face.clone();
        let detector = DetectorHandle::new(move || {
            log::info!("loading face landmark model from {}", model_path.display());
            YunetDetector::load(&model_path, &limits)
                .map(|d| Box::new(d) as BoxedDetector)
                .map_err(|e| ClassifierError::ModelLoad(format!("{e:#}")))
        });
        let detector = match self.model_load_timeout() {
            Some(timeout) => detector.with_load_timeout(timeout),
            None => detector,
        };

        Classifier::new(self.thresholds.clone(), detector)
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let mut cfg = if path.exists() {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config at {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?
    } else {
        Config::default()
    };

    if let Ok(key) = std::env::var(API_KEY_ENV) {
        cfg.gateway.api_key = key;
    }
    Ok(cfg)
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}
