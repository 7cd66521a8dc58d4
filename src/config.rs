use std::{path::Path, time::Duration};

use serde::Deserialize;

use crate::error::{AnalysisError, Result};

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const API_KEY_ENV: &str = "REALEYE_API_KEY";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub max_upload_bytes: usize,
    pub ela: ElaConfig,
    pub spectrum: SpectrumConfig,
    pub progress: ProgressConfig,
    pub classifier: ClassifierConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            ela: ElaConfig::default(),
            spectrum: SpectrumConfig::default(),
            progress: ProgressConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| AnalysisError::InvalidParameter(format!("config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    pub fn with_spectrum(mut self, spectrum: SpectrumConfig) -> Self {
        self.spectrum = spectrum;
        self
    }

    pub fn with_progress(mut self, progress: ProgressConfig) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_upload_bytes == 0 {
            return Err(AnalysisError::InvalidParameter(
                "max_upload_bytes must be positive".into(),
            ));
        }
        if !(self.ela.quality > 0.0 && self.ela.quality <= 1.0) {
            return Err(AnalysisError::InvalidParameter(format!(
                "ELA quality must be within (0, 1], got {}",
                self.ela.quality
            )));
        }
        if self.ela.amplification <= 0.0 {
            return Err(AnalysisError::InvalidParameter(
                "ELA amplification must be positive".into(),
            ));
        }
        if self.spectrum.ray_step_degrees == 0 || self.spectrum.ray_step_degrees > 360 {
            return Err(AnalysisError::InvalidParameter(
                "ray_step_degrees must be between 1 and 360".into(),
            ));
        }
        if self.progress.interval_ms == 0 || self.progress.step == 0 {
            return Err(AnalysisError::InvalidParameter(
                "progress interval and step must be positive".into(),
            ));
        }
        if self.progress.ceiling > 100 {
            return Err(AnalysisError::InvalidParameter(
                "progress ceiling cannot exceed 100".into(),
            ));
        }
        if self.classifier.retry.max_attempts == 0 {
            return Err(AnalysisError::InvalidParameter(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ElaConfig {
    /// JPEG quality on a 0-1 scale.
    pub quality: f32,
    pub amplification: f64,
}

impl Default for ElaConfig {
    fn default() -> Self {
        Self {
            quality: 0.75,
            amplification: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpectrumMode {
    #[default]
    Synthetic,
    Fourier,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    pub mode: SpectrumMode,
    pub ray_step_degrees: u32,
    pub gradient_radius: f32,
    pub seed: Option<u64>,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            mode: SpectrumMode::Synthetic,
            ray_step_degrees: 15,
            gradient_radius: 50.0,
            seed: None,
        }
    }
}

impl SpectrumConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_mode(mut self, mode: SpectrumMode) -> Self {
        self.mode = mode;
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    pub interval_ms: u64,
    pub step: u8,
    pub ceiling: u8,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            interval_ms: 200,
            step: 5,
            ceiling: 95,
        }
    }
}

impl ProgressConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
            max_jitter_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Wait before retrying after `attempt` was rate limited: `2^attempt * base + jitter`.
    pub fn delay_for(&self, attempt: u32, jitter_ms: u64) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let jitter = if self.max_jitter_ms == 0 {
            0
        } else {
            jitter_ms % self.max_jitter_ms
        };
        Duration::from_millis(factor.saturating_mul(self.base_delay_ms).saturating_add(jitter))
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub endpoint: String,
    pub model: String,
    pub request_timeout_secs: u64,
    pub retry: RetryPolicy,
    #[serde(skip)]
    pub api_key: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".into(),
            model: "gemini-2.5-flash-preview-05-20".into(),
            request_timeout_secs: 60,
            retry: RetryPolicy::default(),
            api_key: String::new(),
        }
    }
}

impl std::fmt::Debug for ClassifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("retry", &self.retry)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ClassifierConfig {
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Fills `api_key` from `REALEYE_API_KEY`.
    pub fn load_api_key_from_env(mut self) -> Result<Self> {
        let key = std::env::var(API_KEY_ENV).map_err(|_| {
            AnalysisError::InvalidParameter(format!("{} is not set", API_KEY_ENV))
        })?;
        self.api_key = key;
        Ok(self)
    }

    pub fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint.trim_end_matches('/'),
            self.model,
            self.api_key
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
