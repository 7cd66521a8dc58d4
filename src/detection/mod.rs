pub mod client;
pub mod request;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};

use crate::{error::ClassificationError, raster::SourceImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    None,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ConfidenceLevel {
    /// `score` on a 0-100 scale.
    pub fn from_score(score: u8) -> Self {
        match score {
            s if s < 20 => ConfidenceLevel::None,
            s if s < 40 => ConfidenceLevel::Low,
            s if s < 60 => ConfidenceLevel::Medium,
            s if s < 80 => ConfidenceLevel::High,
            _ => ConfidenceLevel::VeryHigh,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDetail {
    pub verdict: String,
    pub explanation: String,
}

/// Verdict returned by the remote classifier.
///
/// `confidence` is the certainty of AI origin when `is_ai` is true and the
/// certainty of authenticity otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationVerdict {
    #[serde(rename = "isAI")]
    pub is_ai: bool,
    #[serde(deserialize_with = "deserialize_confidence")]
    pub confidence: u8,
    pub overall_justification: String,
    pub visual_analysis: AnalysisDetail,
    pub noise_analysis: AnalysisDetail,
    pub fingerprint_analysis: AnalysisDetail,
}

impl ClassificationVerdict {
    pub fn confidence_level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_score(self.confidence)
    }
}

// The schema declares a NUMBER, so accept `87` as well as `87.0`.
fn deserialize_confidence<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(D::Error::custom(format!(
            "confidence must be within 0..=100, got {}",
            value
        )));
    }
    Ok(value.round() as u8)
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, image: &SourceImage) -> Result<ClassificationVerdict, ClassificationError>;

    fn name(&self) -> &str;
}
