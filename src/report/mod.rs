pub mod visualization;

use serde::Serialize;

use crate::{
    AnalysisOutcome,
    detection::{AnalysisDetail, ConfidenceLevel},
};

#[derive(Serialize)]
pub struct JsonReport {
    pub is_ai: bool,
    pub confidence: u8,
    pub confidence_level: ConfidenceLevel,
    pub overall_justification: String,
    pub visual_analysis: AnalysisDetail,
    pub noise_analysis: AnalysisDetail,
    pub fingerprint_analysis: AnalysisDetail,
    pub ela_analysis: ElaReportSection,
    pub spectrum: ArtifactSection,
}

#[derive(Serialize)]
pub struct ElaReportSection {
    pub width: u32,
    pub height: u32,
    pub max_difference: f64,
    pub mean_difference: f64,
    pub std_deviation: f64,
}

#[derive(Serialize)]
pub struct ArtifactSection {
    pub width: u32,
    pub height: u32,
}

impl From<&AnalysisOutcome> for JsonReport {
    fn from(outcome: &AnalysisOutcome) -> Self {
        let verdict = &outcome.classification;
        let (ela_width, ela_height) = outcome.ela.image.dimensions();
        let (spectrum_width, spectrum_height) = outcome.spectrum.dimensions();

        Self {
            is_ai: verdict.is_ai,
            confidence: verdict.confidence,
            confidence_level: verdict.confidence_level(),
            overall_justification: verdict.overall_justification.clone(),
            visual_analysis: verdict.visual_analysis.clone(),
            noise_analysis: verdict.noise_analysis.clone(),
            fingerprint_analysis: verdict.fingerprint_analysis.clone(),
            ela_analysis: ElaReportSection {
                width: ela_width,
                height: ela_height,
                max_difference: outcome.ela.max_difference,
                mean_difference: outcome.ela.mean_difference,
                std_deviation: outcome.ela.std_deviation,
            },
            spectrum: ArtifactSection {
                width: spectrum_width,
                height: spectrum_height,
            },
        }
    }
}

impl JsonReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// One-line human readable verdict.
    pub fn headline(&self) -> String {
        if self.is_ai {
            format!("Likely AI-generated ({}% confidence)", self.confidence)
        } else {
            format!("Likely authentic ({}% confidence)", self.confidence)
        }
    }
}
