use std::path::Path;

use crate::{
    detection::ClassificationVerdict,
    error::Result,
    raster::PixelBuffer,
};

pub mod analysis;
pub mod config;
pub mod detection;
pub mod error;
pub mod image_utils;
pub mod raster;
pub mod report;
pub mod session;

pub use config::AnalysisConfig;
pub use raster::{ImageMime, SourceImage};
pub use session::{AnalysisOrchestrator, AnalysisSession, SessionEvent, SessionState};

#[derive(Debug, Clone)]
pub struct ElaResult {
    pub image: PixelBuffer,
    pub max_difference: f64,
    pub mean_difference: f64,
    pub std_deviation: f64,
}

impl ElaResult {
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.image.save(path)?;
        Ok(())
    }
}

/// Combined result of one analysis run; only built when every stage succeeded.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub classification: ClassificationVerdict,
    pub ela: ElaResult,
    pub spectrum: PixelBuffer,
}
