use rayon::{
    iter::{IndexedParallelIterator, ParallelIterator},
    slice::{ParallelSlice, ParallelSliceMut},
};

use crate::{
    ElaResult,
    analysis::recompress::RecompressionCodec,
    config::ElaConfig,
    error::CodecError,
    raster::PixelBuffer,
};

pub struct ElaEngine {
    quality: f32,
    amplification: f64,
}

impl ElaEngine {
    pub fn new(quality: f32) -> Self {
        Self {
            quality,
            amplification: 10.0,
        }
    }

    pub fn from_config(config: &ElaConfig) -> Self {
        Self::new(config.quality).with_amplification(config.amplification)
    }

    pub fn with_amplification(mut self, amp: f64) -> Self {
        self.amplification = amp;
        self
    }

    /// Amplified per-channel difference against a JPEG round-trip of `original`.
    /// Alpha is always 255 and the output has the input's dimensions.
    pub fn compute(&self, original: &PixelBuffer) -> Result<PixelBuffer, CodecError> {
        let recompressed = RecompressionCodec::recompress(original, self.quality)?;
        Ok(self.difference_map(original, &recompressed))
    }

    pub fn analyze(&self, original: &PixelBuffer) -> Result<ElaResult, CodecError> {
        let recompressed = RecompressionCodec::recompress(original, self.quality)?;
        let image = self.difference_map(original, &recompressed);

        let differences = original
            .as_raw()
            .par_chunks_exact(4)
            .zip(recompressed.as_raw().par_chunks_exact(4))
            .map(|(orig, recomp)| {
                (0..3)
                    .map(|c| (orig[c] as i32 - recomp[c] as i32).abs() as f64)
                    .sum::<f64>()
                    / 3.0
            })
            .collect::<Vec<_>>();

        let count = differences.len().max(1) as f64;
        let max_difference = differences.iter().cloned().fold(0.0f64, f64::max);
        let mean_difference = differences.iter().sum::<f64>() / count;
        let variance = differences
            .iter()
            .map(|d| (d - mean_difference).powi(2))
            .sum::<f64>()
            / count;

        log::debug!(
            "ELA at quality {}: max {:.2}, mean {:.3}",
            self.quality,
            max_difference,
            mean_difference
        );

        Ok(ElaResult {
            image,
            max_difference,
            mean_difference,
            std_deviation: variance.sqrt(),
        })
    }

    fn difference_map(&self, original: &PixelBuffer, recompressed: &PixelBuffer) -> PixelBuffer {
        let (width, height) = original.dimensions();
        let mut ela_image = PixelBuffer::new(width, height);
        let amplification = self.amplification;

        ela_image
            .par_chunks_exact_mut(4)
            .zip(original.as_raw().par_chunks_exact(4))
            .zip(recompressed.as_raw().par_chunks_exact(4))
            .for_each(|((out, orig), recomp)| {
                for c in 0..3 {
                    let diff = (orig[c] as i32 - recomp[c] as i32).abs() as f64;
                    out[c] = (diff * amplification).min(255.0) as u8;
                }
                out[3] = 255;
            });

        ela_image
    }
}
