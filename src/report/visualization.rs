use std::{path::Path, sync::Arc};

use image::Rgba;

use crate::{AnalysisOutcome, error::Result, raster::PixelBuffer, raster::SourceImage};

const BACKGROUND: Rgba<u8> = Rgba([40, 40, 40, 255]);
const LABEL_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Debug, Clone)]
pub struct SheetConfig {
    pub padding: u32,
    pub label_height: u32,
    /// Panels taller than this are downscaled to fit.
    pub max_panel_height: u32,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            padding: 10,
            label_height: 20,
            max_panel_height: 480,
        }
    }
}

pub struct Visualizer {
    config: SheetConfig,
}

impl Visualizer {
    pub fn new() -> Self {
        Self {
            config: SheetConfig::default(),
        }
    }

    pub fn with_config(config: SheetConfig) -> Self {
        Self { config }
    }

    /// Lays panels out left to right on a dark sheet, each under its label.
    pub fn create_comparison(&self, images: &[(&str, &PixelBuffer)]) -> PixelBuffer {
        if images.is_empty() {
            return PixelBuffer::from_pixel(1, 1, BACKGROUND);
        }

        let padding = self.config.padding;
        let label_height = self.config.label_height;
        let panels = images
            .iter()
            .map(|(label, img)| (*label, self.fit_panel(img)))
            .collect::<Vec<_>>();

        let max_height = panels.iter().map(|(_, img)| img.height()).max().unwrap_or(0);
        let total_width = panels.iter().map(|(_, img)| img.width()).sum::<u32>()
            + padding * (panels.len() as u32 + 1);
        let total_height = max_height + label_height + padding * 2;

        let mut sheet = PixelBuffer::from_pixel(total_width, total_height, BACKGROUND);

        let mut x_offset = padding;
        for (label, img) in &panels {
            self.draw_label(&mut sheet, x_offset, padding / 2, label, LABEL_COLOR);
            self.copy_image_to(&mut sheet, img, x_offset, label_height + padding);
            x_offset += img.width() + padding;
        }

        sheet
    }

    fn fit_panel(&self, image: &PixelBuffer) -> PixelBuffer {
        let max_height = self.config.max_panel_height.max(1);
        if image.height() <= max_height {
            return image.clone();
        }

        let scale = max_height as f64 / image.height() as f64;
        let width = ((image.width() as f64 * scale).round() as u32).max(1);
        image::imageops::resize(image, width, max_height, image::imageops::FilterType::Triangle)
    }

    // Glyphs are drawn as solid cells; labels only need to mark which panel is which.
    fn draw_label(&self, image: &mut PixelBuffer, x: u32, y: u32, text: &str, color: Rgba<u8>) {
        let (width, height) = image.dimensions();
        let char_width = 6u32;
        let char_height = 8u32;

        for (i, c) in text.chars().enumerate() {
            if c.is_whitespace() {
                continue;
            }

            let cx = x + 2 + i as u32 * char_width;
            let cy = y + 2;
            for dy in 0..char_height {
                for dx in 0..(char_width - 1) {
                    let (px, py) = (cx + dx, cy + dy);
                    if px < width && py < height {
                        image.put_pixel(px, py, color);
                    }
                }
            }
        }
    }

    fn copy_image_to(&self, dest: &mut PixelBuffer, src: &PixelBuffer, offset_x: u32, offset_y: u32) {
        let (dest_w, dest_h) = dest.dimensions();

        for (x, y, pixel) in src.enumerate_pixels() {
            let (dx, dy) = (offset_x + x, offset_y + y);
            if dx < dest_w && dy < dest_h {
                dest.put_pixel(dx, dy, *pixel);
            }
        }
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Displayable rasters of one completed run.
pub struct ArtifactExport {
    pub original: PixelBuffer,
    pub ela: PixelBuffer,
    pub spectrum: PixelBuffer,
}

impl ArtifactExport {
    pub fn new(source: &SourceImage, outcome: &Arc<AnalysisOutcome>) -> Self {
        Self {
            original: source.pixels().clone(),
            ela: outcome.ela.image.clone(),
            spectrum: outcome.spectrum.clone(),
        }
    }

    pub fn create_overview(&self) -> PixelBuffer {
        Visualizer::new().create_comparison(&[
            ("Original", &self.original),
            ("ELA", &self.ela),
            ("Spectrum", &self.spectrum),
        ])
    }

    pub fn save_all<P: AsRef<Path>>(&self, directory: P) -> Result<()> {
        let directory = directory.as_ref();
        std::fs::create_dir_all(directory)?;

        self.original.save(directory.join("original.png"))?;
        self.ela.save(directory.join("ela.png"))?;
        self.spectrum.save(directory.join("spectrum.png"))?;
        self.create_overview().save(directory.join("overview.png"))?;

        log::info!("Saved analysis artifacts to {}", directory.display());
        Ok(())
    }
}
