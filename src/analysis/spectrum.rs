use image::Rgba;
use imageproc::drawing::draw_line_segment_mut;
use ndarray::Array2;
use num_complex::Complex;
use rand::{Rng, SeedableRng, rngs::StdRng};
use rustfft::FftPlanner;

use crate::{
    config::{SpectrumConfig, SpectrumMode},
    image_utils::{array_to_rgba, normalize_to_u8, rgba_to_luma_array},
    raster::PixelBuffer,
};

/// Frequency-spectrum visualization sized to the analysed image.
///
/// The default `Synthetic` mode draws a stylised radial plot that does not
/// depend on image content; `Fourier` renders the centred log-magnitude
/// spectrum of the luma channel.
pub struct SpectrumRenderer {
    config: SpectrumConfig,
}

impl SpectrumRenderer {
    pub fn new(config: SpectrumConfig) -> Self {
        Self { config }
    }

    pub fn mode(&self) -> SpectrumMode {
        self.config.mode
    }

    pub fn render_for(&self, source: &PixelBuffer) -> PixelBuffer {
        match self.config.mode {
            SpectrumMode::Synthetic => {
                let (width, height) = source.dimensions();
                self.render(width, height)
            }
            SpectrumMode::Fourier => self.fourier(source),
        }
    }

    /// Uses the configured seed when present, OS entropy otherwise.
    pub fn render(&self, width: u32, height: u32) -> PixelBuffer {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        self.render_with_rng(width, height, &mut rng)
    }

    pub fn render_with_rng<R: Rng>(&self, width: u32, height: u32, rng: &mut R) -> PixelBuffer {
        let mut canvas = PixelBuffer::from_pixel(width, height, Rgba([0, 0, 0, 255]));
        let center_x = width as f32 / 2.0;
        let center_y = height as f32 / 2.0;
        let max_length = center_x.min(center_y);

        for degrees in (0..360).step_by(self.config.ray_step_degrees.max(1) as usize) {
            let rad = (degrees as f32).to_radians();
            let length = rng.random::<f32>() * max_length;
            let intensity = rng.random_range(100u8..255);

            draw_line_segment_mut(
                &mut canvas,
                (center_x, center_y),
                (center_x + rad.cos() * length, center_y + rad.sin() * length),
                Rgba([intensity, intensity, intensity, 255]),
            );
        }

        self.overlay_center_glow(&mut canvas, center_x, center_y);

        canvas
    }

    // White at the centre fading to transparent at `gradient_radius`, blended over the rays.
    fn overlay_center_glow(&self, canvas: &mut PixelBuffer, center_x: f32, center_y: f32) {
        let radius = self.config.gradient_radius;
        if radius <= 0.0 {
            return;
        }

        let (width, height) = canvas.dimensions();
        let x0 = (center_x - radius).floor().max(0.0) as u32;
        let y0 = (center_y - radius).floor().max(0.0) as u32;
        let x1 = ((center_x + radius).ceil() as u32).min(width);
        let y1 = ((center_y + radius).ceil() as u32).min(height);

        for y in y0..y1 {
            for x in x0..x1 {
                let dx = x as f32 + 0.5 - center_x;
                let dy = y as f32 + 0.5 - center_y;
                let t = (dx * dx + dy * dy).sqrt() / radius;
                if t >= 1.0 {
                    continue;
                }

                let alpha = 1.0 - t;
                let pixel = canvas.get_pixel_mut(x, y);
                for c in 0..3 {
                    let blended = alpha * 255.0 + (1.0 - alpha) * pixel[c] as f32;
                    pixel[c] = blended.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }

    pub fn fourier(&self, source: &PixelBuffer) -> PixelBuffer {
        let luma = rgba_to_luma_array(source);
        let (height, width) = luma.dim();
        let mut data = luma.mapv(|v| Complex::new(v, 0.0));

        let mut planner = FftPlanner::<f64>::new();
        let row_fft = planner.plan_fft_forward(width);
        let column_fft = planner.plan_fft_forward(height);

        for mut row in data.rows_mut() {
            let mut buffer = row.to_vec();
            row_fft.process(&mut buffer);
            row.iter_mut().zip(buffer).for_each(|(dst, v)| *dst = v);
        }

        for mut column in data.columns_mut() {
            let mut buffer = column.to_vec();
            column_fft.process(&mut buffer);
            column.iter_mut().zip(buffer).for_each(|(dst, v)| *dst = v);
        }

        let mut shifted = Array2::zeros((height, width));
        for ((y, x), c) in data.indexed_iter() {
            shifted[[(y + height / 2) % height, (x + width / 2) % width]] = (1.0 + c.norm()).ln();
        }

        array_to_rgba(&normalize_to_u8(&shifted))
    }
}

impl Default for SpectrumRenderer {
    fn default() -> Self {
        Self::new(SpectrumConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distance_from_center(x: u32, y: u32, width: u32, height: u32) -> f32 {
        let dx = x as f32 + 0.5 - width as f32 / 2.0;
        let dy = y as f32 + 0.5 - height as f32 / 2.0;
        (dx * dx + dy * dy).sqrt()
    }

    #[test]
    fn test_render_matches_requested_size() {
        let renderer = SpectrumRenderer::default();
        for (w, h) in [(1, 1), (3, 200), (800, 600)] {
            assert_eq!(renderer.render(w, h).dimensions(), (w, h));
        }
    }

    #[test]
    fn test_seeded_render_is_reproducible() {
        let renderer = SpectrumRenderer::new(SpectrumConfig::default().with_seed(42));
        let a = renderer.render(128, 96);
        let b = renderer.render(128, 96);
        assert_eq!(a, b);

        let other = SpectrumRenderer::new(SpectrumConfig::default().with_seed(43));
        assert_ne!(a, other.render(128, 96));
    }

    #[test]
    fn test_visual_structure() {
        let (width, height) = (300, 300);
        let renderer = SpectrumRenderer::new(SpectrumConfig::default().with_seed(7));
        let image = renderer.render(width, height);

        // Glow saturates the centre.
        let center = image.get_pixel(width / 2, height / 2);
        assert!(center[0] >= 245);

        // Corners lie beyond both the rays and the glow.
        assert_eq!(image.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(image.get_pixel(width - 1, height - 1), &Rgba([0, 0, 0, 255]));

        // Outside the glow every lit pixel belongs to a gray ray of intensity [100, 255).
        for (x, y, p) in image.enumerate_pixels() {
            assert_eq!(p[3], 255);
            if distance_from_center(x, y, width, height) > 52.0 && p[0] != 0 {
                assert!(p[0] == p[1] && p[1] == p[2]);
                assert!((100..255).contains(&p[0]), "pixel {:?} at {},{}", p, x, y);
            }
        }
    }

    #[test]
    fn test_fourier_constant_image_is_pure_dc() {
        let renderer = SpectrumRenderer::new(SpectrumConfig::default().with_mode(SpectrumMode::Fourier));
        let source = PixelBuffer::from_pixel(16, 12, Rgba([100, 100, 100, 255]));

        let spectrum = renderer.render_for(&source);
        assert_eq!(spectrum.dimensions(), (16, 12));

        for (x, y, p) in spectrum.enumerate_pixels() {
            if (x, y) == (8, 6) {
                assert_eq!(p[0], 255);
            } else {
                assert_eq!(p[0], 0, "unexpected energy at {},{}", x, y);
            }
        }
    }

    #[test]
    fn test_fourier_vertical_stripes_hit_nyquist() {
        let renderer = SpectrumRenderer::new(SpectrumConfig::default().with_mode(SpectrumMode::Fourier));
        let source = PixelBuffer::from_fn(16, 16, |x, _| {
            if x % 2 == 0 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });

        let spectrum = renderer.fourier(&source);
        assert!(spectrum.get_pixel(8, 8)[0] > 200);
        assert!(spectrum.get_pixel(0, 8)[0] > 200);
        assert!(spectrum.get_pixel(4, 4)[0] < 50);
    }
}
