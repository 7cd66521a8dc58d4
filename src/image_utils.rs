use image::{Rgb, RgbImage, Rgba, RgbaImage};
use ndarray::Array2;

pub fn luma(pixel: &Rgba<u8>) -> f64 {
    0.299 * pixel[0] as f64 + 0.587 * pixel[1] as f64 + 0.114 * pixel[2] as f64
}

pub fn rgba_to_luma_array(image: &RgbaImage) -> Array2<f64> {
    let (width, height) = image.dimensions();
    let mut arr = Array2::zeros((height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        arr[[y as usize, x as usize]] = luma(pixel);
    }

    arr
}

/// Opaque grayscale raster from an array already scaled to 0..=255.
pub fn array_to_rgba(arr: &Array2<f64>) -> RgbaImage {
    let (height, width) = arr.dim();
    let mut image = RgbaImage::new(width as u32, height as u32);

    for ((y, x), &v) in arr.indexed_iter() {
        let value = v.clamp(0.0, 255.0) as u8;
        image.put_pixel(x as u32, y as u32, Rgba([value, value, value, 255]));
    }

    image
}

pub fn normalize_to_u8(arr: &Array2<f64>) -> Array2<f64> {
    let min = arr.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = arr.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    if range < 1e-10 {
        Array2::zeros(arr.dim())
    } else {
        arr.mapv(|v| ((v - min) / range) * 255.0)
    }
}

/// Drops alpha by compositing over black, the way a canvas flattens for JPEG.
pub fn flatten_on_black(image: &RgbaImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut rgb = RgbImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        let alpha = pixel[3] as u16;
        let scale = |c: u8| ((c as u16 * alpha + 127) / 255) as u8;
        rgb.put_pixel(x, y, Rgb([scale(pixel[0]), scale(pixel[1]), scale(pixel[2])]));
    }

    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_flat_array_is_zero() {
        let arr = Array2::from_elem((4, 4), 42.0);
        assert!(normalize_to_u8(&arr).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_normalize_spans_full_range() {
        let arr = Array2::from_shape_vec((1, 3), vec![-5.0, 0.0, 5.0]).unwrap();
        let norm = normalize_to_u8(&arr);
        assert_eq!(norm[[0, 0]], 0.0);
        assert_eq!(norm[[0, 2]], 255.0);
    }

    #[test]
    fn test_flatten_on_black() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, Rgba([200, 100, 50, 255]));
        image.put_pixel(1, 0, Rgba([200, 100, 50, 0]));

        let flat = flatten_on_black(&image);
        assert_eq!(flat.get_pixel(0, 0), &Rgb([200, 100, 50]));
        assert_eq!(flat.get_pixel(1, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_luma_array_layout() {
        let mut image = RgbaImage::from_pixel(3, 2, Rgba([0, 0, 0, 255]));
        image.put_pixel(2, 1, Rgba([255, 255, 255, 255]));

        let arr = rgba_to_luma_array(&image);
        assert_eq!(arr.dim(), (2, 3));
        assert!((arr[[1, 2]] - 255.0).abs() < 1e-6);
        assert_eq!(arr[[0, 0]], 0.0);
    }
}
