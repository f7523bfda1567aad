//! Blur rejection via Laplacian variance
//!
//! A tile is scored by the variance of its 3x3 Laplacian response on the
//! luminance channel. Flat or defocused tiles have little second-derivative
//! energy and score low.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::laplacian_filter;
use tracing::debug;

/// Laplacian variance below which a tile is rejected
pub const DEFAULT_BLUR_THRESHOLD: f64 = 100.0;

/// Verdict of the sharpness gate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sharpness {
    /// Score at or above the threshold
    Sharp { score: f64 },

    /// Score below the threshold, or `None` when the bytes did not decode
    Blurry { score: Option<f64> },
}

impl Sharpness {
    /// Whether the tile must be rejected
    pub fn is_blurry(&self) -> bool {
        matches!(self, Self::Blurry { .. })
    }

    /// Laplacian variance, if the image decoded
    pub fn score(&self) -> Option<f64> {
        match self {
            Self::Sharp { score } => Some(*score),
            Self::Blurry { score } => *score,
        }
    }
}

/// Rejects tiles too blurry to classify reliably
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SharpnessGate {
    threshold: f64,
}

impl SharpnessGate {
    /// Create a gate with a custom threshold
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Rejection threshold
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Score raw image bytes.
    ///
    /// Undecodable bytes are reported as blurry rather than as an error.
    pub fn check(&self, image_bytes: &[u8]) -> Sharpness {
        let image = match image::load_from_memory(image_bytes) {
            Ok(image) => image,
            Err(e) => {
                debug!("Blur check could not decode image: {}", e);
                return Sharpness::Blurry { score: None };
            }
        };

        let score = laplacian_variance(&luminance(&image));
        debug!(score, threshold = self.threshold, "Blur score");

        if score < self.threshold {
            Sharpness::Blurry { score: Some(score) }
        } else {
            Sharpness::Sharp { score }
        }
    }
}

impl Default for SharpnessGate {
    fn default() -> Self {
        Self::new(DEFAULT_BLUR_THRESHOLD)
    }
}

/// 8-bit luminance with BT.601 weights
pub fn luminance(image: &DynamicImage) -> GrayImage {
    let rgb = image.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let luma = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// Population variance of the 3x3 Laplacian response.
///
/// Borders use reflect-101 extension (`dcb|abcd|cba`), matching the OpenCV
/// default, so small tiles score the same as they would there.
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return 0.0;
    }

    let response = laplacian_filter(&pad_reflect_101(gray));

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0u64;

    // Interior only; the padded ring is not part of the image
    for y in 1..=height {
        for x in 1..=width {
            let value = f64::from(response.get_pixel(x, y).0[0]);
            sum += value;
            sum_sq += value * value;
            count += 1;
        }
    }

    let mean = sum / count as f64;
    (sum_sq / count as f64 - mean * mean).max(0.0)
}

/// Grow the image by one pixel on every side, mirroring without repeating the edge
fn pad_reflect_101(gray: &GrayImage) -> GrayImage {
    let (width, height) = gray.dimensions();
    GrayImage::from_fn(width + 2, height + 2, |x, y| {
        let sx = reflect_101(i64::from(x) - 1, width);
        let sy = reflect_101(i64::from(y) - 1, height);
        *gray.get_pixel(sx, sy)
    })
}

fn reflect_101(i: i64, len: u32) -> u32 {
    let n = i64::from(len);
    if n <= 1 {
        return 0;
    }
    let mirrored = if i < 0 {
        -i
    } else if i >= n {
        2 * n - 2 - i
    } else {
        i
    };
    mirrored as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::io::Cursor;

    fn encode_png(image: RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn checkerboard(size: u32) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| {
            if (x + y) % 2 == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        })
    }

    #[test]
    fn test_flat_image_has_zero_variance() {
        let flat = RgbImage::from_pixel(64, 64, Rgb([34, 139, 34]));
        let gray = luminance(&DynamicImage::ImageRgb8(flat.clone()));

        assert_eq!(laplacian_variance(&gray), 0.0);

        let verdict = SharpnessGate::default().check(&encode_png(flat));
        assert_eq!(verdict, Sharpness::Blurry { score: Some(0.0) });
    }

    #[test]
    fn test_noise_is_sharp() {
        let mut rng = StdRng::seed_from_u64(7);
        let noise = RgbImage::from_fn(128, 128, |_, _| Rgb([rng.gen(), rng.gen(), rng.gen()]));

        let verdict = SharpnessGate::default().check(&encode_png(noise));
        assert!(!verdict.is_blurry());
        assert!(verdict.score().unwrap() > DEFAULT_BLUR_THRESHOLD);
    }

    #[test]
    fn test_blurred_checkerboard_is_rejected() {
        let sharp = checkerboard(96);
        let blurred = image::imageops::blur(&sharp, 4.0);

        let gate = SharpnessGate::default();
        assert!(!gate.check(&encode_png(sharp)).is_blurry());

        let verdict = gate.check(&encode_png(blurred));
        assert!(verdict.is_blurry());
        assert!(verdict.score().unwrap() < DEFAULT_BLUR_THRESHOLD);
    }

    #[test]
    fn test_undecodable_bytes_fail_safe() {
        let verdict = SharpnessGate::default().check(b"definitely not an image");
        assert_eq!(verdict, Sharpness::Blurry { score: None });

        let verdict = SharpnessGate::default().check(&[]);
        assert!(verdict.is_blurry());
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let bytes = encode_png(checkerboard(32));
        let score = SharpnessGate::default().check(&bytes).score().unwrap();

        assert!(!SharpnessGate::new(score).check(&bytes).is_blurry());
        assert!(SharpnessGate::new(score + 1.0).check(&bytes).is_blurry());
    }

    #[test]
    fn test_reflect_101_indices() {
        assert_eq!(reflect_101(-1, 4), 1);
        assert_eq!(reflect_101(0, 4), 0);
        assert_eq!(reflect_101(3, 4), 3);
        assert_eq!(reflect_101(4, 4), 2);
        assert_eq!(reflect_101(-1, 1), 0);
        assert_eq!(reflect_101(1, 1), 0);
    }

    #[test]
    fn test_border_uses_reflect_101() {
        // Horizontal ramp: interior response is zero, edges see the mirrored
        // neighbour. Rows are [20, 0, 0, -20]; clamped borders would give +-10.
        let ramp = GrayImage::from_fn(4, 3, |x, _| Luma([(x * 10) as u8]));
        assert_eq!(laplacian_variance(&ramp), 200.0);
    }

    #[test]
    fn test_single_pixel_and_empty() {
        let dot = GrayImage::from_pixel(1, 1, Luma([200]));
        assert_eq!(laplacian_variance(&dot), 0.0);
        assert_eq!(laplacian_variance(&GrayImage::new(0, 0)), 0.0);
    }

    #[test]
    fn test_luminance_weights() {
        let red = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([255, 0, 0])));
        let green = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([0, 255, 0])));
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([255, 255, 255])));

        assert_eq!(luminance(&red).get_pixel(0, 0).0[0], 76);
        assert_eq!(luminance(&green).get_pixel(0, 0).0[0], 150);
        assert_eq!(luminance(&white).get_pixel(0, 0).0[0], 255);
    }
}
