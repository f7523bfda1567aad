//! Image bytes to model input tensor

use candle_core::{DType, Device, Tensor};
use geosight_core::{Error, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::debug;

/// Side length of the square model input
pub const INPUT_SIZE: usize = 224;

/// Shape of the tensor handed to the engine: (batch, channels, height, width)
pub const INPUT_SHAPE: [usize; 4] = [1, 3, INPUT_SIZE, INPUT_SIZE];

/// Message for bytes that do not decode as an image
pub const UNDECODABLE_IMAGE_MESSAGE: &str = "Image could not be decoded. Please upload a JPEG or PNG.";

/// Per-channel RGB mean of the training data
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel RGB standard deviation of the training data
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Converts encoded image bytes into a normalized NCHW tensor.
///
/// Output always lives on the CPU; engines move it to their own device.
#[derive(Debug, Clone)]
pub struct TensorPreprocessor {
    size: u32,
    mean: [f32; 3],
    std: [f32; 3],
}

impl TensorPreprocessor {
    /// Create a preprocessor for the standard 224x224 ImageNet-normalized input
    pub fn new() -> Self {
        Self {
            size: INPUT_SIZE as u32,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }

    /// Decode, resize and normalize.
    ///
    /// Fails with a preprocessing error when the bytes are not a decodable
    /// image, whatever the sharpness gate concluded. The decoder's own
    /// message is logged, not returned.
    pub fn process(&self, image_bytes: &[u8]) -> Result<Tensor> {
        let image = image::load_from_memory(image_bytes).map_err(|e| {
            debug!("Failed to decode image: {}", e);
            Error::preprocessing(UNDECODABLE_IMAGE_MESSAGE)
        })?;

        let resized = imageops::resize(&image.to_rgb8(), self.size, self.size, FilterType::CatmullRom);

        self.to_tensor(resized)
            .map_err(|e| Error::internal(format!("failed to build input tensor: {}", e)))
    }

    fn to_tensor(&self, rgb: RgbImage) -> candle_core::Result<Tensor> {
        let (width, height) = (rgb.width() as usize, rgb.height() as usize);
        let device = Device::Cpu;

        let mean = Tensor::new(&self.mean, &device)?.reshape((1, 1, 3))?;
        let std = Tensor::new(&self.std, &device)?.reshape((1, 1, 3))?;

        // HWC, scaled to [0, 1], then standardized per channel
        let hwc = Tensor::from_vec(rgb.into_raw(), (height, width, 3), &device)?
            .to_dtype(DType::F32)?
            .affine(1.0 / 255.0, 0.0)?
            .broadcast_sub(&mean)?
            .broadcast_div(&std)?;

        hwc.permute((2, 0, 1))?.unsqueeze(0)?.contiguous()
    }
}

impl Default for TensorPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        image.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8])
        }))
    }

    #[test]
    fn test_output_shape() {
        let bytes = encode(gradient(300, 180), ImageFormat::Png);
        let tensor = TensorPreprocessor::new().process(&bytes).unwrap();

        assert_eq!(tensor.dims(), &INPUT_SHAPE);
        assert_eq!(tensor.dtype(), DType::F32);
    }

    #[test]
    fn test_deterministic() {
        let bytes = encode(gradient(64, 64), ImageFormat::Png);
        let preprocessor = TensorPreprocessor::new();

        let a: Vec<u32> = preprocessor
            .process(&bytes)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap()
            .into_iter()
            .map(f32::to_bits)
            .collect();
        let b: Vec<u32> = preprocessor
            .process(&bytes)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap()
            .into_iter()
            .map(f32::to_bits)
            .collect();

        assert_eq!(a, b);
    }

    #[test]
    fn test_channel_order_and_normalization() {
        let red = DynamicImage::ImageRgb8(RgbImage::from_pixel(224, 224, Rgb([255, 0, 0])));
        let bytes = encode(red, ImageFormat::Png);

        let tensor = TensorPreprocessor::new().process(&bytes).unwrap();
        let chw = tensor.squeeze(0).unwrap().to_vec3::<f32>().unwrap();

        let expected = [
            (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0],
            (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1],
            (0.0 - IMAGENET_MEAN[2]) / IMAGENET_STD[2],
        ];

        for (channel, value) in expected.iter().enumerate() {
            for row in [0, 111, 223] {
                for col in [0, 57, 223] {
                    let got = chw[channel][row][col];
                    assert!(
                        (got - value).abs() < 1e-5,
                        "channel {} at ({}, {}): {} != {}",
                        channel,
                        row,
                        col,
                        got,
                        value
                    );
                }
            }
        }
    }

    #[test]
    fn test_alpha_channel_dropped() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(40, 40, Rgba([10, 200, 30, 128])));
        let bytes = encode(rgba, ImageFormat::Png);

        let tensor = TensorPreprocessor::new().process(&bytes).unwrap();
        assert_eq!(tensor.dims(), &INPUT_SHAPE);
    }

    #[test]
    fn test_jpeg_input() {
        let bytes = encode(gradient(256, 256), ImageFormat::Jpeg);
        let tensor = TensorPreprocessor::new().process(&bytes).unwrap();
        assert_eq!(tensor.dims(), &INPUT_SHAPE);
    }

    #[test]
    fn test_undecodable_bytes() {
        let err = TensorPreprocessor::new().process(b"\x89PNG but not really").unwrap_err();
        assert!(matches!(err, Error::Preprocessing(_)));
        assert_eq!(err.public_message(), UNDECODABLE_IMAGE_MESSAGE);
        assert!(!err.to_string().contains("Format error"));
    }
}
