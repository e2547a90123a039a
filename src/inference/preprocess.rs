//! Deterministic image transform applied before every forward pass:
//! RGB conversion, exact resize, scaling to `[0, 1]`, per-channel normalisation.

use image::imageops::{self, FilterType};
use image::DynamicImage;

use super::domain::ImageTensor;

/// Preprocessing options.
#[derive(Clone, Debug, PartialEq)]
pub struct Preprocess {
    /// Output `(width, height)` in pixels.
    pub target_size: (u32, u32),
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for Preprocess {
    fn default() -> Self {
        Self {
            target_size: (224, 224),
            mean: [0.5, 0.5, 0.5],
            std: [0.5, 0.5, 0.5],
        }
    }
}

impl Preprocess {
    /// Convert any decoded image into a normalised 3-channel CHW tensor.
    pub fn apply(&self, img: &DynamicImage) -> ImageTensor {
        let (width, height) = self.target_size;
        let rgb = imageops::resize(&img.to_rgb8(), width, height, FilterType::Triangle);

        let plane = (width * height) as usize;
        let mut data = vec![0.0f32; 3 * plane];
        for (x, y, pixel) in rgb.enumerate_pixels() {
            let offset = (y * width + x) as usize;
            for c in 0..3 {
                let v = f32::from(pixel[c]) / 255.0;
                data[c * plane + offset] = (v - self.mean[c]) / self.std[c];
            }
        }

        ImageTensor {
            channels: 3,
            height: height as usize,
            width: width as usize,
            data,
        }
    }
}
