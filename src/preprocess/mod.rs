//! Image-to-tensor preprocessing.
//!
//! Converts an arbitrary-sized color image into the fixed-shape normalized
//! tensor a model expects: resample to the target shape, reorder channels,
//! optionally scale bytes to unit range, apply per-channel mean/std, and
//! lay the result out planar (channel-major), since that is the layout
//! virtually all vision graphs expect.
//!
//! The unit-range scale and the mean/std adjustment are folded into one
//! affine transform per channel (`alpha = scale / std`, `beta = -mean /
//! std`), so each pixel costs one multiply-add.

use image::imageops::FilterType;
use image::DynamicImage;
use rayon::prelude::*;

use crate::core::{Tensor4D, VisionError, VisionResult};
use crate::domain::{ChannelOrder, InputShape, PreprocessingConfig};

/// Pixel count above which the channel planes are filled in parallel.
/// Below it the rayon dispatch overhead outweighs the work.
const PARALLEL_PIXEL_THRESHOLD: usize = 256 * 256;

/// Converts images into normalized planar tensors.
///
/// Pure and stateless after construction: `run` borrows `&self` and may be
/// called concurrently for independent frames.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    /// Per-output-channel scale (`scale / std`).
    alpha: [f32; 3],
    /// Per-output-channel offset (`-mean / std`).
    beta: [f32; 3],
    channel_order: ChannelOrder,
    resize_filter: FilterType,
}

impl Preprocessor {
    /// Builds a preprocessor from normalization constants.
    ///
    /// Uses bilinear resampling by default; see [`with_resize_filter`]
    /// for quality/speed trade-offs.
    ///
    /// [`with_resize_filter`]: Self::with_resize_filter
    pub fn new(config: &PreprocessingConfig) -> VisionResult<Self> {
        config.validate()?;

        let scale = if config.normalize_to_unit_range {
            1.0 / 255.0
        } else {
            1.0
        };
        let mut alpha = [0.0f32; 3];
        let mut beta = [0.0f32; 3];
        for c in 0..3 {
            alpha[c] = scale / config.channel_stds[c];
            beta[c] = -config.channel_means[c] / config.channel_stds[c];
        }

        Ok(Self {
            alpha,
            beta,
            channel_order: config.channel_order,
            resize_filter: FilterType::Triangle,
        })
    }

    /// Overrides the resampling filter.
    pub fn with_resize_filter(mut self, filter: FilterType) -> Self {
        self.resize_filter = filter;
        self
    }

    /// Preprocesses one image into a `(1, C, H, W)` tensor.
    pub fn run(&self, image: &DynamicImage, target: InputShape) -> VisionResult<Tensor4D> {
        let width = target.width;
        let height = target.height;

        let rgb = image::imageops::resize(&image.to_rgb8(), width, height, self.resize_filter);

        let plane_len = (width * height) as usize;
        let mut tensor = vec![0.0f32; 3 * plane_len];
        let pixels = rgb.as_raw();

        let fill_plane = |c: usize, plane: &mut [f32]| {
            // Output channel c reads source channel c, or its mirror for BGR.
            let src = match self.channel_order {
                ChannelOrder::Rgb => c,
                ChannelOrder::Bgr => 2 - c,
            };
            let alpha = self.alpha[c];
            let beta = self.beta[c];
            for (i, value) in plane.iter_mut().enumerate() {
                *value = pixels[i * 3 + src] as f32 * alpha + beta;
            }
        };

        if plane_len >= PARALLEL_PIXEL_THRESHOLD {
            tensor
                .par_chunks_mut(plane_len)
                .enumerate()
                .for_each(|(c, plane)| fill_plane(c, plane));
        } else {
            for (c, plane) in tensor.chunks_mut(plane_len).enumerate() {
                fill_plane(c, plane);
            }
        }

        ndarray::Array4::from_shape_vec((1, 3, height as usize, width as usize), tensor).map_err(
            |e| {
                VisionError::normalization(
                    &format!("failed to shape {width}x{height} planar tensor"),
                    e,
                )
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid_image(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        let mut img = RgbImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = Rgb(color);
        }
        DynamicImage::ImageRgb8(img)
    }

    fn shape(width: u32, height: u32) -> InputShape {
        InputShape::new(width, height, 3)
    }

    #[test]
    fn passthrough_keeps_raw_byte_values() {
        let pre = Preprocessor::new(&PreprocessingConfig::passthrough()).unwrap();
        let tensor = pre.run(&solid_image(2, 2, [10, 20, 30]), shape(2, 2)).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 2, 2]);
        assert_eq!(tensor[[0, 0, 0, 0]], 10.0);
        assert_eq!(tensor[[0, 1, 0, 0]], 20.0);
        assert_eq!(tensor[[0, 2, 0, 0]], 30.0);
    }

    #[test]
    fn unit_range_divides_by_255() {
        let pre = Preprocessor::new(&PreprocessingConfig::unit_range()).unwrap();
        let tensor = pre.run(&solid_image(2, 2, [255, 0, 51]), shape(2, 2)).unwrap();

        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
        assert_eq!(tensor[[0, 1, 0, 0]], 0.0);
        assert!((tensor[[0, 2, 0, 0]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn bgr_order_swaps_red_and_blue_planes() {
        let mut config = PreprocessingConfig::passthrough();
        config.channel_order = ChannelOrder::Bgr;
        let pre = Preprocessor::new(&config).unwrap();
        let tensor = pre.run(&solid_image(2, 2, [10, 20, 30]), shape(2, 2)).unwrap();

        assert_eq!(tensor[[0, 0, 0, 0]], 30.0);
        assert_eq!(tensor[[0, 1, 0, 0]], 20.0);
        assert_eq!(tensor[[0, 2, 0, 0]], 10.0);
    }

    #[test]
    fn mean_std_applied_after_unit_range() {
        let mut config = PreprocessingConfig::unit_range();
        config.channel_means = [0.5, 0.5, 0.5];
        config.channel_stds = [0.5, 0.5, 0.5];
        let pre = Preprocessor::new(&config).unwrap();
        let tensor = pre.run(&solid_image(2, 2, [255, 0, 255]), shape(2, 2)).unwrap();

        // (1.0 - 0.5) / 0.5 = 1.0; (0.0 - 0.5) / 0.5 = -1.0
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 0, 0]] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn output_is_planar_channel_major() {
        // Left column red, right column green, on a 2x1 image.
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([200, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 100, 0]));
        let pre = Preprocessor::new(&PreprocessingConfig::passthrough())
            .unwrap()
            .with_resize_filter(FilterType::Nearest);
        let tensor = pre.run(&DynamicImage::ImageRgb8(img), shape(2, 1)).unwrap();

        let flat: Vec<f32> = tensor.iter().copied().collect();
        // Plane 0 (R): [200, 0], plane 1 (G): [0, 100], plane 2 (B): [0, 0].
        assert_eq!(flat, vec![200.0, 0.0, 0.0, 100.0, 0.0, 0.0]);
    }

    #[test]
    fn resizes_to_target_shape() {
        let pre = Preprocessor::new(&PreprocessingConfig::default()).unwrap();
        let tensor = pre.run(&solid_image(37, 61, [128, 128, 128]), shape(8, 8)).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 8, 8]);
    }

    #[test]
    fn callable_concurrently_for_independent_frames() {
        use std::sync::Arc;

        let pre = Arc::new(Preprocessor::new(&PreprocessingConfig::default()).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let pre = Arc::clone(&pre);
                std::thread::spawn(move || {
                    let img = solid_image(16 + i, 16, [i as u8 * 10, 0, 0]);
                    pre.run(&img, shape(8, 8)).unwrap().shape().to_vec()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), vec![1, 3, 8, 8]);
        }
    }
}
