//! Hitchhiker SSIM kernel (§4.7): rectangular-window SSIM accelerated by summed-area
//! tables, with optional coefficient-of-variation pooling.

use serde::{Deserialize, Serialize};

use crate::integral::IntegralImage;
use crate::luma::to_luma_plane;
use crate::output::render_map;
use crate::types::{validate_shapes, Image, SimError};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct HitchSsimOptions {
    pub window_size: u32,
    pub window_stride: u32,
    pub k1: f64,
    pub k2: f64,
    pub l: f64,
    pub cov_pooling: bool,
}

impl Default for HitchSsimOptions {
    fn default() -> Self {
        Self {
            window_size: 11,
            window_stride: 11,
            k1: 0.01,
            k2: 0.03,
            l: 255.0,
            cov_pooling: true,
        }
    }
}

pub fn hitch_ssim(
    image1: &Image,
    image2: &Image,
    mut output: Option<&mut Image>,
    options: &HitchSsimOptions,
) -> Result<f64, SimError> {
    validate_shapes(image1, image2, &output)?;

    let width = image1.width;
    let height = image1.height;
    let k = options.window_size;
    let stride = options.window_stride;

    let l1 = to_luma_plane(image1);
    let l2 = to_luma_plane(image2);
    let l1_sq: Vec<f32> = l1.iter().map(|v| v * v).collect();
    let l2_sq: Vec<f32> = l2.iter().map(|v| v * v).collect();
    let l1_l2: Vec<f32> = l1.iter().zip(&l2).map(|(a, b)| a * b).collect();

    let sat1 = IntegralImage::build(&l1, width, height);
    let sat2 = IntegralImage::build(&l2, width, height);
    let sat1_sq = IntegralImage::build(&l1_sq, width, height);
    let sat2_sq = IntegralImage::build(&l2_sq, width, height);
    let sat12 = IntegralImage::build(&l1_l2, width, height);

    let c1 = (options.k1 * options.l) * (options.k1 * options.l);
    let c2 = (options.k2 * options.l) * (options.k2 * options.l);
    let area = (k * k) as f64;

    let map_w = if width >= k { (width - k) / stride + 1 } else { 0 };
    let map_h = if height >= k { (height - k) / stride + 1 } else { 0 };

    let mut map = vec![0.0f32; (map_w * map_h) as usize];
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let n = (map_w * map_h) as usize;

    for row in 0..map_h {
        let y0 = row * stride;
        let y1 = y0 + k;
        for col in 0..map_w {
            let x0 = col * stride;
            let x1 = x0 + k;

            let mu1 = sat1.window_sum(x0, y0, x1, y1) / area;
            let mu2 = sat2.window_sum(x0, y0, x1, y1) / area;
            let s1 = sat1_sq.window_sum(x0, y0, x1, y1) / area;
            let s2 = sat2_sq.window_sum(x0, y0, x1, y1) / area;
            let s12 = sat12.window_sum(x0, y0, x1, y1) / area;

            let var1 = (s1 - mu1 * mu1).max(0.0);
            let var2 = (s2 - mu2 * mu2).max(0.0);
            let cov12 = s12 - mu1 * mu2;

            let ssim = ((2.0 * mu1 * mu2 + c1) * (2.0 * cov12 + c2))
                / ((mu1 * mu1 + mu2 * mu2 + c1) * (var1 + var2 + c2));

            let idx = (row * map_w + col) as usize;
            map[idx] = ssim as f32;
            sum += ssim;
            sum_sq += ssim * ssim;
        }
    }

    let score = if n == 0 {
        1.0
    } else {
        let mean = sum / n as f64;
        if options.cov_pooling {
            if mean == 0.0 {
                1.0
            } else {
                let variance = (sum_sq / n as f64 - mean * mean).max(0.0);
                let stddev = variance.sqrt();
                1.0 - stddev / mean
            }
        } else {
            mean
        }
    };

    if let Some(out) = output.as_deref_mut() {
        if map_w > 0 && map_h > 0 {
            render_map(&map, map_w, map_h, out);
        }
    }

    Ok(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yiq::pack_pixel;

    fn solid(width: u32, height: u32, r: u8, g: u8, b: u8) -> Image {
        let mut img = Image::new(width, height);
        let px = pack_pixel(r, g, b, 255);
        for p in img.as_u32_mut() {
            *p = px;
        }
        img
    }

    #[test]
    fn test_identical_images_mean_pooling_one() {
        let img = solid(64, 64, 128, 128, 128);
        let options = HitchSsimOptions {
            cov_pooling: false,
            ..Default::default()
        };
        let score = hitch_ssim(&img, &img, None, &options).unwrap();
        assert!((score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_identical_images_cov_pooling_one() {
        let img = solid(64, 64, 100, 100, 100);
        let score = hitch_ssim(&img, &img, None, &HitchSsimOptions::default()).unwrap();
        assert!((score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_black_vs_white_mean_pooling_below_half() {
        let black = solid(100, 100, 0, 0, 0);
        let white = solid(100, 100, 255, 255, 255);
        let options = HitchSsimOptions {
            cov_pooling: false,
            ..Default::default()
        };
        let score = hitch_ssim(&black, &white, None, &options).unwrap();
        assert!(score < 0.5);
    }

    #[test]
    fn test_size_mismatch_is_rejected() {
        let a = Image::new(50, 50);
        let b = Image::new(50, 49);
        let err = hitch_ssim(&a, &b, None, &HitchSsimOptions::default()).unwrap_err();
        assert!(matches!(err, SimError::SizeMismatch { .. }));
    }
}
