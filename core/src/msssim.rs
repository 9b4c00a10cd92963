//! MS-SSIM kernel (§4.6): a five-octave SSIM/CS pyramid combined by weighted product
//! or weighted sum.

use serde::{Deserialize, Serialize};

use crate::conv::box_downsample;
use crate::luma::to_luma_plane;
use crate::output::render_map;
use crate::ssim_core::compute_ssim_components;
use crate::types::{validate_shapes, Image, SimError};

pub const DEFAULT_MSSSIM_WEIGHTS: [f64; 5] = [0.0448, 0.2856, 0.3001, 0.2363, 0.1333];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MsSsimMethod {
    Product,
    WtdSum,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MsSsimOptions {
    pub window_size: usize,
    pub k1: f64,
    pub k2: f64,
    pub l: f64,
    pub level: usize,
    pub weight: Vec<f64>,
    pub method: MsSsimMethod,
}

impl Default for MsSsimOptions {
    fn default() -> Self {
        Self {
            window_size: 11,
            k1: 0.01,
            k2: 0.03,
            l: 255.0,
            level: 5,
            weight: DEFAULT_MSSSIM_WEIGHTS.to_vec(),
            method: MsSsimMethod::Product,
        }
    }
}

pub fn ms_ssim(
    image1: &Image,
    image2: &Image,
    mut output: Option<&mut Image>,
    options: &MsSsimOptions,
) -> Result<f64, SimError> {
    validate_shapes(image1, image2, &output)?;

    let mut l1 = to_luma_plane(image1);
    let mut l2 = to_luma_plane(image2);
    let mut w = image1.width;
    let mut h = image1.height;

    let mut mean_ssim = Vec::with_capacity(options.level);
    let mut mean_cs = Vec::with_capacity(options.level);
    let mut finest_map: Option<(Vec<f32>, u32, u32)> = None;

    for level in 0..options.level {
        let components = compute_ssim_components(
            &l1,
            &l2,
            w,
            h,
            options.window_size,
            options.k1,
            options.k2,
            options.l,
        );
        mean_ssim.push(components.mean_ssim);
        mean_cs.push(components.mean_cs);

        if level == options.level - 1 {
            finest_map = Some((components.map, components.map_width, components.map_height));
        } else {
            let (d1, dw, dh) = box_downsample(&l1, w, h, 2);
            let (d2, _, _) = box_downsample(&l2, w, h, 2);
            l1 = d1;
            l2 = d2;
            w = dw;
            h = dh;
        }
    }

    let score = match options.method {
        MsSsimMethod::Product => {
            let mut acc = 1.0f64;
            for (l, &w) in mean_cs.iter().take(options.level - 1).zip(&options.weight) {
                acc *= l.max(0.0).powf(w);
            }
            acc * mean_ssim[options.level - 1]
                .max(0.0)
                .powf(options.weight[options.level - 1])
        }
        MsSsimMethod::WtdSum => {
            let weight_sum: f64 = options.weight.iter().sum();
            let mut acc = 0.0f64;
            for (l, &w) in mean_cs.iter().take(options.level - 1).zip(&options.weight) {
                acc += (w / weight_sum) * l;
            }
            acc += (options.weight[options.level - 1] / weight_sum) * mean_ssim[options.level - 1];
            acc
        }
    };

    if let Some(out) = output.as_deref_mut() {
        if let Some((map, mw, mh)) = finest_map {
            render_map(&map, mw, mh, out);
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
    fn test_identical_images_ms_ssim_one() {
        let img = solid(256, 256, 100, 150, 200);
        let score = ms_ssim(&img, &img, None, &MsSsimOptions::default()).unwrap();
        assert!((score - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_identical_images_wtd_sum_one() {
        let img = solid(256, 256, 100, 150, 200);
        let options = MsSsimOptions {
            method: MsSsimMethod::WtdSum,
            ..Default::default()
        };
        let score = ms_ssim(&img, &img, None, &options).unwrap();
        assert!((score - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_size_mismatch_is_rejected() {
        let a = Image::new(256, 256);
        let b = Image::new(256, 255);
        let err = ms_ssim(&a, &b, None, &MsSsimOptions::default()).unwrap_err();
        assert!(matches!(err, SimError::SizeMismatch { .. }));
    }
}
