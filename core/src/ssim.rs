//! SSIM kernel (§4.5): automatic decimation, 11-tap Gaussian windowing, reduced to a
//! single `[0,1]` score.

use serde::{Deserialize, Serialize};

use crate::conv::box_downsample;
use crate::luma::to_luma_plane;
use crate::output::render_map;
use crate::ssim_core::compute_ssim_components;
use crate::types::{validate_shapes, Image, SimError};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SsimOptions {
    pub window_size: usize,
    pub k1: f64,
    pub k2: f64,
    pub l: f64,
}

impl Default for SsimOptions {
    fn default() -> Self {
        Self {
            window_size: 11,
            k1: 0.01,
            k2: 0.03,
            l: 255.0,
        }
    }
}

/// Decimation factor per §4.5 step 2: `max(1, round(min(W,H)/256))`.
fn decimation_factor(width: u32, height: u32) -> u32 {
    let m = width.min(height) as f64;
    (m / 256.0).round().max(1.0) as u32
}

pub fn ssim(
    image1: &Image,
    image2: &Image,
    mut output: Option<&mut Image>,
    options: &SsimOptions,
) -> Result<f64, SimError> {
    validate_shapes(image1, image2, &output)?;

    let width = image1.width;
    let height = image1.height;

    let mut l1 = to_luma_plane(image1);
    let mut l2 = to_luma_plane(image2);
    let mut w = width;
    let mut h = height;

    let f = decimation_factor(width, height);
    if f > 1 {
        let (d1, dw, dh) = box_downsample(&l1, w, h, f);
        let (d2, _, _) = box_downsample(&l2, w, h, f);
        l1 = d1;
        l2 = d2;
        w = dw;
        h = dh;
    }

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

    if let Some(out) = output.as_deref_mut() {
        render_map(&components.map, components.map_width, components.map_height, out);
    }

    Ok(components.mean_ssim)
}
