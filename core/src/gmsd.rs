//! GMSD kernel (§4.8): Prewitt gradient-magnitude similarity deviation.

use serde::{Deserialize, Serialize};

use crate::conv::{box_weights, convolve_separable, Mode, Padding};
use crate::luma::to_luma_plane;
use crate::types::{validate_shapes, Image, SimError};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GmsdOptions {
    pub downsample: bool,
    pub c: f64,
}

impl Default for GmsdOptions {
    fn default() -> Self {
        Self {
            downsample: true,
            c: 170.0,
        }
    }
}

/// Prewitt gradient magnitude (÷3), zero on the outermost 1-pixel ring (§4.8 step 3).
fn gradient_magnitude(plane: &[f32], width: u32, height: u32) -> Vec<f32> {
    let w = width as usize;
    let h = height as usize;
    let mut out = vec![0.0f32; w * h];
    if w < 3 || h < 3 {
        return out;
    }
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let tl = plane[(y - 1) * w + (x - 1)];
            let tc = plane[(y - 1) * w + x];
            let tr = plane[(y - 1) * w + (x + 1)];
            let ml = plane[y * w + (x - 1)];
            let mr = plane[y * w + (x + 1)];
            let bl = plane[(y + 1) * w + (x - 1)];
            let bc = plane[(y + 1) * w + x];
            let br = plane[(y + 1) * w + (x + 1)];

            let gx = (tl + ml + bl - tr - mr - br) / 3.0;
            let gy = (tl + tc + tr - bl - bc - br) / 3.0;
            out[y * w + x] = (gx * gx + gy * gy).sqrt();
        }
    }
    out
}

/// 2x2 average, zero-border padding (MATLAB `conv2` default), stride-2 subsample at the
/// origin. Deliberately distinct from [`crate::conv::box_downsample`]'s symmetric padding.
fn gmsd_downsample(plane: &[f32], width: u32, height: u32) -> (Vec<f32>, u32, u32) {
    let kernel = box_weights(2);
    let (filtered, fw, _fh) = convolve_separable(plane, width, height, &kernel, Mode::Same, Padding::Zero);
    let new_w = width / 2;
    let new_h = height / 2;
    let mut out = vec![0.0f32; (new_w * new_h) as usize];
    for y in 0..new_h {
        for x in 0..new_w {
            out[(y * new_w + x) as usize] = filtered[(y * 2 * fw + x * 2) as usize];
        }
    }
    (out, new_w, new_h)
}

pub fn gmsd(
    image1: &Image,
    image2: &Image,
    mut output: Option<&mut Image>,
    options: &GmsdOptions,
) -> Result<f64, SimError> {
    validate_shapes(image1, image2, &output)?;

    let mut l1 = to_luma_plane(image1);
    let mut l2 = to_luma_plane(image2);
    let mut w = image1.width;
    let mut h = image1.height;

    if options.downsample && w >= 2 && h >= 2 {
        let (d1, dw, dh) = gmsd_downsample(&l1, w, h);
        let (d2, _, _) = gmsd_downsample(&l2, w, h);
        l1 = d1;
        l2 = d2;
        w = dw;
        h = dh;
    }

    let g1 = gradient_magnitude(&l1, w, h);
    let g2 = gradient_magnitude(&l2, w, h);

    let ww = w as usize;
    let hh = h as usize;
    let mut gms = vec![0.0f32; ww * hh];
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0usize;

    if ww >= 3 && hh >= 3 {
        for y in 1..hh - 1 {
            for x in 1..ww - 1 {
                let idx = y * ww + x;
                let a = g1[idx] as f64;
                let b = g2[idx] as f64;
                let value = (2.0 * a * b + options.c) / (a * a + b * b + options.c);
                gms[idx] = value as f32;
                sum += value;
                sum_sq += value * value;
                count += 1;
            }
        }
    }

    let score = if count == 0 {
        0.0
    } else {
        let mean = sum / count as f64;
        let variance = (sum_sq / count as f64 - mean * mean).max(0.0);
        variance.sqrt()
    };

    if let Some(out) = output.as_deref_mut() {
        // The GMS map's own border is undefined (step 3), and when `downsample` halves
        // the map's resolution that undefined ring covers more than the output image's
        // literal 1-pixel edge. Zero the whole buffer up front so every byte is
        // deterministically written regardless of the downsample factor, then paint the
        // interior nearest-neighbor-upscaled from the map.
        crate::output::clear_transparent(out);
        if ww >= 3 && hh >= 3 {
            let img_w = out.width;
            let img_h = out.height;
            for y in 0..img_h {
                let v = (y as u64 * hh as u64 / img_h as u64) as u32;
                if v == 0 || v as usize >= hh - 1 {
                    continue;
                }
                for x in 0..img_w {
                    let u = (x as u64 * ww as u64 / img_w as u64) as u32;
                    if u == 0 || u as usize >= ww - 1 {
                        continue;
                    }
                    let value = gms[(v as usize) * ww + u as usize];
                    let gray = (value.clamp(0.0, 1.0) * 255.0).floor() as u8;
                    out.set_pixel(x, y, crate::yiq::pack_pixel(gray, gray, gray, 255));
                }
            }
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
    fn test_identical_images_gmsd_zero() {
        let img = solid(64, 64, 90, 90, 90);
        let score = gmsd(&img, &img, None, &GmsdOptions::default()).unwrap();
        assert!(score.abs() < 1e-9);
    }

    #[test]
    fn test_solid_color_pair_no_gradients_gmsd_zero() {
        // Scenario A: two solid-color images have no internal gradients anywhere,
        // so every GMS value is 1 and the population stddev is exactly 0.
        let black = solid(32, 32, 0, 0, 0);
        let white = solid(32, 32, 255, 255, 255);
        let score = gmsd(&black, &white, None, &GmsdOptions::default()).unwrap();
        assert!(score.abs() < 1e-9);
    }

    #[test]
    fn test_gradient_image_gmsd_positive() {
        let mut img1 = Image::new(32, 32);
        let mut img2 = Image::new(32, 32);
        for y in 0..32u32 {
            for x in 0..32u32 {
                let v = ((x * 8) % 256) as u8;
                img1.set_pixel(x, y, pack_pixel(v, v, v, 255));
                let v2 = v.wrapping_add(if x % 2 == 0 { 30 } else { 0 });
                img2.set_pixel(x, y, pack_pixel(v2, v2, v2, 255));
            }
        }
        let score = gmsd(&img1, &img2, None, &GmsdOptions::default()).unwrap();
        assert!(score > 0.0);
    }

    #[test]
    fn test_size_mismatch_is_rejected() {
        let a = Image::new(20, 20);
        let b = Image::new(21, 20);
        let err = gmsd(&a, &b, None, &GmsdOptions::default()).unwrap_err();
        assert!(matches!(err, SimError::SizeMismatch { .. }));
    }

    #[test]
    fn test_output_buffer_fully_initialized_with_downsample() {
        // 64x64 with downsample=true halves the GMS map to ~32x32, so the map's own
        // undefined border covers rows/cols well past the output image's literal edge.
        // Poison the buffer first so any untouched byte would be caught.
        let mut img1 = Image::new(64, 64);
        let mut img2 = Image::new(64, 64);
        for y in 0..64u32 {
            for x in 0..64u32 {
                let v = ((x * 5 + y * 3) % 255) as u8;
                img1.set_pixel(x, y, pack_pixel(v, v, v, 255));
                img2.set_pixel(x, y, pack_pixel(v.wrapping_add(10), v, v, 255));
            }
        }
        let mut output = Image::new_uninit(64, 64);
        output.data.fill(0xAA);

        gmsd(&img1, &img2, Some(&mut output), &GmsdOptions::default()).unwrap();

        // Every alpha byte must be either the opaque interior fill (255) or the
        // transparent clear (0); 0xAA poison surviving anywhere means an uninitialized
        // pixel leaked into the output.
        for chunk in output.data.chunks_exact(4) {
            assert!(chunk[3] == 255 || chunk[3] == 0, "found un-cleared pixel: {:?}", chunk);
        }
    }
}
