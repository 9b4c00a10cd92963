//! PixelDiff kernel (§4.3): adaptive block partitioning, a cold pass that rules out
//! unchanged blocks in bulk, and a hot pass that classifies the remainder through the
//! YIQ color delta and anti-aliasing detector.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::antialiasing::is_antialiased;
use crate::output::{clear_transparent, draw_colored_pixel, draw_gray_pixel, fill_block_gray};
use crate::types::{validate_shapes, Image, SimError};
use crate::yiq::{color_delta, threshold_to_max_delta};

#[derive(Clone, Debug)]
pub struct PixelDiffOptions {
    pub threshold: f64,
    pub alpha: f64,
    pub aa_color: [u8; 3],
    pub diff_color: [u8; 3],
    pub diff_color_alt: Option<[u8; 3]>,
    pub include_aa: bool,
    pub diff_mask: bool,
    pub fast_buffer_check: bool,
}

impl Default for PixelDiffOptions {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            alpha: 0.1,
            aa_color: [255, 255, 0],
            diff_color: [255, 0, 0],
            diff_color_alt: None,
            include_aa: false,
            diff_mask: false,
            fast_buffer_check: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffResult {
    pub diff_count: u32,
    pub diff_percentage: f64,
    pub identical: bool,
}

impl DiffResult {
    fn new(diff_count: u32, total_pixels: u32) -> Self {
        let diff_percentage = if total_pixels > 0 {
            100.0 * (diff_count as f64) / (total_pixels as f64)
        } else {
            0.0
        };
        Self {
            diff_count,
            diff_percentage,
            identical: diff_count == 0,
        }
    }
}

/// The power of two nearest `16*sqrt(sqrt(W*H)/100)`, clamped to a sane block range (§4.3).
fn calculate_block_size(width: u32, height: u32) -> u32 {
    let area = width as f64 * height as f64;
    let scale = area.sqrt() / 100.0;
    let raw_size = 16.0 * scale.sqrt();
    let log2_val = raw_size.max(1.0).log2();
    (1u32 << (log2_val.round() as u32)).clamp(8, 128)
}

fn block_has_perceptual_diff(
    a32: &[u32],
    b32: &[u32],
    width: u32,
    start_x: u32,
    start_y: u32,
    end_x: u32,
    end_y: u32,
    max_delta: f64,
) -> bool {
    for y in start_y..end_y {
        for x in start_x..end_x {
            let idx = (y * width + x) as usize;
            let (pa, pb) = (a32[idx], b32[idx]);
            if pa != pb && color_delta(pa, pb, idx, false).abs() > max_delta {
                return true;
            }
        }
    }
    false
}

#[allow(clippy::too_many_arguments)]
fn process_block(
    image1: &Image,
    image2: &Image,
    output: Option<&mut Image>,
    start_x: u32,
    start_y: u32,
    end_x: u32,
    end_y: u32,
    options: &PixelDiffOptions,
    max_delta: f64,
) -> u32 {
    let width = image1.width;
    let a32 = image1.as_u32();
    let b32 = image2.as_u32();
    let draw_background = output.is_some() && !options.diff_mask;
    let mut count = 0u32;

    // Read-only classification happens before any output write so the borrow checker
    // can see `output` released for the duration of the two immutable scans above.
    let mut classifications: Vec<(usize, Classification)> =
        Vec::with_capacity(((end_x - start_x) * (end_y - start_y)) as usize);

    for y in start_y..end_y {
        for x in start_x..end_x {
            let idx = (y * width + x) as usize;
            let (pa, pb) = (a32[idx], b32[idx]);

            if pa == pb {
                classifications.push((idx, Classification::Unchanged));
                continue;
            }

            let delta = color_delta(pa, pb, idx, false);
            if delta.abs() <= max_delta {
                classifications.push((idx, Classification::Unchanged));
                continue;
            }

            if !options.include_aa
                && (is_antialiased(image1, image2, x, y) || is_antialiased(image2, image1, x, y))
            {
                classifications.push((idx, Classification::Antialiased));
                continue;
            }

            count += 1;
            classifications.push((idx, Classification::Diff { negative: delta < 0.0 }));
        }
    }

    if let Some(out) = output {
        for (idx, class) in classifications {
            match class {
                Classification::Unchanged => {
                    if draw_background {
                        draw_gray_pixel(image1, idx, options.alpha, out);
                    }
                }
                Classification::Antialiased => {
                    draw_colored_pixel(out, idx, &options.aa_color);
                }
                Classification::Diff { negative } => {
                    let color = if negative {
                        options.diff_color_alt.unwrap_or(options.diff_color)
                    } else {
                        options.diff_color
                    };
                    draw_colored_pixel(out, idx, &color);
                }
            }
        }
    }

    count
}

enum Classification {
    Unchanged,
    Antialiased,
    Diff { negative: bool },
}

pub fn diff(
    image1: &Image,
    image2: &Image,
    mut output: Option<&mut Image>,
    options: &PixelDiffOptions,
) -> Result<DiffResult, SimError> {
    validate_shapes(image1, image2, &output)?;

    let width = image1.width;
    let height = image1.height;
    let total_pixels = width * height;

    if let Some(out) = output.as_deref_mut() {
        if options.diff_mask {
            clear_transparent(out);
        }
    }

    if options.fast_buffer_check && image1.data == image2.data {
        if let Some(out) = output.as_deref_mut() {
            if !options.diff_mask {
                fill_block_gray(image1, out, options.alpha, 0, 0, width, height);
            }
        }
        return Ok(DiffResult::new(0, total_pixels));
    }

    let block_size = calculate_block_size(width, height);
    let blocks_x = (width + block_size - 1) / block_size;
    let blocks_y = (height + block_size - 1) / block_size;

    let a32 = image1.as_u32();
    let b32 = image2.as_u32();
    let max_delta = threshold_to_max_delta(options.threshold);

    // Cold pass: classify every block in parallel (read-only), then apply the
    // gray/changed-block bookkeeping sequentially so the output buffer is touched once.
    let mut block_coords = Vec::with_capacity((blocks_x * blocks_y) as usize);
    for by in 0..blocks_y {
        for bx in 0..blocks_x {
            let start_x = bx * block_size;
            let start_y = by * block_size;
            let end_x = (start_x + block_size).min(width);
            let end_y = (start_y + block_size).min(height);
            block_coords.push((start_x, start_y, end_x, end_y));
        }
    }

    let block_changed: Vec<bool> = block_coords
        .par_iter()
        .map(|&(sx, sy, ex, ey)| block_has_perceptual_diff(a32, b32, width, sx, sy, ex, ey, max_delta))
        .collect();

    let mut changed_blocks = Vec::with_capacity(block_coords.len());
    for (&coords, &changed) in block_coords.iter().zip(&block_changed) {
        if changed {
            changed_blocks.push(coords);
        } else if let Some(out) = output.as_deref_mut() {
            if !options.diff_mask {
                let (sx, sy, ex, ey) = coords;
                fill_block_gray(image1, out, options.alpha, sx, sy, ex, ey);
            }
        }
    }

    if changed_blocks.is_empty() {
        return Ok(DiffResult::new(0, total_pixels));
    }

    // Hot pass: when no output buffer is requested, every block is independent and can
    // be reduced in parallel; the final sum is still taken in block order for determinism.
    let diff_count: u32 = if let Some(out) = output.as_deref_mut() {
        changed_blocks
            .iter()
            .map(|&(sx, sy, ex, ey)| {
                process_block(image1, image2, Some(out), sx, sy, ex, ey, options, max_delta)
            })
            .sum()
    } else {
        changed_blocks
            .par_iter()
            .map(|&(sx, sy, ex, ey)| {
                process_block(image1, image2, None, sx, sy, ex, ey, options, max_delta)
            })
            .sum()
    };

    Ok(DiffResult::new(diff_count, total_pixels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yiq::pack_pixel;

    fn solid(width: u32, height: u32, color: u32) -> Image {
        let mut img = Image::new(width, height);
        for p in img.as_u32_mut() {
            *p = color;
        }
        img
    }

    #[test]
    fn test_identical_images_zero_diff() {
        let img = solid(100, 100, pack_pixel(255, 255, 255, 255));
        let result = diff(&img, &img, None, &PixelDiffOptions::default()).unwrap();
        assert_eq!(result.diff_count, 0);
        assert!(result.identical);
    }

    #[test]
    fn test_completely_different_counts_every_pixel() {
        let img1 = solid(100, 100, pack_pixel(0, 0, 0, 255));
        let img2 = solid(100, 100, pack_pixel(255, 255, 255, 255));
        let options = PixelDiffOptions {
            include_aa: true,
            ..Default::default()
        };
        let result = diff(&img1, &img2, None, &options).unwrap();
        assert_eq!(result.diff_count, 10000);
    }

    #[test]
    fn test_scenario_a_two_by_two_solid_colors() {
        let img1 = solid(2, 2, pack_pixel(0, 0, 0, 255));
        let img2 = solid(2, 2, pack_pixel(255, 255, 255, 255));
        let options = PixelDiffOptions {
            include_aa: true,
            ..Default::default()
        };
        let result = diff(&img1, &img2, None, &options).unwrap();
        assert_eq!(result.diff_count, 4);
    }

    #[test]
    fn test_size_mismatch_is_rejected() {
        let img1 = solid(100, 100, pack_pixel(0, 0, 0, 255));
        let img2 = solid(50, 50, pack_pixel(0, 0, 0, 255));
        let err = diff(&img1, &img2, None, &PixelDiffOptions::default()).unwrap_err();
        assert!(matches!(err, SimError::SizeMismatch { .. }));
    }

    #[test]
    fn test_aa_excluded_from_count() {
        let img1 = solid(10, 10, pack_pixel(100, 100, 100, 255));
        let mut img2 = solid(10, 10, pack_pixel(100, 100, 100, 255));
        img2.as_u32_mut()[0] = pack_pixel(100, 100, 104, 255);
        img2.as_u32_mut()[1] = pack_pixel(100, 101, 100, 255);

        let options = PixelDiffOptions {
            include_aa: false,
            threshold: 0.1,
            ..Default::default()
        };
        let result = diff(&img1, &img2, None, &options).unwrap();
        assert!(result.diff_count < 2, "AA pixels should be excluded, got {}", result.diff_count);
    }

    #[test]
    fn test_include_aa_does_not_change_count_only_coloring() {
        let img1 = solid(10, 10, pack_pixel(0, 0, 0, 255));
        let img2 = solid(10, 10, pack_pixel(255, 255, 255, 255));

        let with_aa = PixelDiffOptions {
            include_aa: true,
            threshold: 0.1,
            ..Default::default()
        };
        let without_aa = PixelDiffOptions {
            include_aa: false,
            threshold: 0.1,
            ..Default::default()
        };

        let a = diff(&img1, &img2, None, &with_aa).unwrap();
        let b = diff(&img1, &img2, None, &without_aa).unwrap();
        assert_eq!(a.diff_count, b.diff_count);
    }

    #[test]
    fn test_threshold_monotonicity() {
        let mut img1 = Image::new(20, 20);
        let mut img2 = Image::new(20, 20);
        for y in 0..20u32 {
            for x in 0..20u32 {
                let v = ((x * 13 + y * 7) % 255) as u8;
                img1.set_pixel(x, y, pack_pixel(v, v, v, 255));
                img2.set_pixel(x, y, pack_pixel(v.wrapping_add(40), v, v, 255));
            }
        }
        let options = PixelDiffOptions {
            include_aa: true,
            ..Default::default()
        };
        let loose = PixelDiffOptions {
            threshold: 0.9,
            ..options.clone()
        };
        let tight = diff(&img1, &img2, None, &options).unwrap();
        let wide = diff(&img1, &img2, None, &loose).unwrap();
        assert!(wide.diff_count <= tight.diff_count);
    }

    #[test]
    fn test_gray_fill_on_identical_inputs_with_output() {
        let img = solid(4, 4, pack_pixel(128, 128, 128, 255));
        let mut out = Image::new(4, 4);
        diff(&img, &img, Some(&mut out), &PixelDiffOptions::default()).unwrap();
        for &p in out.as_u32() {
            assert_eq!(p, pack_pixel(242, 242, 242, 255));
        }
    }
}
