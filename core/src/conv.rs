//! 1-D window factory (with a process-wide memoized Gaussian cache) and the separable
//! 2-D convolver that both SSIM (valid, symmetric padding) and GMSD (same, zero padding)
//! are built on top of.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

/// Horizontal/vertical border handling for the convolver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Padding {
    /// Mirror without repeating the edge pixel: `s=-s` for `s<0`, `s=2W-s-2` for `s>=W`.
    /// Used by SSIM/MS-SSIM decimation (§4.5, §4.6) — required for MATLAB agreement there.
    Symmetric,
    /// Treat samples outside the plane as zero (MATLAB `conv2` default). Used by GMSD's
    /// downsampling step (§4.8) — required for MATLAB agreement there. Never interchange
    /// the two: this asymmetry between SSIM and GMSD is intentional (Open Question 2).
    Zero,
}

/// Output sizing mode for the vertical pass of [`convolve_separable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// `(W-k+1, H-k+1)`; the vertical pass reads rows directly with no border handling.
    Valid,
    /// `(W, H)`; the vertical pass applies the same padding mode as the horizontal pass.
    Same,
}

#[inline]
fn clamp_symmetric(s: i64, len: u32) -> usize {
    let len = len as i64;
    let mut s = s;
    if s < 0 {
        s = -s;
    } else if s >= len {
        s = 2 * len - s - 2;
    }
    s.clamp(0, len - 1) as usize
}

/// 1-D Gaussian weights of size `k`, standard deviation `sigma`, normalized so `Σw = 1`.
fn gaussian_weights_uncached(k: usize, sigma: f64) -> Vec<f32> {
    let c = (k as f64 - 1.0) / 2.0;
    let mut w: Vec<f64> = (0..k)
        .map(|i| {
            let d = i as f64 - c;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = w.iter().sum();
    for v in w.iter_mut() {
        *v /= sum;
    }
    w.into_iter().map(|v| v as f32).collect()
}

/// 1-D box weights of size `k`: `w_i = 1/k`.
pub fn box_weights(k: usize) -> Vec<f32> {
    vec![1.0 / k as f32; k]
}

type WindowKey = (usize, u64);
static WINDOW_CACHE: OnceLock<Mutex<HashMap<WindowKey, Arc<Vec<f32>>>>> = OnceLock::new();

/// Process-wide memoized `(size, sigma) -> weights` Gaussian window, per §4.4/§9.
pub fn gaussian_window(k: usize, sigma: f64) -> Arc<Vec<f32>> {
    let cache = WINDOW_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let key = (k, sigma.to_bits());
    let mut guard = cache.lock().unwrap();
    guard
        .entry(key)
        .or_insert_with(|| Arc::new(gaussian_weights_uncached(k, sigma)))
        .clone()
}

/// Separable 2-D convolution of `input` (`width x height`) by 1-D kernel `kernel`,
/// per §4.4. Returns `(output, out_width, out_height)`.
pub fn convolve_separable(
    input: &[f32],
    width: u32,
    height: u32,
    kernel: &[f32],
    mode: Mode,
    padding: Padding,
) -> (Vec<f32>, u32, u32) {
    let k = kernel.len();
    let p = (k / 2) as i64;
    let w = width as usize;
    let h = height as usize;

    // Horizontal pass into a same-size scratch plane.
    let mut scratch = vec![0.0f32; w * h];
    for y in 0..h {
        let row = y * w;
        for x in 0..w {
            let mut acc = 0.0f32;
            for j in 0..k {
                let s = x as i64 + j as i64 - p;
                let sample = match padding {
                    Padding::Symmetric => input[row + clamp_symmetric(s, width)],
                    Padding::Zero => {
                        if s < 0 || s >= width as i64 {
                            0.0
                        } else {
                            input[row + s as usize]
                        }
                    }
                };
                acc += kernel[j] * sample;
            }
            scratch[row + x] = acc;
        }
    }

    match mode {
        Mode::Valid => {
            let out_h = h.saturating_sub(k - 1);
            let out_w = w.saturating_sub(k - 1);
            let mut output = vec![0.0f32; out_w * out_h];
            for y in 0..out_h {
                for x in 0..out_w {
                    let mut acc = 0.0f32;
                    for j in 0..k {
                        acc += kernel[j] * scratch[(y + j) * w + x];
                    }
                    output[y * out_w + x] = acc;
                }
            }
            (output, out_w as u32, out_h as u32)
        }
        Mode::Same => {
            let mut output = vec![0.0f32; w * h];
            for y in 0..h {
                for x in 0..w {
                    let mut acc = 0.0f32;
                    for j in 0..k {
                        let s = y as i64 + j as i64 - p;
                        let sample = match padding {
                            Padding::Symmetric => scratch[clamp_symmetric(s, height) * w + x],
                            Padding::Zero => {
                                if s < 0 || s >= height as i64 {
                                    0.0
                                } else {
                                    scratch[s as usize * w + x]
                                }
                            }
                        };
                        acc += kernel[j] * sample;
                    }
                    output[y * w + x] = acc;
                }
            }
            (output, width, height)
        }
    }
}

/// Box-filter downsample by `factor`, symmetric padding, stride-`factor` subsample at
/// the origin. Shared by SSIM's auto-decimation (§4.5 step 2) and MS-SSIM's per-octave
/// downsample (§4.6 step 2, `factor = 2`).
pub fn box_downsample(plane: &[f32], width: u32, height: u32, factor: u32) -> (Vec<f32>, u32, u32) {
    let kernel = box_weights(factor as usize);
    let (filtered, fw, fh) = convolve_separable(plane, width, height, &kernel, Mode::Same, Padding::Symmetric);

    let new_w = width / factor;
    let new_h = height / factor;
    let mut out = vec![0.0f32; (new_w * new_h) as usize];
    for y in 0..new_h {
        for x in 0..new_w {
            out[(y * new_w + x) as usize] = filtered[(y * factor * fw + x * factor) as usize];
        }
    }
    (out, new_w, new_h)
}
