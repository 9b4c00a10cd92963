//! The SSIM/CS map computation shared by the SSIM and MS-SSIM kernels (§4.5 steps 3-6).

use crate::conv::{convolve_separable, gaussian_window, Mode, Padding};

/// Mean SSIM and mean CS (contrast-structure) over a windowed comparison of two luma
/// planes, plus the full SSIM map (needed by the SSIM kernel's output rendering and by
/// MS-SSIM's finest-scale output).
pub struct SsimComponents {
    pub map: Vec<f32>,
    pub map_width: u32,
    pub map_height: u32,
    pub mean_ssim: f64,
    pub mean_cs: f64,
}

/// Compute the valid-mode SSIM/CS map between `luma1` and `luma2` (`width x height`)
/// with an `window_size`-tap Gaussian window (`sigma = 1.5`) and stabilization constants
/// derived from `k1`, `k2`, `l`.
pub fn compute_ssim_components(
    luma1: &[f32],
    luma2: &[f32],
    width: u32,
    height: u32,
    window_size: usize,
    k1: f64,
    k2: f64,
    l: f64,
) -> SsimComponents {
    // Clamp the window to the plane so `Mode::Valid` never yields a zero-sized map (a
    // window larger than a tiny/decimated image would otherwise divide mean_ssim by zero).
    let max_window = (width.min(height) as usize).max(1);
    let window_size = window_size.min(max_window).max(1);
    let window = gaussian_window(window_size, 1.5);

    let (mu1, mw, mh) = convolve_separable(luma1, width, height, &window, Mode::Valid, Padding::Symmetric);
    let (mu2, _, _) = convolve_separable(luma2, width, height, &window, Mode::Valid, Padding::Symmetric);

    let n = (mw * mh) as usize;
    if n == 0 {
        return SsimComponents {
            map: Vec::new(),
            map_width: mw,
            map_height: mh,
            mean_ssim: 1.0,
            mean_cs: 1.0,
        };
    }

    let l1_sq: Vec<f32> = luma1.iter().map(|v| v * v).collect();
    let l2_sq: Vec<f32> = luma2.iter().map(|v| v * v).collect();
    let l1_l2: Vec<f32> = luma1.iter().zip(luma2).map(|(a, b)| a * b).collect();

    let (sigma1_sq_raw, _, _) = convolve_separable(&l1_sq, width, height, &window, Mode::Valid, Padding::Symmetric);
    let (sigma2_sq_raw, _, _) = convolve_separable(&l2_sq, width, height, &window, Mode::Valid, Padding::Symmetric);
    let (sigma12_raw, _, _) = convolve_separable(&l1_l2, width, height, &window, Mode::Valid, Padding::Symmetric);

    let c1 = (k1 * l) * (k1 * l);
    let c2 = (k2 * l) * (k2 * l);

    let mut map = vec![0.0f32; n];
    let mut ssim_sum = 0.0f64;
    let mut cs_sum = 0.0f64;

    for i in 0..n {
        let m1 = mu1[i] as f64;
        let m2 = mu2[i] as f64;
        let var1 = (sigma1_sq_raw[i] as f64 - m1 * m1).max(0.0);
        let var2 = (sigma2_sq_raw[i] as f64 - m2 * m2).max(0.0);
        let cov12 = sigma12_raw[i] as f64 - m1 * m2;

        let cs = (2.0 * cov12 + c2) / (var1 + var2 + c2);
        let luminance = (2.0 * m1 * m2 + c1) / (m1 * m1 + m2 * m2 + c1);
        let ssim = luminance * cs;

        map[i] = ssim as f32;
        ssim_sum += ssim;
        cs_sum += cs;
    }

    SsimComponents {
        map,
        map_width: mw,
        map_height: mh,
        mean_ssim: ssim_sum / n as f64,
        mean_cs: cs_sum / n as f64,
    }
}
