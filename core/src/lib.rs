//! Perceptual image comparison kernels: PixelDiff, SSIM, MS-SSIM, Hitchhiker SSIM
//! (integral-image accelerated), and GMSD. Pure, reentrant, synchronous — no I/O, no
//! logging, no shared mutable state beyond a process-wide Gaussian window cache.

pub mod antialiasing;
pub mod conv;
pub mod gmsd;
pub mod hitchhiker;
pub mod integral;
pub mod luma;
pub mod msssim;
pub mod output;
pub mod pixeldiff;
pub mod ssim;
pub mod ssim_core;
pub mod types;
pub mod yiq;

pub use gmsd::{gmsd, GmsdOptions};
pub use hitchhiker::{hitch_ssim, HitchSsimOptions};
pub use msssim::{ms_ssim, MsSsimMethod, MsSsimOptions};
pub use pixeldiff::{diff, DiffResult, PixelDiffOptions};
pub use ssim::{ssim, SsimOptions};
pub use types::{Image, SimError};
