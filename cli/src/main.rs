//! Command-line front-end for the simkit perceptual image comparison kernels.
//!
//! Usage:
//!   simkit <pixel-diff|ssim|ms-ssim|hitchhiker-ssim|gmsd> <image1> <image2> [output] [options]
//!
//! Exit codes:
//!   0 - kernel ran successfully
//!   1 - validation error (size/dimension mismatch)
//!   2 - I/O error (decode/encode failure)

use std::fmt;
use std::path::Path;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use simkit_core::{
    diff, gmsd, hitch_ssim, ms_ssim, ssim, GmsdOptions, HitchSsimOptions, Image, MsSsimMethod,
    MsSsimOptions, PixelDiffOptions, SimError, SsimOptions,
};

#[derive(Debug)]
enum CliError {
    Sim(SimError),
    Io(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Sim(e) => write!(f, "{}", e),
            CliError::Io(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl From<SimError> for CliError {
    fn from(e: SimError) -> Self {
        CliError::Sim(e)
    }
}

#[derive(Parser, Debug)]
#[command(name = "simkit")]
#[command(author = "Teimur Gasanov")]
#[command(version = "0.1.0")]
#[command(about = "Perceptual image comparison kernels: pixel diff, SSIM, MS-SSIM, Hitchhiker SSIM, GMSD")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output format (json or text)
    #[arg(long, global = true, default_value = "json")]
    output_format: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// YIQ perceptual pixel diff with anti-aliasing rejection
    PixelDiff {
        image1: String,
        image2: String,
        output: Option<String>,
        #[arg(short, long, default_value = "0.1")]
        threshold: f64,
        #[arg(short, long)]
        antialiasing: bool,
        #[arg(long)]
        diff_mask: bool,
    },
    /// Structural Similarity Index
    Ssim {
        image1: String,
        image2: String,
        output: Option<String>,
        #[arg(long, default_value = "11")]
        window_size: usize,
    },
    /// Multi-scale SSIM over five octaves
    MsSsim {
        image1: String,
        image2: String,
        output: Option<String>,
        #[arg(long, default_value = "5")]
        level: usize,
        #[arg(long, default_value = "product")]
        method: String,
    },
    /// Integral-image-accelerated SSIM with rectangular windows
    HitchhikerSsim {
        image1: String,
        image2: String,
        output: Option<String>,
        #[arg(long, default_value = "11")]
        window_size: u32,
        #[arg(long)]
        mean_pooling: bool,
    },
    /// Gradient Magnitude Similarity Deviation
    Gmsd {
        image1: String,
        image2: String,
        output: Option<String>,
        #[arg(long, default_value = "170.0")]
        c: f64,
        #[arg(long)]
        no_downsample: bool,
    },
}

fn load_image(path: &str) -> Result<Image, CliError> {
    let decoded = image::open(Path::new(path))
        .map_err(|e| CliError::Io(format!("failed to load {}: {}", path, e)))?
        .to_rgba8();
    let (width, height) = (decoded.width(), decoded.height());
    log::info!("loaded {} ({}x{})", path, width, height);
    Image::from_raw(decoded.into_raw(), width, height).map_err(CliError::Sim)
}

fn save_image(img: &Image, path: &str) -> Result<(), CliError> {
    let buffer = image::RgbaImage::from_raw(img.width, img.height, img.data.clone())
        .ok_or_else(|| CliError::Io(format!("invalid buffer for {}", path)))?;
    buffer
        .save(Path::new(path))
        .map_err(|e| CliError::Io(format!("failed to save {}: {}", path, e)))?;
    log::info!("wrote {}", path);
    Ok(())
}

#[derive(Serialize)]
struct JsonResult {
    kernel: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "diffCount")]
    diff_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "diffPercentage")]
    diff_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    identical: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn print_result(format: &str, result: &JsonResult) {
    if format == "json" {
        println!("{}", serde_json::to_string(result).unwrap());
    } else if let Some(error) = &result.error {
        eprintln!("Error: {}", error);
    } else if let Some(score) = result.score {
        println!("{}: {:.6}", result.kernel, score);
    } else {
        println!(
            "{}: diff_count={} diff_percentage={:.4}% identical={}",
            result.kernel,
            result.diff_count.unwrap_or(0),
            result.diff_percentage.unwrap_or(0.0),
            result.identical.unwrap_or(false)
        );
    }
}

fn emit_error(format: &str, kernel: &'static str, err: &CliError) -> ExitCode {
    let result = JsonResult {
        kernel,
        score: None,
        diff_count: None,
        diff_percentage: None,
        identical: None,
        error: Some(err.to_string()),
    };
    print_result(format, &result);
    match err {
        CliError::Sim(_) => ExitCode::from(1),
        CliError::Io(_) => ExitCode::from(2),
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let format = cli.output_format.as_str();

    match run(&cli.command, format) {
        Ok(code) => code,
        Err((kernel, err)) => emit_error(format, kernel, &err),
    }
}

fn run(command: &Command, format: &str) -> Result<ExitCode, (&'static str, CliError)> {
    match command {
        Command::PixelDiff {
            image1,
            image2,
            output,
            threshold,
            antialiasing,
            diff_mask,
        } => {
            let kernel = "pixel-diff";
            let img1 = load_image(image1).map_err(|e| (kernel, e))?;
            let img2 = load_image(image2).map_err(|e| (kernel, e))?;
            let options = PixelDiffOptions {
                threshold: *threshold,
                include_aa: !*antialiasing,
                diff_mask: *diff_mask,
                ..Default::default()
            };
            let mut out = output.as_ref().map(|_| Image::new_uninit(img1.width, img1.height));
            let start = std::time::Instant::now();
            let result = diff(&img1, &img2, out.as_mut(), &options).map_err(|e| (kernel, e.into()))?;
            log::info!("pixel-diff ran in {:?}", start.elapsed());

            if let (Some(path), Some(buf)) = (output, &out) {
                save_image(buf, path).map_err(|e| (kernel, e))?;
            }

            print_result(
                format,
                &JsonResult {
                    kernel,
                    score: None,
                    diff_count: Some(result.diff_count),
                    diff_percentage: Some(result.diff_percentage),
                    identical: Some(result.identical),
                    error: None,
                },
            );
            Ok(if result.identical { ExitCode::from(0) } else { ExitCode::from(1) })
        }
        Command::Ssim {
            image1,
            image2,
            output,
            window_size,
        } => run_score_kernel("ssim", image1, image2, output, format, |img1, img2, out| {
            let options = SsimOptions {
                window_size: *window_size,
                ..Default::default()
            };
            ssim(img1, img2, out, &options)
        }),
        Command::MsSsim {
            image1,
            image2,
            output,
            level,
            method,
        } => run_score_kernel("ms-ssim", image1, image2, output, format, |img1, img2, out| {
            let method = if method == "wtd_sum" {
                MsSsimMethod::WtdSum
            } else {
                MsSsimMethod::Product
            };
            let options = MsSsimOptions {
                level: *level,
                method,
                ..Default::default()
            };
            ms_ssim(img1, img2, out, &options)
        }),
        Command::HitchhikerSsim {
            image1,
            image2,
            output,
            window_size,
            mean_pooling,
        } => run_score_kernel("hitchhiker-ssim", image1, image2, output, format, |img1, img2, out| {
            let options = HitchSsimOptions {
                window_size: *window_size,
                window_stride: *window_size,
                cov_pooling: !*mean_pooling,
                ..Default::default()
            };
            hitch_ssim(img1, img2, out, &options)
        }),
        Command::Gmsd {
            image1,
            image2,
            output,
            c,
            no_downsample,
        } => run_score_kernel("gmsd", image1, image2, output, format, |img1, img2, out| {
            let options = GmsdOptions {
                downsample: !*no_downsample,
                c: *c,
            };
            gmsd(img1, img2, out, &options)
        }),
    }
}

fn run_score_kernel(
    kernel: &'static str,
    image1: &str,
    image2: &str,
    output: &Option<String>,
    format: &str,
    f: impl FnOnce(&Image, &Image, Option<&mut Image>) -> Result<f64, SimError>,
) -> Result<ExitCode, (&'static str, CliError)> {
    let img1 = load_image(image1).map_err(|e| (kernel, e))?;
    let img2 = load_image(image2).map_err(|e| (kernel, e))?;
    let mut out = output.as_ref().map(|_| Image::new_uninit(img1.width, img1.height));

    let start = std::time::Instant::now();
    let score = f(&img1, &img2, out.as_mut()).map_err(|e| (kernel, e.into()))?;
    log::info!("{} ran in {:?}, score={:.6}", kernel, start.elapsed(), score);

    if let (Some(path), Some(buf)) = (output, &out) {
        save_image(buf, path).map_err(|e| (kernel, e))?;
    }

    print_result(
        format,
        &JsonResult {
            kernel,
            score: Some(score),
            diff_count: None,
            diff_percentage: None,
            identical: None,
            error: None,
        },
    );
    Ok(ExitCode::from(0))
}
