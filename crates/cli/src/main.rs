//! Pansharp CLI - pansharpening of multispectral imagery

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use pansharp_algorithms::fusion::{BroveyWeights, MemoryPolicy};
use pansharp_algorithms::histogram::match_histograms;
use pansharp_algorithms::job::{FusionMethod, JobOptions, PansharpJob};
use pansharp_algorithms::kernel::Filter2D;
use pansharp_algorithms::resample::ResampleMethod;
use pansharp_core::band::{statistics, BandStatistics};
use pansharp_core::io::{read_tiff, write_tiff, Compression};
use pansharp_core::progress::{Phase, ProgressObserver};
use pansharp_core::{DataType, MemBand, RasterBand, Shape, Spectrum};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "pansharp")]
#[command(author, version, about = "Pansharpening of multispectral imagery", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a TIFF file
    Info {
        /// Input TIFF file
        input: PathBuf,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Fuse a panchromatic band with multispectral bands
    Fuse {
        /// Panchromatic TIFF (first band is used)
        #[arg(long)]
        pan: PathBuf,
        /// Multispectral TIFF; bands 1-3 are red, green, blue
        #[arg(long)]
        ms: PathBuf,
        /// 1-based index of the near infrared band in the multispectral file
        #[arg(long)]
        nir_band: Option<usize>,
        /// Output TIFF (RGB)
        #[arg(short, long)]
        output: PathBuf,
        /// Fusion method: brovey, hpfm
        #[arg(short, long, default_value = "brovey")]
        method: String,
        /// Brovey weights: r,g,b or r,g,b,nir
        #[arg(long, default_value = "1,1,1")]
        weights: String,
        /// HPFM high-pass kernel: box, gaussian
        #[arg(long, default_value = "box")]
        kernel: String,
        /// Box kernel side
        #[arg(long, default_value = "5")]
        size: usize,
        /// Gaussian kernel sigma
        #[arg(long, default_value = "1.0")]
        sigma: f64,
        /// HPFM halo memory policy: auto, cached, per-block
        #[arg(long, default_value = "auto")]
        memory: String,
        /// Multispectral upsampling: nearest, bilinear, cubic
        #[arg(long, default_value = "bilinear")]
        resampling: String,
        /// Native block of the fused bands, WxH (defaults to the pan block)
        #[arg(long)]
        block_size: Option<String>,
        /// Output compression: none, lzw, deflate, packbits
        #[arg(long, default_value = "none")]
        compress: String,
        /// Output datatype
        #[arg(long, default_value = "Byte")]
        datatype: String,
        /// Skip histogram matching of the fused bands
        #[arg(long)]
        no_hist_matching: bool,
        /// Fusion threads
        #[arg(long, default_value = "1")]
        threads: usize,
    },
    /// Match the histogram of one band against another
    Match {
        /// Band to adjust (first band of the file)
        src: PathBuf,
        /// Reference band (first band of the file)
        reference: PathBuf,
        /// Output file
        output: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set default subscriber")
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

/// Progress bar fed by pansharpening passes; restarts on every phase change
struct BarObserver {
    bar: ProgressBar,
    phase: Option<Phase>,
}

impl BarObserver {
    fn new() -> Result<Self> {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:>18.bold} [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
                .progress_chars("=> "),
        );
        Ok(Self { bar, phase: None })
    }

    fn finish(self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressObserver for BarObserver {
    fn on_progress(&mut self, phase: Phase, fraction: f64, message: &str) {
        if self.phase != Some(phase) {
            self.phase = Some(phase);
            self.bar.set_prefix(phase.to_string());
            self.bar.reset();
        }
        self.bar.set_position((fraction * 100.0).round() as u64);
        self.bar.set_message(message.to_string());
    }
}

fn read_bands(path: &Path) -> Result<Vec<MemBand>> {
    let pb = spinner("Reading TIFF...")?;
    let bands =
        read_tiff(path).with_context(|| format!("Failed to read {}", path.display()))?;
    pb.finish_and_clear();
    if let Some(first) = bands.first() {
        info!(
            "{}: {} band(s) of {} x {} {}",
            path.display(),
            bands.len(),
            first.width(),
            first.height(),
            first.data_type()
        );
    }
    Ok(bands)
}

fn first_band(path: &Path) -> Result<MemBand> {
    read_bands(path)?
        .into_iter()
        .next()
        .with_context(|| format!("{} has no bands", path.display()))
}

fn write_bands(bands: &[&MemBand], path: &Path) -> Result<()> {
    let pb = spinner("Writing output...")?;
    write_tiff(path, bands).context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn parse_block_size(s: &str) -> Result<Shape> {
    let (w, h) = match s.to_lowercase().split_once('x') {
        Some((w, h)) => (w.trim().to_string(), h.trim().to_string()),
        None => (s.trim().to_string(), s.trim().to_string()),
    };
    let width: usize = w
        .parse()
        .with_context(|| format!("Invalid block width in {}", s))?;
    let height: usize = h
        .parse()
        .with_context(|| format!("Invalid block height in {}", s))?;
    if width == 0 || height == 0 {
        anyhow::bail!("Block size must be positive, got: {}", s);
    }
    Ok(Shape::new(width, height))
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn parse_weights(s: &str) -> Result<BroveyWeights> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Invalid weights: {}", s))?;
    match parts.as_slice() {
        [r, g, b] => Ok(BroveyWeights::rgb(*r, *g, *b)),
        [r, g, b, nir] => Ok(BroveyWeights::rgb(*r, *g, *b).with_nir(*nir)),
        _ => anyhow::bail!("Weights must be 'r,g,b' or 'r,g,b,nir', got: {}", s),
    }
}

fn parse_kernel(kind: &str, size: usize, sigma: f64) -> Result<Filter2D> {
    match kind.to_lowercase().as_str() {
        "box" => Ok(Filter2D::box_high_pass(size)),
        "gaussian" | "gauss" => {
            Filter2D::gaussian_high_pass(sigma).context("Invalid gaussian kernel")
        }
        _ => anyhow::bail!("Unknown kernel: {}. Use box or gaussian.", kind),
    }
}

fn parse_memory(s: &str) -> Result<MemoryPolicy> {
    match s.to_lowercase().as_str() {
        "auto" => Ok(MemoryPolicy::Auto),
        "cached" | "cache" => Ok(MemoryPolicy::Cached),
        "per-block" | "perblock" | "polite" => Ok(MemoryPolicy::PerBlock),
        _ => anyhow::bail!("Unknown memory policy: {}. Use auto, cached, or per-block.", s),
    }
}

#[derive(Serialize)]
struct BandReport {
    index: usize,
    width: usize,
    height: usize,
    data_type: DataType,
    block: Shape,
    nodata: Option<f64>,
    statistics: BandStatistics,
}

#[derive(Serialize)]
struct FileReport {
    file: String,
    bands: Vec<BandReport>,
}

fn report(path: &Path, bands: &mut [MemBand]) -> Result<FileReport> {
    let bands = bands
        .iter_mut()
        .enumerate()
        .map(|(i, band)| -> Result<BandReport> {
            Ok(BandReport {
                index: i + 1,
                width: band.width(),
                height: band.height(),
                data_type: band.data_type(),
                block: band.block_size(),
                nodata: band.nodata(),
                statistics: statistics(band).context("Failed to compute statistics")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(FileReport {
        file: path.display().to_string(),
        bands,
    })
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input, json } => {
            let mut bands = read_bands(&input)?;
            let report = report(&input, &mut bands)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            println!("File: {}", report.file);
            for band in &report.bands {
                let stats = &band.statistics;
                println!("\nBand {}:", band.index);
                println!(
                    "  Dimensions: {} x {} ({} cells)",
                    band.width,
                    band.height,
                    band.width * band.height
                );
                println!("  Data type: {}", band.data_type);
                println!("  Block: {} x {}", band.block.width, band.block.height);
                if let Some(nodata) = band.nodata {
                    println!("  NoData: {}", nodata);
                }
                if stats.valid_count > 0 {
                    println!("  Min: {:.4}", stats.min);
                    println!("  Max: {:.4}", stats.max);
                    println!("  Mean: {:.4}", stats.mean);
                }
                println!(
                    "  Valid cells: {} ({:.1}%)",
                    stats.valid_count,
                    100.0 * stats.valid_count as f64 / (band.width * band.height) as f64
                );
            }
        }

        // ── Fuse ─────────────────────────────────────────────────────
        Commands::Fuse {
            pan,
            ms,
            nir_band,
            output,
            method,
            weights,
            kernel,
            size,
            sigma,
            memory,
            resampling,
            block_size,
            compress,
            datatype,
            no_hist_matching,
            threads,
        } => {
            let method = match method.to_lowercase().as_str() {
                "brovey" => FusionMethod::Brovey {
                    weights: parse_weights(&weights)?,
                },
                "hpfm" => FusionMethod::Hpfm {
                    kernel: parse_kernel(&kernel, size, sigma)?,
                    memory: parse_memory(&memory)?,
                },
                _ => anyhow::bail!("Unknown method: {}. Use brovey or hpfm.", method),
            };
            let resampling = ResampleMethod::from_name(&resampling).with_context(|| {
                format!(
                    "Unknown resampling: {}. Use nearest, bilinear or cubic.",
                    resampling
                )
            })?;
            let block_size = block_size.as_deref().map(parse_block_size).transpose()?;
            let compression = Compression::from_name(&compress).with_context(|| {
                format!(
                    "Unknown compression: {}. Use none, lzw, deflate or packbits.",
                    compress
                )
            })?;
            let output_type = DataType::from_name(&datatype)
                .with_context(|| format!("Unknown datatype: {}", datatype))?;

            let mut pan_band = first_band(&pan)?;
            let mut ms_bands = read_bands(&ms)?;
            if ms_bands.len() < 3 {
                anyhow::bail!(
                    "{} has {} band(s), red, green and blue are needed",
                    ms.display(),
                    ms_bands.len()
                );
            }
            let mut nir = match nir_band {
                Some(n) if n < 4 || n > ms_bands.len() => anyhow::bail!(
                    "--nir-band {} must point past the visible bands (4..={})",
                    n,
                    ms_bands.len()
                ),
                Some(n) => Some(ms_bands.swap_remove(n - 1)),
                None => None,
            };
            let [red, green, blue, ..] = ms_bands.as_mut_slice() else {
                anyhow::bail!("{} lost its visible bands", ms.display());
            };

            let options = JobOptions {
                output_type,
                block_size,
                resampling,
                histogram_matching: !no_hist_matching,
                num_threads: threads,
                compression,
            };
            info!(
                "Fusing with {} into {} x {} {}",
                method.name(),
                pan_band.width(),
                pan_band.height(),
                output_type
            );

            let mut builder = PansharpJob::builder()
                .band(Spectrum::Panchromatic, &mut pan_band)
                .band(Spectrum::Red, red)
                .band(Spectrum::Green, green)
                .band(Spectrum::Blue, blue)
                .method(method)
                .options(options);
            if let Some(nir) = nir.as_mut() {
                builder = builder.band(Spectrum::NearInfrared, nir);
            }
            let job = builder.build().context("Invalid pansharpening job")?;

            let start = Instant::now();
            let mut observer = BarObserver::new()?;
            let image = job.run(&mut observer).context("Pansharpening failed")?;
            observer.finish();
            let elapsed = start.elapsed();

            let pb = spinner("Writing output...")?;
            image
                .write_tiff(&output)
                .context("Failed to write output")?;
            pb.finish_and_clear();
            done("Pansharpened image", &output, elapsed);
        }

        // ── Match ────────────────────────────────────────────────────
        Commands::Match {
            src,
            reference,
            output,
        } => {
            let mut src_band = first_band(&src)?;
            let mut ref_band = first_band(&reference)?;

            let start = Instant::now();
            let mut observer = BarObserver::new()?;
            match_histograms(&mut src_band, &mut ref_band, &mut observer)
                .context("Histogram matching failed")?;
            observer.finish();
            let elapsed = start.elapsed();

            write_bands(&[&src_band], &output)?;
            done("Matched band", &output, elapsed);
        }
    }

    Ok(())
}
