//! Pansharpening job
//!
//! A [`PansharpJob`] ties the passes together: multispectral bands are
//! resampled to the panchromatic extent, fused into three new bands and
//! optionally histogram-matched against their sources.
//!
//! ```ignore
//! let image = PansharpJob::builder()
//!     .band(Spectrum::Panchromatic, &mut pan)
//!     .band(Spectrum::Red, &mut red)
//!     .band(Spectrum::Green, &mut green)
//!     .band(Spectrum::Blue, &mut blue)
//!     .method(FusionMethod::default())
//!     .build()?
//!     .run(&mut NoProgress)?;
//! ```

use crate::fusion::{Brovey, BroveyWeights, Fusor, Hpfm, HpfmParams, MemoryPolicy};
use crate::histogram::{match_histograms, MAX_HISTOGRAM_DOMAIN};
use crate::kernel::Filter2D;
use crate::resample::{resample, ResampleMethod};
use pansharp_core::band::{BandMap, MemBand, RasterBand};
use pansharp_core::io::{write_tiff_to_buffer_with, write_tiff_with, Compression};
use pansharp_core::progress::{Phase, ProgressObserver, ProgressTicker};
use pansharp_core::{DataType, Error, Result, Shape, Spectrum};
use std::collections::BTreeMap;
use std::path::Path;

/// Fusion algorithm and its parameters
#[derive(Debug, Clone)]
pub enum FusionMethod {
    Brovey { weights: BroveyWeights },
    Hpfm { kernel: Filter2D, memory: MemoryPolicy },
}

impl Default for FusionMethod {
    fn default() -> Self {
        FusionMethod::Brovey {
            weights: BroveyWeights::default(),
        }
    }
}

impl FusionMethod {
    pub fn name(&self) -> &'static str {
        match self {
            FusionMethod::Brovey { .. } => "brovey",
            FusionMethod::Hpfm { .. } => "hpfm",
        }
    }

    fn fusor(&self) -> Result<Box<dyn Fusor>> {
        Ok(match self {
            FusionMethod::Brovey { weights } => Box::new(Brovey::new(*weights)?),
            FusionMethod::Hpfm { kernel, memory } => Box::new(Hpfm::new(HpfmParams {
                kernel: kernel.clone(),
                memory: *memory,
            })),
        })
    }
}

/// Options of a pansharpening job
#[derive(Debug, Clone)]
pub struct JobOptions {
    /// Datatype of the fused bands
    pub output_type: DataType,
    /// Native block of the fused bands; the panchromatic block when `None`
    pub block_size: Option<Shape>,
    /// Multispectral upsampling method
    pub resampling: ResampleMethod,
    /// Match every fused band against its source band
    pub histogram_matching: bool,
    /// Fusion threads. Only 1 is supported.
    pub num_threads: usize,
    /// Strip compression used when the fused image is written
    pub compression: Compression,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            output_type: DataType::Byte,
            block_size: None,
            resampling: ResampleMethod::Bilinear,
            histogram_matching: true,
            num_threads: 1,
            compression: Compression::None,
        }
    }
}

/// The fused red, green and blue bands
#[derive(Debug)]
pub struct FusedImage {
    pub red: MemBand,
    pub green: MemBand,
    pub blue: MemBand,
    /// Compression used by [`FusedImage::write_tiff`]
    pub compression: Compression,
}

impl FusedImage {
    pub fn bands(&self) -> [&MemBand; 3] {
        [&self.red, &self.green, &self.blue]
    }

    /// Write the three bands as one RGB TIFF
    pub fn write_tiff<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_tiff_with(path, &self.bands(), self.compression)
    }

    pub fn to_tiff_buffer(&self) -> Result<Vec<u8>> {
        write_tiff_to_buffer_with(&self.bands(), self.compression)
    }

    pub fn into_bands(self) -> [MemBand; 3] {
        [self.red, self.green, self.blue]
    }
}

/// Collects the inputs of a [`PansharpJob`]
#[derive(Default)]
pub struct PansharpJobBuilder<'a> {
    bands: BandMap<'a>,
    method: FusionMethod,
    options: JobOptions,
}

impl<'a> PansharpJobBuilder<'a> {
    /// Use `band` for `role`, replacing any previous band for it
    pub fn band(mut self, role: Spectrum, band: &'a mut dyn RasterBand) -> Self {
        self.bands.insert(role, band);
        self
    }

    pub fn method(mut self, method: FusionMethod) -> Self {
        self.method = method;
        self
    }

    pub fn options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }

    /// Validate the inputs. Fails with `MissingBand` when one of the
    /// panchromatic, red, green or blue bands is absent, `DimensionMismatch`
    /// when the multispectral bands differ in extent and `Unsupported` for
    /// more than one thread.
    pub fn build(self) -> Result<PansharpJob<'a>> {
        for role in [
            Spectrum::Panchromatic,
            Spectrum::Red,
            Spectrum::Green,
            Spectrum::Blue,
        ] {
            if !self.bands.contains_key(&role) {
                return Err(Error::MissingBand(role));
            }
        }

        let ms_extent = self
            .bands
            .get(&Spectrum::Red)
            .map(|b| b.shape())
            .ok_or(Error::MissingBand(Spectrum::Red))?;
        for role in Spectrum::MULTISPECTRAL {
            if let Some(band) = self.bands.get(&role) {
                let actual = band.shape();
                if actual != ms_extent {
                    return Err(Error::DimensionMismatch {
                        role,
                        expected: (ms_extent.width, ms_extent.height),
                        actual: (actual.width, actual.height),
                    });
                }
            }
        }

        let options = &self.options;
        if options.num_threads == 0 {
            return Err(Error::InvalidParameter {
                name: "num_threads",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        if options.num_threads > 1 {
            return Err(Error::Unsupported(format!(
                "parallel fusion with {} threads",
                options.num_threads
            )));
        }
        if !options.output_type.is_integer() {
            return Err(Error::UnsupportedDataType(format!(
                "fused bands must be integer, got {}",
                options.output_type
            )));
        }
        if options.histogram_matching
            && options.output_type.bit_range_max() >= MAX_HISTOGRAM_DOMAIN as u64
        {
            return Err(Error::UnsupportedDataType(format!(
                "histogram matching of {} output; disable matching or use a 16-bit type",
                options.output_type
            )));
        }
        if let Some(block) = options.block_size {
            if block.is_empty() {
                return Err(Error::InvalidParameter {
                    name: "block_size",
                    value: format!("{}x{}", block.width, block.height),
                    reason: "must not be empty".into(),
                });
            }
        }

        let fusor = self.method.fusor()?;
        Ok(PansharpJob {
            bands: self.bands,
            fusor,
            options: self.options,
        })
    }
}

/// A validated pansharpening job over borrowed source bands
pub struct PansharpJob<'a> {
    bands: BandMap<'a>,
    fusor: Box<dyn Fusor>,
    options: JobOptions,
}

impl<'a> PansharpJob<'a> {
    pub fn builder() -> PansharpJobBuilder<'a> {
        PansharpJobBuilder::default()
    }

    pub fn options(&self) -> &JobOptions {
        &self.options
    }

    /// Run every pass and return the fused bands. Source bands are only read.
    pub fn run(mut self, progress: &mut dyn ProgressObserver) -> Result<FusedImage> {
        let (extent, pan_block) = self
            .bands
            .get(&Spectrum::Panchromatic)
            .map(|pa| (pa.shape(), pa.block_size()))
            .ok_or(Error::MissingBand(Spectrum::Panchromatic))?;
        let block = self.options.block_size.unwrap_or(pan_block);
        tracing::debug!(
            "pansharp job: {} fusion to {}x{} {}",
            self.fusor.name(),
            extent.width,
            extent.height,
            self.options.output_type
        );

        let mut resampled = self.resample_multispectral(extent, progress)?;
        let [mut red, mut green, mut blue] = self.create_targets(extent, block, progress)?;

        {
            let mut src: BandMap<'_> = BandMap::new();
            for (&role, band) in resampled.iter_mut() {
                src.insert(role, band);
            }
            for (&role, band) in self.bands.iter_mut() {
                if !src.contains_key(&role) {
                    src.insert(role, &mut **band);
                }
            }
            let mut dst: BandMap<'_> = BandMap::new();
            dst.insert(Spectrum::Red, &mut red);
            dst.insert(Spectrum::Green, &mut green);
            dst.insert(Spectrum::Blue, &mut blue);
            self.fusor.fuse(&mut dst, &mut src, progress)?;
        }
        drop(resampled);

        if self.options.histogram_matching {
            for (role, fused) in [
                (Spectrum::Red, &mut red),
                (Spectrum::Green, &mut green),
                (Spectrum::Blue, &mut blue),
            ] {
                let source = self
                    .bands
                    .get_mut(&role)
                    .ok_or(Error::MissingBand(role))?;
                tracing::debug!("matching fused {} band against its source", role);
                match_histograms(fused, &mut **source, progress)?;
            }
        }

        for band in [&mut red, &mut green, &mut blue] {
            band.reset_counters();
        }
        Ok(FusedImage {
            red,
            green,
            blue,
            compression: self.options.compression,
        })
    }

    /// Resampled copies of the multispectral bands whose extent differs from
    /// `extent`; empty when they already match
    fn resample_multispectral(
        &mut self,
        extent: Shape,
        progress: &mut dyn ProgressObserver,
    ) -> Result<BTreeMap<Spectrum, MemBand>> {
        let method = self.options.resampling;
        let mut out = BTreeMap::new();
        let roles: Vec<Spectrum> = Spectrum::MULTISPECTRAL
            .into_iter()
            .filter(|role| {
                self.bands
                    .get(role)
                    .map_or(false, |band| band.shape() != extent)
            })
            .collect();
        if roles.is_empty() {
            return Ok(out);
        }

        let mut ticker = ProgressTicker::new(Phase::Resampling, roles.len());
        for role in roles {
            let band = self.bands.get_mut(&role).ok_or(Error::MissingBand(role))?;
            let block = band.block_size();
            tracing::debug!(
                "resampling {} band {}x{} -> {}x{} ({})",
                role,
                band.width(),
                band.height(),
                extent.width,
                extent.height,
                method
            );
            let scaled = resample(&mut **band, extent.width, extent.height, block, method)?;
            out.insert(role, scaled);
            ticker.tick(progress);
        }
        Ok(out)
    }

    fn create_targets(
        &self,
        extent: Shape,
        block: Shape,
        progress: &mut dyn ProgressObserver,
    ) -> Result<[MemBand; 3]> {
        let mut ticker = ProgressTicker::new(Phase::TargetCreation, 3);
        let mut make = || -> Result<MemBand> {
            let band = MemBand::new(extent.width, extent.height, self.options.output_type)?
                .with_block_size(block);
            ticker.tick(progress);
            Ok(band)
        };
        Ok([make()?, make()?, make()?])
    }
}
