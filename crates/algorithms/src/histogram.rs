//! Histogram matching
//!
//! Remaps the samples of a band so its cumulative distribution follows a
//! reference distribution (histogram specification). Histograms are dense
//! arrays over the working datatype's unsigned range `[0, 2^bits - 1]`,
//! which limits them to types with at most 65536 values.

use pansharp_core::band::RasterBand;
use pansharp_core::progress::{NoProgress, Phase, ProgressObserver, ProgressTicker};
use pansharp_core::tile::IntTileBuffer;
use pansharp_core::{DataType, Error, Result};

/// Largest value domain a histogram supports
pub const MAX_HISTOGRAM_DOMAIN: usize = 65536;

/// Sample counts over the value domain of an integer datatype.
///
/// A scale factor applies on [`get`](Histogram::get), which returns
/// `floor(scale * count)`. It makes histograms of images with different
/// pixel counts comparable.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    counts: Vec<u64>,
    scale: f64,
    data_type: DataType,
}

impl Histogram {
    /// Empty histogram over the domain of `data_type`
    pub fn for_data_type(data_type: DataType) -> Result<Self> {
        let size = domain_size(data_type)?;
        Ok(Self {
            counts: vec![0; size],
            scale: 1.0,
            data_type,
        })
    }

    /// Scaled count of `sample`; zero outside the domain
    pub fn get(&self, sample: usize) -> u64 {
        self.counts
            .get(sample)
            .map_or(0, |&c| (self.scale * c as f64).floor() as u64)
    }

    /// Raw count of `sample`
    pub fn count(&self, sample: usize) -> u64 {
        self.counts.get(sample).copied().unwrap_or(0)
    }

    pub fn add(&mut self, sample: usize) -> Result<()> {
        let size = self.counts.len();
        let slot = self.counts.get_mut(sample).ok_or(Error::IndexOutOfBounds {
            x: sample,
            y: 0,
            width: size,
            height: 1,
        })?;
        *slot += 1;
        Ok(())
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Number of bins
    pub fn size(&self) -> usize {
        self.counts.len()
    }

    pub fn min_val(&self) -> usize {
        0
    }

    pub fn max_val(&self) -> usize {
        self.counts.len() - 1
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Unscaled number of samples counted
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Sample replacement table over the domain of a histogram
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable {
    table: Vec<u64>,
    data_type: DataType,
}

impl LookupTable {
    /// Replacement for `sample`; samples outside the table map to themselves
    pub fn get(&self, sample: u64) -> u64 {
        usize::try_from(sample)
            .ok()
            .and_then(|i| self.table.get(i).copied())
            .unwrap_or(sample)
    }

    pub fn size(&self) -> usize {
        self.table.len()
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }
}

fn domain_size(data_type: DataType) -> Result<usize> {
    if !data_type.is_integer() || data_type.bits() > 16 {
        return Err(Error::UnsupportedDataType(format!(
            "histogram over {} exceeds {} values",
            data_type, MAX_HISTOGRAM_DOMAIN
        )));
    }
    Ok(1usize << data_type.bits())
}

/// Count every sample of `band`, read in the `working` range
pub fn get_histogram(band: &mut dyn RasterBand, working: DataType) -> Result<Histogram> {
    let mut hist = Histogram::for_data_type(working)?;
    let mut buffer = IntTileBuffer::new(band, working)?;
    let mut ticker = ProgressTicker::new(Phase::HistogramMatching, block_count(&buffer));
    accumulate(&mut buffer, &mut hist, &mut ticker, &mut NoProgress)?;
    Ok(hist)
}

fn block_count(buffer: &IntTileBuffer<'_>) -> usize {
    buffer.blocks_in_row() * buffer.blocks_in_col()
}

fn accumulate(
    buffer: &mut IntTileBuffer<'_>,
    hist: &mut Histogram,
    ticker: &mut ProgressTicker,
    progress: &mut dyn ProgressObserver,
) -> Result<()> {
    for by in 0..buffer.blocks_in_col() {
        for bx in 0..buffer.blocks_in_row() {
            buffer.cache_block(bx, by)?;
            for i in 0..buffer.block_len(bx, by) {
                hist.add(buffer.get_at(i)? as usize)?;
            }
            ticker.tick(progress);
        }
    }
    Ok(())
}

/// Build the lookup table mapping `src` onto `reference`.
///
/// Walks source intensities upward accumulating the source CDF; the reference
/// intensity only moves forward, while its CDF is below the source CDF, and
/// stops at the last reference bin.
pub fn lookup_table(src: &Histogram, reference: &Histogram) -> LookupTable {
    let mut table = vec![0u64; src.size()];
    let mut ref_intensity = 0usize;
    let mut src_cum = 0u64;
    let mut ref_cum = reference.get(0);

    for (src_intensity, slot) in table.iter_mut().enumerate() {
        src_cum += src.get(src_intensity);
        while ref_cum < src_cum && ref_intensity < reference.max_val() {
            ref_intensity += 1;
            ref_cum += reference.get(ref_intensity);
        }
        *slot = ref_intensity as u64;
    }

    LookupTable {
        table,
        data_type: src.data_type(),
    }
}

/// Replace every sample of `band` through `lut`, in the table's working range
pub fn apply_lookup(band: &mut dyn RasterBand, lut: &LookupTable) -> Result<()> {
    let mut buffer = IntTileBuffer::new(band, lut.data_type())?;
    let mut ticker = ProgressTicker::new(Phase::HistogramMatching, block_count(&buffer));
    remap(&mut buffer, lut, &mut ticker, &mut NoProgress)
}

fn remap(
    buffer: &mut IntTileBuffer<'_>,
    lut: &LookupTable,
    ticker: &mut ProgressTicker,
    progress: &mut dyn ProgressObserver,
) -> Result<()> {
    for by in 0..buffer.blocks_in_col() {
        for bx in 0..buffer.blocks_in_row() {
            buffer.cache_block(bx, by)?;
            for i in 0..buffer.block_len(bx, by) {
                let v = buffer.get_at(i)?;
                buffer.set_at(i, lut.get(v))?;
            }
            ticker.tick(progress);
        }
    }
    buffer.flush_cache()
}

/// Match `src` in place against the distribution of `reference`.
///
/// Both histograms are taken in `src`'s datatype. When the pixel counts
/// differ, the histogram of the smaller image is scaled by
/// `larger / smaller`.
pub fn match_histograms(
    src: &mut dyn RasterBand,
    reference: &mut dyn RasterBand,
    progress: &mut dyn ProgressObserver,
) -> Result<()> {
    let working = src.data_type();
    let src_size = src.shape().len();
    let ref_size = reference.shape().len();

    let mut src_hist = Histogram::for_data_type(working)?;
    let mut ref_hist = Histogram::for_data_type(working)?;
    let mut src_buf = IntTileBuffer::new(src, working)?;
    let mut ref_buf = IntTileBuffer::new(reference, working)?;

    let total = 2 * block_count(&src_buf) + block_count(&ref_buf);
    let mut ticker = ProgressTicker::new(Phase::HistogramMatching, total);

    accumulate(&mut src_buf, &mut src_hist, &mut ticker, progress)?;
    accumulate(&mut ref_buf, &mut ref_hist, &mut ticker, progress)?;

    if src_size > ref_size {
        ref_hist.set_scale(src_size as f64 / ref_size as f64);
    } else if src_size < ref_size {
        src_hist.set_scale(ref_size as f64 / src_size as f64);
    }
    tracing::debug!(
        "histogram matching {} samples against {} (scales {} / {})",
        src_size,
        ref_size,
        src_hist.scale(),
        ref_hist.scale()
    );

    let lut = lookup_table(&src_hist, &ref_hist);
    remap(&mut src_buf, &lut, &mut ticker, progress)
}

/// Match `band` in place against a precomputed histogram, working in the
/// histogram's datatype. Pixel counts are equalized as in [`match_histograms`].
pub fn match_to_histogram(
    band: &mut dyn RasterBand,
    reference: &Histogram,
    progress: &mut dyn ProgressObserver,
) -> Result<()> {
    let working = reference.data_type();
    let mut hist = Histogram::for_data_type(working)?;
    let mut buffer = IntTileBuffer::new(band, working)?;
    let mut ticker = ProgressTicker::new(Phase::HistogramMatching, 2 * block_count(&buffer));

    accumulate(&mut buffer, &mut hist, &mut ticker, progress)?;
    let scale = reference.total() as f64 / hist.total().max(1) as f64;
    let mut reference = reference.clone();
    if scale < 1.0 {
        reference.set_scale(reference.scale() / scale);
    } else if scale > 1.0 {
        hist.set_scale(scale);
    }

    let lut = lookup_table(&hist, &reference);
    remap(&mut buffer, &lut, &mut ticker, progress)
}
