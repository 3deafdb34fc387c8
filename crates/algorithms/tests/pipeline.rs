//! End-to-end pansharpening: TIFF in, job, TIFF out.

use pansharp_algorithms::fusion::{BroveyWeights, MemoryPolicy};
use pansharp_algorithms::job::{FusionMethod, JobOptions, PansharpJob};
use pansharp_algorithms::kernel::Filter2D;
use pansharp_algorithms::resample::ResampleMethod;
use pansharp_core::io::{read_tiff_from_buffer, write_tiff_to_buffer, Compression};
use pansharp_core::progress::{NoProgress, Phase};
use pansharp_core::{DataType, MemBand, RasterBand, Shape, Spectrum};
use std::collections::BTreeSet;

fn pattern(width: usize, height: usize, data_type: DataType, seed: usize) -> MemBand {
    let values: Vec<f64> = (0..width * height)
        .map(|i| (1000 + (i * (7 + seed) + seed * 31) % 3000) as f64)
        .collect();
    MemBand::from_values(width, height, data_type, &values).unwrap()
}

fn distinct(band: &MemBand) -> BTreeSet<u64> {
    band.to_array().iter().map(|&v| v as u64).collect()
}

#[test]
fn hpfm_job_from_tiff_buffers() {
    let ms = [
        pattern(8, 8, DataType::UInt16, 1),
        pattern(8, 8, DataType::UInt16, 2),
        pattern(8, 8, DataType::UInt16, 3),
    ];
    let pan = pattern(16, 16, DataType::UInt16, 4);
    let ms_tiff = write_tiff_to_buffer(&[&ms[0], &ms[1], &ms[2]]).unwrap();
    let pan_tiff = write_tiff_to_buffer(&[&pan]).unwrap();

    let [mut red, mut green, mut blue]: [MemBand; 3] = read_tiff_from_buffer(&ms_tiff)
        .unwrap()
        .try_into()
        .unwrap();
    let mut pan = read_tiff_from_buffer(&pan_tiff).unwrap().remove(0);
    assert_eq!(red.data_type(), DataType::UInt16);

    let mut phases = Vec::new();
    let mut observer = |phase: Phase, _: f64, _: &str| {
        if phases.last() != Some(&phase) {
            phases.push(phase);
        }
    };
    let image = PansharpJob::builder()
        .band(Spectrum::Panchromatic, &mut pan)
        .band(Spectrum::Red, &mut red)
        .band(Spectrum::Green, &mut green)
        .band(Spectrum::Blue, &mut blue)
        .method(FusionMethod::Hpfm {
            kernel: Filter2D::box_high_pass(3),
            memory: MemoryPolicy::Cached,
        })
        .options(JobOptions {
            output_type: DataType::UInt16,
            resampling: ResampleMethod::Cubic,
            compression: Compression::Lzw,
            ..Default::default()
        })
        .build()
        .unwrap()
        .run(&mut observer)
        .unwrap();

    assert_eq!(
        phases,
        vec![
            Phase::Resampling,
            Phase::TargetCreation,
            Phase::Fusion,
            Phase::HistogramMatching
        ]
    );

    // matched values come from the source distribution
    for (fused, source) in image.bands().into_iter().zip([&red, &green, &blue]) {
        assert_eq!(fused.shape(), Shape::new(16, 16));
        assert!(distinct(fused).is_subset(&distinct(source)));
    }
    for band in [&red, &green, &blue, &pan] {
        assert_eq!(band.writes(), 0);
    }

    let out = image.to_tiff_buffer().unwrap();
    let decoded = read_tiff_from_buffer(&out).unwrap();
    assert_eq!(decoded.len(), 3);
    for (read, fused) in decoded.iter().zip(image.bands()) {
        assert_eq!(read.data_type(), DataType::UInt16);
        assert_eq!(read.to_array(), fused.to_array());
    }
}

#[test]
fn brovey_job_with_nir_and_custom_block() {
    let mut red = MemBand::filled(10, 10, DataType::Byte, 40.0).unwrap();
    let mut green = MemBand::filled(10, 10, DataType::Byte, 50.0).unwrap();
    let mut blue = MemBand::filled(10, 10, DataType::Byte, 60.0).unwrap();
    let mut nir = MemBand::filled(10, 10, DataType::Byte, 20.0).unwrap();
    let mut pan = MemBand::filled(20, 20, DataType::Byte, 310.0).unwrap();

    let image = PansharpJob::builder()
        .band(Spectrum::Panchromatic, &mut pan)
        .band(Spectrum::Red, &mut red)
        .band(Spectrum::Green, &mut green)
        .band(Spectrum::Blue, &mut blue)
        .band(Spectrum::NearInfrared, &mut nir)
        .method(FusionMethod::Brovey {
            weights: BroveyWeights::default().with_nir(0.5),
        })
        .options(JobOptions {
            block_size: Some(Shape::new(8, 8)),
            resampling: ResampleMethod::Nearest,
            histogram_matching: false,
            ..Default::default()
        })
        .build()
        .unwrap()
        .run(&mut NoProgress)
        .unwrap();

    // (310 - 20 * 0.5) / 150 = 2
    let expected = [80.0, 100.0, 120.0];
    for (band, value) in image.bands().into_iter().zip(expected) {
        assert_eq!(band.shape(), Shape::new(20, 20));
        assert_eq!(band.block_size(), Shape::new(8, 8));
        assert!(band.to_array().iter().all(|&v| v == value));
    }
}

#[test]
fn job_without_resampling_uses_sources_directly() {
    let mut red = pattern(12, 12, DataType::UInt16, 5);
    let mut green = pattern(12, 12, DataType::UInt16, 6);
    let mut blue = pattern(12, 12, DataType::UInt16, 7);
    let mut pan = pattern(12, 12, DataType::UInt16, 8);

    let mut saw_resampling = false;
    let mut observer = |phase: Phase, _: f64, _: &str| {
        saw_resampling |= phase == Phase::Resampling;
    };
    let image = PansharpJob::builder()
        .band(Spectrum::Panchromatic, &mut pan)
        .band(Spectrum::Red, &mut red)
        .band(Spectrum::Green, &mut green)
        .band(Spectrum::Blue, &mut blue)
        .options(JobOptions {
            output_type: DataType::UInt16,
            ..Default::default()
        })
        .build()
        .unwrap()
        .run(&mut observer)
        .unwrap();

    assert!(!saw_resampling);
    assert_eq!(image.red.shape(), Shape::new(12, 12));
    let [r, _, _] = image.into_bands();
    assert_eq!(r.data_type(), DataType::UInt16);
}
