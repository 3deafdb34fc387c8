//! Pansharpening fusion
//!
//! A [`Fusor`] reads source bands by role (red, green, blue, panchromatic and
//! optionally near infrared) and writes the fused red, green and blue bands
//! into destination bands of the panchromatic extent. Every band is accessed
//! through a tile buffer, one block at a time.
//!
//! Validation (roles present, extents equal, integer datatypes) runs before
//! the first destination write.

mod brovey;
mod halo;
mod hpfm;

pub use brovey::{Brovey, BroveyWeights};
pub use hpfm::{Hpfm, HpfmParams, MemoryPolicy, MEMORY_POLITE_THRESHOLD};

use pansharp_core::band::{BandMap, RasterBand};
use pansharp_core::progress::ProgressObserver;
use pansharp_core::{Error, Result, Shape, Spectrum};
use std::collections::BTreeMap;

/// A fusion algorithm over role-keyed bands
pub trait Fusor {
    fn name(&self) -> &'static str;

    /// Fuse `src` into `dst`. All bands must share the panchromatic extent.
    fn fuse(
        &self,
        dst: &mut BandMap<'_>,
        src: &mut BandMap<'_>,
        progress: &mut dyn ProgressObserver,
    ) -> Result<()>;
}

/// Check that every role is present, failing on the first missing one
pub(crate) fn require_roles(map: &BandMap<'_>, roles: &[Spectrum]) -> Result<()> {
    match roles.iter().find(|r| !map.contains_key(*r)) {
        Some(&missing) => Err(Error::MissingBand(missing)),
        None => Ok(()),
    }
}

/// Check that the bands for `roles` have the `expected` extent
pub(crate) fn require_extent(map: &BandMap<'_>, roles: &[Spectrum], expected: Shape) -> Result<()> {
    for (&role, band) in map.iter().filter(|(role, _)| roles.contains(*role)) {
        let actual = band.shape();
        if actual != expected {
            return Err(Error::DimensionMismatch {
                role,
                expected: (expected.width, expected.height),
                actual: (actual.width, actual.height),
            });
        }
    }
    Ok(())
}

/// Check that the bands for `roles` have integer datatypes
pub(crate) fn require_integer(map: &BandMap<'_>, roles: &[Spectrum], algorithm: &str) -> Result<()> {
    for (&role, band) in map.iter().filter(|(role, _)| roles.contains(*role)) {
        if !band.data_type().is_integer() {
            return Err(Error::UnsupportedDataType(format!(
                "{} fusion needs integer bands, {} band is {}",
                algorithm,
                role,
                band.data_type()
            )));
        }
    }
    Ok(())
}

/// Borrow the bands for `roles` mutably and simultaneously, in `roles` order
pub(crate) fn split_roles<'m, 'a>(
    map: &'m mut BandMap<'a>,
    roles: &[Spectrum],
) -> Result<Vec<&'m mut (dyn RasterBand + 'a)>> {
    let mut found: BTreeMap<Spectrum, &'m mut (dyn RasterBand + 'a)> = map
        .iter_mut()
        .filter(|(role, _)| roles.contains(*role))
        .map(|(&role, band)| (role, &mut **band))
        .collect();
    roles
        .iter()
        .map(|role| found.remove(role).ok_or(Error::MissingBand(*role)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pansharp_core::{DataType, MemBand};

    #[test]
    fn test_split_roles_in_requested_order() {
        let mut red = MemBand::filled(2, 2, DataType::Byte, 1.0).unwrap();
        let mut blue = MemBand::filled(2, 2, DataType::Byte, 3.0).unwrap();
        let mut map: BandMap = BandMap::new();
        map.insert(Spectrum::Red, &mut red);
        map.insert(Spectrum::Blue, &mut blue);

        let bands = split_roles(&mut map, &[Spectrum::Blue, Spectrum::Red]).unwrap();
        assert_eq!(bands.len(), 2);
        assert_eq!(bands[0].width(), 2);
        drop(bands);

        assert!(matches!(
            split_roles(&mut map, &[Spectrum::Green]),
            Err(Error::MissingBand(Spectrum::Green))
        ));
    }

    #[test]
    fn test_require_extent_reports_role() {
        let mut pan = MemBand::new(4, 4, DataType::Byte).unwrap();
        let mut red = MemBand::new(2, 2, DataType::Byte).unwrap();
        let mut map: BandMap = BandMap::new();
        map.insert(Spectrum::Panchromatic, &mut pan);
        map.insert(Spectrum::Red, &mut red);

        match require_extent(&map, &[Spectrum::Red, Spectrum::Panchromatic], Shape::new(4, 4)) {
            Err(Error::DimensionMismatch {
                role,
                expected,
                actual,
            }) => {
                assert_eq!(role, Spectrum::Red);
                assert_eq!(expected, (4, 4));
                assert_eq!(actual, (2, 2));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_require_integer() {
        let mut pan = MemBand::new(4, 4, DataType::Float32).unwrap();
        let mut map: BandMap = BandMap::new();
        map.insert(Spectrum::Panchromatic, &mut pan);
        assert!(matches!(
            require_integer(&map, &[Spectrum::Panchromatic], "brovey"),
            Err(Error::UnsupportedDataType(_))
        ));
    }
}
