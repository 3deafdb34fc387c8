//! Spectral roles of bands taking part in a fusion

use serde::{Deserialize, Serialize};
use std::fmt;

/// The role a band plays in pansharpening
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Spectrum {
    Red,
    Green,
    Blue,
    NearInfrared,
    Panchromatic,
}

impl Spectrum {
    /// Visible multispectral channels in output order
    pub const RGB: [Spectrum; 3] = [Spectrum::Red, Spectrum::Green, Spectrum::Blue];

    /// All multispectral channels, in the order they are packed for resampling
    pub const MULTISPECTRAL: [Spectrum; 4] = [
        Spectrum::Red,
        Spectrum::Green,
        Spectrum::Blue,
        Spectrum::NearInfrared,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Spectrum::Red => "red",
            Spectrum::Green => "green",
            Spectrum::Blue => "blue",
            Spectrum::NearInfrared => "nir",
            Spectrum::Panchromatic => "pan",
        }
    }
}

impl fmt::Display for Spectrum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
