use crate::result::{Error, Result};
use crate::types::{Coord, Dimensions};

/// Envelope contents indicator from the GeoPackage binary header flags
/// (bits 1-3). The code determines how many doubles the header carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeContents {
    None,
    Xy,
    Xyz,
    Xym,
    Xyzm,
}

impl EnvelopeContents {
    pub fn code(self) -> u8 {
        match self {
            EnvelopeContents::None => 0,
            EnvelopeContents::Xy => 1,
            EnvelopeContents::Xyz => 2,
            EnvelopeContents::Xym => 3,
            EnvelopeContents::Xyzm => 4,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(EnvelopeContents::None),
            1 => Ok(EnvelopeContents::Xy),
            2 => Ok(EnvelopeContents::Xyz),
            3 => Ok(EnvelopeContents::Xym),
            4 => Ok(EnvelopeContents::Xyzm),
            _ => Err(Error::Format(format!(
                "invalid envelope contents indicator code {}",
                code
            ))),
        }
    }

    /// Number of doubles in the header's envelope array
    pub fn array_size(self) -> usize {
        match self {
            EnvelopeContents::None => 0,
            EnvelopeContents::Xy => 4,
            EnvelopeContents::Xyz | EnvelopeContents::Xym => 6,
            EnvelopeContents::Xyzm => 8,
        }
    }

    /// Indicator for a non-empty geometry of the given dimensionality
    pub fn for_dimensions(dimensions: Dimensions) -> Self {
        match dimensions {
            Dimensions::Xy => EnvelopeContents::Xy,
            Dimensions::Xyz => EnvelopeContents::Xyz,
            Dimensions::Xym => EnvelopeContents::Xym,
            Dimensions::Xyzm => EnvelopeContents::Xyzm,
        }
    }
}

/// Axis-aligned bounding extent. NaN components mean "no value yet", so a
/// freshly combined envelope grows monotonically as coordinates are folded
/// in and [Envelope::EMPTY] is the identity for [Envelope::combine].
#[derive(Debug, Clone, Copy)]
pub struct Envelope {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub min_z: f64,
    pub max_z: f64,
    pub min_m: f64,
    pub max_m: f64,
}

// NaN components mean "absent", so equality treats NaN as equal to itself
impl PartialEq for Envelope {
    fn eq(&self, other: &Self) -> bool {
        fn component_eq(first: f64, second: f64) -> bool {
            first == second || (first.is_nan() && second.is_nan())
        }

        component_eq(self.min_x, other.min_x)
            && component_eq(self.max_x, other.max_x)
            && component_eq(self.min_y, other.min_y)
            && component_eq(self.max_y, other.max_y)
            && component_eq(self.min_z, other.min_z)
            && component_eq(self.max_z, other.max_z)
            && component_eq(self.min_m, other.min_m)
            && component_eq(self.max_m, other.max_m)
    }
}

impl Envelope {
    pub const EMPTY: Envelope = Envelope {
        min_x: f64::NAN,
        max_x: f64::NAN,
        min_y: f64::NAN,
        max_y: f64::NAN,
        min_z: f64::NAN,
        max_z: f64::NAN,
        min_m: f64::NAN,
        max_m: f64::NAN,
    };

    pub fn is_empty(&self) -> bool {
        self.min_x.is_nan()
            && self.max_x.is_nan()
            && self.min_y.is_nan()
            && self.max_y.is_nan()
            && self.min_z.is_nan()
            && self.max_z.is_nan()
            && self.min_m.is_nan()
            && self.max_m.is_nan()
    }

    /// Grow the envelope to include a coordinate. Empty (all-NaN)
    /// coordinates leave it unchanged.
    pub fn expand(&mut self, coord: &Coord) {
        self.min_x = nan_minimum(self.min_x, coord.x);
        self.max_x = nan_maximum(self.max_x, coord.x);
        self.min_y = nan_minimum(self.min_y, coord.y);
        self.max_y = nan_maximum(self.max_y, coord.y);

        if let Some(z) = coord.z {
            self.min_z = nan_minimum(self.min_z, z);
            self.max_z = nan_maximum(self.max_z, z);
        }

        if let Some(m) = coord.m {
            self.min_m = nan_minimum(self.min_m, m);
            self.max_m = nan_maximum(self.max_m, m);
        }
    }

    /// Component-wise union of two envelopes, treating NaN as absent
    pub fn combine(&self, other: &Envelope) -> Envelope {
        Envelope {
            min_x: nan_minimum(self.min_x, other.min_x),
            max_x: nan_maximum(self.max_x, other.max_x),
            min_y: nan_minimum(self.min_y, other.min_y),
            max_y: nan_maximum(self.max_y, other.max_y),
            min_z: nan_minimum(self.min_z, other.min_z),
            max_z: nan_maximum(self.max_z, other.max_z),
            min_m: nan_minimum(self.min_m, other.min_m),
            max_m: nan_maximum(self.max_m, other.max_m),
        }
    }

    /// Header array layout: min x, max x, min y, max y, then min/max z
    /// and/or min/max m according to the contents indicator
    pub fn to_array(&self, contents: EnvelopeContents) -> Vec<f64> {
        let mut array = Vec::with_capacity(contents.array_size());
        if contents == EnvelopeContents::None {
            return array;
        }

        array.extend_from_slice(&[self.min_x, self.max_x, self.min_y, self.max_y]);

        match contents {
            EnvelopeContents::Xyz => array.extend_from_slice(&[self.min_z, self.max_z]),
            EnvelopeContents::Xym => array.extend_from_slice(&[self.min_m, self.max_m]),
            EnvelopeContents::Xyzm => {
                array.extend_from_slice(&[self.min_z, self.max_z, self.min_m, self.max_m])
            }
            _ => {}
        }

        array
    }

    pub fn from_array(contents: EnvelopeContents, array: &[f64]) -> Result<Envelope> {
        if array.len() != contents.array_size() {
            return Err(Error::Format(format!(
                "envelope contents indicator {} declares {} doubles but {} were supplied",
                contents.code(),
                contents.array_size(),
                array.len()
            )));
        }

        let mut envelope = Envelope::EMPTY;

        if contents == EnvelopeContents::None {
            return Ok(envelope);
        }

        envelope.min_x = array[0];
        envelope.max_x = array[1];
        envelope.min_y = array[2];
        envelope.max_y = array[3];

        match contents {
            EnvelopeContents::Xyz => {
                envelope.min_z = array[4];
                envelope.max_z = array[5];
            }
            EnvelopeContents::Xym => {
                envelope.min_m = array[4];
                envelope.max_m = array[5];
            }
            EnvelopeContents::Xyzm => {
                envelope.min_z = array[4];
                envelope.max_z = array[5];
                envelope.min_m = array[6];
                envelope.max_m = array[7];
            }
            _ => {}
        }

        Ok(envelope)
    }
}

/// Minimum of two doubles where NaN means "absent", not "smallest"
pub fn nan_minimum(first: f64, second: f64) -> f64 {
    if first.is_nan() {
        return second;
    }
    if second.is_nan() {
        return first;
    }
    first.min(second)
}

/// Maximum of two doubles where NaN means "absent"
pub fn nan_maximum(first: f64, second: f64) -> f64 {
    if first.is_nan() {
        return second;
    }
    if second.is_nan() {
        return first;
    }
    first.max(second)
}
