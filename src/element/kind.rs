//! Element type tags
//!
//! The closed set of element kinds an archive can hold. The numeric value of
//! each tag is its wire value in the index table.

use serde::{Deserialize, Serialize};

/// Kind of a monitor element, one per data table in an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u32)]
pub enum TypeTag {
    Int = 0,
    Float = 1,
    String = 2,
    TH1F = 3,
    TH1S = 4,
    TH1D = 5,
    TH2F = 6,
    TH2S = 7,
    TH2D = 8,
    TH3F = 9,
    TProfile = 10,
    TProfile2D = 11,
}

/// How histogram bin contents are stored for a kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinStorage {
    /// Single precision floats
    F32,
    /// Signed 16-bit counts, saturating
    I16,
    /// Double precision floats
    F64,
}

impl BinStorage {
    /// Bring a value into this storage's representable range
    pub fn normalize(&self, value: f64) -> f64 {
        match self {
            BinStorage::F32 => value as f32 as f64,
            BinStorage::I16 => value.round().clamp(i16::MIN as f64, i16::MAX as f64),
            BinStorage::F64 => value,
        }
    }
}

impl TypeTag {
    /// Number of element kinds
    pub const COUNT: usize = 12;

    /// Get all kinds in wire order
    pub fn all() -> &'static [TypeTag] {
        &[
            TypeTag::Int,
            TypeTag::Float,
            TypeTag::String,
            TypeTag::TH1F,
            TypeTag::TH1S,
            TypeTag::TH1D,
            TypeTag::TH2F,
            TypeTag::TH2S,
            TypeTag::TH2D,
            TypeTag::TH3F,
            TypeTag::TProfile,
            TypeTag::TProfile2D,
        ]
    }

    /// Key of the data table holding rows of this kind
    pub fn table_key(&self) -> &'static str {
        match self {
            TypeTag::Int => "Ints",
            TypeTag::Float => "Floats",
            TypeTag::String => "Strings",
            TypeTag::TH1F => "TH1Fs",
            TypeTag::TH1S => "TH1Ss",
            TypeTag::TH1D => "TH1Ds",
            TypeTag::TH2F => "TH2Fs",
            TypeTag::TH2S => "TH2Ss",
            TypeTag::TH2D => "TH2Ds",
            TypeTag::TH3F => "TH3Fs",
            TypeTag::TProfile => "TProfiles",
            TypeTag::TProfile2D => "TProfile2Ds",
        }
    }

    /// Histogram dimension, `None` for scalar kinds
    pub fn dimension(&self) -> Option<usize> {
        match self {
            TypeTag::Int | TypeTag::Float | TypeTag::String => None,
            TypeTag::TH1F | TypeTag::TH1S | TypeTag::TH1D | TypeTag::TProfile => Some(1),
            TypeTag::TH2F | TypeTag::TH2S | TypeTag::TH2D | TypeTag::TProfile2D => Some(2),
            TypeTag::TH3F => Some(3),
        }
    }

    /// Bin storage for histogram kinds
    pub fn bin_storage(&self) -> Option<BinStorage> {
        match self {
            TypeTag::Int | TypeTag::Float | TypeTag::String => None,
            TypeTag::TH1F | TypeTag::TH2F | TypeTag::TH3F => Some(BinStorage::F32),
            TypeTag::TH1S | TypeTag::TH2S => Some(BinStorage::I16),
            TypeTag::TH1D | TypeTag::TH2D | TypeTag::TProfile | TypeTag::TProfile2D => {
                Some(BinStorage::F64)
            }
        }
    }

    pub fn is_profile(&self) -> bool {
        matches!(self, TypeTag::TProfile | TypeTag::TProfile2D)
    }
}

impl TryFrom<u32> for TypeTag {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        TypeTag::all()
            .get(value as usize)
            .copied()
            .ok_or(value)
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeTag::Int => write!(f, "int"),
            TypeTag::Float => write!(f, "float"),
            TypeTag::String => write!(f, "string"),
            TypeTag::TH1F => write!(f, "th1f"),
            TypeTag::TH1S => write!(f, "th1s"),
            TypeTag::TH1D => write!(f, "th1d"),
            TypeTag::TH2F => write!(f, "th2f"),
            TypeTag::TH2S => write!(f, "th2s"),
            TypeTag::TH2D => write!(f, "th2d"),
            TypeTag::TH3F => write!(f, "th3f"),
            TypeTag::TProfile => write!(f, "tprofile"),
            TypeTag::TProfile2D => write!(f, "tprofile2d"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_values() {
        for (i, tag) in TypeTag::all().iter().enumerate() {
            assert_eq!(*tag as u32, i as u32);
            assert_eq!(TypeTag::try_from(i as u32), Ok(*tag));
        }
        assert_eq!(TypeTag::all().len(), TypeTag::COUNT);
        assert_eq!(TypeTag::try_from(12), Err(12));
    }

    #[test]
    fn test_table_keys_unique() {
        let mut keys: Vec<_> = TypeTag::all().iter().map(|t| t.table_key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), TypeTag::COUNT);
    }

    #[test]
    fn test_bin_storage_normalize() {
        assert_eq!(BinStorage::I16.normalize(40000.0), 32767.0);
        assert_eq!(BinStorage::I16.normalize(-40000.0), -32768.0);
        assert_eq!(BinStorage::I16.normalize(2.6), 3.0);
        assert_eq!(BinStorage::F32.normalize(0.1), 0.1f32 as f64);
        assert_eq!(BinStorage::F64.normalize(0.1), 0.1);
    }

    #[test]
    fn test_dimensions() {
        assert_eq!(TypeTag::Int.dimension(), None);
        assert_eq!(TypeTag::TProfile.dimension(), Some(1));
        assert_eq!(TypeTag::TProfile2D.dimension(), Some(2));
        assert_eq!(TypeTag::TH3F.dimension(), Some(3));
        assert!(TypeTag::TProfile2D.is_profile());
        assert!(!TypeTag::TH2D.is_profile());
    }
}
