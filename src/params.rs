//! Simulation and deployment configuration descriptors.
//!
//! Two layers mirror the experiment setup: a general section shared by all
//! runs and an individual section per scheme. Parsing is plain serde so the
//! host application can read TOML or JSON as it pleases; validation is
//! explicit and returns `InvalidInput` with the offending field.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The query family a configuration exercises.
///
/// The `cmp-*` baselines are recognized for configuration compatibility but
/// are served by external comparison implementations, not by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Primitive {
    PirClassic,
    PirMerkle,
    VpirIt,
    VpirDpf,
    PirIt,
    PirItMerkle,
    CmpPir,
    CmpVpir,
}

impl Primitive {
    /// Whether this crate implements the primitive itself.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Primitive::CmpPir | Primitive::CmpVpir)
    }

    /// Whether answers carry Merkle authentication paths.
    pub fn is_merkle(&self) -> bool {
        matches!(self, Primitive::PirMerkle | Primitive::PirItMerkle)
    }
}

impl std::fmt::Display for Primitive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Primitive::PirClassic => "pir-classic",
            Primitive::PirMerkle => "pir-merkle",
            Primitive::VpirIt => "vpir-it",
            Primitive::VpirDpf => "vpir-dpf",
            Primitive::PirIt => "pir-it",
            Primitive::PirItMerkle => "pir-it-merkle",
            Primitive::CmpPir => "cmp-pir",
            Primitive::CmpVpir => "cmp-vpir",
        };
        write!(f, "{name}")
    }
}

/// Parameters shared by every simulation in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Database sizes to sweep, in bits.
    pub db_bit_lengths: Vec<usize>,
    /// Repetitions per measurement point.
    pub repetitions: usize,
    /// Total number of bits to retrieve per repetition.
    pub bits_to_retrieve: usize,
}

/// Parameters of one scheme under test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndividualConfig {
    pub name: String,
    pub primitive: Primitive,
    /// 1 selects the vector layout, anything else the rebalanced matrix.
    pub num_rows: usize,
    /// Elements (or bytes) per block.
    pub block_length: usize,
    /// Bit width of a database element.
    pub element_bit_size: usize,
}

impl GeneralConfig {
    pub fn validate(&self) -> Result<()> {
        if self.db_bit_lengths.is_empty() {
            return Err(Error::InvalidInput("no database lengths configured".into()));
        }
        if self.repetitions == 0 {
            return Err(Error::InvalidInput("repetitions must be positive".into()));
        }
        Ok(())
    }
}

impl IndividualConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_rows == 0 {
            return Err(Error::InvalidInput(format!(
                "{}: num_rows must be positive",
                self.name
            )));
        }
        if self.block_length == 0 || self.element_bit_size == 0 {
            return Err(Error::InvalidInput(format!(
                "{}: block and element sizes must be positive",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_display_names() {
        assert_eq!(Primitive::PirClassic.to_string(), "pir-classic");
        assert_eq!(Primitive::VpirDpf.to_string(), "vpir-dpf");
        assert_eq!(Primitive::PirItMerkle.to_string(), "pir-it-merkle");
    }

    #[test]
    fn test_baselines_are_external() {
        assert!(!Primitive::CmpPir.is_supported());
        assert!(!Primitive::CmpVpir.is_supported());
        assert!(Primitive::VpirDpf.is_supported());
        assert!(Primitive::PirMerkle.is_merkle());
        assert!(!Primitive::PirClassic.is_merkle());
    }

    #[test]
    fn test_config_validation() {
        let general = GeneralConfig {
            db_bit_lengths: vec![1 << 20],
            repetitions: 3,
            bits_to_retrieve: 128,
        };
        assert!(general.validate().is_ok());

        let empty = GeneralConfig {
            db_bit_lengths: vec![],
            ..general
        };
        assert!(empty.validate().is_err());

        let individual = IndividualConfig {
            name: "merkle".into(),
            primitive: Primitive::PirMerkle,
            num_rows: 0,
            block_length: 16,
            element_bit_size: 8,
        };
        assert!(individual.validate().is_err());
    }
}
