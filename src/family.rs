//! The code families and their construction.
//!
//! Every family is a pure function of the [CodeParameters]. Reed-Solomon
//! with a Vandermonde matrix is encoded and decoded with field arithmetic,
//! all other families are XOR codes driven by a bitmatrix and a schedule.
//! The Cauchy codes start from a field matrix and expand it, while
//! Liberation, Blaum-Roth and Liber8tion define their bitmatrix directly.
use std::fmt;
use std::str::FromStr;

#[cfg(test)]
use enum_iterator::Sequence;
use flagset::{flags, FlagSet};
use serde::{Deserialize, Serialize};

use crate::bitmatrix::BitMatrix;
use crate::error::{Error, Result};
use crate::galois::Field;
use crate::matrix::CodingMatrix;
use crate::params::CodeParameters;
use crate::schedule::Schedule;

mod blaum_roth;
mod cauchy;
mod liber8tion;
mod liberation;
mod vandermonde;

/// The supported code families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(test, derive(Sequence))]
#[serde(rename_all = "snake_case")]
pub enum CodeFamily {
    /// Reed-Solomon with a Vandermonde derived matrix.
    #[serde(alias = "reed_sol_van")]
    Vandermonde,
    /// Cauchy Reed-Solomon, `1 / (x_i + y_j)`.
    #[serde(alias = "cauchy_orig")]
    CauchyOriginal,
    /// Cauchy Reed-Solomon with fewer ones in the bitmatrix.
    CauchyGood,
    /// Minimum density RAID-6 code for prime `w`.
    Liberation,
    /// RAID-6 code for `w + 1` prime.
    BlaumRoth,
    /// Minimum density RAID-6 code for `w = 8`.
    Liber8tion,
}

flags! {
    /// Constraints a family puts on its parameters.
    ///
    /// Base checks (`k > 0`, `1 <= w <= 32`) apply to every family.
    pub enum Requirement: u16 {
        /// `packet_size > 0`
        PacketSize        = 0b0_0000_0001,
        /// `packet_size` is a multiple of the machine word size.
        WordAlignedPacket = 0b0_0000_0010,
        /// `w` is 8, 16 or 32.
        WordWidth         = 0b0_0000_0100,
        /// The field has enough distinct elements, `k + m <= 2^w`.
        FieldCapacity     = 0b0_0000_1000,
        /// `k <= w`
        DataWithinWidth   = 0b0_0001_0000,
        /// `w > 2` and prime.
        PrimeWidth        = 0b0_0010_0000,
        /// `w > 2` and `w + 1` prime.
        PrimeWidthPlusOne = 0b0_0100_0000,
        /// `w = 8`
        WidthEight        = 0b0_1000_0000,
        /// `m = 2`
        TwoCoding         = 0b1_0000_0000,
    }
}

impl CodeFamily {
    /// Conventional short name, also accepted by [FromStr].
    pub fn name(&self) -> &'static str {
        match self {
            Self::Vandermonde => "reed_sol_van",
            Self::CauchyOriginal => "cauchy_orig",
            Self::CauchyGood => "cauchy_good",
            Self::Liberation => "liberation",
            Self::BlaumRoth => "blaum_roth",
            Self::Liber8tion => "liber8tion",
        }
    }

    pub fn requirements(&self) -> FlagSet<Requirement> {
        use Requirement::*;
        match self {
            Self::Vandermonde => WordWidth | FieldCapacity,
            Self::CauchyOriginal | Self::CauchyGood => PacketSize | FieldCapacity,
            Self::Liberation => {
                DataWithinWidth | PrimeWidth | PacketSize | WordAlignedPacket | TwoCoding
            }
            Self::BlaumRoth => {
                DataWithinWidth | PrimeWidthPlusOne | PacketSize | WordAlignedPacket | TwoCoding
            }
            Self::Liber8tion => DataWithinWidth | WidthEight | TwoCoding | PacketSize,
        }
    }

    /// Is the code encoded and decoded with field arithmetic on words?
    pub fn is_matrix_code(&self) -> bool {
        matches!(self, Self::Vandermonde)
    }
}

impl fmt::Display for CodeFamily {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CodeFamily {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "reed_sol_van" | "vandermonde" => Ok(Self::Vandermonde),
            "cauchy_orig" | "cauchy_original" => Ok(Self::CauchyOriginal),
            "cauchy_good" => Ok(Self::CauchyGood),
            "liberation" => Ok(Self::Liberation),
            "blaum_roth" => Ok(Self::BlaumRoth),
            "liber8tion" => Ok(Self::Liber8tion),
            other => Err(Error::Config(format!("unknown code family {other:?}"))),
        }
    }
}

/// What a family builds for its parameters.
#[derive(Debug, Clone)]
pub enum Artifact {
    /// Field coefficients, applied word by word.
    Matrix(CodingMatrix),
    /// XOR code. `matrix` is the field matrix the bitmatrix was expanded
    /// from, if there is one.
    Bitmatrix {
        matrix: Option<CodingMatrix>,
        bitmatrix: BitMatrix,
        schedule: Schedule,
    },
}

impl Artifact {
    pub fn matrix(&self) -> Option<&CodingMatrix> {
        match self {
            Self::Matrix(matrix) => Some(matrix),
            Self::Bitmatrix { matrix, .. } => matrix.as_ref(),
        }
    }

    pub fn bitmatrix(&self) -> Option<&BitMatrix> {
        match self {
            Self::Matrix(_) => None,
            Self::Bitmatrix { bitmatrix, .. } => Some(bitmatrix),
        }
    }

    pub fn schedule(&self) -> Option<&Schedule> {
        match self {
            Self::Matrix(_) => None,
            Self::Bitmatrix { schedule, .. } => Some(schedule),
        }
    }
}

/// Validate the parameters and build the coding artifacts of `family`.
pub fn build(family: CodeFamily, params: &CodeParameters) -> Result<Artifact> {
    params.validate(family)?;
    let (k, m, w) = (params.k, params.m, params.w);
    let field = Field::new(w)?;

    let artifact = match family {
        CodeFamily::Vandermonde => Artifact::Matrix(vandermonde::coding_matrix(k, m, &field)?),
        CodeFamily::CauchyOriginal | CodeFamily::CauchyGood => {
            let matrix = if family == CodeFamily::CauchyGood {
                cauchy::good_matrix(k, m, &field)?
            } else {
                cauchy::original_matrix(k, m, &field)?
            };
            let bitmatrix = BitMatrix::from_matrix(&matrix, &field);
            bitmatrix_artifact(Some(matrix), bitmatrix)
        }
        CodeFamily::Liberation => bitmatrix_artifact(None, liberation::bitmatrix(k, w)),
        CodeFamily::BlaumRoth => bitmatrix_artifact(None, blaum_roth::bitmatrix(k, w)),
        CodeFamily::Liber8tion => bitmatrix_artifact(None, liber8tion::bitmatrix(k)),
    };
    tracing::debug!(
        family = family.name(),
        k,
        m,
        w,
        ones = artifact.bitmatrix().map(BitMatrix::ones),
        operations = artifact.schedule().map(Schedule::len),
        "built coding artifacts"
    );
    Ok(artifact)
}

fn bitmatrix_artifact(matrix: Option<CodingMatrix>, bitmatrix: BitMatrix) -> Artifact {
    let schedule = Schedule::smart(&bitmatrix);
    Artifact::Bitmatrix {
        matrix,
        bitmatrix,
        schedule,
    }
}

/// Top half of a RAID-6 bitmatrix: plain parity, one identity block per
/// data block in the first coding row.
fn parity_rows(bitmatrix: &mut BitMatrix) {
    let w = bitmatrix.w();
    for j in 0..bitmatrix.k() {
        for i in 0..w {
            bitmatrix.set(i, j * w + i, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enum_iterator::all;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_names_roundtrip() {
        for family in all::<CodeFamily>() {
            assert_eq!(family.name().parse::<CodeFamily>().unwrap(), family);
        }
        assert!("reed_sol".parse::<CodeFamily>().is_err());
    }

    #[test]
    fn test_only_vandermonde_is_matrix_code() {
        let matrix: Vec<_> = all::<CodeFamily>().filter(|f| f.is_matrix_code()).collect();
        assert_eq!(matrix, vec![CodeFamily::Vandermonde]);
    }

    #[test]
    fn test_every_family_needs_something() {
        for family in all::<CodeFamily>() {
            assert!(!family.requirements().is_empty(), "{}", family);
        }
    }

    #[test]
    fn test_build_rejects_before_construction() {
        let params = CodeParameters::new(4, 2, 4, 8, 0);
        assert!(matches!(
            build(CodeFamily::Liberation, &params),
            Err(Error::InvalidCodeParameters { .. })
        ));
    }

    #[test]
    fn test_cauchy_artifact_keeps_matrix() {
        let params = CodeParameters::new(3, 2, 4, 8, 0);
        let artifact = build(CodeFamily::CauchyOriginal, &params).unwrap();
        let matrix = artifact.matrix().unwrap();
        assert_eq!(matrix.row(0), &[9, 14, 13]);
        assert_eq!(matrix.row(1), &[14, 9, 11]);
        assert_eq!(artifact.bitmatrix().unwrap().rows(), 8);
        assert!(!artifact.schedule().unwrap().is_empty());
    }
}
