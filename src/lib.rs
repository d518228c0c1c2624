//! Erasure coding for striped storage.
//!
//! A stripe of k data blocks is protected by m coding blocks so that any m
//! lost blocks, data or coding, can be rebuilt from the others. The codes
//! available are
//!
//! - Reed-Solomon with a Vandermonde derived matrix, using field arithmetic
//!   on 8, 16 or 32 bit words,
//! - Cauchy Reed-Solomon, in its original form and with a matrix picked for
//!   few XORs,
//! - the minimum density RAID-6 codes Liberation, Blaum-Roth and
//!   Liber8tion.
//!
//! All but Reed-Solomon are XOR codes: their coding matrix is a bitmatrix
//! and encoding replays a precomputed schedule of packet copies and XORs.
//!
//! ```
//! use stripecode::{Code, CodeFamily, CodeParameters, Erasures};
//!
//! let code = Code::new(CodeFamily::CauchyGood, CodeParameters::new(3, 2, 4, 8, 0))?;
//! let data = vec![vec![1u8; 64], vec![2u8; 64], vec![3u8; 64]];
//! let coding = code.encode(&data)?;
//!
//! let mut damaged = data.clone();
//! damaged[0].fill(0);
//! damaged[2].fill(0);
//! let mut coding = coding;
//! code.decode(&mut damaged, &mut coding, &Erasures::from(vec![0, 2]))?;
//! assert_eq!(damaged, data);
//! # Ok::<(), stripecode::Error>(())
//! ```
//!
//! Reading and writing block files, and cutting an input into stripes, is
//! left to the caller. [Code::check_compatibility] tells whether an input
//! size fits the parameters.

pub mod bitmatrix;
mod code;
mod config;
mod erasure;
mod error;
pub mod family;
pub mod galois;
pub mod matrix;
mod params;
pub mod schedule;

pub use bitmatrix::BitMatrix;
pub use code::{Code, DecodePlan};
pub use config::CodeConfig;
pub use erasure::{Erasures, SENTINEL};
pub use error::{Error, Result};
pub use family::{build, Artifact, CodeFamily, Requirement};
pub use matrix::CodingMatrix;
pub use params::{is_prime, CodeParameters, StripeLayout, WORD_SIZE};
pub use schedule::{Operation, Packet, Schedule};
