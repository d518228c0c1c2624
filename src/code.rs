//! Encoding and decoding of stripes.
//!
//! A [Code] is built once from a [CodeFamily] and [CodeParameters] and can
//! then be used, also from several threads at once, to encode and decode any
//! number of stripes. A stripe is k data buffers and m coding buffers of the
//! same length. The buffers belong to the caller, the code only reads and
//! writes them during a call.
//!
//! ```
//! use stripecode::{Code, CodeFamily, CodeParameters, Erasures};
//!
//! let code = Code::new(CodeFamily::Vandermonde, CodeParameters::new(4, 2, 8, 0, 0))?;
//! let mut data = vec![b"erasure!".to_vec(), b"coding::".to_vec(), b"galois<>".to_vec(), b"stripe42".to_vec()];
//! let mut coding = code.encode(&data)?;
//!
//! // lose a data and a coding block
//! data[1].fill(0);
//! coding[0].fill(0);
//! code.decode(&mut data, &mut coding, &Erasures::from(vec![1, 4]))?;
//! assert_eq!(data[1], b"coding::");
//! # Ok::<(), stripecode::Error>(())
//! ```
use crate::bitmatrix::BitMatrix;
use crate::erasure::Erasures;
use crate::error::{Error, Result};
use crate::family::{build, Artifact, CodeFamily};
use crate::galois::Field;
use crate::matrix::{linear_combination, CodingMatrix};
use crate::params::{CodeParameters, StripeLayout};
use crate::schedule::{Block, Schedule};

mod decode;
#[cfg(test)]
mod tests;

pub use decode::DecodePlan;

/// An erasure code ready to encode and decode stripes.
#[derive(Debug, Clone)]
pub struct Code {
    family: CodeFamily,
    params: CodeParameters,
    artifact: Artifact,
    field: Field<'static>,
}

impl Code {
    /// Validate the parameters and build the coding artifacts.
    pub fn new(family: CodeFamily, params: CodeParameters) -> Result<Self> {
        let artifact = build(family, &params)?;
        Ok(Self {
            family,
            params,
            artifact,
            field: Field::new(params.w)?,
        })
    }

    pub fn family(&self) -> CodeFamily {
        self.family
    }

    pub fn parameters(&self) -> &CodeParameters {
        &self.params
    }

    /// The parameters, for diagnostics.
    pub fn describe(&self) -> CodeParameters {
        self.params
    }

    pub fn k(&self) -> usize {
        self.params.k
    }

    pub fn m(&self) -> usize {
        self.params.m
    }

    pub fn w(&self) -> usize {
        self.params.w
    }

    /// The field matrix, if the code has one.
    pub fn matrix(&self) -> Option<&CodingMatrix> {
        self.artifact.matrix()
    }

    /// The bitmatrix of an XOR code.
    pub fn bitmatrix(&self) -> Option<&BitMatrix> {
        self.artifact.bitmatrix()
    }

    /// The encoding schedule of an XOR code.
    pub fn schedule(&self) -> Option<&Schedule> {
        self.artifact.schedule()
    }

    /// See [CodeParameters::check_compatibility].
    pub fn check_compatibility(&self, total_size: u64) -> Result<StripeLayout> {
        self.params.check_compatibility(total_size)
    }

    /// Block lengths must be a multiple of this many bytes.
    fn block_unit(&self) -> usize {
        match self.artifact {
            Artifact::Matrix(_) => self.params.w / 8,
            Artifact::Bitmatrix { .. } => self.params.packet_size * self.params.w,
        }
    }

    fn check_buffers(
        &self,
        data: usize,
        coding: usize,
        mut lens: impl Iterator<Item = usize>,
    ) -> Result<usize> {
        let (k, m) = (self.params.k, self.params.m);
        if data != k {
            return Err(Error::buffers(format!("expected {k} data buffers, got {data}")));
        }
        if coding != m {
            return Err(Error::buffers(format!("expected {m} coding buffers, got {coding}")));
        }
        let len = lens.next().unwrap_or(0);
        if lens.any(|l| l != len) {
            return Err(Error::buffers("buffers differ in length"));
        }
        if self.params.buffer_size != 0 && len as u64 != self.params.buffer_size {
            return Err(Error::buffers(format!(
                "buffers have {len} bytes, the code expects {}",
                self.params.buffer_size
            )));
        }
        let unit = self.block_unit();
        if len % unit != 0 {
            return Err(Error::buffers(format!(
                "buffer length {len} is not a multiple of {unit} bytes"
            )));
        }
        Ok(len)
    }

    /// Compute the m coding buffers of `data`.
    pub fn encode<B: AsRef<[u8]>>(&self, data: &[B]) -> Result<Vec<Vec<u8>>> {
        let len = data.first().map_or(0, |d| d.as_ref().len());
        let mut coding = vec![vec![0u8; len]; self.params.m];
        self.encode_into(data, &mut coding)?;
        Ok(coding)
    }

    /// Compute the coding buffers of `data` into `coding`, overwriting
    /// whatever they held.
    pub fn encode_into<B: AsRef<[u8]>, C: AsMut<[u8]>>(
        &self,
        data: &[B],
        coding: &mut [C],
    ) -> Result<()> {
        let (data_len, coding_len) = (data.len(), coding.len());
        let lens = data
            .iter()
            .map(|d| d.as_ref().len())
            .chain(coding.iter_mut().map(|c| c.as_mut().len()));
        let len = self.check_buffers(data_len, coding_len, lens)?;

        match &self.artifact {
            Artifact::Matrix(matrix) => {
                for (i, dst) in coding.iter_mut().enumerate() {
                    let terms = matrix.row(i).iter().cloned().zip(data.iter().map(|d| d.as_ref()));
                    linear_combination(&self.field, terms, dst.as_mut());
                }
            }
            Artifact::Bitmatrix { schedule, .. } => {
                let mut blocks: Vec<Block> = data
                    .iter()
                    .map(|d| Block::Read(d.as_ref()))
                    .chain(coding.iter_mut().map(|c| Block::Write(c.as_mut())))
                    .collect();
                schedule.run(&mut blocks, self.params.packet_size)?;
            }
        }
        tracing::trace!(family = self.family.name(), len, "encoded stripe");
        Ok(())
    }

    /// Work out how to recover the blocks in `erasures`.
    ///
    /// Fails with [Error::TooManyErasures] for more than m erasures and
    /// with [Error::InvalidErasureSet] for indices out of range or repeated.
    pub fn plan(&self, erasures: &Erasures) -> Result<DecodePlan> {
        let erased = erasures.checked(self.params.k, self.params.m)?;
        DecodePlan::new(self, erased)
    }

    /// Rebuild the erased blocks of a stripe in place.
    ///
    /// Erased buffers are only placeholders, their content is ignored and
    /// overwritten. All other buffers must hold the stripe as encoded.
    pub fn decode<D: AsMut<[u8]>, C: AsMut<[u8]>>(
        &self,
        data: &mut [D],
        coding: &mut [C],
        erasures: &Erasures,
    ) -> Result<()> {
        let erased = erasures.checked(self.params.k, self.params.m)?;
        if erased.is_empty() {
            return Ok(());
        }
        let (data_len, coding_len) = (data.len(), coding.len());
        let lens = data
            .iter_mut()
            .map(|d| d.as_mut().len())
            .chain(coding.iter_mut().map(|c| c.as_mut().len()));
        self.check_buffers(data_len, coding_len, lens)?;
        let plan = DecodePlan::new(self, erased)?;
        self.decode_with(&plan, data, coding)
    }

    /// Rebuild the erased blocks of a stripe with a plan made by
    /// [Code::plan].
    pub fn decode_with<D: AsMut<[u8]>, C: AsMut<[u8]>>(
        &self,
        plan: &DecodePlan,
        data: &mut [D],
        coding: &mut [C],
    ) -> Result<()> {
        if !plan.belongs_to(self) {
            return Err(Error::PlanMismatch);
        }
        if plan.is_empty() {
            return Ok(());
        }
        let (data_len, coding_len) = (data.len(), coding.len());
        let lens = data
            .iter_mut()
            .map(|d| d.as_mut().len())
            .chain(coding.iter_mut().map(|c| c.as_mut().len()));
        self.check_buffers(data_len, coding_len, lens)?;

        let erased = plan.erased();
        let k = self.params.k;
        let mut blocks: Vec<Block> = data
            .iter_mut()
            .map(|d| d.as_mut())
            .chain(coding.iter_mut().map(|c| c.as_mut()))
            .enumerate()
            .map(|(i, buf)| {
                if erased.contains(&i) {
                    Block::Write(buf)
                } else {
                    Block::Read(buf)
                }
            })
            .collect();
        plan.run(&self.field, &mut blocks, self.params.packet_size)?;
        tracing::trace!(family = self.family.name(), k, erased = ?erased, "decoded stripe");
        Ok(())
    }
}
