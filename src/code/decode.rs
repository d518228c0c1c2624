//! Recovery plans for one erasure pattern.
//!
//! Matrix codes recover lost data blocks with the inverse of the rows of
//! k surviving blocks and then re-encode lost coding blocks. XOR codes
//! derive a decoding bitmatrix for the pattern and compile it into a
//! schedule, so the expensive part (inversion and scheduling) happens once
//! per pattern and can be replayed on any number of stripes.
use std::iter;

use super::Code;
use crate::bitmatrix::{self, BitMatrix};
use crate::error::{Error, Result};
use crate::family::{Artifact, CodeFamily};
use crate::galois::Field;
use crate::matrix::{self, linear_combination, CodingMatrix};
use crate::params::CodeParameters;
use crate::schedule::{restore, take_writable, Block, Schedule};

/// How to rebuild the blocks of one erasure pattern.
///
/// Created with [Code::plan], replayed with [Code::decode_with].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodePlan {
    family: CodeFamily,
    params: CodeParameters,
    erased: Vec<usize>,
    recovery: Recovery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Recovery {
    Steps(Vec<Step>),
    Schedule(Schedule),
}

/// `target = sum(coefficient * source)`
#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    target: usize,
    terms: Vec<(usize, u32)>,
}

impl DecodePlan {
    /// `erased` must be checked and sorted.
    pub(super) fn new(code: &Code, erased: Vec<usize>) -> Result<Self> {
        let recovery = if erased.is_empty() {
            Recovery::Steps(Vec::new())
        } else {
            match &code.artifact {
                Artifact::Matrix(matrix) => Recovery::Steps(matrix_steps(matrix, &code.field, &erased)?),
                Artifact::Bitmatrix { bitmatrix, .. } => {
                    Recovery::Schedule(decoding_schedule(bitmatrix, &erased)?)
                }
            }
        };
        let plan = Self {
            family: code.family,
            params: code.params,
            erased,
            recovery,
        };
        tracing::debug!(
            family = plan.family.name(),
            k = plan.params.k,
            m = plan.params.m,
            erased = ?plan.erased,
            cost = plan.cost(),
            "planned recovery"
        );
        Ok(plan)
    }

    pub(super) fn belongs_to(&self, code: &Code) -> bool {
        self.family == code.family && self.params == code.params
    }

    /// Lost blocks, ascending.
    pub fn erased(&self) -> &[usize] {
        &self.erased
    }

    /// Nothing to recover?
    pub fn is_empty(&self) -> bool {
        self.erased.is_empty()
    }

    /// Number of region operations per stripe (per packet group for XOR
    /// codes).
    pub fn cost(&self) -> usize {
        match &self.recovery {
            Recovery::Steps(steps) => steps.iter().map(|s| s.terms.len().max(1)).sum(),
            Recovery::Schedule(schedule) => schedule.len(),
        }
    }

    /// The decoding schedule of an XOR code.
    pub fn schedule(&self) -> Option<&Schedule> {
        match &self.recovery {
            Recovery::Schedule(schedule) => Some(schedule),
            Recovery::Steps(_) => None,
        }
    }

    pub(super) fn run(
        &self,
        field: &Field,
        blocks: &mut [Block<'_>],
        packet_size: usize,
    ) -> Result<()> {
        match &self.recovery {
            Recovery::Steps(steps) => {
                for step in steps {
                    let dst = take_writable(blocks, step.target);
                    let sources = &*blocks;
                    linear_combination(
                        field,
                        step.terms.iter().map(|(src, c)| (*c, sources[*src].bytes())),
                        dst,
                    );
                    restore(blocks, step.target, dst);
                }
                Ok(())
            }
            Recovery::Schedule(schedule) => schedule.run(blocks, packet_size),
        }
    }
}

fn singular(k: usize, m: usize, erased: &[usize]) -> Error {
    tracing::warn!(k, m, ?erased, "no invertible decoding matrix");
    Error::SingularSubmatrix {
        k,
        m,
        erased: erased.to_vec(),
    }
}

fn matrix_steps(matrix: &CodingMatrix, field: &Field, erased: &[usize]) -> Result<Vec<Step>> {
    let (k, m) = (matrix.k(), matrix.m());
    let data_lost: Vec<usize> = erased.iter().cloned().filter(|i| *i < k).collect();
    let mut steps = Vec::new();

    if !data_lost.is_empty() {
        // with a parity row, the last lost data block is the XOR of coding
        // block 0 and all other data blocks
        let parity = matrix.row(0).iter().all(|e| *e == 1) && !erased.contains(&k);
        let (by_inverse, by_parity) = if parity {
            data_lost.split_at(data_lost.len() - 1)
        } else {
            (&data_lost[..], &[][..])
        };

        if !by_inverse.is_empty() {
            let survivors: Vec<usize> = (0..k + m).filter(|i| !erased.contains(i)).take(k).collect();
            let mut system = Vec::with_capacity(k * k);
            for s in &survivors {
                if *s < k {
                    system.extend((0..k).map(|j| (j == *s) as u32));
                } else {
                    system.extend_from_slice(matrix.row(s - k));
                }
            }
            let inv = matrix::invert(&system, k, field).ok_or_else(|| singular(k, m, erased))?;
            for t in by_inverse {
                let terms = survivors
                    .iter()
                    .zip(&inv[t * k..(t + 1) * k])
                    .filter(|(_, c)| **c != 0)
                    .map(|(s, c)| (*s, *c))
                    .collect();
                steps.push(Step { target: *t, terms });
            }
        }

        for t in by_parity {
            let terms = iter::once((k, 1))
                .chain((0..k).filter(|j| j != t).map(|j| (j, 1)))
                .collect();
            steps.push(Step { target: *t, terms });
        }
    }

    // lost coding blocks are encoded again from the complete data
    for c in erased.iter().filter(|i| **i >= k) {
        let terms = matrix
            .row(c - k)
            .iter()
            .enumerate()
            .filter(|(_, e)| **e != 0)
            .map(|(j, e)| (j, *e))
            .collect();
        steps.push(Step { target: *c, terms });
    }
    Ok(steps)
}

/// Schedule rebuilding the erased blocks of an XOR code.
///
/// Every lost data block is stood in for by the next surviving coding
/// block, which gives k input blocks. The decoding bitmatrix has one group
/// of w rows per lost block, lost data blocks first. Its data rows come from
/// inverting the bitmatrix of the inputs. Its coding rows are the coding
/// rows of the code with the bits of lost data blocks replaced by their
/// decoding rows.
fn decoding_schedule(bm: &BitMatrix, erased: &[usize]) -> Result<Schedule> {
    let (k, m, w) = (bm.k(), bm.m(), bm.w());
    let data_lost: Vec<usize> = erased.iter().cloned().filter(|i| *i < k).collect();
    let coding_lost: Vec<usize> = erased.iter().cloned().filter(|i| *i >= k).collect();

    let mut spare = (k..k + m).filter(|i| !erased.contains(i));
    let mut inputs: Vec<usize> = (0..k).collect();
    for lost in &data_lost {
        inputs[*lost] = spare.next().ok_or_else(|| singular(k, m, erased))?;
    }
    let outputs: Vec<usize> = data_lost.iter().chain(&coding_lost).cloned().collect();

    let mut decoding = BitMatrix::new(k, outputs.len(), w);
    if !data_lost.is_empty() {
        let n = k * w;
        let mut system = vec![false; n * n];
        for (slot, src) in inputs.iter().enumerate() {
            for x in 0..w {
                let row = slot * w + x;
                if *src < k {
                    system[row * n + row] = true;
                } else {
                    system[row * n..(row + 1) * n].copy_from_slice(bm.row((src - k) * w + x));
                }
            }
        }
        let inv = bitmatrix::invert(&system, n).ok_or_else(|| singular(k, m, erased))?;
        for (o, lost) in data_lost.iter().enumerate() {
            for x in 0..w {
                let r = lost * w + x;
                decoding
                    .row_mut(o * w + x)
                    .copy_from_slice(&inv[r * n..(r + 1) * n]);
            }
        }
    }

    for (o, lost) in coding_lost.iter().enumerate() {
        let first = (data_lost.len() + o) * w;
        for j in 0..w {
            let source = bm.row((lost - k) * w + j);
            let mut row = source.to_vec();
            for i in &data_lost {
                row[i * w..(i + 1) * w].fill(false);
            }
            for (d, i) in data_lost.iter().enumerate() {
                for y in (0..w).filter(|y| source[i * w + y]) {
                    for (a, b) in row.iter_mut().zip(decoding.row(d * w + y)) {
                        *a ^= *b;
                    }
                }
            }
            decoding.row_mut(first + j).copy_from_slice(&row);
        }
    }

    Ok(Schedule::smart(&decoding).remap(|v| if v < k { inputs[v] } else { outputs[v - k] }))
}
