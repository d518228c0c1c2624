//! XOR schedules compiled from bitmatrices.
//!
//! Bitmatrix codes split every block into packets of `packet_size` bytes,
//! `w` consecutive packets forming one word-bit group: packet `x` of a
//! group holds bit `x` of the w-bit words. Row `r` of a bitmatrix then
//! says which data packets have to be XORed together to get packet `r % w`
//! of output block `r / w`. A [Schedule] is that list of packet operations
//! in an order that can be replayed group by group over a whole buffer.
//!
//! The *dumb* schedule handles every row on its own. The *smart* schedule
//! also lets a row start from an output row that was already computed and
//! only patch the bits where the two rows differ, whenever that needs fewer
//! operations. This is what makes codes like Cauchy cheap to encode.
use std::mem;

use crate::bitmatrix::BitMatrix;
use crate::error::{Error, Result};
use crate::galois::xor_region;

/// Packet `bit` of the current group in `block`.
///
/// Blocks `0..k` are the inputs of the bitmatrix, block `k + i` is the
/// output computed by rows `i * w .. (i + 1) * w`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Packet {
    pub block: usize,
    pub bit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `dst = src`
    Copy { src: Packet, dst: Packet },
    /// `dst ^= src`
    Xor { src: Packet, dst: Packet },
    /// `dst = 0`, for all zero rows.
    Clear { dst: Packet },
}

impl Operation {
    pub fn dst(&self) -> Packet {
        match self {
            Self::Copy { dst, .. } | Self::Xor { dst, .. } | Self::Clear { dst } => *dst,
        }
    }

    fn map_blocks(self, f: &impl Fn(usize) -> usize) -> Self {
        let map = |p: Packet| Packet {
            block: f(p.block),
            bit: p.bit,
        };
        match self {
            Self::Copy { src, dst } => Self::Copy {
                src: map(src),
                dst: map(dst),
            },
            Self::Xor { src, dst } => Self::Xor {
                src: map(src),
                dst: map(dst),
            },
            Self::Clear { dst } => Self::Clear { dst: map(dst) },
        }
    }
}

/// One block of a stripe as seen by a running schedule.
pub enum Block<'a> {
    /// Only read from.
    Read(&'a [u8]),
    /// Written by the schedule, may be read back afterwards.
    Write(&'a mut [u8]),
}

impl<'a> Block<'a> {
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Read(b) => b,
            Self::Write(b) => b,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }
}

/// Take the writable buffer out of `blocks[idx]`, leaving an empty
/// placeholder. Hand it back with [restore].
pub(crate) fn take_writable<'a>(blocks: &mut [Block<'a>], idx: usize) -> &'a mut [u8] {
    match mem::replace(&mut blocks[idx], Block::Read(&[])) {
        Block::Write(b) => b,
        Block::Read(_) => panic!("block {idx} is read only but a recovery step writes to it"),
    }
}

pub(crate) fn restore<'a>(blocks: &mut [Block<'a>], idx: usize, buf: &'a mut [u8]) {
    blocks[idx] = Block::Write(buf);
}

/// Ordered list of packet operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    w: usize,
    ops: Vec<Operation>,
}

impl Schedule {
    /// One copy and then XORs per row, straight from the inputs.
    pub fn dumb(bitmatrix: &BitMatrix) -> Self {
        let (k, w) = (bitmatrix.k(), bitmatrix.w());
        let mut ops = Vec::new();
        for r in 0..bitmatrix.rows() {
            from_inputs(bitmatrix.row(r), output(k, w, r), w, &mut ops);
        }
        Self { w, ops }
    }

    /// Schedule reusing already computed rows.
    ///
    /// Rows are emitted cheapest first. A pending row costs its number of
    /// ones when built from the inputs, or one plus its Hamming distance to
    /// a done row when copied from that row and patched. After each row the
    /// costs of the pending rows are lowered where the new row is a better
    /// start, and the next row is the pending one with the lowest cost.
    /// Ties go to the lowest row index.
    pub fn smart(bitmatrix: &BitMatrix) -> Self {
        let (k, w, rows) = (bitmatrix.k(), bitmatrix.w(), bitmatrix.rows());
        let mut ops = Vec::new();
        if rows == 0 {
            return Self { w, ops };
        }

        let mut cost: Vec<usize> = (0..rows)
            .map(|r| bitmatrix.row(r).iter().filter(|b| **b).count())
            .collect();
        let mut from: Vec<Option<usize>> = vec![None; rows];
        let mut done = vec![false; rows];

        let mut next = (0..rows).min_by_key(|r| cost[*r]);
        while let Some(row) = next {
            let bits = bitmatrix.row(row);
            match from[row] {
                None => from_inputs(bits, output(k, w, row), w, &mut ops),
                Some(f) => {
                    let dst = output(k, w, row);
                    ops.push(Operation::Copy {
                        src: output(k, w, f),
                        dst,
                    });
                    let base = bitmatrix.row(f);
                    for (c, _) in bits.iter().zip(base).enumerate().filter(|(_, (a, b))| a != b) {
                        ops.push(Operation::Xor {
                            src: input(w, c),
                            dst,
                        });
                    }
                }
            }
            done[row] = true;

            next = None;
            for i in (0..rows).filter(|i| !done[*i]) {
                let distance = 1 + hamming(bits, bitmatrix.row(i));
                if distance < cost[i] {
                    cost[i] = distance;
                    from[i] = Some(row);
                }
                if next.map_or(true, |b| cost[i] < cost[b]) {
                    next = Some(i);
                }
            }
        }
        Self { w, ops }
    }

    pub fn w(&self) -> usize {
        self.w
    }

    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Rename the blocks the schedule works on.
    pub fn remap(self, f: impl Fn(usize) -> usize) -> Self {
        Self {
            w: self.w,
            ops: self.ops.into_iter().map(|op| op.map_blocks(&f)).collect(),
        }
    }

    /// Replay the schedule on every packet group of the blocks.
    ///
    /// All blocks must have the same length, a multiple of
    /// `packet_size * w`. Destinations must be [Block::Write]. Nothing is
    /// written if the blocks do not fit the schedule.
    pub fn run(&self, blocks: &mut [Block<'_>], packet_size: usize) -> Result<()> {
        let len = blocks.first().map_or(0, Block::len);
        let group = match packet_size.checked_mul(self.w) {
            Some(group) if group > 0 => group,
            _ => {
                return Err(Error::buffers(format!(
                    "no packet groups for packet size {packet_size} and w = {}",
                    self.w
                )))
            }
        };
        if let Some(other) = blocks.iter().find(|b| b.len() != len) {
            return Err(Error::buffers(format!(
                "blocks of {len} and {} bytes in one stripe",
                other.len()
            )));
        }
        if len % group != 0 {
            return Err(Error::buffers(format!(
                "block size {len} is not a multiple of packet_size * w = {group}"
            )));
        }
        self.check_blocks(blocks)?;

        for base in (0..len).step_by(group) {
            for op in &self.ops {
                apply(op, blocks, base, packet_size);
            }
        }
        Ok(())
    }

    fn check_blocks(&self, blocks: &[Block<'_>]) -> Result<()> {
        for op in &self.ops {
            let dst = op.dst();
            let packets = match *op {
                Operation::Copy { src, .. } | Operation::Xor { src, .. } => [Some(src), Some(dst)],
                Operation::Clear { .. } => [None, Some(dst)],
            };
            for p in packets.into_iter().flatten() {
                if p.block >= blocks.len() || p.bit >= self.w {
                    return Err(Error::buffers(format!(
                        "schedule uses packet {} of block {} but got {} blocks",
                        p.bit,
                        p.block,
                        blocks.len()
                    )));
                }
            }
            if let Block::Read(_) = blocks[dst.block] {
                return Err(Error::buffers(format!(
                    "schedule writes to block {} which is read only",
                    dst.block
                )));
            }
        }
        Ok(())
    }
}

fn output(k: usize, w: usize, row: usize) -> Packet {
    Packet {
        block: k + row / w,
        bit: row % w,
    }
}

fn input(w: usize, col: usize) -> Packet {
    Packet {
        block: col / w,
        bit: col % w,
    }
}

fn hamming(a: &[bool], b: &[bool]) -> usize {
    a.iter().zip(b).filter(|(x, y)| x != y).count()
}

fn from_inputs(bits: &[bool], dst: Packet, w: usize, ops: &mut Vec<Operation>) {
    let mut first = true;
    for (c, _) in bits.iter().enumerate().filter(|(_, b)| **b) {
        let src = input(w, c);
        ops.push(if first {
            Operation::Copy { src, dst }
        } else {
            Operation::Xor { src, dst }
        });
        first = false;
    }
    if first {
        ops.push(Operation::Clear { dst });
    }
}

fn apply(op: &Operation, blocks: &mut [Block<'_>], base: usize, packet_size: usize) {
    let range = |p: Packet| {
        let start = base + p.bit * packet_size;
        start..start + packet_size
    };
    let (src, dst, xor) = match *op {
        Operation::Clear { dst } => {
            let buf = take_writable(blocks, dst.block);
            buf[range(dst)].fill(0);
            restore(blocks, dst.block, buf);
            return;
        }
        Operation::Copy { src, dst } => (src, dst, false),
        Operation::Xor { src, dst } => (src, dst, true),
    };

    let buf = take_writable(blocks, dst.block);
    {
        let (s, d): (&[u8], &mut [u8]) = if src.block == dst.block {
            // two packets of the same block, split around the destination
            let (s_start, d_start) = (range(src).start, range(dst).start);
            if s_start < d_start {
                let (lo, hi) = buf.split_at_mut(d_start);
                (&lo[s_start..s_start + packet_size], &mut hi[..packet_size])
            } else {
                let (lo, hi) = buf.split_at_mut(s_start);
                (&hi[..packet_size], &mut lo[d_start..d_start + packet_size])
            }
        } else {
            (&blocks[src.block].bytes()[range(src)], &mut buf[range(dst)])
        };
        if xor {
            xor_region(s, d);
        } else {
            d.copy_from_slice(s);
        }
    }
    restore(blocks, dst.block, buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::galois::Field;
    use crate::matrix::CodingMatrix;
    use pretty_assertions::assert_eq;

    fn bitmatrix(k: usize, m: usize, w: usize, rows: &[&[u8]]) -> BitMatrix {
        let mut bm = BitMatrix::new(k, m, w);
        for (r, row) in rows.iter().enumerate() {
            for (c, bit) in row.iter().enumerate() {
                bm.set(r, c, *bit == 1);
            }
        }
        bm
    }

    /// Evaluate a bitmatrix directly, packet by packet.
    fn reference(bm: &BitMatrix, data: &[Vec<u8>], packet_size: usize) -> Vec<Vec<u8>> {
        let w = bm.w();
        let len = data[0].len();
        let mut out = vec![vec![0u8; len]; bm.m()];
        for base in (0..len).step_by(packet_size * w) {
            for r in 0..bm.rows() {
                for c in (0..bm.cols()).filter(|c| bm.get(r, *c)) {
                    for b in 0..packet_size {
                        out[r / w][base + (r % w) * packet_size + b] ^=
                            data[c / w][base + (c % w) * packet_size + b];
                    }
                }
            }
        }
        out
    }

    fn run(schedule: &Schedule, data: &[Vec<u8>], m: usize, packet_size: usize) -> Vec<Vec<u8>> {
        let mut coding = vec![vec![0xaau8; data[0].len()]; m];
        let mut blocks: Vec<Block> = data.iter().map(|d| Block::Read(&d[..])).collect();
        blocks.extend(coding.iter_mut().map(|c| Block::Write(&mut c[..])));
        schedule.run(&mut blocks, packet_size).unwrap();
        drop(blocks);
        coding
    }

    #[test]
    fn test_dumb_schedule_ops() {
        let bm = bitmatrix(2, 1, 2, &[&[1, 0, 1, 1], &[0, 0, 0, 0]]);
        let s = Schedule::dumb(&bm);
        let p = |block, bit| Packet { block, bit };
        assert_eq!(
            s.operations(),
            &[
                Operation::Copy {
                    src: p(0, 0),
                    dst: p(2, 0)
                },
                Operation::Xor {
                    src: p(1, 0),
                    dst: p(2, 0)
                },
                Operation::Xor {
                    src: p(1, 1),
                    dst: p(2, 0)
                },
                Operation::Clear { dst: p(2, 1) },
            ]
        );
    }

    #[test]
    fn test_smart_schedule_reuses_rows() {
        // second row differs from the first in one bit
        let bm = bitmatrix(4, 1, 2, &[&[1, 1, 1, 1, 1, 1, 0, 0], &[1, 1, 1, 1, 1, 1, 1, 0]]);
        let dumb = Schedule::dumb(&bm);
        let smart = Schedule::smart(&bm);
        assert_eq!(dumb.len(), 6 + 7);
        assert_eq!(smart.len(), 6 + 2);
        let p = |block, bit| Packet { block, bit };
        assert_eq!(
            &smart.operations()[6..],
            &[
                Operation::Copy {
                    src: p(4, 0),
                    dst: p(4, 1)
                },
                Operation::Xor {
                    src: p(3, 0),
                    dst: p(4, 1)
                },
            ]
        );
    }

    #[test]
    fn test_schedules_match_bitmatrix() {
        let f = Field::new(4).unwrap();
        let mat = CodingMatrix::from_entries(3, 2, 4, vec![1, 1, 1, 9, 14, 13]);
        let bm = BitMatrix::from_matrix(&mat, &f);
        let packet_size = 3;
        let len = 2 * packet_size * 4;
        let data: Vec<Vec<u8>> = (0..3)
            .map(|i| (0..len).map(|b| (b * 31 + i * 97 + 5) as u8).collect())
            .collect();
        let expected = reference(&bm, &data, packet_size);
        assert_eq!(run(&Schedule::dumb(&bm), &data, 2, packet_size), expected);
        let smart = Schedule::smart(&bm);
        assert!(smart.len() <= Schedule::dumb(&bm).len());
        assert_eq!(run(&smart, &data, 2, packet_size), expected);
    }

    #[test]
    fn test_run_rejects_unfit_blocks() {
        fn unfit(schedule: &Schedule, blocks: &mut [Block<'_>], packet_size: usize) -> bool {
            matches!(
                schedule.run(blocks, packet_size),
                Err(Error::InvalidBuffers { .. })
            )
        }

        let bm = bitmatrix(2, 1, 2, &[&[1, 0, 1, 1], &[0, 1, 0, 0]]);
        let schedule = Schedule::smart(&bm);
        let data: [Vec<u8>; 2] = [vec![1; 8], (0..8).collect()];
        let mut coding = vec![0x55u8; 8];
        {
            let mut blocks = vec![
                Block::Read(&data[0][..]),
                Block::Read(&data[1][..]),
                Block::Write(&mut coding[..]),
            ];
            // 8 bytes are not a whole number of 3 byte packet groups
            assert!(unfit(&schedule, &mut blocks, 3));
            assert!(unfit(&schedule, &mut blocks, 0));
            // the output block is missing
            assert!(unfit(&schedule, &mut blocks[..2], 2));
        }
        {
            // uneven block lengths
            let mut blocks = vec![
                Block::Read(&data[0][..4]),
                Block::Read(&data[1][..]),
                Block::Write(&mut coding[..]),
            ];
            assert!(unfit(&schedule, &mut blocks, 2));
        }
        // the output block is read only
        let mut blocks = vec![
            Block::Read(&data[0][..]),
            Block::Read(&data[1][..]),
            Block::Read(&data[1][..]),
        ];
        assert!(unfit(&schedule, &mut blocks, 2));
        assert_eq!(coding, vec![0x55u8; 8]);

        let mut blocks = vec![
            Block::Read(&data[0][..]),
            Block::Read(&data[1][..]),
            Block::Write(&mut coding[..]),
        ];
        schedule.run(&mut blocks, 2).unwrap();
        drop(blocks);
        assert_eq!(coding, vec![3, 3, 1, 1, 3, 3, 1, 1]);
    }

    #[test]
    fn test_remap() {
        let bm = bitmatrix(1, 1, 1, &[&[1]]);
        let s = Schedule::dumb(&bm).remap(|b| b + 10);
        assert_eq!(
            s.operations(),
            &[Operation::Copy {
                src: Packet { block: 10, bit: 0 },
                dst: Packet { block: 11, bit: 0 }
            }]
        );
    }
}
