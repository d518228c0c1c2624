//! Liber8tion, a minimum density RAID-6 bitmatrix for w = 8.
//!
//! There is no closed form for w = 8 (neither w nor w + 1 is prime), the
//! blocks were found by search. `X_0` is the identity and every other block
//! is a permutation matrix with one extra bit, so each has nine ones. Every
//! block and every sum of two blocks is invertible, which is exactly the
//! condition for recovering any two lost blocks.
use crate::bitmatrix::BitMatrix;

use super::parity_rows;

const W: usize = 8;

/// `X_1 ..= X_7`: row `r` of a block has its bit in column `perm[r]`, plus
/// one extra bit at `(row, column)`.
const BLOCKS: [([usize; W], (usize, usize)); W - 1] = [
    ([6, 2, 4, 7, 0, 3, 5, 1], (0, 0)),
    ([5, 3, 6, 4, 0, 7, 1, 2], (4, 3)),
    ([6, 7, 5, 0, 1, 4, 2, 3], (2, 6)),
    ([7, 0, 1, 5, 3, 2, 4, 6], (5, 4)),
    ([3, 6, 7, 1, 2, 0, 4, 5], (6, 1)),
    ([2, 4, 5, 1, 7, 6, 3, 0], (3, 5)),
    ([1, 3, 0, 6, 5, 2, 7, 4], (1, 2)),
];

pub(super) fn bitmatrix(k: usize) -> BitMatrix {
    let mut bm = BitMatrix::new(k, 2, W);
    parity_rows(&mut bm);
    for j in 0..k {
        if j == 0 {
            for r in 0..W {
                bm.set(W + r, r, true);
            }
            continue;
        }
        let (perm, (row, col)) = &BLOCKS[j - 1];
        for (r, c) in perm.iter().enumerate() {
            bm.set(W + r, j * W + c, true);
        }
        bm.set(W + row, j * W + col, true);
    }
    bm
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmatrix::invert;
    use pretty_assertions::assert_eq;

    fn block(bm: &BitMatrix, j: usize) -> Vec<bool> {
        (0..W * W).map(|x| bm.get(W + x / W, j * W + x % W)).collect()
    }

    #[test]
    fn test_density() {
        let bm = bitmatrix(8);
        assert_eq!(bm.ones(), 8 * 8 + 8 + 7 * 9);
    }

    #[test]
    fn test_blocks_and_pair_sums_invertible() {
        let bm = bitmatrix(8);
        for a in 0..W {
            assert!(invert(&block(&bm, a), W).is_some(), "block {}", a);
            for b in a + 1..W {
                let sum: Vec<bool> = block(&bm, a)
                    .iter()
                    .zip(block(&bm, b))
                    .map(|(x, y)| x ^ y)
                    .collect();
                assert!(invert(&sum, W).is_some(), "blocks {} {}", a, b);
            }
        }
    }

    #[test]
    fn test_fewer_data_blocks_is_a_prefix() {
        let full = bitmatrix(8);
        let small = bitmatrix(3);
        for r in 0..2 * W {
            assert_eq!(small.row(r), &full.row(r)[..3 * W]);
        }
    }
}
