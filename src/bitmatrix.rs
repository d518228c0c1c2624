//! Bit level expansion of coding matrices.
//!
//! Multiplying by a fixed element `e` of GF(2^w) is a linear map on the
//! w bits of a word, so it can be written as a `w x w` matrix over GF(2).
//! Column `x` of that matrix holds the bits of `e * 2^x`. Replacing every
//! coefficient of a [CodingMatrix] by its `w x w` block gives a matrix with
//! `m * w` rows and `k * w` columns whose product with the data bits only
//! needs XOR. The number of ones is the number of XORs, see [BitMatrix::ones].
use std::fmt;

use arrayvec::ArrayVec;

use crate::galois::{Field, MAX_WIDTH};
use crate::matrix::CodingMatrix;

/// A `(m * w) x (k * w)` matrix over GF(2).
///
/// Row `i * w + l` computes bit `l` of coding block `i`, column `j * w + x`
/// reads bit `x` of data block `j`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMatrix {
    k: usize,
    m: usize,
    w: usize,
    bits: Vec<bool>,
}

impl BitMatrix {
    /// All zero bitmatrix.
    pub fn new(k: usize, m: usize, w: usize) -> Self {
        Self {
            k,
            m,
            w,
            bits: vec![false; k * m * w * w],
        }
    }

    /// Expand a field matrix into its bitmatrix.
    pub fn from_matrix(matrix: &CodingMatrix, field: &Field) -> Self {
        let w = matrix.w();
        let mut out = Self::new(matrix.k(), matrix.m(), w);
        for i in 0..matrix.m() {
            for j in 0..matrix.k() {
                let doublings = doublings(field, matrix.coefficient(j, i));
                for (x, elt) in doublings.iter().enumerate() {
                    for l in 0..w {
                        out.set(i * w + l, j * w + x, (elt >> l) & 1 == 1);
                    }
                }
            }
        }
        out
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn m(&self) -> usize {
        self.m
    }

    pub fn w(&self) -> usize {
        self.w
    }

    pub fn rows(&self) -> usize {
        self.m * self.w
    }

    pub fn cols(&self) -> usize {
        self.k * self.w
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        self.bits[row * self.cols() + col]
    }

    pub fn set(&mut self, row: usize, col: usize, bit: bool) {
        let cols = self.cols();
        self.bits[row * cols + col] = bit;
    }

    pub fn row(&self, row: usize) -> &[bool] {
        let cols = self.cols();
        &self.bits[row * cols..(row + 1) * cols]
    }

    pub(crate) fn row_mut(&mut self, row: usize) -> &mut [bool] {
        let cols = self.cols();
        &mut self.bits[row * cols..(row + 1) * cols]
    }

    /// Number of ones in the matrix.
    pub fn ones(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }
}

impl fmt::Display for BitMatrix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for r in 0..self.rows() {
            if r > 0 && r % self.w == 0 {
                f.write_str("\n")?;
            }
            for (c, bit) in self.row(r).iter().enumerate() {
                if c > 0 && c % self.w == 0 {
                    f.write_str(" ")?;
                }
                f.write_str(if *bit { "1" } else { "0" })?;
            }
            f.write_str("\n")?;
        }
        Ok(())
    }
}

/// `elt, x elt, x^2 elt, ...`, the columns of the bit block of `elt`.
fn doublings(field: &Field, elt: u32) -> ArrayVec<u32, MAX_WIDTH> {
    let x = field.generator();
    let mut out = ArrayVec::new();
    let mut e = elt;
    for _ in 0..field.width() {
        out.push(e);
        e = field.multiply(e, x);
    }
    out
}

/// Number of ones in the bit block of `elt`.
pub(crate) fn element_ones(field: &Field, elt: u32) -> u32 {
    doublings(field, elt).iter().map(|e| e.count_ones()).sum()
}

/// Invert the `n x n` matrix `mat` over GF(2).
///
/// Returns `None` if the matrix is singular.
pub(crate) fn invert(mat: &[bool], n: usize) -> Option<Vec<bool>> {
    let c = |i: usize, j: usize| i * n + j;
    let mut a = mat.to_vec();
    let mut inv = vec![false; n * n];
    for i in 0..n {
        inv[c(i, i)] = true;
    }

    for i in 0..n {
        let i_nz = (i..n).find(|r| a[c(*r, i)])?;
        if i_nz != i {
            for j in 0..n {
                a.swap(c(i, j), c(i_nz, j));
                inv.swap(c(i, j), c(i_nz, j));
            }
        }
        for r in 0..n {
            if r != i && a[c(r, i)] {
                for j in 0..n {
                    a[c(r, j)] ^= a[c(i, j)];
                    inv[c(r, j)] ^= inv[c(i, j)];
                }
            }
        }
    }
    Some(inv)
}

#[cfg(test)]
use pretty_assertions::assert_eq;

#[test]
fn test_identity_element_is_identity_block() {
    let f = Field::new(4).unwrap();
    let mat = CodingMatrix::from_entries(1, 1, 4, vec![1]);
    let bm = BitMatrix::from_matrix(&mat, &f);
    for r in 0..4 {
        for c in 0..4 {
            assert_eq!(bm.get(r, c), r == c);
        }
    }
    assert_eq!(bm.ones(), 4);
    assert_eq!(element_ones(&f, 1), 4);
}

#[test]
fn test_blocks_in_smallest_fields() {
    let f = Field::new(1).unwrap();
    let bm = BitMatrix::from_matrix(&CodingMatrix::from_entries(2, 1, 1, vec![1, 1]), &f);
    assert_eq!(bm.to_string(), "1 1\n");
    assert_eq!(element_ones(&f, 1), 1);

    // columns 2 and 2 * 2 = 3, since x^2 = x + 1
    let f = Field::new(2).unwrap();
    let bm = BitMatrix::from_matrix(&CodingMatrix::from_entries(1, 1, 2, vec![2]), &f);
    assert_eq!(bm.to_string(), "01\n11\n");
    assert_eq!(element_ones(&f, 3), 3);
}

#[test]
fn test_block_multiplies() {
    // Applying the block of e to the bits of v gives the bits of e * v.
    let f = Field::new(8).unwrap();
    for e in [2u32, 0x57, 142, 255] {
        let mat = CodingMatrix::from_entries(1, 1, 8, vec![e]);
        let bm = BitMatrix::from_matrix(&mat, &f);
        for v in [1u32, 3, 0x83, 200] {
            let mut product = 0;
            for l in 0..8 {
                let bit = (0..8)
                    .filter(|x| bm.get(l, *x) && (v >> x) & 1 == 1)
                    .count()
                    % 2;
                product |= (bit as u32) << l;
            }
            assert_eq!(product, f.multiply(e, v), "e={} v={}", e, v);
        }
    }
}

#[test]
fn test_display() {
    let f = Field::new(2).unwrap();
    let mat = CodingMatrix::from_entries(2, 1, 2, vec![1, 2]);
    let bm = BitMatrix::from_matrix(&mat, &f);
    assert_eq!(bm.to_string(), "10 01\n01 11\n");
}

#[test]
fn test_invert_gf2() {
    #[rustfmt::skip]
    let mat = [
        true, true, false,
        false, true, true,
        false, false, true,
    ];
    let inv = invert(&mat, 3).unwrap();
    #[rustfmt::skip]
    assert_eq!(inv, vec![
        true, true, true,
        false, true, true,
        false, false, true,
    ]);
    assert_eq!(invert(&[true, true, true, true], 2), None);
}
