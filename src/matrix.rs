//! Coding matrices over GF(2^w) and the field linear algebra used to
//! invert them.
use std::fmt;

use crate::galois::{xor_region, Field};

/// Coefficients mapping k data blocks to m coding blocks.
///
/// Stored coding row by coding row: the row of coding block `i` holds the
/// k coefficients of the data blocks contributing to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodingMatrix {
    k: usize,
    m: usize,
    w: usize,
    entries: Vec<u32>,
}

impl CodingMatrix {
    pub(crate) fn from_entries(k: usize, m: usize, w: usize, entries: Vec<u32>) -> Self {
        debug_assert_eq!(entries.len(), k * m);
        Self { k, m, w, entries }
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

    /// Coefficient of data block `data` in coding block `coding`.
    pub fn coefficient(&self, data: usize, coding: usize) -> u32 {
        self.entries[coding * self.k + data]
    }

    /// All coefficients of coding block `coding`.
    pub fn row(&self, coding: usize) -> &[u32] {
        &self.entries[coding * self.k..(coding + 1) * self.k]
    }

    pub(crate) fn row_mut(&mut self, coding: usize) -> &mut [u32] {
        &mut self.entries[coding * self.k..(coding + 1) * self.k]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u32]> + '_ {
        // chunks(0) panics, an empty matrix has no rows anyway
        self.entries.chunks(self.k.max(1))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for CodingMatrix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let width = ((1u64 << self.w) - 1).to_string().len();
        for row in self.rows() {
            for (j, e) in row.iter().enumerate() {
                if j > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{:>width$}", e, width = width)?;
            }
            f.write_str("\n")?;
        }
        Ok(())
    }
}

/// Invert the `n x n` matrix `mat` (row major) with Gauss-Jordan elimination.
///
/// Returns `None` if the matrix is singular.
pub(crate) fn invert(mat: &[u32], n: usize, field: &Field) -> Option<Vec<u32>> {
    let c = |i: usize, j: usize| i * n + j;
    let mut a = mat.to_vec();
    let mut inv = vec![0; n * n];
    for i in 0..n {
        inv[c(i, i)] = 1;
    }

    for i in 0..n {
        // find non-zero pivot
        let i_nz = (i..n).find(|r| a[c(*r, i)] != 0)?;
        if i_nz != i {
            for j in 0..n {
                a.swap(c(i, j), c(i_nz, j));
                inv.swap(c(i, j), c(i_nz, j));
            }
        }

        let pivot = a[c(i, i)];
        if pivot != 1 {
            let scale = field.inverse(pivot).ok()?;
            for j in 0..n {
                a[c(i, j)] = field.multiply(a[c(i, j)], scale);
                inv[c(i, j)] = field.multiply(inv[c(i, j)], scale);
            }
        }

        // eliminate column i from every other row
        for r in (0..n).filter(|r| *r != i) {
            let factor = a[c(r, i)];
            if factor == 0 {
                continue;
            }
            for j in 0..n {
                a[c(r, j)] ^= field.multiply(factor, a[c(i, j)]);
                inv[c(r, j)] ^= field.multiply(factor, inv[c(i, j)]);
            }
        }
    }
    Some(inv)
}

/// Store `sum(coefficient * source)` in `dst`, word by word.
///
/// Zero coefficients are skipped and a coefficient of one is a plain copy
/// or XOR. Without any non-zero term `dst` is cleared.
pub(crate) fn linear_combination<'s>(
    field: &Field,
    terms: impl IntoIterator<Item = (u32, &'s [u8])>,
    dst: &mut [u8],
) {
    let mut written = false;
    for (coefficient, src) in terms {
        match (coefficient, written) {
            (0, _) => continue,
            (1, false) => dst.copy_from_slice(src),
            (1, true) => xor_region(src, dst),
            (c, acc) => field.multiply_region(c, src, dst, acc),
        }
        written = true;
    }
    if !written {
        dst.fill(0);
    }
}

#[cfg(test)]
use pretty_assertions::assert_eq;

#[test]
fn test_invert_1x1() {
    let f = Field::new(8).unwrap();
    let inv = invert(&[5], 1, &f).unwrap();
    assert_eq!(f.multiply(inv[0], 5), 1);
}

#[test]
fn test_invert_roundtrip() {
    let f = Field::new(8).unwrap();
    let n = 4;
    // rows of a Vandermonde-like system, invertible
    let mat: Vec<u32> = (0..n as u32)
        .flat_map(|i| (0..n as u64).map(move |j| (i, j)))
        .map(|(i, j)| f.exponentiate(i + 1, j))
        .collect();
    let inv = invert(&mat, n, &f).unwrap();
    for i in 0..n {
        for j in 0..n {
            let dot = (0..n).fold(0, |acc, x| acc ^ f.multiply(mat[i * n + x], inv[x * n + j]));
            assert_eq!(dot, (i == j) as u32, "({}, {})", i, j);
        }
    }
}

#[test]
fn test_invert_needs_row_swap() {
    let f = Field::new(4).unwrap();
    let mat = [0, 1, 1, 0];
    assert_eq!(invert(&mat, 2, &f), Some(vec![0, 1, 1, 0]));
}

#[test]
fn test_invert_singular() {
    let f = Field::new(8).unwrap();
    let mat = [1, 2, 3, 2, 4, 6, 7, 9, 11];
    assert_eq!(invert(&mat, 3, &f), None);
}

#[test]
fn test_linear_combination() {
    let f = Field::new(8).unwrap();
    let a = [1u8, 2, 3, 4];
    let b = [0x57u8, 0, 1, 2];
    let mut dst = [0xffu8; 4];
    linear_combination(&f, [(1, &a[..]), (0x83, &b[..])], &mut dst);
    let expected: Vec<u8> = a
        .iter()
        .zip(&b)
        .map(|(x, y)| x ^ f.multiply(0x83, u32::from(*y)) as u8)
        .collect();
    assert_eq!(dst.to_vec(), expected);

    linear_combination(&f, [(0, &a[..])], &mut dst);
    assert_eq!(dst, [0; 4]);
}

#[test]
fn test_display_aligns_columns() {
    let mat = CodingMatrix::from_entries(3, 2, 8, vec![1, 1, 1, 1, 70, 143]);
    assert_eq!(mat.to_string(), "  1   1   1\n  1  70 143\n");
}
