//! Reed-Solomon coding matrix derived from an extended Vandermonde matrix.
//!
//! The `(k + m) x k` extended Vandermonde matrix has `[1, 0, ..., 0]` as its
//! first row, `[0, ..., 0, 1]` as its last row, and `[1, i, i^2, ...]` as row
//! `i` in between. Any k of its rows are linearly independent. Column
//! operations keep that property, so we reduce the top `k x k` block to the
//! identity (the data blocks are stored verbatim) and keep the bottom m rows
//! as the coding matrix. A last normalisation makes the first coding row and
//! the first column all ones, which turns coding block 0 into plain parity.
use crate::error::{Error, Result};
use crate::family::CodeFamily;
use crate::galois::Field;
use crate::matrix::CodingMatrix;

pub(super) fn coding_matrix(k: usize, m: usize, field: &Field) -> Result<CodingMatrix> {
    let w = field.width();
    if m == 0 {
        return Ok(CodingMatrix::from_entries(k, 0, w, Vec::new()));
    }
    let mut dist = distribution_matrix(k + m, k, field)?;
    let coding = dist.split_off(k * k);
    Ok(CodingMatrix::from_entries(k, m, w, coding))
}

/// The full `rows x cols` matrix whose top `cols x cols` block is the
/// identity, row major.
fn distribution_matrix(rows: usize, cols: usize, field: &Field) -> Result<Vec<u32>> {
    let c = |i: usize, j: usize| i * cols + j;
    let mut dist = extended_vandermonde(rows, cols, field);

    for i in 1..cols {
        // bring a row with a non-zero entry in column i up to row i
        let pivot = (i..rows)
            .find(|j| dist[c(*j, i)] != 0)
            .ok_or_else(|| Error::invalid(CodeFamily::Vandermonde, "degenerate Vandermonde matrix"))?;
        if pivot != i {
            for x in 0..cols {
                dist.swap(c(i, x), c(pivot, x));
            }
        }

        // scale column i so that dist[i][i] = 1
        let d = dist[c(i, i)];
        if d != 1 {
            let inv = field.inverse(d)?;
            for r in 0..rows {
                dist[c(r, i)] = field.multiply(inv, dist[c(r, i)]);
            }
        }

        // zero the rest of row i with column operations
        for j in (0..cols).filter(|j| *j != i) {
            let t = dist[c(i, j)];
            if t != 0 {
                for r in 0..rows {
                    dist[c(r, j)] ^= field.multiply(t, dist[c(r, i)]);
                }
            }
        }
    }

    // first coding row all ones: scale the coding part of every column
    for j in 0..cols {
        let t = dist[c(cols, j)];
        if t != 1 {
            let inv = field.inverse(t)?;
            for r in cols..rows {
                dist[c(r, j)] = field.multiply(inv, dist[c(r, j)]);
            }
        }
    }

    // first column all ones: scale the remaining coding rows
    for r in cols + 1..rows {
        let t = dist[c(r, 0)];
        if t != 1 {
            let inv = field.inverse(t)?;
            for j in 0..cols {
                dist[c(r, j)] = field.multiply(dist[c(r, j)], inv);
            }
        }
    }
    Ok(dist)
}

fn extended_vandermonde(rows: usize, cols: usize, field: &Field) -> Vec<u32> {
    let mut vdm = vec![0u32; rows * cols];
    vdm[0] = 1;
    vdm[(rows - 1) * cols + cols - 1] = 1;
    for i in 1..rows - 1 {
        let mut power = 1;
        for j in 0..cols {
            vdm[i * cols + j] = power;
            power = field.multiply(power, i as u32);
        }
    }
    vdm
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::invert;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_known_matrices() {
        let f = Field::new(8).unwrap();
        let mat = coding_matrix(4, 2, &f).unwrap();
        assert_eq!(mat.row(0), &[1, 1, 1, 1]);
        assert_eq!(mat.row(1), &[1, 70, 143, 200]);

        let mat = coding_matrix(4, 3, &f).unwrap();
        let rows: Vec<&[u32]> = mat.rows().collect();
        assert_eq!(rows, vec![&[1, 1, 1, 1][..], &[1, 217, 92, 172][..], &[1, 70, 143, 200][..]]);
    }

    #[test]
    fn test_top_block_is_identity() {
        let f = Field::new(8).unwrap();
        let dist = distribution_matrix(9, 5, &f).unwrap();
        for i in 0..5 {
            for j in 0..5 {
                assert_eq!(dist[i * 5 + j], (i == j) as u32);
            }
        }
    }

    #[test]
    fn test_any_k_rows_invertible() {
        let f = Field::new(8).unwrap();
        let (k, m) = (3, 3);
        let dist = distribution_matrix(k + m, k, &f).unwrap();
        for a in 0..k + m {
            for b in a + 1..k + m {
                for c in b + 1..k + m {
                    let sub: Vec<u32> = [a, b, c]
                        .iter()
                        .flat_map(|r| dist[r * k..(r + 1) * k].iter().cloned())
                        .collect();
                    assert!(invert(&sub, k, &f).is_some(), "rows {} {} {}", a, b, c);
                }
            }
        }
    }

    #[test]
    fn test_wide_fields_and_edges() {
        let f = Field::new(16).unwrap();
        let mat = coding_matrix(6, 3, &f).unwrap();
        assert!(mat.row(0).iter().all(|e| *e == 1));
        assert!(mat.rows().all(|r| r[0] == 1));

        let f = Field::new(32).unwrap();
        let mat = coding_matrix(3, 2, &f).unwrap();
        assert_eq!(mat.row(0), &[1, 1, 1]);

        let f = Field::new(8).unwrap();
        assert!(coding_matrix(5, 0, &f).unwrap().is_empty());
        assert_eq!(coding_matrix(1, 1, &f).unwrap().row(0), &[1]);
    }
}
