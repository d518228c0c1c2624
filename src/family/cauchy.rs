//! Cauchy Reed-Solomon coding matrices.
//!
//! With disjoint sets `{x_i}` and `{y_j}` of field elements, the matrix with
//! entries `1 / (x_i + y_j)` has only invertible square submatrices, so it
//! is a valid coding matrix. We take `x_i = i` for the coding rows and
//! `y_j = m + j` for the data columns.
//!
//! Scaling a row or a column by a non-zero constant keeps every submatrix
//! invertible, which leaves room to pick the scaling with the fewest ones in
//! the bitmatrix. That is what the "good" matrices do.
use crate::bitmatrix::element_ones;
use crate::error::Result;
use crate::galois::Field;
use crate::matrix::CodingMatrix;

/// Largest w for which all field elements are ranked by their number of
/// ones when m = 2.
const MAX_RANKED_WIDTH: usize = 16;

pub(super) fn original_matrix(k: usize, m: usize, field: &Field) -> Result<CodingMatrix> {
    let mut entries = Vec::with_capacity(k * m);
    for i in 0..m {
        for j in 0..k {
            entries.push(field.divide(1, (i ^ (m + j)) as u32)?);
        }
    }
    Ok(CodingMatrix::from_entries(k, m, field.width(), entries))
}

pub(super) fn good_matrix(k: usize, m: usize, field: &Field) -> Result<CodingMatrix> {
    let w = field.width();
    if m == 2 && w <= MAX_RANKED_WIDTH {
        // first row all ones, second row the k cheapest distinct elements
        let mut elements: Vec<(u32, u32)> = (1..(1u32 << w))
            .map(|e| (element_ones(field, e), e))
            .collect();
        elements.sort_unstable();
        let mut entries = vec![1; k];
        entries.extend(elements.iter().take(k).map(|(_, e)| *e));
        return Ok(CodingMatrix::from_entries(k, m, w, entries));
    }
    let mut matrix = original_matrix(k, m, field)?;
    improve(&mut matrix, field)?;
    Ok(matrix)
}

fn row_ones(field: &Field, row: &[u32]) -> u32 {
    row.iter().map(|e| element_ones(field, *e)).sum()
}

/// Scale the columns so that the first row is all ones, then scale every
/// other row by the divisor giving it the fewest ones.
///
/// A row is only rescaled when that is strictly better, ties keep the
/// lowest column.
fn improve(matrix: &mut CodingMatrix, field: &Field) -> Result<()> {
    let (k, m) = (matrix.k(), matrix.m());
    if m == 0 {
        return Ok(());
    }

    for j in 0..k {
        let head = matrix.coefficient(j, 0);
        if head != 1 {
            let inv = field.inverse(head)?;
            for i in 0..m {
                let row = matrix.row_mut(i);
                row[j] = field.multiply(row[j], inv);
            }
        }
    }

    for i in 1..m {
        let row = matrix.row(i);
        let mut best_ones = row_ones(field, row);
        let mut best = None;
        for j in 0..k {
            if row[j] == 1 {
                continue;
            }
            let inv = field.inverse(row[j])?;
            let ones: u32 = row
                .iter()
                .map(|e| element_ones(field, field.multiply(*e, inv)))
                .sum();
            if ones < best_ones {
                best_ones = ones;
                best = Some(j);
            }
        }
        if let Some(j) = best {
            let inv = field.inverse(matrix.row(i)[j])?;
            for e in matrix.row_mut(i) {
                *e = field.multiply(*e, inv);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmatrix::BitMatrix;
    use pretty_assertions::assert_eq;

    fn rows(matrix: &CodingMatrix) -> Vec<Vec<u32>> {
        matrix.rows().map(|r| r.to_vec()).collect()
    }

    #[test]
    fn test_original() {
        let f = Field::new(4).unwrap();
        let mat = original_matrix(3, 2, &f).unwrap();
        assert_eq!(rows(&mat), vec![vec![9, 14, 13], vec![14, 9, 11]]);
    }

    #[test]
    fn test_good_two_coding_rows() {
        let f = Field::new(4).unwrap();
        let good = good_matrix(4, 2, &f).unwrap();
        assert_eq!(rows(&good), vec![vec![1, 1, 1, 1], vec![1, 2, 9, 4]]);
        let orig = original_matrix(4, 2, &f).unwrap();
        assert_eq!(BitMatrix::from_matrix(&good, &f).ones(), 36);
        assert_eq!(BitMatrix::from_matrix(&orig, &f).ones(), 68);

        let f = Field::new(8).unwrap();
        let good = good_matrix(5, 2, &f).unwrap();
        assert_eq!(good.row(1), &[1, 2, 142, 4, 71]);
        assert_eq!(BitMatrix::from_matrix(&good, &f).ones(), 98);
        let orig = original_matrix(5, 2, &f).unwrap();
        assert_eq!(BitMatrix::from_matrix(&orig, &f).ones(), 292);
    }

    #[test]
    fn test_good_improved() {
        let f = Field::new(3).unwrap();
        let good = good_matrix(3, 3, &f).unwrap();
        assert_eq!(rows(&good), vec![vec![1, 1, 1], vec![5, 1, 2], vec![1, 4, 7]]);
    }

    #[test]
    fn test_good_has_fewer_ones() {
        for (k, m, w) in [(4, 3, 5), (6, 3, 4), (5, 4, 8), (3, 2, 20)] {
            let f = Field::new(w).unwrap();
            let orig = original_matrix(k, m, &f).unwrap();
            let good = good_matrix(k, m, &f).unwrap();
            assert!(good.row(0).iter().all(|e| *e == 1));
            assert!(
                BitMatrix::from_matrix(&good, &f).ones() <= BitMatrix::from_matrix(&orig, &f).ones(),
                "k={} m={} w={}",
                k,
                m,
                w
            );
        }
    }
}
