//! Liberation codes, minimum density RAID-6 bitmatrices for prime w.
//!
//! The second coding row consists of blocks `X_j`: the identity matrix
//! shifted cyclically by `j` columns, plus (for `j > 0`) one extra bit.
//! That gives `k * w + k - 1` ones, the lowest possible for an MDS code
//! with two coding blocks.
use crate::bitmatrix::BitMatrix;

use super::parity_rows;

pub(super) fn bitmatrix(k: usize, w: usize) -> BitMatrix {
    let mut bm = BitMatrix::new(k, 2, w);
    parity_rows(&mut bm);
    for j in 0..k {
        for i in 0..w {
            bm.set(w + i, j * w + (j + i) % w, true);
        }
        if j > 0 {
            let i = (j * ((w - 1) / 2)) % w;
            bm.set(w + i, j * w + (i + j - 1) % w, true);
        }
    }
    bm
}
