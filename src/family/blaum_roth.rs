//! Blaum-Roth RAID-6 bitmatrices for prime `p = w + 1`.
//!
//! Words are read as polynomials modulo `M_p(x) = 1 + x + ... + x^w`, and
//! block `X_i` of the second coding row multiplies by `x^i`. Shifting bit
//! `c` up by `i` lands on bit `(c + i) mod p`. Bit `w` does not exist in the
//! ring, `x^w` equals the sum of all lower powers, so that bit maps onto
//! every output bit.
use crate::bitmatrix::BitMatrix;

use super::parity_rows;

pub(super) fn bitmatrix(k: usize, w: usize) -> BitMatrix {
    let p = w + 1;
    let mut bm = BitMatrix::new(k, 2, w);
    parity_rows(&mut bm);
    for i in 0..k {
        for c in 0..w {
            match (c + i) % p {
                e if e < w => bm.set(w + e, i * w + c, true),
                _ => {
                    for r in 0..w {
                        bm.set(w + r, i * w + c, true);
                    }
                }
            }
        }
    }
    bm
}
