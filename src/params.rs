//! Code parameters, their validation and the size compatibility check.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::family::{CodeFamily, Requirement};
use crate::galois::MAX_WIDTH;

/// Machine word size in bytes. Packets of the XOR codes and the alignment
/// unit of stripe buffers are multiples of it.
pub const WORD_SIZE: u64 = 8;

/// Shape of a code and of the buffers it works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeParameters {
    /// Number of data blocks.
    pub k: usize,
    /// Number of coding blocks.
    pub m: usize,
    /// Bits per field element.
    pub w: usize,
    /// Bytes per packet for the XOR codes, 0 for none.
    #[serde(default)]
    pub packet_size: usize,
    /// Bytes per block and call, 0 for "whatever the input is".
    #[serde(default)]
    pub buffer_size: u64,
}

/// How an input is cut into stripe buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripeLayout {
    /// Effective buffer size.
    pub buffer_size: u64,
    /// Number of buffers of that size making up the input.
    pub buffers: u64,
}

impl CodeParameters {
    pub fn new(k: usize, m: usize, w: usize, packet_size: usize, buffer_size: u64) -> Self {
        Self {
            k,
            m,
            w,
            packet_size,
            buffer_size,
        }
    }

    /// Check the base constraints and every [Requirement] of `family`.
    pub fn validate(&self, family: CodeFamily) -> Result<()> {
        let fail = |reason: String| Err(Error::invalid(family, reason));
        if self.k == 0 {
            return fail("k must be positive".into());
        }
        if self.w == 0 || self.w > MAX_WIDTH {
            return fail(format!("w must be in 1..={MAX_WIDTH}, got {}", self.w));
        }

        let (k, m, w) = (self.k, self.m, self.w);
        for requirement in family.requirements() {
            match requirement {
                Requirement::PacketSize if self.packet_size == 0 => {
                    return fail("packet size must be positive".into());
                }
                Requirement::WordAlignedPacket if self.packet_size as u64 % WORD_SIZE != 0 => {
                    return fail(format!(
                        "packet size {} must be a multiple of {WORD_SIZE}",
                        self.packet_size
                    ));
                }
                Requirement::WordWidth if !matches!(w, 8 | 16 | 32) => {
                    return fail(format!("w must be 8, 16 or 32, got {w}"));
                }
                Requirement::FieldCapacity if k.saturating_add(m) as u64 > 1u64 << w => {
                    return fail(format!("k + m = {k} + {m} exceeds the field size 2^{w}"));
                }
                Requirement::DataWithinWidth if k > w => {
                    return fail(format!("k = {k} must not exceed w = {w}"));
                }
                Requirement::PrimeWidth if w <= 2 || !is_prime(w) => {
                    return fail(format!("w = {w} must be a prime greater than 2"));
                }
                Requirement::PrimeWidthPlusOne if w <= 2 || !is_prime(w + 1) => {
                    return fail(format!("w + 1 = {} must be prime and w greater than 2", w + 1));
                }
                Requirement::WidthEight if w != 8 => {
                    return fail(format!("w must be 8, got {w}"));
                }
                Requirement::TwoCoding if m != 2 => {
                    return fail(format!("m must be 2, got {m}"));
                }
                _ => {}
            }
        }
        if self.alignment().is_none() {
            return fail(format!(
                "alignment unit {WORD_SIZE} * k * w * packet_size overflows for packet size {}",
                self.packet_size
            ));
        }
        Ok(())
    }

    /// Unit both the buffer size and the total size must be a multiple of:
    /// `WORD_SIZE * k * w * packet_size` (`packet_size` counted as 1 if 0).
    ///
    /// `None` if the unit does not fit a `u64`.
    pub fn alignment(&self) -> Option<u64> {
        [self.k, self.w, self.packet_size.max(1)]
            .into_iter()
            .try_fold(WORD_SIZE, |unit, factor| unit.checked_mul(u64::try_from(factor).ok()?))
    }

    /// Check that an input of `total_size` bytes can be cut into stripe
    /// buffers with these parameters.
    ///
    /// A buffer size of 0 means one buffer holding the whole input.
    pub fn check_compatibility(&self, total_size: u64) -> Result<StripeLayout> {
        let overflow = Error::SizeOverflow { params: *self };
        let unit = self.alignment().ok_or_else(|| overflow.clone())?;
        let buffer_size = match self.buffer_size {
            0 => total_size,
            size => {
                let suggested = next_multiple(size, unit).ok_or_else(|| overflow.clone())?;
                if suggested != size {
                    return Err(if suggested <= total_size {
                        Error::MisalignedBuffer {
                            buffer_size: size,
                            suggested,
                        }
                    } else {
                        Error::BufferExceedsInput {
                            suggested,
                            total_size,
                        }
                    });
                }
                size
            }
        };
        if total_size == 0 {
            return Ok(StripeLayout {
                buffer_size,
                buffers: 0,
            });
        }
        if total_size % buffer_size != 0 {
            return Err(Error::MisalignedFile {
                total_size,
                buffer_size,
                suggested: next_multiple(total_size, buffer_size).ok_or(overflow)?,
            });
        }
        Ok(StripeLayout {
            buffer_size,
            buffers: total_size / buffer_size,
        })
    }
}

impl fmt::Display for CodeParameters {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "k={} m={} w={} packet_size={} buffer_size={}",
            self.k, self.m, self.w, self.packet_size, self.buffer_size
        )
    }
}

/// Smallest multiple of `unit` not below `size`.
fn next_multiple(size: u64, unit: u64) -> Option<u64> {
    size.div_ceil(unit).checked_mul(unit)
}

/// Trial division, fine for the small numbers word sizes are.
pub fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    (2..).take_while(|d| d * d <= n).all(|d| n % d != 0)
}
