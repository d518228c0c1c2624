//! Sets of lost blocks.
use crate::error::{Error, Result};

/// Marks the end of a terminated erasure list.
pub const SENTINEL: i32 = -1;

/// Indices of the blocks lost in a stripe, `0..k` for data blocks and
/// `k..k + m` for coding blocks.
///
/// The set is only checked against a code when it is used, see
/// [Code::plan](crate::Code::plan).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Erasures(Vec<usize>);

impl Erasures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a list terminated by [SENTINEL].
    ///
    /// Values after the sentinel are ignored.
    pub fn from_terminated(list: &[i32]) -> Result<Self> {
        let end = list
            .iter()
            .position(|i| *i == SENTINEL)
            .ok_or_else(|| Error::InvalidErasureSet {
                reason: "missing -1 terminator".into(),
            })?;
        list[..end]
            .iter()
            .map(|i| {
                usize::try_from(*i).map_err(|_| Error::InvalidErasureSet {
                    reason: format!("negative block index {i}"),
                })
            })
            .collect()
    }

    /// The indices followed by [SENTINEL].
    ///
    /// Fails for indices that do not fit an `i32`.
    pub fn to_terminated(&self) -> Result<Vec<i32>> {
        self.0
            .iter()
            .map(|i| {
                i32::try_from(*i).map_err(|_| Error::InvalidErasureSet {
                    reason: format!("block index {i} does not fit a terminated list"),
                })
            })
            .chain(std::iter::once(Ok(SENTINEL)))
            .collect()
    }

    pub fn push(&mut self, block: usize) {
        self.0.push(block);
    }

    pub fn contains(&self, block: usize) -> bool {
        self.0.contains(&block)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().cloned()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Check the set against a code with `k` data and `m` coding blocks and
    /// return the indices in ascending order.
    pub(crate) fn checked(&self, k: usize, m: usize) -> Result<Vec<usize>> {
        if self.0.len() > m {
            return Err(Error::TooManyErasures {
                k,
                m,
                erased: self.0.clone(),
            });
        }
        let mut sorted = self.0.clone();
        sorted.sort_unstable();
        if let Some(i) = sorted.iter().find(|i| **i >= k + m) {
            return Err(Error::InvalidErasureSet {
                reason: format!("block {i} out of range, there are {} blocks", k + m),
            });
        }
        if let Some(w) = sorted.windows(2).find(|w| w[0] == w[1]) {
            return Err(Error::InvalidErasureSet {
                reason: format!("block {} erased twice", w[0]),
            });
        }
        Ok(sorted)
    }
}

impl FromIterator<usize> for Erasures {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<usize>> for Erasures {
    fn from(blocks: Vec<usize>) -> Self {
        Self(blocks)
    }
}

impl From<&[usize]> for Erasures {
    fn from(blocks: &[usize]) -> Self {
        Self(blocks.to_vec())
    }
}

#[cfg(test)]
use pretty_assertions::assert_eq;

#[test]
fn test_terminated_roundtrip() {
    let e = Erasures::from_terminated(&[3, 0, -1, 7]).unwrap();
    assert_eq!(e.as_slice(), &[3, 0]);
    assert_eq!(e.to_terminated().unwrap(), vec![3, 0, -1]);
    assert!(Erasures::from_terminated(&[-1]).unwrap().is_empty());
}

#[test]
fn test_terminated_errors() {
    assert!(matches!(
        Erasures::from_terminated(&[1, 2]),
        Err(Error::InvalidErasureSet { .. })
    ));
    assert!(matches!(
        Erasures::from_terminated(&[1, -3, -1]),
        Err(Error::InvalidErasureSet { .. })
    ));
    // an index that would wrap around to the sentinel
    let huge = Erasures::from(vec![1, u32::MAX as usize]);
    assert!(matches!(
        huge.to_terminated(),
        Err(Error::InvalidErasureSet { .. })
    ));
    let largest = Erasures::from(vec![i32::MAX as usize]);
    assert_eq!(largest.to_terminated().unwrap(), vec![i32::MAX, SENTINEL]);
}

#[test]
fn test_checked() {
    let e: Erasures = [5, 1].into_iter().collect();
    assert_eq!(e.checked(4, 2), Ok(vec![1, 5]));
    assert_eq!(
        Erasures::from(vec![0, 1, 2]).checked(4, 2),
        Err(Error::TooManyErasures {
            k: 4,
            m: 2,
            erased: vec![0, 1, 2]
        })
    );
    // count is checked before anything else
    assert!(matches!(
        Erasures::from(vec![9, 9, 9]).checked(4, 2),
        Err(Error::TooManyErasures { .. })
    ));
    assert!(matches!(
        Erasures::from(vec![6]).checked(4, 2),
        Err(Error::InvalidErasureSet { .. })
    ));
    assert!(matches!(
        Erasures::from(vec![2, 2]).checked(4, 2),
        Err(Error::InvalidErasureSet { .. })
    ));
}
