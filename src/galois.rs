//! Arithmetic in the binary extension fields GF(2^w) for `1 <= w <= 32`.
//!
//! An element of GF(2^w) is stored as a `u32` whose low `w` bits are the
//! coefficients of a polynomial of degree below `w`, the least significant
//! bit being the coefficient of 1. For example, with w = 8:
//!
//! > 0b1010_0011 = x^7 + x^5 + x + 1.
//!
//! Addition is done coefficient by coefficient, so it is a plain XOR and
//! every element is its own negative.
//!
//! Multiplying two polynomials can produce powers of x of degree `w` and
//! above, so multiplication is done modulo a fixed primitive polynomial of
//! degree `w` (see [PRIMITIVE_POLYNOMIALS]). Because the polynomial is
//! primitive, the powers 1, x, x^2, ..., x^(2^w - 2) run through every
//! non-zero element, which means `x` (the element 2) is a generator.
//!
//! Any non-zero `a` is then some power `x^i`, and
//! `a * b = x^i * x^j = x^(i + j)`. For w up to 16 the two lookup tables
//! (log and antilog) are small enough to build, and multiplication and
//! division become two lookups and an addition. Tables are built on first
//! use of a width and kept in a process wide [FieldCache].
//!
//! For wider fields the tables would not fit in memory. Multiplication then
//! falls back to carry-less shift-and-add followed by a reduction modulo
//! the primitive polynomial, and inversion uses `a^(2^w - 2) = a^-1`.
use std::fmt;
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// Largest supported word size.
pub const MAX_WIDTH: usize = 32;

/// Widths up to this one get log/antilog tables.
const MAX_TABLE_WIDTH: usize = 16;

/// Primitive polynomials defining GF(2^w), indexed by `w`, including the
/// `x^w` term.
pub const PRIMITIVE_POLYNOMIALS: [u64; MAX_WIDTH + 1] = [
    0,
    0x3,
    0x7,
    0xb,
    0x13,
    0x25,
    0x43,
    0x89,
    0x11d,
    0x211,
    0x409,
    0x805,
    0x1053,
    0x201b,
    0x4443,
    0x8003,
    0x1100b,
    0x20009,
    0x40081,
    0x80027,
    0x100009,
    0x200005,
    0x400003,
    0x800021,
    0x1000087,
    0x2000009,
    0x4000047,
    0x8000027,
    0x10000009,
    0x20000005,
    0x40800007,
    0x80000009,
    0x1_0040_0007,
];

/// Lookup tables for one field width.
struct LogTables {
    /// `log[a]` is the power `i` with `x^i = a`. `log[0]` is unused.
    log: Vec<u32>,
    /// `antilog[i] = x^i`, stored twice in a row so that the sum of two
    /// logarithms can be looked up without reduction.
    antilog: Vec<u32>,
    /// Order of the multiplicative group, `2^w - 1`.
    order: usize,
}

impl LogTables {
    fn build(w: usize) -> Self {
        let order = (1usize << w) - 1;
        let poly = PRIMITIVE_POLYNOMIALS[w];
        let mut log = vec![0u32; order + 1];
        let mut antilog = vec![0u32; 2 * order];
        let mut p: u64 = 1; // polynomial representation of x^i
        for i in 0..order {
            antilog[i] = p as u32;
            antilog[i + order] = p as u32;
            log[p as usize] = i as u32;
            p <<= 1;
            if p >> w != 0 {
                p ^= poly;
            }
        }
        Self {
            log,
            antilog,
            order,
        }
    }
}

/// Process wide cache of log/antilog tables, keyed by the word size.
///
/// Each slot is initialised at most once. After that the tables are only
/// read, so any number of threads can share them.
pub struct FieldCache {
    tables: [OnceLock<LogTables>; MAX_TABLE_WIDTH + 1],
}

impl FieldCache {
    #[allow(clippy::declare_interior_mutable_const)]
    const EMPTY: OnceLock<LogTables> = OnceLock::new();

    /// Create an empty cache. Tables are built on demand.
    pub const fn new() -> Self {
        Self {
            tables: [Self::EMPTY; MAX_TABLE_WIDTH + 1],
        }
    }

    /// The cache used by [Field::new].
    pub fn global() -> &'static FieldCache {
        static CACHE: FieldCache = FieldCache::new();
        &CACHE
    }

    /// Get a handle for GF(2^w), building the tables if needed.
    pub fn field(&self, w: usize) -> Result<Field<'_>> {
        if w == 0 || w > MAX_WIDTH {
            return Err(Error::UnsupportedFieldWidth { w });
        }
        let tables = (w <= MAX_TABLE_WIDTH).then(|| {
            self.tables[w].get_or_init(|| {
                tracing::debug!(w, "building GF(2^w) log tables");
                LogTables::build(w)
            })
        });
        Ok(Field { w, tables })
    }

    /// Were the tables for `w` already built?
    pub fn is_built(&self, w: usize) -> bool {
        w <= MAX_TABLE_WIDTH && self.tables[w].get().is_some()
    }
}

impl Default for FieldCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to the arithmetic of GF(2^w).
///
/// Cheap to copy, it only borrows the cached tables.
#[derive(Clone, Copy)]
pub struct Field<'c> {
    w: usize,
    tables: Option<&'c LogTables>,
}

impl Field<'static> {
    /// Arithmetic for GF(2^w) backed by the global [FieldCache].
    pub fn new(w: usize) -> Result<Self> {
        FieldCache::global().field(w)
    }
}

impl<'c> Field<'c> {
    /// The word size `w`.
    pub fn width(&self) -> usize {
        self.w
    }

    /// Number of elements, `2^w`.
    pub fn size(&self) -> u64 {
        1u64 << self.w
    }

    /// Is `a` below `2^w`?
    pub fn contains(&self, a: u32) -> bool {
        u64::from(a) < self.size()
    }

    /// `a` itself if it is an element of the field.
    pub fn element(&self, a: u32) -> Result<u32> {
        if self.contains(a) {
            Ok(a)
        } else {
            Err(Error::InvalidFieldElement { value: a, w: self.w })
        }
    }

    /// The element x, which generates the multiplicative group.
    ///
    /// This is 2 except in GF(2), where x reduces to 1.
    pub fn generator(&self) -> u32 {
        let x = 2u64;
        let x = if x >> self.w != 0 {
            x ^ PRIMITIVE_POLYNOMIALS[self.w]
        } else {
            x
        };
        x as u32
    }

    fn check(&self, a: u32) {
        debug_assert!(self.contains(a), "{} is not an element of GF(2^{})", a, self.w);
    }

    // The arithmetic below trusts its operands to be elements of the
    // field. The checked versions are the free functions of this module.

    pub(crate) fn multiply(&self, a: u32, b: u32) -> u32 {
        self.check(a);
        self.check(b);
        if a == 0 || b == 0 {
            return 0;
        }
        match self.tables {
            Some(t) => t.antilog[(t.log[a as usize] + t.log[b as usize]) as usize],
            None => shift_multiply(a, b, self.w),
        }
    }

    /// Compute `a / b`.
    pub(crate) fn divide(&self, a: u32, b: u32) -> Result<u32> {
        self.check(a);
        self.check(b);
        if b == 0 {
            return Err(Error::DivideByZero { w: self.w });
        }
        if a == 0 {
            return Ok(0);
        }
        match self.tables {
            Some(t) => {
                let i = t.log[a as usize] as usize + t.order - t.log[b as usize] as usize;
                Ok(t.antilog[i])
            }
            None => Ok(self.multiply(a, self.inverse(b)?)),
        }
    }

    /// Multiplicative inverse of `a`.
    pub(crate) fn inverse(&self, a: u32) -> Result<u32> {
        if a == 0 {
            return Err(Error::DivideByZero { w: self.w });
        }
        match self.tables {
            Some(_) => self.divide(1, a),
            None => Ok(self.exponentiate(a, (1u64 << self.w) - 2)),
        }
    }

    /// Compute `a^n`, with `0^0 = 1`.
    pub(crate) fn exponentiate(&self, a: u32, n: u64) -> u32 {
        self.check(a);
        if n == 0 {
            return 1;
        }
        if a == 0 {
            return 0;
        }
        match self.tables {
            Some(t) => {
                let order = t.order as u64;
                let i = (u64::from(t.log[a as usize]) * (n % order)) % order;
                t.antilog[i as usize]
            }
            None => {
                let (mut base, mut n, mut result) = (a, n, 1);
                while n > 0 {
                    if n & 1 == 1 {
                        result = self.multiply(result, base);
                    }
                    base = self.multiply(base, base);
                    n >>= 1;
                }
                result
            }
        }
    }

    /// Multiply every `w` bit word of `src` by `constant` and store the
    /// product in `dst`, or XOR it into `dst` if `accumulate` is set.
    ///
    /// Words are read and written little-endian. Only defined for the
    /// word widths 8, 16 and 32, and both regions must have the same
    /// length, a multiple of `w / 8`.
    pub(crate) fn multiply_region(
        &self,
        constant: u32,
        src: &[u8],
        dst: &mut [u8],
        accumulate: bool,
    ) {
        debug_assert_eq!(src.len(), dst.len());
        match self.w {
            8 => {
                let table: [u8; 256] =
                    std::array::from_fn(|b| self.multiply(constant, b as u32) as u8);
                for (d, s) in dst.iter_mut().zip(src) {
                    let p = table[*s as usize];
                    *d = if accumulate { *d ^ p } else { p };
                }
            }
            16 => {
                for (d, s) in dst.chunks_exact_mut(2).zip(src.chunks_exact(2)) {
                    let word = u16::from_le_bytes([s[0], s[1]]);
                    let p = (self.multiply(constant, u32::from(word)) as u16).to_le_bytes();
                    store(d, &p, accumulate);
                }
            }
            32 => {
                // Split tables: the product with each byte lane of the word.
                let lanes: [[u32; 256]; 4] = std::array::from_fn(|lane| {
                    std::array::from_fn(|b| self.multiply(constant, (b as u32) << (8 * lane)))
                });
                for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                    let p = lanes[0][s[0] as usize]
                        ^ lanes[1][s[1] as usize]
                        ^ lanes[2][s[2] as usize]
                        ^ lanes[3][s[3] as usize];
                    store(d, &p.to_le_bytes(), accumulate);
                }
            }
            w => panic!("region multiplication is only defined for w in {{8, 16, 32}}, got {w}"),
        }
    }
}

impl fmt::Debug for Field<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "GF(2^{})", self.w)
    }
}

fn store(dst: &mut [u8], value: &[u8], accumulate: bool) {
    for (d, v) in dst.iter_mut().zip(value) {
        *d = if accumulate { *d ^ *v } else { *v };
    }
}

/// Carry-less product of `a` and `b` reduced modulo the primitive
/// polynomial for `w`.
fn shift_multiply(a: u32, b: u32, w: usize) -> u32 {
    let poly = PRIMITIVE_POLYNOMIALS[w];
    let (mut a, mut b) = (u64::from(a), u64::from(b));
    let mut product = 0u64;
    while b != 0 {
        if b & 1 == 1 {
            product ^= a;
        }
        a <<= 1;
        b >>= 1;
    }
    for bit in (w..2 * w - 1).rev() {
        if (product >> bit) & 1 == 1 {
            product ^= poly << (bit - w);
        }
    }
    product as u32
}

/// XOR `src` into `dst`.
pub(crate) fn xor_region(src: &[u8], dst: &mut [u8]) {
    debug_assert_eq!(src.len(), dst.len());
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= *s;
    }
}

/// Compute `a * b` in GF(2^w).
///
/// Operands must be below `2^w`, otherwise this fails with
/// [Error::InvalidFieldElement]. The same holds for the other functions.
pub fn multiply(a: u32, b: u32, w: usize) -> Result<u32> {
    let field = Field::new(w)?;
    Ok(field.multiply(field.element(a)?, field.element(b)?))
}

/// Compute `a / b` in GF(2^w), failing with [Error::DivideByZero] for `b = 0`.
pub fn divide(a: u32, b: u32, w: usize) -> Result<u32> {
    let field = Field::new(w)?;
    field.divide(field.element(a)?, field.element(b)?)
}

pub fn inverse(a: u32, w: usize) -> Result<u32> {
    let field = Field::new(w)?;
    field.inverse(field.element(a)?)
}

/// Compute `a^n` in GF(2^w).
pub fn exponentiate(a: u32, n: u64, w: usize) -> Result<u32> {
    let field = Field::new(w)?;
    Ok(field.exponentiate(field.element(a)?, n))
}

#[cfg(test)]
use pretty_assertions::assert_eq;

#[test]
fn sanity_check_tables() {
    use std::collections::HashSet;

    for w in [1, 3, 4, 8, 11] {
        let t = LogTables::build(w);
        let anti_log: HashSet<u32> = t.antilog[..t.order].iter().cloned().collect();
        assert_eq!(anti_log.len(), t.order, "w={}", w);
        for i in 0..t.order {
            assert_eq!(i as u32, t.log[t.antilog[i] as usize]);
            assert_eq!(t.antilog[i], t.antilog[i + t.order]);
        }
    }
}

#[test]
fn cache_builds_each_width_once() {
    let cache = FieldCache::new();
    assert!(!cache.is_built(8));
    let a = cache.field(8).unwrap();
    let b = cache.field(8).unwrap();
    assert!(cache.is_built(8));
    assert!(std::ptr::eq(a.tables.unwrap(), b.tables.unwrap()));
    // wide fields never get tables
    assert!(cache.field(32).unwrap().tables.is_none());
    assert!(!cache.is_built(32));
}

#[test]
fn gf256_mul() {
    let f = Field::new(8).unwrap();
    assert_eq!(f.multiply(123, 1), 123);
    assert_eq!(f.multiply(234, 0), 0);
    assert_eq!(f.multiply(0, 23), 0);
    assert_eq!(f.multiply(2, 4), 8);
    assert_eq!(f.multiply(0x57, 0x83), 49);
    assert_eq!(f.inverse(2).unwrap(), 142);
}

#[test]
fn known_products_other_widths() {
    assert_eq!(multiply(3, 7, 4).unwrap(), 9);
    assert_eq!(multiply(0x1234, 0x5678, 16).unwrap(), 25380);
    assert_eq!(multiply(0x1234_5678, 0x9abc_def0, 32).unwrap(), 2_156_827_741);
    assert_eq!(divide(1, 3, 4).unwrap(), 14);
}

#[test]
fn gf256_div_mul() {
    let f = Field::new(8).unwrap();
    for a in 0..=255 {
        for b in 1..=255 {
            let a_div_b = f.divide(a, b).unwrap();
            assert_eq!(f.multiply(a_div_b, b), a);
        }
    }
}

#[test]
fn table_and_shift_multiply_agree() {
    for w in [5, 8, 13, 16] {
        let f = Field::new(w).unwrap();
        let mask = (1u32 << w) - 1;
        for a in (1..=mask).step_by(37) {
            for b in (0..=mask).step_by(53) {
                assert_eq!(f.multiply(a, b), shift_multiply(a, b, w), "w={}", w);
            }
        }
    }
}

#[test]
fn wide_field_inverse() {
    for w in [17, 24, 31, 32] {
        let f = Field::new(w).unwrap();
        let mask = ((1u64 << w) - 1) as u32;
        for a in [1u32, 2, 3, 0x1f0f, mask] {
            let a = a & mask;
            let inv = f.inverse(a).unwrap();
            assert_eq!(f.multiply(a, inv), 1, "w={} a={}", w, a);
        }
    }
}

#[test]
fn powers_of_two_follow_doubling() {
    for w in [4, 8, 16, 32] {
        let f = Field::new(w).unwrap();
        let mut a = 1;
        for i in 0..300 {
            assert_eq!(f.exponentiate(2, i), a, "w={} i={}", w, i);
            a = f.multiply(a, 2);
        }
    }
    assert_eq!(exponentiate(0, 0, 8).unwrap(), 1);
    assert_eq!(exponentiate(0, 5, 8).unwrap(), 0);
}

#[test]
fn divide_by_zero_is_an_error() {
    assert_eq!(divide(5, 0, 8), Err(Error::DivideByZero { w: 8 }));
    assert_eq!(
        Field::new(32).unwrap().inverse(0),
        Err(Error::DivideByZero { w: 32 })
    );
}

#[test]
fn operands_outside_the_field() {
    assert_eq!(
        multiply(256, 3, 8),
        Err(Error::InvalidFieldElement { value: 256, w: 8 })
    );
    assert_eq!(
        multiply(3, 0xffff_ffff, 20),
        Err(Error::InvalidFieldElement {
            value: 0xffff_ffff,
            w: 20
        })
    );
    assert_eq!(divide(1, 16, 4), Err(Error::InvalidFieldElement { value: 16, w: 4 }));
    assert_eq!(inverse(2, 1), Err(Error::InvalidFieldElement { value: 2, w: 1 }));
    assert_eq!(
        exponentiate(1 << 17, 2, 17),
        Err(Error::InvalidFieldElement { value: 1 << 17, w: 17 })
    );
    let max = u32::MAX;
    assert_eq!(multiply(max, max, 32).unwrap(), shift_multiply(max, max, 32));
    assert_eq!(inverse(1, 1), Ok(1));
    assert!(Field::new(20).unwrap().contains(0xf_ffff));
    assert!(!Field::new(20).unwrap().contains(0x10_0000));
}

#[test]
fn generator_of_every_width() {
    for w in 1..=MAX_WIDTH {
        let f = Field::new(w).unwrap();
        let x = f.generator();
        assert!(f.contains(x), "w={}", w);
        assert_eq!(x, if w == 1 { 1 } else { 2 });
        // x^(2^w - 1) = 1 for every generator of the multiplicative group
        assert_eq!(f.exponentiate(x, (1u64 << w) - 1), 1, "w={}", w);
    }
}

#[test]
fn unsupported_widths() {
    assert_eq!(multiply(1, 1, 0), Err(Error::UnsupportedFieldWidth { w: 0 }));
    assert_eq!(multiply(1, 1, 33), Err(Error::UnsupportedFieldWidth { w: 33 }));
}

#[test]
fn region_multiply_matches_scalar() {
    let src: Vec<u8> = (0..64u32).map(|i| (i * 29 + 7) as u8).collect();
    for w in [8, 16, 32] {
        let f = Field::new(w).unwrap();
        let c = 0x9e37_79b9 & ((1u64 << w) - 1) as u32;
        let mut dst = vec![0u8; src.len()];
        f.multiply_region(c, &src, &mut dst, false);
        let bytes = w / 8;
        for (s, d) in src.chunks(bytes).zip(dst.chunks(bytes)) {
            let mut word = [0u8; 4];
            word[..bytes].copy_from_slice(s);
            let mut expected = [0u8; 4];
            expected[..bytes].copy_from_slice(d);
            assert_eq!(
                f.multiply(c, u32::from_le_bytes(word)),
                u32::from_le_bytes(expected)
            );
        }
        // accumulating twice cancels out
        let before = dst.clone();
        f.multiply_region(c, &src, &mut dst, true);
        f.multiply_region(c, &src, &mut dst, true);
        assert_eq!(dst, before);
    }
}
