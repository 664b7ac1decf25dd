//! Arithmetic in F_p for the fixed 32-bit prime p = 2^32 − 5.
//!
//! Elements are plain `u32` values in [0, p); products go through `u64`
//! intermediates, so no Montgomery machinery is needed at this width.

use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use crate::prg::Xof;

/// The field modulus: the largest 32-bit prime, 2^32 − 5.
pub const MODULUS: u32 = 4_294_967_291;

/// Serialized size of an element in bytes (little-endian).
pub const BYTES: usize = 4;

/// An element of F_p, always reduced into [0, p).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element(u32);

impl Element {
    /// The additive identity.
    pub const ZERO: Element = Element(0);

    /// The multiplicative identity.
    pub const ONE: Element = Element(1);

    /// Creates an element from an integer, reducing modulo p.
    pub fn from_u32(v: u32) -> Self {
        if v >= MODULUS {
            Element(v - MODULUS)
        } else {
            Element(v)
        }
    }

    /// Creates an element from a u64, reducing modulo p.
    pub fn from_u64(v: u64) -> Self {
        Element((v % MODULUS as u64) as u32)
    }

    /// The canonical integer representative in [0, p).
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Samples a uniform element by rejection: draw four bytes, retry while
    /// the draw falls outside the largest multiple of p below 2^32. For this
    /// modulus that multiple is p itself, so at most 5 in 2^32 draws repeat.
    pub fn set_random(xof: &mut Xof) -> Self {
        let mut buf = [0u8; 4];
        loop {
            xof.fill(&mut buf);
            let v = u32::from_le_bytes(buf);
            if v < MODULUS {
                return Element(v);
            }
        }
    }

    /// Samples `n` independent uniform elements.
    pub fn random_vector(n: usize, xof: &mut Xof) -> Vec<Element> {
        (0..n).map(|_| Element::set_random(xof)).collect()
    }

    /// Little-endian encoding of the canonical representative.
    pub fn to_bytes(self) -> [u8; BYTES] {
        self.0.to_le_bytes()
    }

    /// Decodes a little-endian representative, reducing modulo p.
    pub fn from_bytes(bytes: [u8; BYTES]) -> Self {
        Element::from_u32(u32::from_le_bytes(bytes))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Add for Element {
    type Output = Element;

    fn add(self, rhs: Element) -> Element {
        let sum = self.0 as u64 + rhs.0 as u64;
        Element((sum % MODULUS as u64) as u32)
    }
}

impl AddAssign for Element {
    fn add_assign(&mut self, rhs: Element) {
        *self = *self + rhs;
    }
}

impl Sub for Element {
    type Output = Element;

    fn sub(self, rhs: Element) -> Element {
        if self.0 >= rhs.0 {
            Element(self.0 - rhs.0)
        } else {
            Element(self.0 + (MODULUS - rhs.0))
        }
    }
}

impl SubAssign for Element {
    fn sub_assign(&mut self, rhs: Element) {
        *self = *self - rhs;
    }
}

impl Mul for Element {
    type Output = Element;

    fn mul(self, rhs: Element) -> Element {
        let prod = self.0 as u64 * rhs.0 as u64;
        Element((prod % MODULUS as u64) as u32)
    }
}

impl MulAssign for Element {
    fn mul_assign(&mut self, rhs: Element) {
        *self = *self * rhs;
    }
}

impl Neg for Element {
    type Output = Element;

    fn neg(self) -> Element {
        if self.0 == 0 {
            Element(0)
        } else {
            Element(MODULUS - self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prg::Xof;

    #[test]
    fn test_basic_operations() {
        let a = Element::from_u32(100);
        let b = Element::from_u32(200);

        assert_eq!((a + b).value(), 300);
        assert_eq!((b - a).value(), 100);
        assert_eq!((a * b).value(), 20000);
    }

    #[test]
    fn test_modular_reduction() {
        let a = Element::from_u32(MODULUS - 1);
        let b = Element::from_u32(2);

        assert_eq!((a + b).value(), 1);
    }

    #[test]
    fn test_negation() {
        let a = Element::from_u32(100);
        let neg_a = -a;

        assert_eq!((a + neg_a).value(), 0);
        assert_eq!(neg_a.value(), MODULUS - 100);
        assert_eq!((-Element::ZERO).value(), 0);
    }

    #[test]
    fn test_subtraction_underflow() {
        let a = Element::from_u32(100);
        let b = Element::from_u32(200);

        assert_eq!((a - b).value(), MODULUS - 100);
    }

    #[test]
    fn test_multiplication_large() {
        let a = Element::from_u32(1 << 31);
        let b = Element::from_u32(1 << 31);
        let expected = (((1u64 << 31) * (1u64 << 31)) % MODULUS as u64) as u32;

        assert_eq!((a * b).value(), expected);
    }

    #[test]
    fn test_distributivity() {
        let a = Element::from_u32(12345);
        let b = Element::from_u32(67890);
        let c = Element::from_u32(11111);

        assert_eq!((a * (b + c)).value(), (a * b + a * c).value());
    }

    #[test]
    fn test_bytes_roundtrip() {
        for v in [0u32, 1, 1234, MODULUS - 1] {
            let e = Element::from_u32(v);
            assert_eq!(Element::from_bytes(e.to_bytes()), e);
        }
    }

    #[test]
    fn test_random_in_range() {
        let mut xof = Xof::new(b"fp test seed");
        for _ in 0..1000 {
            let e = Element::set_random(&mut xof);
            assert!(e.value() < MODULUS);
        }
    }

    #[test]
    fn test_random_vector_deterministic() {
        let mut xof1 = Xof::new(b"same seed");
        let mut xof2 = Xof::new(b"same seed");

        let v1 = Element::random_vector(64, &mut xof1);
        let v2 = Element::random_vector(64, &mut xof2);
        assert_eq!(v1, v2);
    }
}
