//! GF(2^128) for the single-bit information-theoretic scheme.
//!
//! Elements are 128-bit polynomials over GF(2) reduced modulo
//! x^128 + x^7 + x^2 + x + 1; addition is XOR and multiplication is a
//! portable shift-and-reduce carryless product.

use serde::{Deserialize, Serialize};

use crate::prg::Xof;

/// Low byte of the reduction polynomial x^128 + x^7 + x^2 + x + 1.
const REDUCTION: u128 = 0x87;

/// An element of GF(2^128). Bit i of the inner `u128` is the coefficient of
/// x^i.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gf128(u128);

impl Gf128 {
    pub const ZERO: Gf128 = Gf128(0);
    pub const ONE: Gf128 = Gf128(1);

    pub fn from_u128(v: u128) -> Self {
        Gf128(v)
    }

    pub fn value(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Samples a uniform element; every 16-byte string is a valid element.
    pub fn set_random(xof: &mut Xof) -> Self {
        let mut buf = [0u8; 16];
        xof.fill(&mut buf);
        Gf128(u128::from_le_bytes(buf))
    }

    pub fn random_vector(n: usize, xof: &mut Xof) -> Vec<Gf128> {
        (0..n).map(|_| Gf128::set_random(xof)).collect()
    }

    pub fn to_bytes(self) -> [u8; 16] {
        self.0.to_le_bytes()
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Gf128(u128::from_le_bytes(bytes))
    }
}

impl std::ops::Add for Gf128 {
    type Output = Gf128;

    /// Field addition: coefficient-wise XOR.
    fn add(self, rhs: Gf128) -> Gf128 {
        Gf128(self.0 ^ rhs.0)
    }
}

impl std::ops::AddAssign for Gf128 {
    fn add_assign(&mut self, rhs: Gf128) {
        self.0 ^= rhs.0;
    }
}

impl std::ops::Mul for Gf128 {
    type Output = Gf128;

    /// Carryless multiplication followed by reduction. One pass over the
    /// 128 bits of `rhs`, folding the carry of each doubling back in via
    /// the reduction polynomial.
    fn mul(self, rhs: Gf128) -> Gf128 {
        let mut a = self.0;
        let mut b = rhs.0;
        let mut acc: u128 = 0;

        while b != 0 {
            if b & 1 == 1 {
                acc ^= a;
            }
            let carry = a >> 127;
            a <<= 1;
            if carry == 1 {
                a ^= REDUCTION;
            }
            b >>= 1;
        }

        Gf128(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_xor() {
        let a = Gf128::from_u128(0b1010);
        let b = Gf128::from_u128(0b0110);

        assert_eq!((a + b).value(), 0b1100);
        assert_eq!((a + a).value(), 0);
    }

    #[test]
    fn test_mul_identity_and_zero() {
        let a = Gf128::from_u128(0xdeadbeef_cafebabe);

        assert_eq!(a * Gf128::ONE, a);
        assert_eq!(a * Gf128::ZERO, Gf128::ZERO);
    }

    #[test]
    fn test_mul_by_x() {
        // x * x^127 wraps around into the reduction polynomial.
        let x = Gf128::from_u128(2);
        let top = Gf128::from_u128(1 << 127);

        assert_eq!((x * top).value(), REDUCTION);
    }

    #[test]
    fn test_mul_commutative_and_associative() {
        let a = Gf128::from_u128(0x0123456789abcdef_fedcba9876543210);
        let b = Gf128::from_u128(0x1111111122222222_3333333344444444);
        let c = Gf128::from_u128(0x5a5a5a5a5a5a5a5a_a5a5a5a5a5a5a5a5);

        assert_eq!(a * b, b * a);
        assert_eq!((a * b) * c, a * (b * c));
    }

    #[test]
    fn test_mul_distributes_over_add() {
        let a = Gf128::from_u128(0x1234);
        let b = Gf128::from_u128(0x9999_0000_1111);
        let c = Gf128::from_u128(0xffff_ffff_ffff_ffff);

        assert_eq!(a * (b + c), a * b + a * c);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let a = Gf128::from_u128(0xa1b2c3d4_e5f60718_293a4b5c_6d7e8f90);
        assert_eq!(Gf128::from_bytes(a.to_bytes()), a);
    }
}
