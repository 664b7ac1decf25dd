//! Seeded deterministic randomness.
//!
//! Two generators live here:
//!
//! - [`Xof`] — a keyed BLAKE2b in counter mode, the source of all query
//!   randomness (field elements, masks, DPF seeds). Instances are not
//!   thread-safe and must be owned by a single producer.
//! - Fixed-key AES helpers — the Matyas–Meyer–Oseas compression
//!   `f(x) = AES_k(x) XOR x` that drives DPF/FSS seed expansion and the
//!   seed-to-field conversion. The keys provide domain separation, not
//!   secrecy.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;
use blake2::{Blake2b512, Digest};
use rand::RngCore;

use crate::field::Element;

/// Keyed BLAKE2b-512 running in counter mode.
pub struct Xof {
    key: [u8; 64],
    counter: u64,
    buf: [u8; 64],
    pos: usize,
}

impl Xof {
    /// Derives the XOF key from an arbitrary-length seed.
    pub fn new(seed: &[u8]) -> Self {
        let mut hasher = Blake2b512::new();
        hasher.update(seed);
        let mut key = [0u8; 64];
        key.copy_from_slice(&hasher.finalize());

        Xof {
            key,
            counter: 0,
            buf: [0u8; 64],
            pos: 64,
        }
    }

    fn refill(&mut self) {
        let mut hasher = Blake2b512::new();
        hasher.update(self.key);
        hasher.update(self.counter.to_le_bytes());
        self.buf.copy_from_slice(&hasher.finalize());
        self.counter += 1;
        self.pos = 0;
    }

    /// Fills `out` with the next bytes of the stream.
    pub fn fill(&mut self, out: &mut [u8]) {
        let mut written = 0;
        while written < out.len() {
            if self.pos == self.buf.len() {
                self.refill();
            }
            let n = (out.len() - written).min(self.buf.len() - self.pos);
            out[written..written + n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
            self.pos += n;
            written += n;
        }
    }

    /// Draws a 16-byte seed, the PRG key size used throughout.
    pub fn seed16(&mut self) -> [u8; 16] {
        let mut s = [0u8; 16];
        self.fill(&mut s);
        s
    }
}

/// An OS-seeded XOF, the usual entry point for clients and database
/// generation.
pub fn random_xof() -> Xof {
    let mut seed = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut seed);
    Xof::new(&seed)
}

/// Matyas–Meyer–Oseas compression: `AES_k(x) XOR x`.
pub(crate) fn mmo(cipher: &Aes128, x: &[u8; 16]) -> [u8; 16] {
    let mut block = GenericArray::clone_from_slice(x);
    cipher.encrypt_block(&mut block);
    let mut out = [0u8; 16];
    for i in 0..16 {
        out[i] = block[i] ^ x[i];
    }
    out
}

/// Expands a seed into two child seeds and control bits. The control bit is
/// carved out of the low bit of each child and cleared from the seed.
pub(crate) fn expand_seed(
    left: &Aes128,
    right: &Aes128,
    s: &[u8; 16],
) -> ([u8; 16], u8, [u8; 16], u8) {
    let mut sl = mmo(left, s);
    let mut sr = mmo(right, s);
    let tl = sl[15] & 1;
    let tr = sr[15] & 1;
    sl[15] &= 0xfe;
    sr[15] &= 0xfe;
    (sl, tl, sr, tr)
}

/// Deterministically maps a leaf seed to `n` field elements. Counter-tweaked
/// MMO blocks yield four elements each; both parties run the identical map,
/// which is all the DPF correctness argument needs.
pub(crate) fn convert_elements(cipher: &Aes128, seed: &[u8; 16], n: usize) -> Vec<Element> {
    let mut out = Vec::with_capacity(n);
    let blocks = n.div_ceil(4);
    for j in 0..blocks {
        let mut x = *seed;
        for (b, c) in x[12..16].iter_mut().zip((j as u32).to_le_bytes()) {
            *b ^= c;
        }
        let y = mmo(cipher, &x);
        for chunk in y.chunks_exact(4) {
            if out.len() < n {
                let v = u32::from_le_bytes(chunk.try_into().expect("4-byte chunk"));
                out.push(Element::from_u64(v as u64));
            }
        }
    }
    out
}

/// Builds an AES-128 instance from a 16-byte key.
pub(crate) fn aes128(key: &[u8; 16]) -> Aes128 {
    Aes128::new(GenericArray::from_slice(key))
}

/// Fixed expansion/conversion keys for the DPF layer, shared by construction
/// between the two parties.
pub(crate) const DPF_LEFT_KEY: [u8; 16] = [
    0x24, 0x3f, 0x6a, 0x88, 0x85, 0xa3, 0x08, 0xd3, 0x13, 0x19, 0x8a, 0x2e, 0x03, 0x70, 0x73,
    0x44,
];
pub(crate) const DPF_RIGHT_KEY: [u8; 16] = [
    0xa4, 0x09, 0x38, 0x22, 0x29, 0x9f, 0x31, 0xd0, 0x08, 0x2e, 0xfa, 0x98, 0xec, 0x4e, 0x6c,
    0x89,
];
pub(crate) const DPF_CONVERT_KEY: [u8; 16] = [
    0x45, 0x28, 0x21, 0xe6, 0x38, 0xd0, 0x13, 0x77, 0xbe, 0x54, 0x66, 0xcf, 0x34, 0xe9, 0x0c,
    0x6c,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xof_deterministic() {
        let mut a = Xof::new(b"seed");
        let mut b = Xof::new(b"seed");

        let mut out_a = [0u8; 100];
        let mut out_b = [0u8; 100];
        a.fill(&mut out_a);
        b.fill(&mut out_b);
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn test_xof_seeds_differ() {
        let mut a = Xof::new(b"seed one");
        let mut b = Xof::new(b"seed two");

        assert_ne!(a.seed16(), b.seed16());
    }

    #[test]
    fn test_xof_split_reads_match_bulk() {
        let mut bulk = Xof::new(b"split");
        let mut split = Xof::new(b"split");

        let mut big = [0u8; 96];
        bulk.fill(&mut big);

        let mut parts = [0u8; 96];
        split.fill(&mut parts[..10]);
        split.fill(&mut parts[10..70]);
        split.fill(&mut parts[70..]);
        assert_eq!(big, parts);
    }

    #[test]
    fn test_expand_seed_clears_control_bit() {
        let left = aes128(&DPF_LEFT_KEY);
        let right = aes128(&DPF_RIGHT_KEY);
        let (sl, tl, sr, tr) = expand_seed(&left, &right, &[7u8; 16]);

        assert_eq!(sl[15] & 1, 0);
        assert_eq!(sr[15] & 1, 0);
        assert!(tl <= 1 && tr <= 1);
    }

    #[test]
    fn test_convert_elements_deterministic() {
        let cipher = aes128(&DPF_CONVERT_KEY);
        let seed = [3u8; 16];

        assert_eq!(
            convert_elements(&cipher, &seed, 9),
            convert_elements(&cipher, &seed, 9)
        );
        assert_eq!(convert_elements(&cipher, &seed, 9).len(), 9);
    }
}
