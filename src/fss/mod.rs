//! Function secret sharing for prefix/suffix predicates.
//!
//! The two-party scheme shares a tree-based point function over an explicit
//! bit string: `generate_tree_pf(input_bits, a)` emits two keys whose
//! evaluations sum to the vector `a` exactly on inputs whose specified bits
//! match `input_bits`, and to zero elsewhere. With
//! `a = [1, α_1, …, α_k]` this carries the data slot and the
//! information-theoretic MAC slots of the predicate queries.
//!
//! Unlike the DPF layer, the PRF here is keyed with [`INIT_PRF_LEN`] 16-byte
//! keys drawn by the client and shared with the servers at construction
//! time. The keys provide domain separation only; transmitting them in the
//! clear does not affect privacy.

mod multiparty;

pub use multiparty::{eval_multi_party, gen_multi_party, MultiPartyKey, CW_BYTES};

use aes::Aes128;
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::dpf::CorrectionWord;
use crate::error::{Error, Result};
use crate::field::Element;
use crate::prg::{aes128, convert_elements, mmo, Xof};

/// Number of fixed PRF keys negotiated between client and servers.
pub const INIT_PRF_LEN: usize = 4;

/// One party's key for the tree predicate function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub s_init: [u8; 16],
    pub t_init: u8,
    pub cw: Vec<CorrectionWord>,
    pub final_cw: Vec<Element>,
}

impl Key {
    /// Deterministic wire encoding:
    /// `| s_init:16 | t_init:u8 | n_cw:u32 | cw… | final_len:u32 | final_cw… |`,
    /// all integers little-endian, each correction word 18 bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + 1 + 4 + self.cw.len() * 18 + 4 + self.final_cw.len() * 4);
        out.extend_from_slice(&self.s_init);
        out.push(self.t_init);

        let mut len = [0u8; 4];
        LittleEndian::write_u32(&mut len, self.cw.len() as u32);
        out.extend_from_slice(&len);
        for cw in &self.cw {
            out.extend_from_slice(&cw.s);
            out.push(cw.t_l);
            out.push(cw.t_r);
        }

        LittleEndian::write_u32(&mut len, self.final_cw.len() as u32);
        out.extend_from_slice(&len);
        for e in &self.final_cw {
            out.extend_from_slice(&e.to_bytes());
        }
        out
    }

    /// Parses [`Key::encode`] output; malformed input is `InvalidInput`.
    pub fn decode(bytes: &[u8]) -> Result<Key> {
        let malformed = || Error::InvalidInput("malformed fss key bytes".into());

        if bytes.len() < 21 {
            return Err(malformed());
        }
        let mut s_init = [0u8; 16];
        s_init.copy_from_slice(&bytes[..16]);
        let t_init = bytes[16];

        let n_cw = LittleEndian::read_u32(&bytes[17..21]) as usize;
        let mut offset = 21;
        let mut cw = Vec::with_capacity(n_cw);
        for _ in 0..n_cw {
            if bytes.len() < offset + 18 {
                return Err(malformed());
            }
            let mut s = [0u8; 16];
            s.copy_from_slice(&bytes[offset..offset + 16]);
            cw.push(CorrectionWord {
                s,
                t_l: bytes[offset + 16],
                t_r: bytes[offset + 17],
            });
            offset += 18;
        }

        if bytes.len() < offset + 4 {
            return Err(malformed());
        }
        let final_len = LittleEndian::read_u32(&bytes[offset..offset + 4]) as usize;
        offset += 4;
        if bytes.len() != offset + final_len * 4 {
            return Err(malformed());
        }
        let mut final_cw = Vec::with_capacity(final_len);
        for j in 0..final_len {
            let mut word = [0u8; 4];
            word.copy_from_slice(&bytes[offset + j * 4..offset + j * 4 + 4]);
            final_cw.push(Element::from_bytes(word));
        }

        Ok(Key {
            s_init,
            t_init,
            cw,
            final_cw,
        })
    }
}

/// FSS context holding the negotiated PRF keys and their AES instances.
pub struct Fss {
    prf_keys: Vec<[u8; 16]>,
    ciphers: Vec<Aes128>,
    num_values: usize,
}

impl Fss {
    /// Client-side construction: draws fresh PRF keys. `num_values` is the
    /// length of the shared value vector, one data slot plus the MAC slots.
    pub fn client_initialize(num_values: usize, xof: &mut Xof) -> Fss {
        let prf_keys: Vec<[u8; 16]> = (0..INIT_PRF_LEN).map(|_| xof.seed16()).collect();
        Fss::from_keys(prf_keys, num_values)
    }

    /// Server-side construction from the client's transmitted PRF keys.
    pub fn server_initialize(prf_keys: Vec<[u8; 16]>, num_values: usize) -> Result<Fss> {
        if prf_keys.len() != INIT_PRF_LEN {
            return Err(Error::InvalidInput(format!(
                "expected {INIT_PRF_LEN} prf keys, got {}",
                prf_keys.len()
            )));
        }
        Ok(Fss::from_keys(prf_keys, num_values))
    }

    fn from_keys(prf_keys: Vec<[u8; 16]>, num_values: usize) -> Fss {
        let ciphers = prf_keys.iter().map(aes128).collect();
        Fss {
            prf_keys,
            ciphers,
            num_values,
        }
    }

    /// The negotiated PRF keys, for transmission to the servers.
    pub fn prf_keys(&self) -> &[[u8; 16]] {
        &self.prf_keys
    }

    pub fn num_values(&self) -> usize {
        self.num_values
    }

    /// Expands a node seed into both children. Child seeds come from the
    /// first two PRF keys, control bits from the low bits of a third block.
    fn expand(&self, s: &[u8; 16]) -> ([u8; 16], u8, [u8; 16], u8) {
        let mut sl = mmo(&self.ciphers[0], s);
        let mut sr = mmo(&self.ciphers[1], s);
        let tb = mmo(&self.ciphers[2], s);
        sl[15] &= 0xfe;
        sr[15] &= 0xfe;
        (sl, tb[0] & 1, sr, tb[1] & 1)
    }

    fn convert(&self, s: &[u8; 16]) -> Vec<Element> {
        convert_elements(&self.ciphers[3], s, self.num_values)
    }

    /// Generates the two keys sharing the function that maps a bit string
    /// equal to `input` to the vector `a` and everything else to zero.
    pub fn generate_tree_pf(
        &self,
        input: &[bool],
        a: &[Element],
        xof: &mut Xof,
    ) -> Result<(Key, Key)> {
        if input.is_empty() {
            return Err(Error::InvalidInput("empty predicate bit string".into()));
        }
        if a.len() != self.num_values {
            return Err(Error::InvalidInput(format!(
                "value vector length {} does not match context {}",
                a.len(),
                self.num_values
            )));
        }

        let mut s_a = xof.seed16();
        let mut s_b = xof.seed16();
        s_a[15] &= 0xfe;
        s_b[15] &= 0xfe;
        let s_init_a = s_a;
        let s_init_b = s_b;
        let mut t_a = 0u8;
        let mut t_b = 1u8;

        let mut cw = Vec::with_capacity(input.len());

        for &bit in input {
            let keep = bit as u8;
            let (sl_a, tl_a, sr_a, tr_a) = self.expand(&s_a);
            let (sl_b, tl_b, sr_b, tr_b) = self.expand(&s_b);

            let (s_lose_a, s_lose_b) = if keep == 1 {
                (&sl_a, &sl_b)
            } else {
                (&sr_a, &sr_b)
            };
            let mut s_cw = [0u8; 16];
            for i in 0..16 {
                s_cw[i] = s_lose_a[i] ^ s_lose_b[i];
            }
            let t_l_cw = tl_a ^ tl_b ^ keep ^ 1;
            let t_r_cw = tr_a ^ tr_b ^ keep;

            let (s_keep_a, t_keep_a, s_keep_b, t_keep_b) = if keep == 1 {
                (sr_a, tr_a, sr_b, tr_b)
            } else {
                (sl_a, tl_a, sl_b, tl_b)
            };
            let t_keep_cw = if keep == 1 { t_r_cw } else { t_l_cw };

            for i in 0..16 {
                s_a[i] = s_keep_a[i] ^ (if t_a == 1 { s_cw[i] } else { 0 });
                s_b[i] = s_keep_b[i] ^ (if t_b == 1 { s_cw[i] } else { 0 });
            }
            let next_t_a = t_keep_a ^ (t_a & t_keep_cw);
            let next_t_b = t_keep_b ^ (t_b & t_keep_cw);
            t_a = next_t_a;
            t_b = next_t_b;

            cw.push(CorrectionWord {
                s: s_cw,
                t_l: t_l_cw,
                t_r: t_r_cw,
            });
        }

        let conv_a = self.convert(&s_a);
        let conv_b = self.convert(&s_b);
        let mut final_cw = Vec::with_capacity(a.len());
        for j in 0..a.len() {
            let mut v = a[j] - conv_a[j] + conv_b[j];
            if t_b == 1 {
                v = -v;
            }
            final_cw.push(v);
        }

        Ok((
            Key {
                s_init: s_init_a,
                t_init: 0,
                cw: cw.clone(),
                final_cw: final_cw.clone(),
            },
            Key {
                s_init: s_init_b,
                t_init: 1,
                cw,
                final_cw,
            },
        ))
    }

    /// Evaluates one party's share on a concrete bit string. `x` must supply
    /// at least as many bits as the predicate specifies.
    pub fn evaluate_pf(&self, party: u8, key: &Key, x: &[bool]) -> Result<Vec<Element>> {
        if x.len() < key.cw.len() {
            return Err(Error::InvalidInput(format!(
                "input of {} bits for a predicate over {}",
                x.len(),
                key.cw.len()
            )));
        }

        let mut s = key.s_init;
        let mut t = key.t_init;
        for (i, cw) in key.cw.iter().enumerate() {
            let (sl, tl, sr, tr) = self.expand(&s);
            let (mut s_next, mut t_next) = if x[i] { (sr, tr) } else { (sl, tl) };
            if t == 1 {
                for j in 0..16 {
                    s_next[j] ^= cw.s[j];
                }
                t_next ^= if x[i] { cw.t_r } else { cw.t_l };
            }
            s = s_next;
            t = t_next;
        }

        let conv = self.convert(&s);
        Ok(conv
            .into_iter()
            .zip(&key.final_cw)
            .map(|(c, &fcw)| {
                let mut v = c;
                if t == 1 {
                    v += fcw;
                }
                if party == 1 {
                    v = -v;
                }
                v
            })
            .collect())
    }
}

/// Expands bytes into bits, most significant bit of each byte first.
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<bool> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &b in bytes {
        for i in (0..8).rev() {
            bits.push((b >> i) & 1 == 1);
        }
    }
    bits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::CONCURRENT_EXECUTIONS;

    fn value_vector() -> Vec<Element> {
        let mut a = vec![Element::ONE];
        for i in 0..CONCURRENT_EXECUTIONS {
            a.push(Element::from_u32(1000 + i as u32));
        }
        a
    }

    #[test]
    fn test_tree_pf_matches_only_input() {
        let mut xof = Xof::new(b"fss match");
        let fss = Fss::client_initialize(1 + CONCURRENT_EXECUTIONS, &mut xof);
        let input = bytes_to_bits(b"a");
        let a = value_vector();

        let (ka, kb) = fss.generate_tree_pf(&input, &a, &mut xof).unwrap();

        for candidate in 0u8..=u8::MAX {
            let bits = bytes_to_bits(&[candidate]);
            let out0 = fss.evaluate_pf(0, &ka, &bits).unwrap();
            let out1 = fss.evaluate_pf(1, &kb, &bits).unwrap();
            let sum: Vec<Element> = out0.iter().zip(&out1).map(|(&x, &y)| x + y).collect();

            if bits == input {
                assert_eq!(sum, a);
            } else {
                assert!(sum.iter().all(Element::is_zero));
            }
        }
    }

    #[test]
    fn test_tree_pf_longer_input_spot_checks() {
        let mut xof = Xof::new(b"fss long");
        let fss = Fss::client_initialize(1 + CONCURRENT_EXECUTIONS, &mut xof);
        let input = bytes_to_bits(b"epfl.ch");
        let a = value_vector();

        let (ka, kb) = fss.generate_tree_pf(&input, &a, &mut xof).unwrap();

        let matching = bytes_to_bits(b"epfl.ch");
        let sum: Vec<Element> = fss
            .evaluate_pf(0, &ka, &matching)
            .unwrap()
            .iter()
            .zip(&fss.evaluate_pf(1, &kb, &matching).unwrap())
            .map(|(&x, &y)| x + y)
            .collect();
        assert_eq!(sum, a);

        for other in [&b"epfl.cc"[..], b"example", b"zpfl.ch"] {
            let bits = bytes_to_bits(other);
            let sum: Vec<Element> = fss
                .evaluate_pf(0, &ka, &bits)
                .unwrap()
                .iter()
                .zip(&fss.evaluate_pf(1, &kb, &bits).unwrap())
                .map(|(&x, &y)| x + y)
                .collect();
            assert!(sum.iter().all(Element::is_zero));
        }
    }

    #[test]
    fn test_server_context_evaluates_identically() {
        let mut xof = Xof::new(b"fss shared keys");
        let client = Fss::client_initialize(2, &mut xof);
        let server =
            Fss::server_initialize(client.prf_keys().to_vec(), 2).unwrap();

        let input = bytes_to_bits(&[0b1011_0010]);
        let a = vec![Element::ONE, Element::from_u32(77)];
        let (ka, kb) = client.generate_tree_pf(&input, &a, &mut xof).unwrap();

        for x in 0u8..=u8::MAX {
            let bits = bytes_to_bits(&[x]);
            assert_eq!(
                client.evaluate_pf(0, &ka, &bits).unwrap(),
                server.evaluate_pf(0, &ka, &bits).unwrap()
            );
            assert_eq!(
                client.evaluate_pf(1, &kb, &bits).unwrap(),
                server.evaluate_pf(1, &kb, &bits).unwrap()
            );
        }
    }

    #[test]
    fn test_key_wire_roundtrip() {
        let mut xof = Xof::new(b"fss codec");
        let fss = Fss::client_initialize(4, &mut xof);
        let input = bytes_to_bits(b"x");
        let a = vec![
            Element::ONE,
            Element::from_u32(2),
            Element::from_u32(3),
            Element::from_u32(4),
        ];
        let (ka, _) = fss.generate_tree_pf(&input, &a, &mut xof).unwrap();

        let decoded = Key::decode(&ka.encode()).unwrap();
        assert_eq!(decoded, ka);
    }

    #[test]
    fn test_key_decode_rejects_truncation() {
        let mut xof = Xof::new(b"fss trunc");
        let fss = Fss::client_initialize(2, &mut xof);
        let (ka, _) = fss
            .generate_tree_pf(&bytes_to_bits(b"q"), &[Element::ONE, Element::ONE], &mut xof)
            .unwrap();

        let bytes = ka.encode();
        for cut in [0, 5, 20, bytes.len() - 1] {
            assert!(Key::decode(&bytes[..cut]).is_err());
        }
    }

    #[test]
    fn test_bytes_to_bits_msb_first() {
        assert_eq!(
            bytes_to_bits(&[0b1000_0001]),
            vec![true, false, false, false, false, false, false, true]
        );
    }

    #[test]
    fn test_wrong_prf_key_count_rejected() {
        assert!(Fss::server_initialize(vec![[0u8; 16]; 3], 2).is_err());
    }
}
