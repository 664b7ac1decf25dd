//! Two-party distributed point function over F_p vectors.
//!
//! `gen(alpha, beta, log_n)` produces two keys whose evaluations sum to
//! `beta` at `alpha` and to zero everywhere else on [0, 2^log_n). The
//! construction is the tree-based Gilboa–Ishai scheme: each level expands a
//! 16-byte seed with fixed-key AES and applies a correction word that
//! re-synchronizes the two parties off the `alpha` path.
//!
//! `eval_full` and `eval_full_flatten` evaluate the whole domain in
//! level order, so a server pays 2^log_n seed expansions instead of
//! `log_n · 2^log_n`.

use aes::Aes128;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::field::Element;
use crate::prg::{
    aes128, convert_elements, expand_seed, Xof, DPF_CONVERT_KEY, DPF_LEFT_KEY, DPF_RIGHT_KEY,
};

/// Per-level correction word: the seed mask and the two control-bit masks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionWord {
    pub s: [u8; 16],
    pub t_l: u8,
    pub t_r: u8,
}

/// One party's DPF key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub s_init: [u8; 16],
    pub t_init: u8,
    pub cw: Vec<CorrectionWord>,
    pub final_cw: Vec<Element>,
}

impl Key {
    /// Wire encoding with the same framing as the predicate keys:
    /// `| s_init:16 | t_init:u8 | n_cw:u32 | cw… | final_len:u32 | final_cw… |`.
    pub fn encode(&self) -> Vec<u8> {
        use byteorder::{ByteOrder, LittleEndian};

        let mut out =
            Vec::with_capacity(21 + self.cw.len() * 18 + 4 + self.final_cw.len() * 4);
        out.extend_from_slice(&self.s_init);
        out.push(self.t_init);
        let mut word = [0u8; 4];
        LittleEndian::write_u32(&mut word, self.cw.len() as u32);
        out.extend_from_slice(&word);
        for cw in &self.cw {
            out.extend_from_slice(&cw.s);
            out.push(cw.t_l);
            out.push(cw.t_r);
        }
        LittleEndian::write_u32(&mut word, self.final_cw.len() as u32);
        out.extend_from_slice(&word);
        for e in &self.final_cw {
            out.extend_from_slice(&e.to_bytes());
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Key> {
        use byteorder::{ByteOrder, LittleEndian};

        let malformed = || Error::InvalidInput("malformed dpf key bytes".into());
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
        let final_cw = bytes[offset..]
            .chunks_exact(4)
            .map(|c| Element::from_bytes(c.try_into().expect("4-byte element")))
            .collect();

        Ok(Key {
            s_init,
            t_init,
            cw,
            final_cw,
        })
    }
}

struct Ciphers {
    left: Aes128,
    right: Aes128,
    convert: Aes128,
}

impl Ciphers {
    fn new() -> Self {
        Ciphers {
            left: aes128(&DPF_LEFT_KEY),
            right: aes128(&DPF_RIGHT_KEY),
            convert: aes128(&DPF_CONVERT_KEY),
        }
    }
}

fn xor16(a: &[u8; 16], b: &[u8; 16]) -> [u8; 16] {
    let mut out = [0u8; 16];
    for i in 0..16 {
        out[i] = a[i] ^ b[i];
    }
    out
}

fn bit_of(x: u64, level: usize, log_n: u32) -> u8 {
    ((x >> (log_n as usize - 1 - level)) & 1) as u8
}

/// Generates the two keys of a point function with value vector `beta` at
/// point `alpha` over a domain of `log_n` bits.
pub fn gen(alpha: u64, beta: &[Element], log_n: u32, xof: &mut Xof) -> Result<(Key, Key)> {
    if log_n == 0 || log_n > 63 {
        return Err(Error::InvalidInput(format!(
            "domain bit length {log_n} out of range"
        )));
    }
    if alpha >= 1u64 << log_n {
        return Err(Error::InvalidInput(format!(
            "alpha {alpha} outside domain of {log_n} bits"
        )));
    }
    if beta.is_empty() {
        return Err(Error::InvalidInput("empty beta vector".into()));
    }

    let ciphers = Ciphers::new();

    let mut s_a = xof.seed16();
    let mut s_b = xof.seed16();
    s_a[15] &= 0xfe;
    s_b[15] &= 0xfe;
    let s_init_a = s_a;
    let s_init_b = s_b;
    let mut t_a = 0u8;
    let mut t_b = 1u8;

    let mut cw = Vec::with_capacity(log_n as usize);

    for i in 0..log_n as usize {
        let (sl_a, tl_a, sr_a, tr_a) = expand_seed(&ciphers.left, &ciphers.right, &s_a);
        let (sl_b, tl_b, sr_b, tr_b) = expand_seed(&ciphers.left, &ciphers.right, &s_b);

        let keep = bit_of(alpha, i, log_n);

        // The off-path children must cancel, so the seed mask is their XOR;
        // the on-path control bits are arranged to diverge.
        let (s_lose_a, s_lose_b) = if keep == 1 {
            (&sl_a, &sl_b)
        } else {
            (&sr_a, &sr_b)
        };
        let s_cw = xor16(s_lose_a, s_lose_b);
        let t_l_cw = tl_a ^ tl_b ^ keep ^ 1;
        let t_r_cw = tr_a ^ tr_b ^ keep;

        let (s_keep_a, t_keep_a, s_keep_b, t_keep_b) = if keep == 1 {
            (sr_a, tr_a, sr_b, tr_b)
        } else {
            (sl_a, tl_a, sl_b, tl_b)
        };
        let t_keep_cw = if keep == 1 { t_r_cw } else { t_l_cw };

        s_a = if t_a == 1 {
            xor16(&s_keep_a, &s_cw)
        } else {
            s_keep_a
        };
        s_b = if t_b == 1 {
            xor16(&s_keep_b, &s_cw)
        } else {
            s_keep_b
        };
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

    let conv_a = convert_elements(&ciphers.convert, &s_a, beta.len());
    let conv_b = convert_elements(&ciphers.convert, &s_b, beta.len());

    let mut final_cw = Vec::with_capacity(beta.len());
    for j in 0..beta.len() {
        let mut v = beta[j] - conv_a[j] + conv_b[j];
        if t_b == 1 {
            v = -v;
        }
        final_cw.push(v);
    }

    let key_a = Key {
        s_init: s_init_a,
        t_init: 0,
        cw: cw.clone(),
        final_cw: final_cw.clone(),
    };
    let key_b = Key {
        s_init: s_init_b,
        t_init: 1,
        cw,
        final_cw,
    };

    Ok((key_a, key_b))
}

fn leaf_output(ciphers: &Ciphers, key: &Key, party: u8, s: &[u8; 16], t: u8) -> Vec<Element> {
    let conv = convert_elements(&ciphers.convert, s, key.final_cw.len());
    conv.into_iter()
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
        .collect()
}

/// Evaluates one party's share of the point function at `x`. Total on the
/// full domain; `x` bits above `log_n` are ignored by masking.
pub fn eval(party: u8, key: &Key, x: u64, log_n: u32) -> Vec<Element> {
    let ciphers = Ciphers::new();
    let x = x & ((1u64 << log_n) - 1);

    let mut s = key.s_init;
    let mut t = key.t_init;

    for (i, cw) in key.cw.iter().enumerate() {
        let (sl, tl, sr, tr) = expand_seed(&ciphers.left, &ciphers.right, &s);
        let bit = bit_of(x, i, log_n);
        let (mut s_next, mut t_next) = if bit == 1 { (sr, tr) } else { (sl, tl) };
        if t == 1 {
            s_next = xor16(&s_next, &cw.s);
            t_next ^= if bit == 1 { cw.t_r } else { cw.t_l };
        }
        s = s_next;
        t = t_next;
    }

    leaf_output(&ciphers, key, party, &s, t)
}

/// Evaluates the whole domain in level order and returns one output vector
/// per point. `num_points` bounds the number of leaves converted (the tree is
/// still fully expanded), matching a database narrower than 2^log_n.
pub fn eval_full(party: u8, key: &Key, log_n: u32, num_points: usize) -> Vec<Vec<Element>> {
    let ciphers = Ciphers::new();
    let total = 1usize << log_n;
    let wanted = num_points.min(total);

    let mut nodes: Vec<([u8; 16], u8)> = vec![(key.s_init, key.t_init)];
    for cw in &key.cw {
        let mut next = Vec::with_capacity(nodes.len() * 2);
        for (s, t) in &nodes {
            let (mut sl, mut tl, mut sr, mut tr) = expand_seed(&ciphers.left, &ciphers.right, s);
            if *t == 1 {
                sl = xor16(&sl, &cw.s);
                sr = xor16(&sr, &cw.s);
                tl ^= cw.t_l;
                tr ^= cw.t_r;
            }
            next.push((sl, tl));
            next.push((sr, tr));
        }
        nodes = next;
    }

    nodes
        .iter()
        .take(wanted)
        .map(|(s, t)| leaf_output(&ciphers, key, party, s, *t))
        .collect()
}

/// Full-domain evaluation into a caller-owned row-major buffer:
/// `out[col * slots + slot]` where `slots == final_cw.len()`. The buffer
/// length fixes the number of columns converted.
pub fn eval_full_flatten(party: u8, key: &Key, log_n: u32, out: &mut [Element]) {
    let slots = key.final_cw.len();
    debug_assert!(slots > 0);
    debug_assert_eq!(out.len() % slots, 0);
    let cols = out.len() / slots;

    for (col, values) in eval_full(party, key, log_n, cols).into_iter().enumerate() {
        out[col * slots..(col + 1) * slots].copy_from_slice(&values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prg::Xof;

    fn beta_pair() -> Vec<Element> {
        vec![Element::from_u32(7613), Element::from_u32(991)]
    }

    #[test]
    fn test_eval_point_function() {
        let mut xof = Xof::new(b"dpf eval");
        let log_n = 8;
        let alpha = 123u64;
        let beta = beta_pair();

        let (ka, kb) = gen(alpha, &beta, log_n, &mut xof).unwrap();

        for x in 0..(1u64 << log_n) {
            let out0 = eval(0, &ka, x, log_n);
            let out1 = eval(1, &kb, x, log_n);
            let sum: Vec<Element> = out0.iter().zip(&out1).map(|(&a, &b)| a + b).collect();

            if x == alpha {
                assert_eq!(sum, beta, "wrong value at alpha");
            } else {
                assert!(sum.iter().all(Element::is_zero), "nonzero at {x}");
            }
        }
    }

    #[test]
    fn test_eval_full_matches_eval() {
        let mut xof = Xof::new(b"dpf full");
        let log_n = 9;
        let alpha = 123u64;
        let beta = beta_pair();

        let (ka, kb) = gen(alpha, &beta, log_n, &mut xof).unwrap();

        for (party, key) in [(0u8, &ka), (1u8, &kb)] {
            let full = eval_full(party, key, log_n, 1 << log_n);
            for x in 0..(1u64 << log_n) {
                assert_eq!(full[x as usize], eval(party, key, x, log_n));
            }
        }
    }

    #[test]
    fn test_eval_full_short_domain() {
        let mut xof = Xof::new(b"dpf short");
        let log_n = 2;
        let alpha = 2u64;
        let beta = beta_pair();

        let (ka, kb) = gen(alpha, &beta, log_n, &mut xof).unwrap();
        let full_a = eval_full(0, &ka, log_n, 4);
        let full_b = eval_full(1, &kb, log_n, 4);

        for x in 0..4usize {
            let sum: Vec<Element> = full_a[x]
                .iter()
                .zip(&full_b[x])
                .map(|(&a, &b)| a + b)
                .collect();
            if x as u64 == alpha {
                assert_eq!(sum, beta);
            } else {
                assert!(sum.iter().all(Element::is_zero));
            }
        }
    }

    #[test]
    fn test_eval_full_partial_width() {
        let mut xof = Xof::new(b"dpf partial");
        let log_n = 9;
        let (ka, _) = gen(123, &beta_pair(), log_n, &mut xof).unwrap();

        let partial = eval_full(0, &ka, log_n, 278);
        assert_eq!(partial.len(), 278);
        for (x, values) in partial.iter().enumerate() {
            assert_eq!(*values, eval(0, &ka, x as u64, log_n));
        }
    }

    #[test]
    fn test_eval_full_flatten_layout() {
        let mut xof = Xof::new(b"dpf flatten");
        let log_n = 6;
        let beta = beta_pair();
        let (ka, _) = gen(11, &beta, log_n, &mut xof).unwrap();

        let cols = 40;
        let mut flat = vec![Element::ZERO; cols * beta.len()];
        eval_full_flatten(0, &ka, log_n, &mut flat);

        for col in 0..cols {
            let values = eval(0, &ka, col as u64, log_n);
            assert_eq!(&flat[col * beta.len()..(col + 1) * beta.len()], &values[..]);
        }
    }

    #[test]
    fn test_key_wire_roundtrip() {
        let mut xof = Xof::new(b"dpf codec");
        let (ka, kb) = gen(42, &beta_pair(), 7, &mut xof).unwrap();

        assert_eq!(Key::decode(&ka.encode()).unwrap(), ka);
        assert_eq!(Key::decode(&kb.encode()).unwrap(), kb);
        assert!(Key::decode(&ka.encode()[..30]).is_err());
    }

    #[test]
    fn test_gen_rejects_alpha_out_of_domain() {
        let mut xof = Xof::new(b"dpf bad alpha");
        let err = gen(1 << 5, &beta_pair(), 5, &mut xof).unwrap_err();
        assert!(matches!(err, crate::error::Error::InvalidInput(_)));
    }

    #[test]
    fn test_gen_rejects_empty_beta() {
        let mut xof = Xof::new(b"dpf empty beta");
        assert!(gen(0, &[], 4, &mut xof).is_err());
    }
}
