//! Multi-party equality FSS with 32-bit correction words.
//!
//! The Boyle–Gilboa–Ishai seed-grid scheme: the domain is laid out as a
//! ν × μ grid and every row carries 2^(p−1) PRG seeds plus one μ-wide
//! correction word of [`CW_BYTES`]-byte cells. Each party receives per-row
//! selection bits over the seed slots and over the correction word; the
//! selections are parity-balanced so that XORing all parties' evaluations
//! cancels everything except the programmed point, where the correction word
//! contributes `beta`.
//!
//! Shares combine by XOR. Privacy holds against any single server, the
//! collusion model of the surrounding protocol.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::prg::Xof;

/// Correction-word cell width in bytes (32-bit cells).
pub const CW_BYTES: usize = 4;

/// Per-row share material for one party.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowShare {
    /// Which of the row's seed slots this party evaluates.
    pub select: Vec<bool>,
    /// The seeds for the selected slots, in slot order.
    pub seeds: Vec<[u8; 16]>,
    /// Whether this party folds the row's correction word into its share.
    pub cw_select: bool,
}

/// One party's multi-party FSS key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiPartyKey {
    pub num_parties: u8,
    pub num_bits: u32,
    /// Grid width; `nu = 2^num_bits / mu` rows.
    pub mu: usize,
    /// Per-row correction words, identical across parties.
    pub cw: Vec<Vec<u32>>,
    /// Per-row selections and seeds for this party.
    pub rows: Vec<RowShare>,
}

fn grid_dims(num_bits: u32) -> (usize, usize) {
    let mu_bits = num_bits.div_ceil(2);
    let mu = 1usize << mu_bits;
    let nu = 1usize << (num_bits - mu_bits);
    (nu, mu)
}

fn prg_row(seed: &[u8; 16], mu: usize) -> Vec<u32> {
    let mut xof = Xof::new(seed);
    let mut buf = vec![0u8; mu * CW_BYTES];
    xof.fill(&mut buf);
    buf.chunks_exact(CW_BYTES)
        .map(|c| u32::from_le_bytes(c.try_into().expect("4-byte cell")))
        .collect()
}

fn random_bits(n: usize, xof: &mut Xof) -> Vec<bool> {
    let mut buf = vec![0u8; n];
    xof.fill(&mut buf);
    buf.into_iter().map(|b| b & 1 == 1).collect()
}

/// Generates one key per party for the point function that is `beta` at
/// `alpha` and zero elsewhere on [0, 2^num_bits), under XOR reconstruction.
pub fn gen_multi_party(
    alpha: u64,
    beta: u32,
    num_bits: u32,
    num_parties: usize,
    xof: &mut Xof,
) -> Result<Vec<MultiPartyKey>> {
    if !(2..=8).contains(&num_parties) {
        return Err(Error::InvalidInput(format!(
            "unsupported party count {num_parties}"
        )));
    }
    if num_bits == 0 || num_bits > 40 {
        return Err(Error::InvalidInput(format!(
            "domain bit length {num_bits} out of range"
        )));
    }
    if alpha >= 1u64 << num_bits {
        return Err(Error::InvalidInput(format!(
            "alpha {alpha} outside domain of {num_bits} bits"
        )));
    }

    let (nu, mu) = grid_dims(num_bits);
    let q = 1usize << (num_parties - 1);
    let gamma_star = (alpha as usize) / mu;
    let delta_star = (alpha as usize) % mu;

    let mut keys: Vec<MultiPartyKey> = (0..num_parties)
        .map(|_| MultiPartyKey {
            num_parties: num_parties as u8,
            num_bits,
            mu,
            cw: Vec::with_capacity(nu),
            rows: Vec::with_capacity(nu),
        })
        .collect();

    for gamma in 0..nu {
        let seeds: Vec<[u8; 16]> = (0..q).map(|_| xof.seed16()).collect();
        let special = gamma == gamma_star;

        // Seed selections: parties 0..p-1 draw uniformly, the last party
        // completes the per-slot parity. On the special row the parity of
        // every slot is flipped to odd, so the XOR of all parties covers
        // each seed exactly once (mod 2). Re-draw if any single party would
        // end up holding the full seed set of the special row.
        let selects = loop {
            let mut selects: Vec<Vec<bool>> = (0..num_parties - 1)
                .map(|_| random_bits(q, xof))
                .collect();
            let mut last = vec![special; q];
            for sel in &selects {
                for (l, &s) in last.iter_mut().zip(sel) {
                    *l ^= s;
                }
            }
            selects.push(last);
            if !special || !selects.iter().any(|sel| sel.iter().all(|&b| b)) {
                break selects;
            }
        };

        // Correction-word selections follow the same parity rule.
        let mut cw_selects: Vec<bool> = (0..num_parties - 1)
            .map(|_| {
                let mut b = [0u8; 1];
                xof.fill(&mut b);
                b[0] & 1 == 1
            })
            .collect();
        let parity = cw_selects.iter().filter(|&&b| b).count() % 2 == 1;
        cw_selects.push(parity != special);

        let cw_row = if special {
            let mut row = vec![0u32; mu];
            for seed in &seeds {
                for (cell, v) in row.iter_mut().zip(prg_row(seed, mu)) {
                    *cell ^= v;
                }
            }
            row[delta_star] ^= beta;
            row
        } else {
            let mut buf = vec![0u8; mu * CW_BYTES];
            xof.fill(&mut buf);
            buf.chunks_exact(CW_BYTES)
                .map(|c| u32::from_le_bytes(c.try_into().expect("4-byte cell")))
                .collect()
        };

        for (party, key) in keys.iter_mut().enumerate() {
            let select = selects[party].clone();
            let held: Vec<[u8; 16]> = select
                .iter()
                .zip(&seeds)
                .filter(|(&sel, _)| sel)
                .map(|(_, &s)| s)
                .collect();
            key.cw.push(cw_row.clone());
            key.rows.push(RowShare {
                select,
                seeds: held,
                cw_select: cw_selects[party],
            });
        }
    }

    Ok(keys)
}

/// Evaluates one party's XOR share at `x`.
pub fn eval_multi_party(key: &MultiPartyKey, x: u64) -> Result<u32> {
    if x >= 1u64 << key.num_bits {
        return Err(Error::InvalidInput(format!(
            "evaluation point {x} outside domain of {} bits",
            key.num_bits
        )));
    }

    let gamma = (x as usize) / key.mu;
    let delta = (x as usize) % key.mu;
    let row = &key.rows[gamma];

    let mut share = 0u32;
    let mut held = row.seeds.iter();
    for &selected in &row.select {
        if selected {
            let seed = held
                .next()
                .ok_or_else(|| Error::Internal("seed share shorter than selection".into()))?;
            share ^= prg_row(seed, key.mu)[delta];
        }
    }
    if row.cw_select {
        share ^= key.cw[gamma][delta];
    }
    Ok(share)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prg::Xof;

    fn reconstruct(keys: &[MultiPartyKey], x: u64) -> u32 {
        keys.iter()
            .map(|k| eval_multi_party(k, x).unwrap())
            .fold(0, |acc, s| acc ^ s)
    }

    #[test]
    fn test_three_party_point_function() {
        let mut xof = Xof::new(b"mp 3 parties");
        let num_bits = 6;
        let alpha = 37u64;
        let beta = 0xdead_beef;

        let keys = gen_multi_party(alpha, beta, num_bits, 3, &mut xof).unwrap();
        assert_eq!(keys.len(), 3);

        for x in 0..(1u64 << num_bits) {
            let value = reconstruct(&keys, x);
            if x == alpha {
                assert_eq!(value, beta);
            } else {
                assert_eq!(value, 0, "nonzero at {x}");
            }
        }
    }

    #[test]
    fn test_four_party_point_function() {
        let mut xof = Xof::new(b"mp 4 parties");
        let num_bits = 5;
        let alpha = 19u64;
        let beta = 41;

        let keys = gen_multi_party(alpha, beta, num_bits, 4, &mut xof).unwrap();
        for x in 0..(1u64 << num_bits) {
            let expected = if x == alpha { beta } else { 0 };
            assert_eq!(reconstruct(&keys, x), expected);
        }
    }

    #[test]
    fn test_odd_bit_length_grid() {
        let mut xof = Xof::new(b"mp odd bits");
        let keys = gen_multi_party(5, 7, 3, 2, &mut xof).unwrap();
        for x in 0..8u64 {
            let expected = if x == 5 { 7 } else { 0 };
            assert_eq!(reconstruct(&keys, x), expected);
        }
    }

    #[test]
    fn test_invalid_inputs() {
        let mut xof = Xof::new(b"mp invalid");
        assert!(gen_multi_party(1 << 6, 1, 6, 3, &mut xof).is_err());
        assert!(gen_multi_party(0, 1, 6, 1, &mut xof).is_err());
        assert!(gen_multi_party(0, 1, 0, 3, &mut xof).is_err());

        let keys = gen_multi_party(0, 1, 4, 2, &mut xof).unwrap();
        assert!(eval_multi_party(&keys[0], 1 << 4).is_err());
    }
}
