//! Predicate descriptors and deterministic wire encodings.
//!
//! A predicate query names a record attribute, how many bytes of it to match
//! from the start and/or the end, an optional conjunction over a second
//! attribute, and the aggregate to compute over matching rows. The concrete
//! bytes being matched never appear in the descriptor: they are folded into
//! the FSS keys, so servers learn the shape of the query but not its
//! content.
//!
//! All encodings are length-prefixed little-endian and fully deterministic;
//! malformed input decodes to `InvalidInput`.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::database::Record;
use crate::error::{Error, Result};
use crate::field::Element;
use crate::fss::{self, bytes_to_bits};

/// Record attribute a predicate matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    UserId,
    Email,
    CreationTime,
    PubKeyAlgo,
}

impl Target {
    fn from_u8(v: u8) -> Result<Target> {
        match v {
            0 => Ok(Target::UserId),
            1 => Ok(Target::Email),
            2 => Ok(Target::CreationTime),
            3 => Ok(Target::PubKeyAlgo),
            _ => Err(Error::InvalidInput(format!("unknown target {v}"))),
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Target::UserId => 0,
            Target::Email => 1,
            Target::CreationTime => 2,
            Target::PubKeyAlgo => 3,
        }
    }

    fn attribute_bytes(self, record: &Record) -> Vec<u8> {
        match self {
            Target::UserId => record.id.as_bytes().to_vec(),
            Target::Email => record.email.as_bytes().to_vec(),
            Target::CreationTime => record.creation_time.to_be_bytes().to_vec(),
            Target::PubKeyAlgo => vec![record.pub_key_algo],
        }
    }
}

/// Aggregate computed over the rows matching the predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregation {
    Count,
    Sum,
    Avg,
}

impl Aggregation {
    fn from_u8(v: u8) -> Result<Aggregation> {
        match v {
            0 => Ok(Aggregation::Count),
            1 => Ok(Aggregation::Sum),
            2 => Ok(Aggregation::Avg),
            _ => Err(Error::InvalidInput(format!("unknown aggregation {v}"))),
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Aggregation::Count => 0,
            Aggregation::Sum => 1,
            Aggregation::Avg => 2,
        }
    }
}

/// Conjunction clause over a second attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AndClause {
    pub target: Target,
    pub from_start: usize,
    pub from_end: usize,
}

/// The public shape of a predicate query. `from_start`/`from_end` count
/// attribute bytes; both zero means the full attribute is matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateInfo {
    pub target: Target,
    pub from_start: usize,
    pub from_end: usize,
    pub and: Option<AndClause>,
    pub agg: Aggregation,
}

/// Selects the matched byte window of an attribute. Attributes shorter than
/// the window are zero-extended, which cannot collide with textual match
/// material.
fn selected_bytes(attr: &[u8], from_start: usize, from_end: usize) -> Vec<u8> {
    if from_start == 0 && from_end == 0 {
        return attr.to_vec();
    }
    let mut out = Vec::with_capacity(from_start + from_end);
    for i in 0..from_start {
        out.push(attr.get(i).copied().unwrap_or(0));
    }
    for i in 0..from_end {
        let idx = attr.len() as isize - from_end as isize + i as isize;
        out.push(if idx >= 0 { attr[idx as usize] } else { 0 });
    }
    out
}

impl PredicateInfo {
    /// Number of bits an FSS input for this predicate must have.
    pub fn input_bit_len(&self) -> usize {
        let primary = if self.from_start + self.from_end > 0 {
            self.from_start + self.from_end
        } else {
            match self.target {
                Target::CreationTime => 4,
                Target::PubKeyAlgo => 1,
                // Full-width string matches must state their length.
                Target::UserId | Target::Email => 0,
            }
        };
        let and = self.and.map_or(0, |c| c.from_start + c.from_end);
        (primary + and) * 8
    }

    /// Builds the client-side input bits from the concrete match material.
    pub fn input_from(&self, primary: &[u8], and: Option<&[u8]>) -> Result<Vec<bool>> {
        if self.from_start + self.from_end > 0
            && primary.len() != self.from_start + self.from_end
        {
            return Err(Error::InvalidInput(format!(
                "match material of {} bytes for a window of {}",
                primary.len(),
                self.from_start + self.from_end
            )));
        }
        let mut bits = bytes_to_bits(primary);
        match (&self.and, and) {
            (Some(clause), Some(bytes)) => {
                if bytes.len() != clause.from_start + clause.from_end {
                    return Err(Error::InvalidInput(
                        "conjunction material does not fit its window".into(),
                    ));
                }
                bits.extend(bytes_to_bits(bytes));
            }
            (Some(_), None) => {
                return Err(Error::InvalidInput(
                    "conjunction clause without match material".into(),
                ))
            }
            (None, Some(_)) => {
                return Err(Error::InvalidInput(
                    "match material without a conjunction clause".into(),
                ))
            }
            (None, None) => {}
        }
        Ok(bits)
    }

    /// Extracts the bits of a record that this predicate is matched against.
    /// Servers run this per row; the same logic builds the client input, so
    /// a row matches exactly when its bits equal the FSS input.
    pub fn target_bits(&self, record: &Record) -> Vec<bool> {
        let attr = self.target.attribute_bytes(record);
        let mut bits = bytes_to_bits(&selected_bytes(&attr, self.from_start, self.from_end));
        if let Some(clause) = &self.and {
            let attr = clause.target.attribute_bytes(record);
            bits.extend(bytes_to_bits(&selected_bytes(
                &attr,
                clause.from_start,
                clause.from_end,
            )));
        }
        bits
    }

    /// Deterministic descriptor encoding, embedded in the query frame.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(19);
        out.push(self.target.as_u8());
        let mut word = [0u8; 4];
        LittleEndian::write_u32(&mut word, self.from_start as u32);
        out.extend_from_slice(&word);
        LittleEndian::write_u32(&mut word, self.from_end as u32);
        out.extend_from_slice(&word);
        out.push(self.agg.as_u8());
        match &self.and {
            None => out.push(0),
            Some(clause) => {
                out.push(1);
                out.push(clause.target.as_u8());
                LittleEndian::write_u32(&mut word, clause.from_start as u32);
                out.extend_from_slice(&word);
                LittleEndian::write_u32(&mut word, clause.from_end as u32);
                out.extend_from_slice(&word);
            }
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<PredicateInfo> {
        let malformed = || Error::InvalidInput("malformed predicate descriptor".into());
        if bytes.len() < 11 {
            return Err(malformed());
        }
        let target = Target::from_u8(bytes[0])?;
        let from_start = LittleEndian::read_u32(&bytes[1..5]) as usize;
        let from_end = LittleEndian::read_u32(&bytes[5..9]) as usize;
        let agg = Aggregation::from_u8(bytes[9])?;
        let and = match bytes[10] {
            0 => {
                if bytes.len() != 11 {
                    return Err(malformed());
                }
                None
            }
            1 => {
                if bytes.len() != 20 {
                    return Err(malformed());
                }
                Some(AndClause {
                    target: Target::from_u8(bytes[11])?,
                    from_start: LittleEndian::read_u32(&bytes[12..16]) as usize,
                    from_end: LittleEndian::read_u32(&bytes[16..20]) as usize,
                })
            }
            _ => return Err(malformed()),
        };
        Ok(PredicateInfo {
            target,
            from_start,
            from_end,
            and,
            agg,
        })
    }
}

/// A decoded predicate query as the client emits it: descriptor plus the
/// concrete input bits folded into the FSS keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFss {
    pub info: PredicateInfo,
    pub input: Vec<bool>,
}

impl ClientFss {
    /// Suffix match, e.g. all emails ending in a domain.
    pub fn match_suffix(target: Target, suffix: &[u8], agg: Aggregation) -> Result<ClientFss> {
        let info = PredicateInfo {
            target,
            from_start: 0,
            from_end: suffix.len(),
            and: None,
            agg,
        };
        let input = info.input_from(suffix, None)?;
        Ok(ClientFss { info, input })
    }

    /// Prefix match, e.g. creation times within a coarse epoch.
    pub fn match_prefix(target: Target, prefix: &[u8], agg: Aggregation) -> Result<ClientFss> {
        let info = PredicateInfo {
            target,
            from_start: prefix.len(),
            from_end: 0,
            and: None,
            agg,
        };
        let input = info.input_from(prefix, None)?;
        Ok(ClientFss { info, input })
    }

    /// `| info_len:u32 | info | n_bits:u32 | packed bits |`.
    pub fn encode(&self) -> Vec<u8> {
        let info = self.info.encode();
        let mut out = Vec::with_capacity(8 + info.len() + self.input.len() / 8 + 1);
        let mut word = [0u8; 4];
        LittleEndian::write_u32(&mut word, info.len() as u32);
        out.extend_from_slice(&word);
        out.extend_from_slice(&info);
        LittleEndian::write_u32(&mut word, self.input.len() as u32);
        out.extend_from_slice(&word);
        out.extend_from_slice(&pack_bits(&self.input));
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<ClientFss> {
        let malformed = || Error::InvalidInput("malformed predicate query".into());
        if bytes.len() < 4 {
            return Err(malformed());
        }
        let info_len = LittleEndian::read_u32(&bytes[..4]) as usize;
        let info_bytes = bytes.get(4..4 + info_len).ok_or_else(malformed)?;
        let info = PredicateInfo::decode(info_bytes)?;

        let rest = &bytes[4 + info_len..];
        if rest.len() < 4 {
            return Err(malformed());
        }
        let n_bits = LittleEndian::read_u32(&rest[..4]) as usize;
        let input = unpack_bits(&rest[4..], n_bits)?;
        Ok(ClientFss { info, input })
    }
}

/// One server's share of a predicate query: the descriptor and that
/// server's FSS key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FssQuery {
    pub info: PredicateInfo,
    pub key: fss::Key,
}

impl FssQuery {
    /// `| info_len:u32 | info | key |` with the key encoded per
    /// [`fss::Key::encode`].
    pub fn encode(&self) -> Vec<u8> {
        let info = self.info.encode();
        let mut out = Vec::with_capacity(4 + info.len());
        let mut word = [0u8; 4];
        LittleEndian::write_u32(&mut word, info.len() as u32);
        out.extend_from_slice(&word);
        out.extend_from_slice(&info);
        out.extend_from_slice(&self.key.encode());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<FssQuery> {
        if bytes.len() < 4 {
            return Err(Error::InvalidInput("truncated query frame".into()));
        }
        let info_len = LittleEndian::read_u32(&bytes[..4]) as usize;
        let info_bytes = bytes
            .get(4..4 + info_len)
            .ok_or_else(|| Error::InvalidInput("truncated query frame".into()))?;
        Ok(FssQuery {
            info: PredicateInfo::decode(info_bytes)?,
            key: fss::Key::decode(&bytes[4 + info_len..])?,
        })
    }
}

/// Length-prefixed encoding of a field-element vector, 4 bytes per element.
pub fn encode_element_vector(elements: &[Element]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + elements.len() * 4);
    let mut word = [0u8; 4];
    LittleEndian::write_u32(&mut word, elements.len() as u32);
    out.extend_from_slice(&word);
    for e in elements {
        out.extend_from_slice(&e.to_bytes());
    }
    out
}

pub fn decode_element_vector(bytes: &[u8]) -> Result<Vec<Element>> {
    let malformed = || Error::InvalidInput("malformed element vector".into());
    if bytes.len() < 4 {
        return Err(malformed());
    }
    let n = LittleEndian::read_u32(&bytes[..4]) as usize;
    if bytes.len() != 4 + n * 4 {
        return Err(malformed());
    }
    Ok(bytes[4..]
        .chunks_exact(4)
        .map(|c| Element::from_bytes(c.try_into().expect("4-byte element")))
        .collect())
}

/// Length-prefixed encoding of a GF(2^128) vector, 16 bytes per element.
pub fn encode_gf_vector(elements: &[crate::field::Gf128]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + elements.len() * 16);
    let mut word = [0u8; 4];
    LittleEndian::write_u32(&mut word, elements.len() as u32);
    out.extend_from_slice(&word);
    for e in elements {
        out.extend_from_slice(&e.to_bytes());
    }
    out
}

pub fn decode_gf_vector(bytes: &[u8]) -> Result<Vec<crate::field::Gf128>> {
    let malformed = || Error::InvalidInput("malformed gf vector".into());
    if bytes.len() < 4 {
        return Err(malformed());
    }
    let n = LittleEndian::read_u32(&bytes[..4]) as usize;
    if bytes.len() != 4 + n * 16 {
        return Err(malformed());
    }
    Ok(bytes[4..]
        .chunks_exact(16)
        .map(|c| crate::field::Gf128::from_bytes(c.try_into().expect("16-byte element")))
        .collect())
}

/// Packs a query bitmask into bytes, low bit of each byte first.
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut out = vec![0u8; bits.len().div_ceil(8)];
    for (i, &b) in bits.iter().enumerate() {
        if b {
            out[i / 8] |= 1 << (i % 8);
        }
    }
    out
}

pub fn unpack_bits(bytes: &[u8], n: usize) -> Result<Vec<bool>> {
    if bytes.len() != n.div_ceil(8) {
        return Err(Error::InvalidInput(format!(
            "bitmask of {} bytes cannot hold {n} bits",
            bytes.len()
        )));
    }
    Ok((0..n).map(|i| (bytes[i / 8] >> (i % 8)) & 1 == 1).collect())
}
