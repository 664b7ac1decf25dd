//! Key-value embedding: records, hash-table bucketing and block padding.
//!
//! Records model the searchable directory entries (user id, email, creation
//! time, public-key algorithm) that predicate queries match on. For
//! retrieval-by-id the records are bucketed into a hash table of
//! `⌈0.1 · |records|⌉` entries; every server derives the identical table
//! because records are sorted by id first and the bucket hash is
//! deterministic.

use std::collections::BTreeMap;

use blake2::{Blake2b512, Digest};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::prg::Xof;

/// Hash-table length as a fraction of the record count.
pub const KEYS_TO_TABLE_RATIO: f64 = 0.1;

/// One directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub email: String,
    /// Creation timestamp, seconds since the epoch.
    pub creation_time: u32,
    /// OpenPGP-style algorithm identifier.
    pub pub_key_algo: u8,
    /// Numeric attribute aggregated by SUM/AVG queries.
    pub value: u32,
    /// Opaque payload stored in the retrieval database.
    pub packet: Vec<u8>,
}

impl Record {
    /// Length-prefixed packet encoding used when buckets are concatenated:
    /// `| total:u16le | id_len:u8 | id | email_len:u8 | email | time:u32le | algo:u8 | value:u32le |`.
    pub fn encode_packet(&self) -> Vec<u8> {
        let body_len = 1 + self.id.len() + 1 + self.email.len() + 4 + 1 + 4;
        let mut out = Vec::with_capacity(2 + body_len);
        out.extend_from_slice(&(body_len as u16).to_le_bytes());
        out.push(self.id.len() as u8);
        out.extend_from_slice(self.id.as_bytes());
        out.push(self.email.len() as u8);
        out.extend_from_slice(self.email.as_bytes());
        out.extend_from_slice(&self.creation_time.to_le_bytes());
        out.push(self.pub_key_algo);
        out.extend_from_slice(&self.value.to_le_bytes());
        out
    }

    fn decode_packet(bytes: &[u8]) -> Result<(Record, usize)> {
        let malformed = || Error::InvalidInput("malformed record packet".into());

        if bytes.len() < 2 {
            return Err(malformed());
        }
        let body_len = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
        let body = bytes.get(2..2 + body_len).ok_or_else(malformed)?;

        let id_len = *body.first().ok_or_else(malformed)? as usize;
        let id = body.get(1..1 + id_len).ok_or_else(malformed)?;
        let mut offset = 1 + id_len;
        let email_len = *body.get(offset).ok_or_else(malformed)? as usize;
        let email = body.get(offset + 1..offset + 1 + email_len).ok_or_else(malformed)?;
        offset += 1 + email_len;
        let rest = body.get(offset..offset + 9).ok_or_else(malformed)?;

        let record = Record {
            id: String::from_utf8(id.to_vec()).map_err(|_| malformed())?,
            email: String::from_utf8(email.to_vec()).map_err(|_| malformed())?,
            creation_time: u32::from_le_bytes(rest[..4].try_into().expect("4 bytes")),
            pub_key_algo: rest[4],
            value: u32::from_le_bytes(rest[5..9].try_into().expect("4 bytes")),
            packet: Vec::new(),
        };
        Ok((record, 2 + body_len))
    }

    /// Scans an unpadded bucket for the record with the given id.
    pub fn find_in_block(block: &[u8], id: &str) -> Result<Record> {
        let mut offset = 0;
        while offset < block.len() {
            let (record, consumed) = Record::decode_packet(&block[offset..])?;
            if record.id == id {
                return Ok(record);
            }
            offset += consumed;
        }
        Err(Error::InvalidInput(format!("id {id} not found in block")))
    }
}

/// Maps an identifier into [0, table_len) via the leading 32 bits of its
/// BLAKE2b digest. Deterministic, so replicas agree on every bucket.
pub fn hash_to_index(id: &str, table_len: usize) -> usize {
    let mut hasher = Blake2b512::new();
    hasher.update(id.as_bytes());
    let digest = hasher.finalize();
    let checksum = u32::from_be_bytes(digest[..4].try_into().expect("4 bytes"));
    checksum as usize % table_len
}

/// Raises `n` to the next perfect square, leaving exact squares alone.
pub fn increase_to_next_square(n: usize) -> usize {
    let root = (n as f64).sqrt();
    if root.fract() == 0.0 {
        n
    } else {
        let next = root.floor() as usize + 1;
        next * next
    }
}

/// Buckets records into the hash table. Records are sorted by id,
/// descending, so that every server ends up with an identical table; the
/// returned length counts empty buckets too.
pub fn make_hash_table(
    records: &mut [Record],
    rebalanced: bool,
) -> (usize, BTreeMap<usize, Vec<u8>>) {
    records.sort_by(|a, b| b.id.cmp(&a.id));

    let mut table_len = ((records.len() as f64 * KEYS_TO_TABLE_RATIO).ceil() as usize).max(1);
    if rebalanced {
        table_len = increase_to_next_square(table_len);
    }

    let mut table: BTreeMap<usize, Vec<u8>> = BTreeMap::new();
    for record in records.iter() {
        let bucket = hash_to_index(&record.id, table_len);
        let packet = if record.packet.is_empty() {
            record.encode_packet()
        } else {
            record.packet.clone()
        };
        table.entry(bucket).or_default().extend_from_slice(&packet);
    }
    debug!(
        records = records.len(),
        table_len,
        occupied = table.len(),
        "built hash table"
    );

    (table_len, table)
}

/// ISO/IEC 7816-4 padding: append 0x80, then zeros up to a multiple of
/// `unit`.
pub fn pad_block(block: &[u8], unit: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(block.len() + unit);
    out.extend_from_slice(block);
    out.push(0x80);
    while out.len() % unit != 0 {
        out.push(0);
    }
    out
}

/// Strips ISO/IEC 7816-4 padding: trailing zeros, then the 0x80 marker.
pub fn unpad_block(block: &[u8]) -> &[u8] {
    let mut end = block.len();
    while end > 0 && block[end - 1] == 0 {
        end -= 1;
    }
    // The marker is always present on a properly padded block.
    if end > 0 && block[end - 1] == 0x80 {
        &block[..end - 1]
    } else {
        &block[..end]
    }
}

const EMAIL_DOMAINS: &[&str] = &["epfl.ch", "example.org", "ietf.org", "mit.edu"];
const PUB_KEY_ALGOS: &[u8] = &[1, 17, 19, 22];

/// Synthesizes `n` random records for benchmark databases.
pub fn random_records(xof: &mut Xof, n: usize) -> Vec<Record> {
    (0..n)
        .map(|_| {
            let id_bytes = xof.seed16();
            let id = id_bytes[..8]
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<String>();
            let mut pick = [0u8; 6];
            xof.fill(&mut pick);
            let email = format!(
                "user{:02x}{:02x}@{}",
                pick[0],
                pick[1],
                EMAIL_DOMAINS[pick[2] as usize % EMAIL_DOMAINS.len()]
            );
            let record = Record {
                id,
                email,
                creation_time: u32::from_le_bytes([pick[3], pick[4], pick[5], 0]),
                pub_key_algo: PUB_KEY_ALGOS[pick[0] as usize % PUB_KEY_ALGOS.len()],
                value: pick[1] as u32 + 1,
                packet: Vec::new(),
            };
            Record {
                packet: record.encode_packet(),
                ..record
            }
        })
        .collect()
}
