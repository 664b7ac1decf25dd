//! Database representations the query families evaluate against.
//!
//! All databases are constructed once and never mutated; servers share
//! read-only views across worker threads. Three layouts exist:
//!
//! - [`FieldDb`] — blocks of F_p elements, optionally carrying the
//!   per-row [`Record`](crate::database::Record) metadata that predicate
//!   queries match on.
//! - [`BitDb`] — a packed bit vector for the single-bit GF(2^128) scheme.
//! - [`BytesDb`] — byte blocks for the XOR-based PIR family, with an
//!   optional Merkle-authenticated variant.

mod bytes;
mod keyvalue;
pub mod merkle;

pub use bytes::BytesDb;
pub use keyvalue::{
    hash_to_index, increase_to_next_square, make_hash_table, pad_block, random_records,
    unpad_block, Record, KEYS_TO_TABLE_RATIO,
};
pub use merkle::{proof_len_for, MerkleTree};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::field::Element;
use crate::params::Primitive;
use crate::prg::Xof;

/// Merkle commitment metadata published next to the database geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleInfo {
    /// Root over all blocks, row-major.
    pub root: [u8; 32],
    /// Length in bytes of the authentication-path prefix of every block.
    pub proof_len: usize,
}

/// The DB info message a server publishes on connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    pub num_rows: usize,
    pub num_columns: usize,
    /// Elements (or bytes) per block, including any proof prefix.
    pub block_size: usize,
    pub pir_type: Primitive,
    pub merkle: Option<MerkleInfo>,
}

impl Info {
    /// Cross-checks geometry between servers; replicas must agree before a
    /// client accepts any of them.
    pub fn matches(&self, other: &Info) -> bool {
        self.num_rows == other.num_rows
            && self.num_columns == other.num_columns
            && self.block_size == other.block_size
    }
}

/// A database of field-element blocks in row-major layout, with optional
/// per-row records for predicate queries.
#[derive(Debug, Clone)]
pub struct FieldDb {
    pub info: Info,
    pub entries: Vec<Element>,
    /// One record per logical row; empty for purely numeric databases.
    pub records: Vec<Record>,
}

impl FieldDb {
    /// All-zero database of the given geometry.
    pub fn create_zero(num_rows: usize, num_columns: usize, block_size: usize) -> Result<FieldDb> {
        if num_rows == 0 || num_columns == 0 || block_size == 0 {
            return Err(Error::InvalidInput("empty database geometry".into()));
        }
        Ok(FieldDb {
            info: Info {
                num_rows,
                num_columns,
                block_size,
                pir_type: Primitive::VpirIt,
                merkle: None,
            },
            entries: vec![Element::ZERO; num_rows * num_columns * block_size],
            records: Vec::new(),
        })
    }

    /// Random database for benchmarks and tests.
    pub fn create_random(
        xof: &mut Xof,
        num_rows: usize,
        num_columns: usize,
        block_size: usize,
    ) -> Result<FieldDb> {
        let mut db = FieldDb::create_zero(num_rows, num_columns, block_size)?;
        for e in db.entries.iter_mut() {
            *e = Element::set_random(xof);
        }
        Ok(db)
    }

    /// Builds the hash-table key database: records are bucketed by
    /// `hash_to_index`, each bucket's packets are concatenated, padded and
    /// embedded as field elements. `element_len` bytes feed each element and
    /// must stay below the field width so the embedding is lossless.
    pub fn create_keys_db(
        mut records: Vec<Record>,
        element_len: usize,
        rebalanced: bool,
    ) -> Result<FieldDb> {
        if element_len == 0 || element_len > 3 {
            return Err(Error::InvalidInput(format!(
                "element length {element_len} cannot embed losslessly in 32-bit field elements"
            )));
        }
        if records.is_empty() {
            return Err(Error::InvalidInput("no records to embed".into()));
        }

        let (num_blocks, table) = make_hash_table(&mut records, rebalanced);

        // +1 accounts for the 0x80 marker the padding always appends.
        let max_bytes = table.values().map(Vec::len).max().unwrap_or(0) + 1;
        let block_size = max_bytes.div_ceil(element_len);
        let (num_rows, num_columns) = if rebalanced {
            let side = (num_blocks as f64).sqrt() as usize;
            (side, side)
        } else {
            (1, num_blocks)
        };
        debug!(
            num_blocks,
            block_size, rebalanced, "embedding key records into field database"
        );

        let mut db = FieldDb::create_zero(num_rows, num_columns, block_size)?;
        db.info.pir_type = Primitive::VpirDpf;
        for (&bucket, value) in table.iter() {
            let padded = pad_block(value, element_len);
            let elements: Vec<Element> = padded
                .chunks(element_len)
                .map(|chunk| {
                    let mut word = [0u8; 4];
                    word[..chunk.len()].copy_from_slice(chunk);
                    Element::from_bytes(word)
                })
                .collect();
            for (m, &e) in elements.iter().enumerate().take(block_size) {
                db.set_entry(bucket * block_size + m, e);
            }
        }
        db.records = records;
        Ok(db)
    }

    /// Synthetic key database for benchmarks: `num_records` random records
    /// run through the same hash-table embedding as real key material.
    pub fn create_random_keys_db(xof: &mut Xof, num_records: usize) -> Result<FieldDb> {
        let records = random_records(xof, num_records);
        FieldDb::create_keys_db(records, 3, false)
    }

    /// Element count of the flattened database.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_entry(&self, index: usize) -> Element {
        self.entries[index]
    }

    pub fn set_entry(&mut self, index: usize, value: Element) {
        self.entries[index] = value;
    }

    /// The block at the given row and column.
    pub fn block(&self, row: usize, column: usize) -> &[Element] {
        let start = (row * self.info.num_columns + column) * self.info.block_size;
        &self.entries[start..start + self.info.block_size]
    }
}

/// A packed single-bit database for the GF(2^128) scheme.
#[derive(Debug, Clone)]
pub struct BitDb {
    pub info: Info,
    bits: Vec<u8>,
}

impl BitDb {
    /// Random bit database; `num_rows > 1` selects the rebalanced √N × √N
    /// layout.
    pub fn create_random_bits(xof: &mut Xof, num_rows: usize, num_columns: usize) -> Result<BitDb> {
        if num_rows == 0 || num_columns == 0 {
            return Err(Error::InvalidInput("empty database geometry".into()));
        }
        let total = num_rows * num_columns;
        let mut bits = vec![0u8; total.div_ceil(8)];
        xof.fill(&mut bits);
        Ok(BitDb {
            info: Info {
                num_rows,
                num_columns,
                block_size: 1,
                pir_type: Primitive::PirIt,
                merkle: None,
            },
            bits,
        })
    }

    pub fn len(&self) -> usize {
        self.info.num_rows * self.info.num_columns
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The bit at flat index `i`, row-major.
    pub fn get(&self, i: usize) -> bool {
        (self.bits[i / 8] >> (i % 8)) & 1 == 1
    }

    pub fn set(&mut self, i: usize, value: bool) {
        if value {
            self.bits[i / 8] |= 1 << (i % 8);
        } else {
            self.bits[i / 8] &= !(1 << (i % 8));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prg::Xof;

    #[test]
    fn test_field_db_geometry() {
        let mut xof = Xof::new(b"db geometry");
        let db = FieldDb::create_random(&mut xof, 4, 8, 3).unwrap();

        assert_eq!(db.len(), 4 * 8 * 3);
        assert_eq!(db.block(2, 5).len(), 3);
        assert_eq!(db.block(0, 0), &db.entries[..3]);
    }

    #[test]
    fn test_field_db_rejects_empty_geometry() {
        assert!(FieldDb::create_zero(0, 8, 1).is_err());
        assert!(FieldDb::create_zero(8, 8, 0).is_err());
    }

    #[test]
    fn test_keys_db_embeds_buckets() {
        let mut xof = Xof::new(b"keys db");
        let records = random_records(&mut xof, 50);
        let db = FieldDb::create_keys_db(records.clone(), 3, false).unwrap();

        assert_eq!(db.info.num_rows, 1);
        assert!(db.info.num_columns >= 1);
        // Each embedded bucket must reproduce its padded byte content.
        let mut sorted = records;
        let (_, table) = make_hash_table(&mut sorted, false);
        for (&bucket, value) in table.iter() {
            let padded = pad_block(value, 3);
            let block = db.block(0, bucket);
            for (chunk, &e) in padded.chunks(3).zip(block) {
                let mut word = [0u8; 4];
                word[..chunk.len()].copy_from_slice(chunk);
                assert_eq!(Element::from_bytes(word), e);
            }
        }
    }

    #[test]
    fn test_keys_db_rejects_wide_elements() {
        let mut xof = Xof::new(b"keys db wide");
        let records = random_records(&mut xof, 10);
        assert!(FieldDb::create_keys_db(records, 4, false).is_err());
    }

    #[test]
    fn test_bit_db_roundtrip() {
        let mut xof = Xof::new(b"bit db");
        let mut db = BitDb::create_random_bits(&mut xof, 1, 64).unwrap();

        db.set(17, true);
        assert!(db.get(17));
        db.set(17, false);
        assert!(!db.get(17));
    }

    #[test]
    fn test_info_matches_ignores_merkle() {
        let a = Info {
            num_rows: 2,
            num_columns: 4,
            block_size: 8,
            pir_type: Primitive::PirClassic,
            merkle: None,
        };
        let mut b = a.clone();
        b.merkle = Some(MerkleInfo {
            root: [0; 32],
            proof_len: 33,
        });
        assert!(a.matches(&b));
    }
}
