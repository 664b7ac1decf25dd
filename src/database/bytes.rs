//! Byte-oriented databases for the XOR-based PIR family.
//!
//! Blocks are flat byte slices in row-major layout. The Merkle variant
//! prefixes every block with its authentication path so a block and its
//! proof travel together through the XOR reconstruction.

use tracing::debug;

use crate::database::keyvalue::{make_hash_table, pad_block, Record};
use crate::database::merkle::MerkleTree;
use crate::database::{Info, MerkleInfo};
use crate::error::{Error, Result};
use crate::params::Primitive;
use crate::prg::Xof;

/// Byte units used when embedding key-value buckets into byte blocks.
const BYTE_EMBED_UNIT: usize = 16;

/// A database of byte blocks.
#[derive(Debug, Clone)]
pub struct BytesDb {
    pub info: Info,
    pub entries: Vec<u8>,
}

impl BytesDb {
    /// Random database: `db_len_bits` bits of payload arranged into
    /// `num_rows` rows of `block_len`-byte blocks.
    pub fn create_random_bytes(
        xof: &mut Xof,
        db_len_bits: usize,
        num_rows: usize,
        block_len: usize,
    ) -> Result<BytesDb> {
        let (num_rows, num_columns) = layout(db_len_bits, num_rows, block_len)?;
        let mut entries = vec![0u8; num_rows * num_columns * block_len];
        xof.fill(&mut entries);

        Ok(BytesDb {
            info: Info {
                num_rows,
                num_columns,
                block_size: block_len,
                pir_type: Primitive::PirClassic,
                merkle: None,
            },
            entries,
        })
    }

    /// Random Merkle-authenticated database. Payloads are generated as in
    /// [`BytesDb::create_random_bytes`], then every block is prefixed with
    /// its authentication path and the root is published in the info.
    pub fn create_random_merkle(
        xof: &mut Xof,
        db_len_bits: usize,
        num_rows: usize,
        block_len: usize,
    ) -> Result<BytesDb> {
        let plain = BytesDb::create_random_bytes(xof, db_len_bits, num_rows, block_len)?;
        plain.into_merkle()
    }

    /// Hash-table embedding of records into byte blocks, 16-byte units.
    pub fn create_keys_bytes(mut records: Vec<Record>, rebalanced: bool) -> Result<BytesDb> {
        if records.is_empty() {
            return Err(Error::InvalidInput("no records to embed".into()));
        }
        let (num_blocks, table) = make_hash_table(&mut records, rebalanced);

        let max_bytes = table.values().map(Vec::len).max().unwrap_or(0) + 1;
        let block_len = max_bytes.div_ceil(BYTE_EMBED_UNIT) * BYTE_EMBED_UNIT;
        let (num_rows, num_columns) = if rebalanced {
            let side = (num_blocks as f64).sqrt() as usize;
            (side, side)
        } else {
            (1, num_blocks)
        };
        debug!(num_blocks, block_len, "embedding key records into byte database");

        let mut entries = vec![0u8; num_rows * num_columns * block_len];
        for (&bucket, value) in table.iter() {
            let padded = pad_block(value, BYTE_EMBED_UNIT);
            entries[bucket * block_len..bucket * block_len + padded.len()]
                .copy_from_slice(&padded);
        }

        Ok(BytesDb {
            info: Info {
                num_rows,
                num_columns,
                block_size: block_len,
                pir_type: Primitive::PirClassic,
                merkle: None,
            },
            entries,
        })
    }

    /// Rebuilds this database with Merkle authentication: each stored block
    /// becomes `path ‖ payload` and the info carries the root.
    pub fn into_merkle(self) -> Result<BytesDb> {
        let payload_len = self.info.block_size;
        let num_blocks = self.info.num_rows * self.info.num_columns;

        let tree = MerkleTree::build(self.entries.chunks_exact(payload_len));
        let proof_len = tree.proof_len();
        let stored_len = proof_len + payload_len;

        let mut entries = vec![0u8; num_blocks * stored_len];
        for i in 0..num_blocks {
            let out = &mut entries[i * stored_len..(i + 1) * stored_len];
            out[..proof_len].copy_from_slice(&tree.proof(i));
            out[proof_len..]
                .copy_from_slice(&self.entries[i * payload_len..(i + 1) * payload_len]);
        }
        debug!(num_blocks, proof_len, root = ?tree.root(), "built merkle database");

        Ok(BytesDb {
            info: Info {
                num_rows: self.info.num_rows,
                num_columns: self.info.num_columns,
                block_size: stored_len,
                pir_type: Primitive::PirMerkle,
                merkle: Some(MerkleInfo {
                    root: tree.root(),
                    proof_len,
                }),
            },
            entries,
        })
    }

    /// The stored block (including any proof prefix) at a row and column.
    pub fn block(&self, row: usize, column: usize) -> &[u8] {
        let start = (row * self.info.num_columns + column) * self.info.block_size;
        &self.entries[start..start + self.info.block_size]
    }

    /// Mutable access, used by tests to model a corrupted replica.
    pub fn block_mut(&mut self, row: usize, column: usize) -> &mut [u8] {
        let start = (row * self.info.num_columns + column) * self.info.block_size;
        &mut self.entries[start..start + self.info.block_size]
    }
}

fn layout(db_len_bits: usize, num_rows: usize, block_len: usize) -> Result<(usize, usize)> {
    if num_rows == 0 || block_len == 0 {
        return Err(Error::InvalidInput("empty database geometry".into()));
    }
    let num_blocks = db_len_bits / (8 * block_len);
    if num_blocks == 0 || num_blocks % num_rows != 0 {
        return Err(Error::InvalidInput(format!(
            "{db_len_bits} bits do not fill {num_rows} rows of {block_len}-byte blocks"
        )));
    }
    Ok((num_rows, num_blocks / num_rows))
}
