//! Binary SHA-256 Merkle tree over database blocks.
//!
//! Leaves are hashed with a 0x00 domain byte and inner nodes with 0x01.
//! The leaf count is padded to the next power of two so every block carries
//! an authentication path of identical length, which keeps block sizes
//! uniform after the path is prefixed to the payload.

use sha2::{Digest, Sha256};

/// Bytes per authentication-path step: one direction byte plus the sibling
/// hash.
const STEP_LEN: usize = 33;

/// Authentication-path length in bytes for a tree over `num_leaves` blocks.
pub fn proof_len_for(num_leaves: usize) -> usize {
    depth(num_leaves.next_power_of_two()) * STEP_LEN
}

fn depth(padded_leaves: usize) -> usize {
    padded_leaves.trailing_zeros() as usize
}

fn leaf_hash(block: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([0u8]);
    hasher.update(block);
    hasher.finalize().into()
}

fn node_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([1u8]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// A fully materialized tree; built once per database at startup.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// levels[0] holds the (padded) leaf hashes, the last level the root.
    levels: Vec<Vec<[u8; 32]>>,
}

impl MerkleTree {
    /// Builds the tree over blocks in row-major order.
    pub fn build<'a, I>(blocks: I) -> MerkleTree
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut leaves: Vec<[u8; 32]> = blocks.into_iter().map(leaf_hash).collect();
        assert!(!leaves.is_empty(), "merkle tree over zero blocks");

        let padded = leaves.len().next_power_of_two();
        leaves.resize(padded, leaf_hash(&[]));

        let mut levels = vec![leaves];
        while levels.last().expect("at least one level").len() > 1 {
            let prev = levels.last().expect("at least one level");
            let next: Vec<[u8; 32]> = prev
                .chunks_exact(2)
                .map(|pair| node_hash(&pair[0], &pair[1]))
                .collect();
            levels.push(next);
        }

        MerkleTree { levels }
    }

    pub fn root(&self) -> [u8; 32] {
        self.levels.last().expect("root level")[0]
    }

    /// The authentication path of the given leaf: per level a direction byte
    /// (1 when the sibling sits to the right) followed by the sibling hash.
    pub fn proof(&self, leaf: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(proof_len_for(self.levels[0].len()));
        let mut index = leaf;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_right = index % 2 == 0;
            let sibling = if sibling_right { index + 1 } else { index - 1 };
            out.push(sibling_right as u8);
            out.extend_from_slice(&level[sibling]);
            index /= 2;
        }
        out
    }

    pub fn proof_len(&self) -> usize {
        depth(self.levels[0].len()) * STEP_LEN
    }
}

/// Recomputes the root from a block payload and its authentication path.
pub fn verify(root: &[u8; 32], payload: &[u8], proof: &[u8]) -> bool {
    if proof.len() % STEP_LEN != 0 {
        return false;
    }
    let mut hash = leaf_hash(payload);
    for step in proof.chunks_exact(STEP_LEN) {
        let sibling: [u8; 32] = step[1..].try_into().expect("32-byte sibling");
        hash = if step[0] == 1 {
            node_hash(&hash, &sibling)
        } else {
            node_hash(&sibling, &hash)
        };
    }
    hash == *root
}
