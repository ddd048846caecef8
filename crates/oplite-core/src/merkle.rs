//! SHA-256 helpers and Merkle branch verification.
//!
//! Container roots come from `tree_hash`; what stays here is the part the
//! verifier walks by hand: folding a leaf up a proof branch to a state root.

use sha2::{Digest, Sha256};

/// A 32-byte Merkle node.
pub type Root = [u8; 32];

/// SHA256 of arbitrary data.
pub fn sha256_hash(data: &[u8]) -> Root {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA256 of two 32-byte values concatenated.
pub fn sha256_pair(a: &Root, b: &Root) -> Root {
    let mut hasher = Sha256::new();
    hasher.update(a);
    hasher.update(b);
    hasher.finalize().into()
}

/// Encode a u64 as a 32-byte SSZ leaf (little-endian, zero-padded).
pub fn uint64_to_leaf(value: u64) -> Root {
    let mut leaf = [0u8; 32];
    leaf[..8].copy_from_slice(&value.to_le_bytes());
    leaf
}

/// Verify a Merkle branch (SSZ proof) against an expected root.
/// `index` is the leaf position at the given depth (a generalized index works
/// too, only its low `depth` bits are read).
pub fn verify_merkle_branch(
    leaf: &Root,
    branch: &[Root],
    depth: usize,
    index: u64,
    root: &Root,
) -> bool {
    if branch.len() != depth {
        return false;
    }
    compute_branch_root(leaf, branch, index) == *root
}

/// Fold a leaf up through its branch. Levels above bit 63 of `index` are
/// read as left children.
pub(crate) fn compute_branch_root(leaf: &Root, branch: &[Root], index: u64) -> Root {
    let mut current = *leaf;
    for (i, node) in branch.iter().enumerate() {
        let bit = u32::try_from(i)
            .ok()
            .and_then(|shift| index.checked_shr(shift))
            .unwrap_or(0);
        if bit & 1 == 1 {
            current = sha256_pair(node, &current);
        } else {
            current = sha256_pair(&current, node);
        }
    }
    current
}
