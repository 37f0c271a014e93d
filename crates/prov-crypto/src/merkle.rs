use prov_types::Digest;
use serde::{Deserialize, Serialize};

use crate::hasher::ContentHasher;

/// Side of a sibling in a Merkle proof path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// Compute the ordered Merkle root of a digest sequence.
///
/// Returns `None` only for an empty sequence. A single digest is its own
/// root. On every level with an odd number of nodes the last node is paired
/// with itself. Leaves are never sorted: the log order is part of what the
/// root commits to.
pub fn merkle_root(leaves: &[Digest]) -> Option<Digest> {
    let mut current = match leaves {
        [] => return None,
        [single] => return Some(*single),
        _ => leaves.to_vec(),
    };
    while current.len() > 1 {
        current = next_level(&current);
    }
    current.first().copied()
}

fn next_level(level: &[Digest]) -> Vec<Digest> {
    level
        .chunks(2)
        .map(|pair| {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            ContentHasher::hash_pair(left, right)
        })
        .collect()
}

/// Binary Merkle tree retaining every level, for inclusion proofs.
///
/// Shares its root computation with [`merkle_root`]; build a tree only when
/// proofs are needed.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    /// Level 0 = leaves, last level = `[root]`. Empty for an empty tree.
    levels: Vec<Vec<Digest>>,
}

impl MerkleTree {
    /// Build a tree from ordered leaf digests.
    pub fn from_leaves(leaves: Vec<Digest>) -> Self {
        if leaves.is_empty() {
            return Self { levels: vec![] };
        }

        let mut levels = vec![leaves];
        while let Some(top) = levels.last().filter(|level| level.len() > 1) {
            let next = next_level(top);
            levels.push(next);
        }
        Self { levels }
    }

    /// The root digest, or `None` for an empty tree.
    pub fn root(&self) -> Option<Digest> {
        self.levels.last().and_then(|top| top.first().copied())
    }

    /// The ordered leaves.
    pub fn leaves(&self) -> &[Digest] {
        self.levels.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.leaves().len()
    }

    /// Generate an inclusion proof for the leaf at `index`.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        let root = self.root()?;
        let leaf = *self.leaves().get(index)?;

        let mut path = Vec::new();
        let mut idx = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_idx = idx ^ 1;
            // Odd level: the last node was paired with itself.
            let sibling = level.get(sibling_idx).copied().unwrap_or(level[idx]);
            let side = if idx % 2 == 0 { Side::Right } else { Side::Left };
            path.push(ProofStep { sibling, side });
            idx /= 2;
        }

        Some(MerkleProof { leaf, path, root })
    }

    /// Inclusion proof for the first occurrence of `digest`.
    pub fn proof_for(&self, digest: &Digest) -> Option<MerkleProof> {
        let index = self.leaves().iter().position(|leaf| leaf == digest)?;
        self.proof(index)
    }
}

/// One step of a proof path: the sibling hash and which side it sits on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling: Digest,
    pub side: Side,
}

/// Merkle inclusion proof.
///
/// Self-contained: an auditor holding only the proof and an anchored root can
/// check coverage offline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// The leaf being proven.
    pub leaf: Digest,
    /// Path from leaf to root.
    pub path: Vec<ProofStep>,
    /// Expected root hash.
    pub root: Digest,
}

impl MerkleProof {
    /// Recompute the root from the leaf and path and compare.
    pub fn verify(&self) -> bool {
        self.computed_root() == self.root
    }

    /// Check the proof against an externally anchored root.
    pub fn verify_against(&self, anchored_root: &Digest) -> bool {
        self.root == *anchored_root && self.verify()
    }

    fn computed_root(&self) -> Digest {
        self.path.iter().fold(self.leaf, |current, step| match step.side {
            Side::Left => ContentHasher::hash_pair(&step.sibling, &current),
            Side::Right => ContentHasher::hash_pair(&current, &step.sibling),
        })
    }
}
