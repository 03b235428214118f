use sha2::{Digest, Sha256};

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

/// Compute the leaf hash for one entrant of a draw.
///
/// `leaf_hash = sha256( 0x00 || uid_bytes || index_u32_be )`
///
/// `index` is the entrant's position in the uid-sorted entrant list.
pub fn compute_leaf_hash(uid: &str, index: u32) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(uid.as_bytes());
    hasher.update(index.to_be_bytes());
    hasher.finalize().into()
}

fn hash_pair(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    // Sorted pair hashing: smaller value first
    if a.as_slice() <= b.as_slice() {
        hasher.update(a);
        hasher.update(b);
    } else {
        hasher.update(b);
        hasher.update(a);
    }
    hasher.finalize().into()
}

fn next_level(level: &[[u8; 32]]) -> Vec<[u8; 32]> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [a, b] => hash_pair(a, b),
            // Odd node is promoted unchanged
            [a] => *a,
            _ => unreachable!("chunks(2) yields one or two items"),
        })
        .collect()
}

/// Root of the tree built over `leaves`, or None for an empty list.
pub fn build_merkle_root(leaves: &[[u8; 32]]) -> Option<[u8; 32]> {
    if leaves.is_empty() {
        return None;
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }
    Some(level[0])
}

/// Sibling hashes (hex) proving `leaves[index]` is part of the root.
pub fn build_merkle_proof(leaves: &[[u8; 32]], index: usize) -> Option<Vec<String>> {
    if index >= leaves.len() {
        return None;
    }
    let mut proof = Vec::new();
    let mut level = leaves.to_vec();
    let mut position = index;
    while level.len() > 1 {
        let sibling = position ^ 1;
        if sibling < level.len() {
            proof.push(hex::encode(level[sibling]));
        }
        level = next_level(&level);
        position /= 2;
    }
    Some(proof)
}

/// Verify a Merkle proof against a known root.
///
/// All values are 32-byte hashes represented as hex strings.
pub fn verify_merkle_proof(root_hex: &str, proof_hex: &[String], leaf_hash: &[u8; 32]) -> bool {
    let expected_root = match hex::decode(root_hex) {
        Ok(v) => v,
        Err(_) => return false,
    };
    if expected_root.len() != 32 {
        return false;
    }

    let mut current = *leaf_hash;

    for sibling_hex in proof_hex {
        let sibling: [u8; 32] = match hex::decode(sibling_hex).map(<[u8; 32]>::try_from) {
            Ok(Ok(v)) => v,
            _ => return false,
        };
        current = hash_pair(&current, &sibling);
    }

    current.as_slice() == expected_root.as_slice()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(uids: &[&str]) -> Vec<[u8; 32]> {
        uids.iter()
            .enumerate()
            .map(|(i, uid)| compute_leaf_hash(uid, i as u32))
            .collect()
    }

    #[test]
    fn test_compute_leaf_hash() {
        let hash1 = compute_leaf_hash("uid-a", 0);
        let hash2 = compute_leaf_hash("uid-a", 0);
        assert_eq!(hash1, hash2);

        assert_ne!(hash1, compute_leaf_hash("uid-a", 1));
        assert_ne!(hash1, compute_leaf_hash("uid-b", 0));
    }

    #[test]
    fn test_every_leaf_proves_inclusion() {
        // Odd count exercises the promoted node
        for count in 1..=7 {
            let uids: Vec<String> = (0..count).map(|i| format!("uid-{i}")).collect();
            let refs: Vec<&str> = uids.iter().map(String::as_str).collect();
            let tree = leaves(&refs);
            let root_hex = hex::encode(build_merkle_root(&tree).unwrap());

            for (i, leaf) in tree.iter().enumerate() {
                let proof = build_merkle_proof(&tree, i).unwrap();
                assert!(
                    verify_merkle_proof(&root_hex, &proof, leaf),
                    "leaf {i} of {count}"
                );
            }
        }
    }

    #[test]
    fn test_tampered_proof_fails() {
        let tree = leaves(&["a", "b", "c", "d"]);
        let root_hex = hex::encode(build_merkle_root(&tree).unwrap());

        let mut proof = build_merkle_proof(&tree, 0).unwrap();
        proof[0] = hex::encode(tree[2]);
        assert!(!verify_merkle_proof(&root_hex, &proof, &tree[0]));
    }

    #[test]
    fn test_wrong_root_fails() {
        let tree = leaves(&["a", "b"]);
        let proof = build_merkle_proof(&tree, 0).unwrap();
        let wrong_root = hex::encode([0u8; 32]);
        assert!(!verify_merkle_proof(&wrong_root, &proof, &tree[0]));
        assert!(!verify_merkle_proof("not-hex", &proof, &tree[0]));
    }

    #[test]
    fn test_single_leaf_tree() {
        let tree = leaves(&["only"]);
        let root = build_merkle_root(&tree).unwrap();
        assert_eq!(root, tree[0]);
        assert!(build_merkle_proof(&tree, 0).unwrap().is_empty());
    }

    #[test]
    fn test_empty_and_out_of_range() {
        assert_eq!(build_merkle_root(&[]), None);
        assert_eq!(build_merkle_proof(&leaves(&["a"]), 1), None);
    }
}
