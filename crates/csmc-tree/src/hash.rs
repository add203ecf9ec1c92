use sha2::{Digest, Sha256};

use crate::node::TreeNode;

/// Computes the canonical topology hash of the tree rooted at `node`.
///
/// Branch lengths are ignored and the two children of every internal node are
/// ordered by digest, so mirror images of one rooted topology hash equally.
pub fn topology_hash(node: &TreeNode) -> String {
    format!("{:x}", subtree_digest(node))
}

fn subtree_digest(node: &TreeNode) -> sha2::digest::Output<Sha256> {
    let mut hasher = Sha256::new();
    match node.edges() {
        None => {
            hasher.update(b"tip:");
            hasher.update(node.label().unwrap_or_default().as_bytes());
        }
        Some((left, right)) => {
            let mut children = [subtree_digest(left.child()), subtree_digest(right.child())];
            children.sort();
            hasher.update(b"node:");
            for child in &children {
                hasher.update(child);
            }
        }
    }
    hasher.finalize()
}
