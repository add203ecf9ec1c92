use std::fmt::Write;

use csmc_tree::TreeNode;

/// Characters that force a label into single quotes.
const RESERVED: &[char] = &[
    ' ', ',', ';', '\t', '\n', '\r', '(', ')', ':', '[', ']', '\'',
];

/// Quotes a label when it contains Newick metacharacters.
///
/// Embedded single quotes are doubled inside the quoted form.
pub fn escape_label(label: &str) -> String {
    if label.is_empty() || label.contains(RESERVED) {
        format!("'{}'", label.replace('\'', "''"))
    } else {
        label.to_string()
    }
}

/// Renders the subtree below `root` in Newick format, terminated by `;`.
///
/// Internal nodes are written as `(left:len,right:len)` in edge order. When
/// `root_length` is given it is appended as the branch above the root.
pub fn to_newick(root: &TreeNode, root_length: Option<f64>) -> String {
    let mut out = String::with_capacity(root.tip_count() * 24);
    write_node(root, &mut out);
    if let Some(length) = root_length {
        let _ = write!(out, ":{length}");
    }
    out.push(';');
    out
}

fn write_node(node: &TreeNode, out: &mut String) {
    match node.edges() {
        Some((left, right)) => {
            out.push('(');
            write_node(left.child(), out);
            let _ = write!(out, ":{}", left.length());
            out.push(',');
            write_node(right.child(), out);
            let _ = write!(out, ":{}", right.length());
            out.push(')');
        }
        None => out.push_str(&escape_label(node.label().unwrap_or_default())),
    }
}

#[cfg(test)]
mod tests {
    use super::escape_label;

    #[test]
    fn plain_labels_pass_through() {
        assert_eq!(escape_label("Kiwi_1"), "Kiwi_1");
    }

    #[test]
    fn metacharacters_are_quoted() {
        assert_eq!(escape_label("Little Spotted Kiwi"), "'Little Spotted Kiwi'");
        assert_eq!(escape_label("it's"), "'it''s'");
        assert_eq!(escape_label("a:b"), "'a:b'");
        assert_eq!(escape_label(""), "''");
    }
}
