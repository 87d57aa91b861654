//! Attachment discovery in the structure tree.

use crate::model::structure::{Leaf, StructureNode};

/// Return every displayable leaf (`INLINE` or `ATTACHMENT` disposition) in
/// depth-first, left-to-right order.
///
/// Leaves without a disposition, such as the primary text body, are skipped.
/// The returned order is the attachment numbering used everywhere else.
pub fn locate(root: &StructureNode) -> Vec<&Leaf> {
    let mut found = Vec::new();
    walk(root, &mut found);
    found
}

fn walk<'a>(node: &'a StructureNode, found: &mut Vec<&'a Leaf>) {
    match node {
        StructureNode::Leaf(leaf) => {
            if leaf
                .disposition
                .as_ref()
                .is_some_and(|d| d.is_displayable())
            {
                found.push(leaf);
            }
        }
        StructureNode::Composite { children } => {
            for child in children {
                walk(child, found);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::structure::Disposition;

    fn leaf(id: &str, disposition: Option<&str>) -> StructureNode {
        let mut leaf = Leaf::new(id, "application/pdf");
        if let Some(kind) = disposition {
            leaf = leaf.with_disposition(Disposition::new(kind));
        }
        leaf.into()
    }

    fn ids(root: &StructureNode) -> Vec<&str> {
        locate(root).iter().map(|l| l.part_id.as_str()).collect()
    }

    #[test]
    fn test_single_leaf_root() {
        assert_eq!(ids(&leaf("1", Some("attachment"))), vec!["1"]);
        assert!(ids(&leaf("1", None)).is_empty());
    }

    #[test]
    fn test_skips_body_without_disposition() {
        let root = StructureNode::composite(vec![
            Leaf::new("1", "text/plain").into(),
            leaf("2", Some("ATTACHMENT")),
        ]);
        assert_eq!(ids(&root), vec!["2"]);
    }

    #[test]
    fn test_disposition_type_is_case_insensitive() {
        let root = StructureNode::composite(vec![
            leaf("1", Some("Inline")),
            leaf("2", Some("attachment")),
            leaf("3", Some("form-data")),
        ]);
        assert_eq!(ids(&root), vec!["1", "2"]);
    }

    #[test]
    fn test_depth_first_left_to_right() {
        let root = StructureNode::composite(vec![
            StructureNode::composite(vec![
                Leaf::new("1.1", "text/plain").into(),
                StructureNode::composite(vec![leaf("1.2.1", Some("inline"))]),
                leaf("1.3", Some("attachment")),
            ]),
            leaf("2", Some("attachment")),
            StructureNode::composite(vec![leaf("3.1", Some("attachment"))]),
        ]);
        assert_eq!(ids(&root), vec!["1.2.1", "1.3", "2", "3.1"]);
    }

    #[test]
    fn test_each_leaf_yielded_once_and_reproducible() {
        let root = StructureNode::composite(vec![
            leaf("1", Some("attachment")),
            StructureNode::composite(vec![]),
            leaf("2", Some("attachment")),
        ]);
        let first = ids(&root);
        assert_eq!(first, vec!["1", "2"]);
        assert_eq!(first, ids(&root));
    }
}
