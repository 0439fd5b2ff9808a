//! Recursive path resolution over element trees.
//!
//! A path is a dot-separated sequence of field names. Resolution descends
//! through nodes one segment at a time and implicitly fans out across any
//! sequence-valued field encountered along the way, preserving element
//! order. Unknown field names resolve to nothing rather than failing.

use crate::node::Node;

/// Resolve a dotted path against a set of input nodes.
///
/// The empty path returns the input unchanged. For a non-empty path the
/// first segment is read on every input element (absent fields contribute
/// nothing), the remaining path is resolved recursively against each
/// result, and the matches are concatenated in input order.
pub fn resolve<'a>(nodes: &[Node<'a>], path: &str) -> Vec<Node<'a>> {
    if path.is_empty() {
        return nodes.to_vec();
    }

    let (segment, rest) = split_first_segment(path);
    let mut matches = Vec::new();
    for node in nodes {
        let children = node.field(segment).into_nodes();
        matches.extend(resolve(&children, rest));
    }
    matches
}

/// Resolve a path against a single node.
pub fn resolve_node<'a>(node: Node<'a>, path: &str) -> Vec<Node<'a>> {
    resolve(&[node], path)
}

/// Resolve a path, returning the first final value satisfying `predicate`.
///
/// Elements are tried in sequence order and the search stops at the first
/// match, so later elements are never resolved. Elements whose field is
/// wholly absent at the current segment are skipped before recursing.
pub fn resolve_first_matching<'a, P>(
    nodes: &[Node<'a>],
    path: &str,
    predicate: &P,
) -> Option<Node<'a>>
where
    P: Fn(Node<'a>) -> bool,
{
    if path.is_empty() {
        return nodes.iter().copied().find(|node| predicate(*node));
    }

    let (segment, rest) = split_first_segment(path);
    for node in nodes {
        let field = node.field(segment);
        if field.is_absent() {
            continue;
        }
        if let Some(found) = resolve_first_matching(&field.into_nodes(), rest, predicate) {
            return Some(found);
        }
    }
    None
}

fn split_first_segment(path: &str) -> (&str, &str) {
    match path.split_once('.') {
        Some((head, rest)) => (head, rest),
        None => (path, ""),
    }
}
