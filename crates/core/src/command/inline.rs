//! Offset arithmetic over the flattened inline content of a block.

use crate::document::{clamp_to_char_boundary, Document, ElementNode, Node, Point, Selection};
use crate::ops::{Op, Path};
use crate::schema::is_inline_block;

pub(crate) struct InlineBlock<'a> {
    pub path: Path,
    pub el: &'a ElementNode,
}

/// All inline-only blocks in document order, however deeply nested.
pub(crate) fn inline_blocks_in_order(doc: &Document) -> Vec<InlineBlock<'_>> {
    fn walk<'a>(children: &'a [Node], path: &mut Path, out: &mut Vec<InlineBlock<'a>>) {
        for (ix, node) in children.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            path.push(ix);
            if is_inline_block(&el.kind) {
                out.push(InlineBlock {
                    path: path.clone(),
                    el,
                });
            } else {
                walk(&el.children, path, out);
            }
            path.pop();
        }
    }

    let mut out = Vec::new();
    walk(&doc.children, &mut Path::new(), &mut out);
    out
}

pub(crate) fn inline_len(children: &[Node]) -> usize {
    children
        .iter()
        .map(|n| match n {
            Node::Text(t) => t.text.len(),
            Node::Void(v) => v.inline_len(),
            Node::Element(_) => 0,
        })
        .sum()
}

/// Byte offset of (child index, local offset) within the block's flattened
/// inline text.
pub(crate) fn global_offset(children: &[Node], child_ix: usize, offset: usize) -> usize {
    let mut global = 0usize;
    for (ix, node) in children.iter().enumerate() {
        if ix == child_ix {
            let local = match node {
                Node::Text(t) => offset.min(t.text.len()),
                Node::Void(v) => offset.min(v.inline_len()),
                Node::Element(_) => 0,
            };
            return global + local;
        }
        global += match node {
            Node::Text(t) => t.text.len(),
            Node::Void(v) => v.inline_len(),
            Node::Element(_) => 0,
        };
    }
    global
}

/// Maps a flattened offset back onto a concrete text node in the block.
pub(crate) fn point_for_global(block_path: &[usize], children: &[Node], global: usize) -> Point {
    let mut cursor = 0usize;
    let mut last_text: Option<(usize, usize)> = None;

    for (ix, node) in children.iter().enumerate() {
        match node {
            Node::Text(t) => {
                let end = cursor + t.text.len();
                if global <= end {
                    let local = clamp_to_char_boundary(&t.text, global.saturating_sub(cursor));
                    let mut path = block_path.to_vec();
                    path.push(ix);
                    return Point::new(path, local);
                }
                last_text = Some((ix, t.text.len()));
                cursor = end;
            }
            Node::Void(v) => cursor += v.inline_len(),
            Node::Element(_) => {}
        }
    }

    let (ix, offset) = last_text.unwrap_or((0, 0));
    let mut path = block_path.to_vec();
    path.push(ix);
    Point::new(path, offset)
}

/// Replaces the full child list of a block: remove old children back to
/// front, insert new ones front to back.
pub(crate) fn replace_inline_children(block_path: &[usize], old_len: usize, new: &[Node]) -> Vec<Op> {
    let mut ops = Vec::new();
    for ix in (0..old_len).rev() {
        let mut path = block_path.to_vec();
        path.push(ix);
        ops.push(Op::RemoveNode { path });
    }
    for (ix, node) in new.iter().cloned().enumerate() {
        let mut path = block_path.to_vec();
        path.push(ix);
        ops.push(Op::InsertNode { path, node });
    }
    ops
}

/// Path of the inline block containing a point, with the child index.
pub(crate) fn block_of(point: &Point) -> Option<(Path, usize)> {
    point
        .path
        .split_last()
        .map(|(&ix, p)| (p.to_vec(), ix))
}

/// Where a block-level insertion after the focus block should land:
/// (parent path, index).
pub(crate) fn insertion_after_focus(doc: &Document, selection: &Selection) -> (Path, usize) {
    let head = &selection.head;
    let Some((block_path, _)) = block_of(head) else {
        return (Path::new(), doc.children.len());
    };
    match block_path.split_last() {
        Some((&block_ix, parent)) => (parent.to_vec(), block_ix + 1),
        None => (Path::new(), doc.children.len()),
    }
}

/// Shared shape for "replace one node in place".
pub(crate) fn replace_node(path: &[usize], node: Node) -> Vec<Op> {
    vec![
        Op::RemoveNode {
            path: path.to_vec(),
        },
        Op::InsertNode {
            path: path.to_vec(),
            node,
        },
    ]
}
