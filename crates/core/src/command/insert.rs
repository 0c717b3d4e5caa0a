//! Inline void insertion: images, mentions, plus the block-level divider.

use serde_json::Value;

use crate::command::inline::*;
use crate::command::{CommandSpec, NotApplicable};
use crate::document::{Document, Node, Point, Selection};
use crate::ops::{Edit, Op};

pub(crate) fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("image.insert", "Insert image", |doc, selection, args| {
            let src = args
                .and_then(|a| a.get("src"))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .ok_or(NotApplicable)?;
            let alt = args
                .and_then(|a| a.get("alt"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let at = point_arg(args);
            insert_inline_void(
                doc,
                selection,
                at,
                Node::image(src, alt),
                "image.insert",
            )
        })
        .applicable_when(|doc, selection| {
            matches!(doc.node_at(&selection.head.path), Some(Node::Text(_)))
        }),
        CommandSpec::new("mention.insert", "Insert mention", |doc, selection, args| {
            let id = args
                .and_then(|a| a.get("id"))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .ok_or(NotApplicable)?;
            let label = args
                .and_then(|a| a.get("label"))
                .and_then(Value::as_str)
                .unwrap_or(id);
            insert_inline_void(
                doc,
                selection,
                None,
                Node::mention(id, label),
                "mention.insert",
            )
        })
        .applicable_when(|doc, selection| {
            matches!(doc.node_at(&selection.head.path), Some(Node::Text(_)))
        }),
        CommandSpec::new("insert.divider", "Divider", |doc, selection, _| {
            let (parent, ix) = insertion_after_focus(doc, selection);
            let mut path = parent;
            path.push(ix);
            Ok(Edit::new(vec![Op::InsertNode {
                path,
                node: Node::divider(),
            }])
            .source("insert.divider"))
        }),
    ]
}

/// Optional explicit insertion point, for callers replaying a deferred
/// insert at the spot the user originally asked for.
fn point_arg(args: Option<&Value>) -> Option<Point> {
    let at = args?.get("at")?;
    serde_json::from_value(at.clone()).ok()
}

/// Splits the text run at the target point and drops the void between the
/// halves. A text run always follows the void so the caret has a home.
fn insert_inline_void(
    doc: &Document,
    selection: &Selection,
    at: Option<Point>,
    node: Node,
    source: &'static str,
) -> Result<Edit, NotApplicable> {
    let (start, end) = selection.ordered();
    let explicit = at.is_some();
    let target = at.unwrap_or_else(|| start.clone());

    let (block_path, child_ix) = block_of(&target).ok_or(NotApplicable)?;
    let Some(Node::Text(text)) = doc.node_at(&target.path) else {
        return Err(NotApplicable);
    };

    let cut_lo = crate::document::clamp_to_char_boundary(&text.text, target.offset);
    // A range within a single run is replaced by the void.
    let cut_hi = if !selection.is_collapsed() && start.path == end.path && !explicit {
        crate::document::clamp_to_char_boundary(&text.text, end.offset.max(cut_lo))
    } else {
        cut_lo
    };

    let left = &text.text[..cut_lo];
    let right = &text.text[cut_hi..];

    let mut replacement = Vec::new();
    if !left.is_empty() {
        replacement.push(Node::marked_text(left, text.marks.clone()));
    }
    replacement.push(node);
    replacement.push(Node::marked_text(right, text.marks.clone()));
    let caret_ix = child_ix + replacement.len() - 1;

    let mut ops = vec![Op::RemoveNode {
        path: target.path.clone(),
    }];
    for (i, node) in replacement.into_iter().enumerate() {
        let mut path = block_path.clone();
        path.push(child_ix + i);
        ops.push(Op::InsertNode { path, node });
    }

    let mut caret_path = block_path;
    caret_path.push(caret_ix);
    Ok(Edit::new(ops)
        .selection_after(Selection::collapsed(Point::new(caret_path, 0)))
        .source(source))
}
