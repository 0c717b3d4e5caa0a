//! Block-level conversions: headings, blockquotes, code blocks.

use serde_json::Value;

use crate::command::inline::*;
use crate::command::{CommandSpec, NotApplicable};
use crate::document::{Attrs, Document, ElementNode, Node, Point, Selection};
use crate::ops::{Edit, Op, Path};
use crate::schema::kind;

pub(crate) fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("block.set_heading", "Heading", |doc, selection, args| {
            let level = args
                .and_then(|a| a.get("level"))
                .and_then(Value::as_u64)
                .unwrap_or(1)
                .clamp(1, 3) as u8;
            let (block_path, el) = focus_block(doc, selection).ok_or(NotApplicable)?;

            let mut attrs = Attrs::default();
            attrs.insert("level".to_string(), Value::from(level));
            let node = Node::element(kind::HEADING, attrs, el.children.clone());

            Ok(Edit::new(replace_node(&block_path, node))
                .selection_after(keep_selection(selection))
                .source("block.set_heading"))
        })
        .applicable_when(|doc, selection| focus_block(doc, selection).is_some())
        .active_when(|doc, selection| focus_block_is(doc, selection, kind::HEADING)),
        CommandSpec::new("block.set_paragraph", "Paragraph", |doc, selection, _| {
            let (block_path, el) = focus_block(doc, selection).ok_or(NotApplicable)?;
            let node = Node::element(kind::PARAGRAPH, Attrs::default(), el.children.clone());
            Ok(Edit::new(replace_node(&block_path, node))
                .selection_after(keep_selection(selection))
                .source("block.set_paragraph"))
        })
        .applicable_when(|doc, selection| focus_block(doc, selection).is_some())
        .active_when(|doc, selection| focus_block_is(doc, selection, kind::PARAGRAPH)),
        CommandSpec::new(
            "block.toggle_blockquote",
            "Blockquote",
            |doc, selection, _| {
                if let Some(bq_path) = doc.ancestor_of_kind(&selection.head.path, kind::BLOCKQUOTE)
                {
                    return unwrap_blockquote(doc, selection, &bq_path);
                }
                let (block_path, el) = focus_block(doc, selection).ok_or(NotApplicable)?;
                let wrapped = Node::element(
                    kind::BLOCKQUOTE,
                    Attrs::default(),
                    vec![Node::Element(el.clone())],
                );

                // The block gains one level of depth inside the quote.
                let remap = |point: &Point| -> Point {
                    if !point.path.starts_with(&block_path) {
                        return point.clone();
                    }
                    let mut path = block_path.clone();
                    path.push(0);
                    path.extend_from_slice(&point.path[block_path.len()..]);
                    Point::new(path, point.offset)
                };
                let selection_after = Selection {
                    anchor: remap(&selection.anchor),
                    head: remap(&selection.head),
                };

                Ok(Edit::new(replace_node(&block_path, wrapped))
                    .selection_after(selection_after)
                    .source("block.toggle_blockquote"))
            },
        )
        .applicable_when(|doc, selection| focus_block(doc, selection).is_some())
        .active_when(|doc, selection| {
            doc.ancestor_of_kind(&selection.head.path, kind::BLOCKQUOTE)
                .is_some()
        }),
        CommandSpec::new(
            "block.toggle_code_block",
            "Code block",
            |doc, selection, _| {
                let (block_path, el) = focus_block(doc, selection).ok_or(NotApplicable)?;
                let text: String = el
                    .children
                    .iter()
                    .filter_map(|n| match n {
                        Node::Text(t) => Some(t.text.as_str()),
                        _ => None,
                    })
                    .collect();

                let node = if el.kind == kind::CODE_BLOCK {
                    Node::paragraph(text)
                } else {
                    Node::element(kind::CODE_BLOCK, Attrs::default(), vec![Node::text(text)])
                };

                let mut caret = block_path.clone();
                caret.push(0);
                Ok(Edit::new(replace_node(&block_path, node))
                    .selection_after(Selection::collapsed(Point::new(caret, 0)))
                    .source("block.toggle_code_block"))
            },
        )
        .applicable_when(|doc, selection| focus_block(doc, selection).is_some())
        .active_when(|doc, selection| focus_block_is(doc, selection, kind::CODE_BLOCK)),
    ]
}

pub(crate) fn focus_block<'a>(
    doc: &'a Document,
    selection: &Selection,
) -> Option<(Path, &'a ElementNode)> {
    let (block_path, _) = block_of(&selection.head)?;
    match doc.node_at(&block_path) {
        Some(Node::Element(el)) if crate::schema::is_inline_block(&el.kind) => {
            Some((block_path, el))
        }
        _ => None,
    }
}

fn focus_block_is(doc: &Document, selection: &Selection, wanted: &str) -> bool {
    focus_block(doc, selection)
        .map(|(_, el)| el.kind == wanted)
        .unwrap_or(false)
}

fn keep_selection(selection: &Selection) -> Selection {
    selection.clone()
}

fn unwrap_blockquote(
    doc: &Document,
    selection: &Selection,
    bq_path: &[usize],
) -> Result<Edit, NotApplicable> {
    let Some(Node::Element(bq)) = doc.node_at(bq_path) else {
        return Err(NotApplicable);
    };
    let (&bq_ix, parent_path) = bq_path.split_last().ok_or(NotApplicable)?;

    let mut ops = vec![Op::RemoveNode {
        path: bq_path.to_vec(),
    }];
    let blocks = if bq.children.is_empty() {
        vec![Node::paragraph("")]
    } else {
        bq.children.clone()
    };
    for (i, node) in blocks.into_iter().enumerate() {
        let mut path = parent_path.to_vec();
        path.push(bq_ix + i);
        ops.push(Op::InsertNode { path, node });
    }

    let remap = |point: &Point| -> Point {
        if point.path.len() <= bq_path.len() || !point.path.starts_with(bq_path) {
            return point.clone();
        }
        let child_ix = point.path[bq_path.len()];
        let mut path = parent_path.to_vec();
        path.push(bq_ix + child_ix);
        path.extend_from_slice(&point.path[bq_path.len() + 1..]);
        Point::new(path, point.offset)
    };

    Ok(Edit::new(ops)
        .selection_after(Selection {
            anchor: remap(&selection.anchor),
            head: remap(&selection.head),
        })
        .source("block.toggle_blockquote"))
}
