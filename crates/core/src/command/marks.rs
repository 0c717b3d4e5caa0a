//! Mark toggling with union semantics: a partially-marked range gets the
//! mark everywhere; a fully-marked range loses it everywhere.

use serde_json::Value;

use crate::command::inline::*;
use crate::command::{CommandSpec, NotApplicable};
use crate::document::{
    clamp_to_char_boundary, Document, Marks, Node, Point, Selection, TextNode,
};
use crate::ops::{Edit, Op};

pub(crate) fn commands() -> Vec<CommandSpec> {
    let mut out = vec![
        bool_mark_command("marks.toggle_bold", "Bold", |m| m.bold, |m, v| m.bold = v),
        bool_mark_command(
            "marks.toggle_italic",
            "Italic",
            |m| m.italic,
            |m, v| m.italic = v,
        ),
        bool_mark_command(
            "marks.toggle_underline",
            "Underline",
            |m| m.underline,
            |m, v| m.underline = v,
        ),
        bool_mark_command(
            "marks.toggle_strikethrough",
            "Strikethrough",
            |m| m.strikethrough,
            |m, v| m.strikethrough = v,
        ),
        bool_mark_command(
            "marks.toggle_highlight",
            "Highlight",
            |m| m.highlight,
            |m, v| m.highlight = v,
        ),
        bool_mark_command("marks.toggle_code", "Inline code", |m| m.code, |m, v| {
            m.code = v
        }),
    ];

    out.push(
        CommandSpec::new("marks.set_link", "Set link", |doc, selection, args| {
            let href = args
                .and_then(|a| a.get("href"))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .ok_or(NotApplicable)?
                .to_string();
            rewrite_marks(doc, selection, "marks.set_link", move |mut m| {
                m.link = Some(href.clone());
                m
            })
        })
        .applicable_when(|doc, selection| focus_is_text(doc, selection))
        .active_when(|doc, selection| marks_at(doc, selection).link.is_some()),
    );
    out.push(
        CommandSpec::new("marks.unset_link", "Remove link", |doc, selection, _| {
            rewrite_marks(doc, selection, "marks.unset_link", |mut m| {
                m.link = None;
                m
            })
        })
        .applicable_when(|doc, selection| marks_at(doc, selection).link.is_some())
        .active_when(|_, _| false),
    );

    out
}

fn bool_mark_command(
    id: &'static str,
    label: &'static str,
    get: fn(&Marks) -> bool,
    set: fn(&mut Marks, bool),
) -> CommandSpec {
    CommandSpec::new(id, label, move |doc, selection, _args| {
        let target = if selection.is_collapsed() {
            !get(&marks_at(doc, selection))
        } else {
            !selection_fully_marked(doc, selection, get)
        };
        rewrite_marks(doc, selection, id, move |mut m| {
            set(&mut m, target);
            m
        })
    })
    .applicable_when(|doc, selection| focus_is_text(doc, selection))
    .active_when(move |doc, selection| get(&marks_at(doc, selection)))
}

/// Marks at the head of the selection; what the toolbar highlights.
pub(crate) fn marks_at(doc: &Document, selection: &Selection) -> Marks {
    match doc.node_at(&selection.head.path) {
        Some(Node::Text(t)) => t.marks.clone(),
        _ => Marks::default(),
    }
}

fn focus_is_text(doc: &Document, selection: &Selection) -> bool {
    matches!(doc.node_at(&selection.head.path), Some(Node::Text(_)))
}

fn rewrite_marks(
    doc: &Document,
    selection: &Selection,
    source: &'static str,
    apply: impl Fn(Marks) -> Marks,
) -> Result<Edit, NotApplicable> {
    let (ops, selection_after) = if selection.is_collapsed() {
        split_at_caret(doc, selection, &apply)?
    } else {
        apply_over_range(doc, selection, &apply)?
    };
    Ok(Edit::new(ops)
        .selection_after(selection_after)
        .source(source))
}

/// Range application: rebuild every touched block's inline children with
/// the marks rewritten over the selected slice.
fn apply_over_range(
    doc: &Document,
    selection: &Selection,
    apply: &dyn Fn(Marks) -> Marks,
) -> Result<(Vec<Op>, Selection), NotApplicable> {
    let (start, end) = selection.ordered();
    let (start_block, start_inline_ix) = block_of(&start).ok_or(NotApplicable)?;
    let (end_block, end_inline_ix) = block_of(&end).ok_or(NotApplicable)?;

    let blocks = inline_blocks_in_order(doc);
    let start_index = blocks
        .iter()
        .position(|b| b.path == start_block)
        .ok_or(NotApplicable)?;
    let end_index = blocks
        .iter()
        .position(|b| b.path == end_block)
        .ok_or(NotApplicable)?;
    let (start_index, end_index) = if start_index <= end_index {
        (start_index, end_index)
    } else {
        (end_index, start_index)
    };

    let mut ops = Vec::new();
    let mut new_anchor = selection.anchor.clone();
    let mut new_head = selection.head.clone();

    for (block_index, block) in blocks
        .iter()
        .enumerate()
        .take(end_index + 1)
        .skip(start_index)
    {
        let children = block.el.children.as_slice();
        let total = inline_len(children);
        if total == 0 {
            continue;
        }

        let lo = if block_index == start_index {
            global_offset(children, start_inline_ix, start.offset)
        } else {
            0
        };
        let hi = if block_index == end_index {
            global_offset(children, end_inline_ix, end.offset)
        } else {
            total
        };
        if lo >= hi {
            continue;
        }

        let rebuilt = rewrite_runs(children, lo, hi, apply);
        ops.extend(replace_inline_children(&block.path, children.len(), &rebuilt));

        for point in [&mut new_anchor, &mut new_head] {
            if point_in_block(point, &block.path) {
                let global = global_offset(
                    children,
                    point.path.last().copied().unwrap_or(0),
                    point.offset,
                );
                *point = point_for_global(&block.path, &rebuilt, global);
            }
        }
    }

    Ok((
        ops,
        Selection {
            anchor: new_anchor,
            head: new_head,
        },
    ))
}

fn point_in_block(point: &Point, block_path: &[usize]) -> bool {
    point.path.len() == block_path.len() + 1 && point.path.starts_with(block_path)
}

/// Rebuilds a block's inline children with `apply` mapped over the marks of
/// every text slice inside [lo, hi) of the flattened content. Runs are split
/// at the boundaries; the defragmentation pass fuses equal neighbors later.
fn rewrite_runs(
    children: &[Node],
    lo: usize,
    hi: usize,
    apply: &dyn Fn(Marks) -> Marks,
) -> Vec<Node> {
    let mut out = Vec::new();
    let mut cursor = 0usize;

    for node in children {
        let t = match node {
            Node::Text(t) => t,
            Node::Void(v) => {
                cursor += v.inline_len();
                out.push(node.clone());
                continue;
            }
            Node::Element(_) => {
                out.push(node.clone());
                continue;
            }
        };

        let node_start = cursor;
        let node_end = cursor + t.text.len();
        cursor = node_end;

        if hi <= node_start || lo >= node_end {
            out.push(node.clone());
            continue;
        }

        let cut_lo = clamp_to_char_boundary(&t.text, lo.saturating_sub(node_start));
        let cut_hi = clamp_to_char_boundary(&t.text, hi.saturating_sub(node_start).min(t.text.len()));

        if cut_lo == 0 && cut_hi == t.text.len() {
            out.push(Node::Text(TextNode {
                text: t.text.clone(),
                marks: apply(t.marks.clone()),
            }));
            continue;
        }

        let prefix = &t.text[..cut_lo];
        let middle = &t.text[cut_lo..cut_hi];
        let suffix = &t.text[cut_hi..];

        if !prefix.is_empty() {
            out.push(Node::marked_text(prefix, t.marks.clone()));
        }
        if !middle.is_empty() {
            out.push(Node::Text(TextNode {
                text: middle.to_string(),
                marks: apply(t.marks.clone()),
            }));
        }
        if !suffix.is_empty() {
            out.push(Node::marked_text(suffix, t.marks.clone()));
        }
    }

    if out.is_empty() {
        out.push(Node::text(""));
    }
    out
}

/// Collapsed-selection toggle: split the run at the caret and leave an
/// empty run carrying the new marks, so the next insertion picks them up.
fn split_at_caret(
    doc: &Document,
    selection: &Selection,
    apply: &dyn Fn(Marks) -> Marks,
) -> Result<(Vec<Op>, Selection), NotApplicable> {
    let head = selection.head.clone();
    let (block_path, child_ix) = block_of(&head).ok_or(NotApplicable)?;
    let Some(Node::Text(text)) = doc.node_at(&head.path) else {
        return Err(NotApplicable);
    };

    let cursor = clamp_to_char_boundary(&text.text, head.offset);
    let marks_after = apply(text.marks.clone());

    if text.text.is_empty() {
        return Ok((
            vec![Op::SetTextMarks {
                path: head.path.clone(),
                marks: marks_after,
            }],
            Selection::collapsed(Point::new(head.path, 0)),
        ));
    }

    let left = &text.text[..cursor];
    let right = &text.text[cursor..];

    let mut replacement = Vec::new();
    let mut caret_ix = child_ix;
    if !left.is_empty() {
        replacement.push(Node::marked_text(left, text.marks.clone()));
        caret_ix += 1;
    }
    replacement.push(Node::Text(TextNode {
        text: String::new(),
        marks: marks_after,
    }));
    if !right.is_empty() {
        replacement.push(Node::marked_text(right, text.marks.clone()));
    }

    let mut ops = vec![Op::RemoveNode {
        path: head.path.clone(),
    }];
    for (i, node) in replacement.into_iter().enumerate() {
        let mut path = block_path.clone();
        path.push(child_ix + i);
        ops.push(Op::InsertNode { path, node });
    }

    let mut caret_path = block_path;
    caret_path.push(caret_ix);
    Ok((ops, Selection::collapsed(Point::new(caret_path, 0))))
}

/// True when every text slice intersecting the selection carries the mark.
pub(crate) fn selection_fully_marked(
    doc: &Document,
    selection: &Selection,
    get: fn(&Marks) -> bool,
) -> bool {
    let (start, end) = selection.ordered();
    let Some((start_block, start_inline_ix)) = block_of(&start) else {
        return false;
    };
    let Some((end_block, end_inline_ix)) = block_of(&end) else {
        return false;
    };

    let blocks = inline_blocks_in_order(doc);
    let Some(start_index) = blocks.iter().position(|b| b.path == start_block) else {
        return false;
    };
    let Some(end_index) = blocks.iter().position(|b| b.path == end_block) else {
        return false;
    };
    let (start_index, end_index) = if start_index <= end_index {
        (start_index, end_index)
    } else {
        (end_index, start_index)
    };

    for (block_index, block) in blocks
        .iter()
        .enumerate()
        .take(end_index + 1)
        .skip(start_index)
    {
        let children = block.el.children.as_slice();
        let total = inline_len(children);
        if total == 0 {
            continue;
        }

        let lo = if block_index == start_index {
            global_offset(children, start_inline_ix, start.offset)
        } else {
            0
        };
        let hi = if block_index == end_index {
            global_offset(children, end_inline_ix, end.offset)
        } else {
            total
        };
        if lo >= hi {
            continue;
        }

        let mut cursor = 0usize;
        for node in children {
            let (node_start, node_end) = match node {
                Node::Text(t) => {
                    let s = cursor;
                    cursor += t.text.len();
                    (s, cursor)
                }
                Node::Void(v) => {
                    let s = cursor;
                    cursor += v.inline_len();
                    (s, cursor)
                }
                Node::Element(_) => continue,
            };
            if hi <= node_start || lo >= node_end {
                continue;
            }
            if let Node::Text(t) = node {
                if !get(&t.marks) {
                    return false;
                }
            }
        }
    }

    true
}
