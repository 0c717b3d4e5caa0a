//! Bullet, ordered, and task lists: wrapping, unwrapping, conversion,
//! checkbox toggling, and whole-item reordering.

use serde_json::Value;

use crate::command::inline::*;
use crate::command::{block::focus_block, CommandSpec, NotApplicable};
use crate::document::{Attrs, Document, ElementNode, Node, Point, Selection};
use crate::ops::{Edit, Op, Path};
use crate::schema::{is_list_kind, kind};

pub(crate) fn commands() -> Vec<CommandSpec> {
    vec![
        list_toggle_command("list.toggle_bullet", "Bullet list", kind::BULLET_LIST),
        list_toggle_command("list.toggle_ordered", "Ordered list", kind::ORDERED_LIST),
        list_toggle_command("list.toggle_task", "Task list", kind::TASK_LIST),
        CommandSpec::new(
            "list.toggle_task_checked",
            "Toggle checkbox",
            |doc, selection, _| {
                let item_path = doc
                    .ancestor_of_kind(&selection.head.path, kind::TASK_ITEM)
                    .ok_or(NotApplicable)?;
                let Some(Node::Element(item)) = doc.node_at(&item_path) else {
                    return Err(NotApplicable);
                };
                let checked = item.attr_bool("checked").unwrap_or(false);
                Ok(Edit::new(vec![Op::SetNodeAttrs {
                    path: item_path,
                    patch: crate::document::AttrPatch::set_one("checked", Value::Bool(!checked)),
                }])
                .selection_after(selection.clone())
                .source("list.toggle_task_checked"))
            },
        )
        .applicable_when(|doc, selection| {
            doc.ancestor_of_kind(&selection.head.path, kind::TASK_ITEM)
                .is_some()
        })
        .active_when(|doc, selection| {
            doc.ancestor_of_kind(&selection.head.path, kind::TASK_ITEM)
                .and_then(|p| match doc.node_at(&p) {
                    Some(Node::Element(el)) => el.attr_bool("checked"),
                    _ => None,
                })
                .unwrap_or(false)
        }),
        CommandSpec::new(
            "list.reorder_item",
            "Move list item",
            |doc, selection, args| {
                let up = match args.and_then(|a| a.get("direction")).and_then(Value::as_str) {
                    Some("up") => true,
                    Some("down") => false,
                    _ => return Err(NotApplicable),
                };
                reorder_item(doc, selection, up)
            },
        )
        .applicable_when(|doc, selection| {
            // Applicable when the item has any sibling to trade places with.
            nearest_item(doc, &selection.head.path)
                .and_then(|p| {
                    let (&ix, parent) = p.split_last()?;
                    let Some(Node::Element(list)) = doc.node_at(parent) else {
                        return None;
                    };
                    Some(list.children.len() > 1 && ix < list.children.len())
                })
                .unwrap_or(false)
        }),
    ]
}

fn list_toggle_command(id: &'static str, label: &'static str, list_kind: &'static str) -> CommandSpec {
    CommandSpec::new(id, label, move |doc, selection, _| {
        toggle_list(doc, selection, list_kind, id)
    })
    .applicable_when(|doc, selection| {
        focus_block(doc, selection).is_some()
            || nearest_item(doc, &selection.head.path).is_some()
    })
    .active_when(move |doc, selection| {
        nearest_list_kind(doc, &selection.head.path) == Some(list_kind)
    })
}

/// Deepest `list_item` or `task_item` ancestor of a point.
pub(crate) fn nearest_item(doc: &Document, path: &[usize]) -> Option<Path> {
    for len in (1..=path.len()).rev() {
        if let Some(Node::Element(el)) = doc.node_at(&path[..len]) {
            if el.kind == kind::LIST_ITEM || el.kind == kind::TASK_ITEM {
                return Some(path[..len].to_vec());
            }
        }
    }
    None
}

fn nearest_list_kind<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a str> {
    for len in (1..=path.len()).rev() {
        if let Some(Node::Element(el)) = doc.node_at(&path[..len]) {
            if is_list_kind(&el.kind) {
                return Some(el.kind.as_str());
            }
        }
    }
    None
}

fn item_node_for(list_kind: &str, children: Vec<Node>, checked: bool) -> Node {
    if list_kind == kind::TASK_LIST {
        let mut attrs = Attrs::default();
        attrs.insert("checked".to_string(), Value::Bool(checked));
        Node::element(kind::TASK_ITEM, attrs, children)
    } else {
        Node::element(kind::LIST_ITEM, Attrs::default(), children)
    }
}

fn toggle_list(
    doc: &Document,
    selection: &Selection,
    list_kind: &'static str,
    source: &'static str,
) -> Result<Edit, NotApplicable> {
    if let Some(item_path) = nearest_item(doc, &selection.head.path) {
        let (&_item_ix, list_path) = item_path.split_last().ok_or(NotApplicable)?;
        let Some(Node::Element(list)) = doc.node_at(list_path) else {
            return Err(NotApplicable);
        };
        if !is_list_kind(&list.kind) {
            return Err(NotApplicable);
        }
        if list.kind == list_kind {
            return unwrap_item(doc, selection, &item_path, source);
        }
        return convert_list(doc, selection, list_path, list, list_kind, source);
    }

    // Not in a list: wrap the focus block in a fresh single-item list.
    let (block_path, el) = focus_block(doc, selection).ok_or(NotApplicable)?;
    let item = item_node_for(list_kind, vec![Node::Element(el.clone())], false);
    let list = Node::element(list_kind, Attrs::default(), vec![item]);

    let remap = |point: &Point| -> Point {
        if !point.path.starts_with(&block_path) {
            return point.clone();
        }
        let mut path = block_path.clone();
        path.extend([0, 0]);
        path.extend_from_slice(&point.path[block_path.len()..]);
        Point::new(path, point.offset)
    };

    Ok(Edit::new(replace_node(&block_path, list))
        .selection_after(Selection {
            anchor: remap(&selection.anchor),
            head: remap(&selection.head),
        })
        .source(source))
}

fn convert_list(
    _doc: &Document,
    selection: &Selection,
    list_path: &[usize],
    list: &ElementNode,
    list_kind: &'static str,
    source: &'static str,
) -> Result<Edit, NotApplicable> {
    let items = list
        .children
        .iter()
        .map(|item| match item {
            Node::Element(el) => {
                let checked = el.attr_bool("checked").unwrap_or(false);
                item_node_for(list_kind, el.children.clone(), checked)
            }
            other => other.clone(),
        })
        .collect();

    let node = Node::element(list_kind, list.attrs.clone(), items);
    Ok(Edit::new(replace_node(list_path, node))
        .selection_after(selection.clone())
        .source(source))
}

/// Lifts an item's blocks out of its list, splitting the list when the item
/// sits in the middle. The item's subtree is never torn apart.
fn unwrap_item(
    doc: &Document,
    selection: &Selection,
    item_path: &[usize],
    source: &'static str,
) -> Result<Edit, NotApplicable> {
    let (&item_ix, list_path) = item_path.split_last().ok_or(NotApplicable)?;
    let Some(Node::Element(list)) = doc.node_at(list_path) else {
        return Err(NotApplicable);
    };
    let (&list_ix, parent_path) = list_path.split_last().ok_or(NotApplicable)?;
    let Some(Node::Element(item)) = doc.node_at(item_path) else {
        return Err(NotApplicable);
    };

    let blocks = if item.children.is_empty() {
        vec![Node::paragraph("")]
    } else {
        item.children.clone()
    };
    let item_count = list.children.len();

    let mut ops = Vec::new();
    // Index in the parent at which the extracted blocks will start; used to
    // remap the selection below.
    let blocks_start;

    if item_count == 1 {
        ops.push(Op::RemoveNode {
            path: list_path.to_vec(),
        });
        for (i, node) in blocks.iter().cloned().enumerate() {
            let mut path = parent_path.to_vec();
            path.push(list_ix + i);
            ops.push(Op::InsertNode { path, node });
        }
        blocks_start = list_ix;
    } else if item_ix == 0 {
        ops.push(Op::RemoveNode {
            path: item_path.to_vec(),
        });
        for (i, node) in blocks.iter().cloned().enumerate() {
            let mut path = parent_path.to_vec();
            path.push(list_ix + i);
            ops.push(Op::InsertNode { path, node });
        }
        blocks_start = list_ix;
    } else if item_ix == item_count - 1 {
        ops.push(Op::RemoveNode {
            path: item_path.to_vec(),
        });
        for (i, node) in blocks.iter().cloned().enumerate() {
            let mut path = parent_path.to_vec();
            path.push(list_ix + 1 + i);
            ops.push(Op::InsertNode { path, node });
        }
        blocks_start = list_ix + 1;
    } else {
        let before = Node::element(
            list.kind.clone(),
            list.attrs.clone(),
            list.children[..item_ix].to_vec(),
        );
        let after = Node::element(
            list.kind.clone(),
            list.attrs.clone(),
            list.children[item_ix + 1..].to_vec(),
        );
        ops.push(Op::RemoveNode {
            path: list_path.to_vec(),
        });
        let mut replacement = vec![before];
        replacement.extend(blocks.iter().cloned());
        replacement.push(after);
        for (i, node) in replacement.into_iter().enumerate() {
            let mut path = parent_path.to_vec();
            path.push(list_ix + i);
            ops.push(Op::InsertNode { path, node });
        }
        blocks_start = list_ix + 1;
    }

    let remap = |point: &Point| -> Point {
        if point.path.len() <= item_path.len() || !point.path.starts_with(item_path) {
            return point.clone();
        }
        let block_ix = point.path[item_path.len()].min(blocks.len().saturating_sub(1));
        let mut path = parent_path.to_vec();
        path.push(blocks_start + block_ix);
        path.extend_from_slice(&point.path[item_path.len() + 1..]);
        Point::new(path, point.offset)
    };

    Ok(Edit::new(ops)
        .selection_after(Selection {
            anchor: remap(&selection.anchor),
            head: remap(&selection.head),
        })
        .source(source))
}

fn reorder_item(
    doc: &Document,
    selection: &Selection,
    up: bool,
) -> Result<Edit, NotApplicable> {
    let item_path = nearest_item(doc, &selection.head.path).ok_or(NotApplicable)?;
    let (&item_ix, list_path) = item_path.split_last().ok_or(NotApplicable)?;
    let Some(Node::Element(list)) = doc.node_at(list_path) else {
        return Err(NotApplicable);
    };

    // No-op at the edges.
    let target_ix = if up {
        item_ix.checked_sub(1).ok_or(NotApplicable)?
    } else {
        if item_ix + 1 >= list.children.len() {
            return Err(NotApplicable);
        }
        item_ix + 1
    };

    let mut target_path = list_path.to_vec();
    target_path.push(target_ix);

    let ops = vec![
        Op::RemoveNode {
            path: item_path.clone(),
        },
        Op::InsertNode {
            path: target_path.clone(),
            node: match doc.node_at(&item_path) {
                Some(node) => node.clone(),
                None => return Err(NotApplicable),
            },
        },
    ];

    let remap = |point: &Point| -> Point {
        if !point.path.starts_with(&item_path) {
            return point.clone();
        }
        let mut path = target_path.clone();
        path.extend_from_slice(&point.path[item_path.len()..]);
        Point::new(path, point.offset)
    };

    Ok(Edit::new(ops)
        .selection_after(Selection {
            anchor: remap(&selection.anchor),
            head: remap(&selection.head),
        })
        .source("list.reorder_item"))
}
