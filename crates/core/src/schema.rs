use crate::document::{Document, Node};
use crate::ops::{Op, Path};

/// Node kind names, shared across the model, commands, and interchange.
pub mod kind {
    pub const PARAGRAPH: &str = "paragraph";
    pub const HEADING: &str = "heading";
    pub const BULLET_LIST: &str = "bullet_list";
    pub const ORDERED_LIST: &str = "ordered_list";
    pub const LIST_ITEM: &str = "list_item";
    pub const TASK_LIST: &str = "task_list";
    pub const TASK_ITEM: &str = "task_item";
    pub const TABLE: &str = "table";
    pub const TABLE_ROW: &str = "table_row";
    pub const TABLE_CELL: &str = "table_cell";
    pub const CODE_BLOCK: &str = "code_block";
    pub const BLOCKQUOTE: &str = "blockquote";
    pub const IMAGE: &str = "image";
    pub const MENTION: &str = "mention";
    pub const DIVIDER: &str = "divider";
    pub const TEXT: &str = "text";
}

/// Blocks whose children are inline content (text runs and inline voids).
pub fn is_inline_block(k: &str) -> bool {
    matches!(k, kind::PARAGRAPH | kind::HEADING | kind::CODE_BLOCK)
}

pub fn is_inline_void(k: &str) -> bool {
    matches!(k, kind::IMAGE | kind::MENTION)
}

pub fn is_list_kind(k: &str) -> bool {
    matches!(k, kind::BULLET_LIST | kind::ORDERED_LIST | kind::TASK_LIST)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaViolation {
    #[error("table at {path:?} has no rows")]
    EmptyTable { path: Path },
    #[error("table at {path:?} is ragged: row {row} spans {cols} columns, expected {expected}")]
    RaggedTable {
        path: Path,
        row: usize,
        cols: usize,
        expected: usize,
    },
    #[error("table nested inside another table at {path:?}")]
    NestedTable { path: Path },
    #[error("{found} at {path:?} is not a valid child of {parent}")]
    InvalidChild {
        path: Path,
        found: String,
        parent: String,
    },
    #[error("list at {path:?} has no items")]
    EmptyList { path: Path },
    #[error("image at {path:?} has an empty src")]
    EmptyImageSrc { path: Path },
    #[error("mention at {path:?} has an empty id")]
    EmptyMentionId { path: Path },
    #[error("task item at {path:?} carries a non-boolean checked attr")]
    BadCheckedAttr { path: Path },
    #[error("block content inside inline-only {parent} at {path:?}")]
    BlockInInlineBlock { path: Path, parent: String },
    #[error("bare text under {parent} at {path:?}")]
    TextInContainer { path: Path, parent: String },
}

/// Checks every invariant against a prospective tree. The model never
/// repairs an invalid tree; the dispatcher rejects the whole transaction.
pub fn validate(doc: &Document) -> Result<(), SchemaViolation> {
    let mut path = Vec::new();
    walk(&doc.children, "document", false, &mut path)
}

fn walk(
    children: &[Node],
    parent_kind: &str,
    in_table: bool,
    path: &mut Path,
) -> Result<(), SchemaViolation> {
    for (ix, node) in children.iter().enumerate() {
        path.push(ix);
        check_node(node, parent_kind, in_table, path)?;
        path.pop();
    }
    Ok(())
}

fn check_node(
    node: &Node,
    parent_kind: &str,
    in_table: bool,
    path: &mut Path,
) -> Result<(), SchemaViolation> {
    match node {
        Node::Text(_) => {
            if !is_inline_block(parent_kind) {
                return Err(SchemaViolation::TextInContainer {
                    path: path.clone(),
                    parent: parent_kind.to_string(),
                });
            }
            Ok(())
        }
        Node::Void(v) => {
            if is_inline_void(&v.kind) && !is_inline_block(parent_kind) {
                return Err(SchemaViolation::InvalidChild {
                    path: path.clone(),
                    found: v.kind.clone(),
                    parent: parent_kind.to_string(),
                });
            }
            match v.kind.as_str() {
                kind::IMAGE => {
                    if v.attr_str("src").unwrap_or("").is_empty() {
                        return Err(SchemaViolation::EmptyImageSrc { path: path.clone() });
                    }
                }
                kind::MENTION => {
                    if v.attr_str("id").unwrap_or("").is_empty() {
                        return Err(SchemaViolation::EmptyMentionId { path: path.clone() });
                    }
                }
                _ => {}
            }
            Ok(())
        }
        Node::Element(el) => {
            check_parentage(&el.kind, parent_kind, path)?;

            if is_inline_block(&el.kind) {
                for (ix, child) in el.children.iter().enumerate() {
                    if matches!(child, Node::Element(_)) {
                        path.push(ix);
                        let err = SchemaViolation::BlockInInlineBlock {
                            path: path.clone(),
                            parent: el.kind.clone(),
                        };
                        path.pop();
                        return Err(err);
                    }
                }
            }

            match el.kind.as_str() {
                kind::TABLE => {
                    if in_table {
                        return Err(SchemaViolation::NestedTable { path: path.clone() });
                    }
                    check_table(node, path)?;
                }
                kind::BULLET_LIST | kind::ORDERED_LIST | kind::TASK_LIST => {
                    if el.children.is_empty() {
                        return Err(SchemaViolation::EmptyList { path: path.clone() });
                    }
                }
                kind::TASK_ITEM => {
                    if let Some(v) = el.attrs.get("checked") {
                        if !v.is_boolean() {
                            return Err(SchemaViolation::BadCheckedAttr { path: path.clone() });
                        }
                    }
                }
                _ => {}
            }

            let in_table = in_table || el.kind == kind::TABLE;
            walk(&el.children, &el.kind, in_table, path)
        }
    }
}

fn check_parentage(k: &str, parent: &str, path: &Path) -> Result<(), SchemaViolation> {
    let ok = match k {
        kind::LIST_ITEM => matches!(
            parent,
            kind::BULLET_LIST | kind::ORDERED_LIST | kind::LIST_ITEM
        ),
        kind::TASK_ITEM => parent == kind::TASK_LIST,
        kind::TABLE_ROW => parent == kind::TABLE,
        kind::TABLE_CELL => parent == kind::TABLE_ROW,
        _ => true,
    };
    let children_ok = match parent {
        kind::BULLET_LIST | kind::ORDERED_LIST => k == kind::LIST_ITEM,
        kind::TASK_LIST => k == kind::TASK_ITEM,
        kind::TABLE => k == kind::TABLE_ROW,
        kind::TABLE_ROW => k == kind::TABLE_CELL,
        _ => true,
    };
    if ok && children_ok {
        Ok(())
    } else {
        Err(SchemaViolation::InvalidChild {
            path: path.clone(),
            found: k.to_string(),
            parent: parent.to_string(),
        })
    }
}

fn check_table(node: &Node, path: &Path) -> Result<(), SchemaViolation> {
    let Node::Element(table) = node else {
        return Ok(());
    };
    if table.children.is_empty() {
        return Err(SchemaViolation::EmptyTable { path: path.clone() });
    }

    let mut expected: Option<usize> = None;
    for (row_ix, row) in table.children.iter().enumerate() {
        let Node::Element(row) = row else {
            continue;
        };
        // Effective width counts colspans, so merged rows still line up.
        let cols: usize = row
            .children
            .iter()
            .map(|c| match c {
                Node::Element(cell) => cell.colspan(),
                _ => 1,
            })
            .sum();
        match expected {
            None => expected = Some(cols),
            Some(e) if e != cols => {
                return Err(SchemaViolation::RaggedTable {
                    path: path.clone(),
                    row: row_ix,
                    cols,
                    expected: e,
                });
            }
            Some(_) => {}
        }
    }
    if expected == Some(0) {
        return Err(SchemaViolation::RaggedTable {
            path: path.clone(),
            row: 0,
            cols: 0,
            expected: 1,
        });
    }
    Ok(())
}

/// Deterministic repairs run inside every commit, before validation:
/// an empty document gets a paragraph, inline blocks get a text leaf,
/// and adjacent text runs with identical marks are folded together.
/// Returns ops for one round; the dispatcher iterates to a fixpoint.
pub fn normalize_ops(doc: &Document) -> Vec<Op> {
    if doc.children.is_empty() {
        return vec![Op::InsertNode {
            path: vec![0],
            node: Node::paragraph(""),
        }];
    }

    let mut ops = Vec::new();
    let mut path = Vec::new();
    normalize_walk(&doc.children, &mut path, &mut ops);
    ops
}

fn normalize_walk(children: &[Node], path: &mut Path, ops: &mut Vec<Op>) {
    for (ix, node) in children.iter().enumerate() {
        let Node::Element(el) = node else {
            continue;
        };
        path.push(ix);

        if is_inline_block(&el.kind) {
            if !el.children.iter().any(|n| matches!(n, Node::Text(_))) {
                let mut insert_path = path.clone();
                insert_path.push(0);
                ops.push(Op::InsertNode {
                    path: insert_path,
                    node: Node::text(""),
                });
            } else if let Some(merge) = first_mergeable_pair(&el.children) {
                let (left_ix, left_len, right_text) = merge;
                let mut left_path = path.clone();
                left_path.push(left_ix);
                let mut right_path = path.clone();
                right_path.push(left_ix + 1);
                if !right_text.is_empty() {
                    ops.push(Op::InsertText {
                        path: left_path,
                        offset: left_len,
                        text: right_text,
                    });
                }
                ops.push(Op::RemoveNode { path: right_path });
            }
        } else {
            normalize_walk(&el.children, path, ops);
        }

        path.pop();
    }
}

fn first_mergeable_pair(children: &[Node]) -> Option<(usize, usize, String)> {
    for ix in 0..children.len().saturating_sub(1) {
        if let (Node::Text(left), Node::Text(right)) = (&children[ix], &children[ix + 1]) {
            if left.marks == right.marks {
                return Some((ix, left.text.len(), right.text.clone()));
            }
        }
    }
    None
}
