//! Table structure editing. Rows and columns are inserted relative to the
//! cell holding the selection; deleting the last row or column removes the
//! table itself without leaving a placeholder behind.

use serde_json::Value;

use crate::command::inline::*;
use crate::command::{CommandSpec, NotApplicable};
use crate::document::{AttrPatch, Attrs, Document, ElementNode, Node, Point, Selection};
use crate::ops::{Edit, Op, Path};
use crate::schema::kind;

pub(crate) fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("table.insert", "Insert table", |doc, selection, args| {
            insert_table(doc, selection, args)
        })
        .applicable_when(|doc, selection| {
            doc.ancestor_of_kind(&selection.head.path, kind::TABLE)
                .is_none()
        })
        .active_when(in_table),
        cell_command("table.add_row_before", "Add row above", |doc, sel, ctx| {
            add_row(doc, sel, ctx, 0)
        }),
        cell_command("table.add_row_after", "Add row below", |doc, sel, ctx| {
            add_row(doc, sel, ctx, 1)
        }),
        cell_command("table.add_col_before", "Add column left", |doc, sel, ctx| {
            add_col(doc, sel, ctx, 0)
        }),
        cell_command("table.add_col_after", "Add column right", |doc, sel, ctx| {
            add_col(doc, sel, ctx, 1)
        }),
        cell_command("table.delete_row", "Delete row", delete_row),
        cell_command("table.delete_col", "Delete column", delete_col),
        cell_command("table.delete_table", "Delete table", |_, _, ctx| {
            Ok(Edit::new(vec![Op::RemoveNode {
                path: ctx.table_path.clone(),
            }])
            .source("table.delete_table"))
        }),
        CommandSpec::new("table.merge_cells", "Merge cells", |doc, selection, _| {
            merge_cells(doc, selection)
        })
        .applicable_when(|doc, selection| merge_span(doc, selection).is_some())
        .active_when(|_, _| false),
        cell_command("table.split_cell", "Split cell", split_cell).applicable_when(
            |doc, selection| {
                cell_context(doc, selection)
                    .and_then(|ctx| ctx.cell(doc).map(|c| c.colspan() > 1 || c.rowspan() > 1))
                    .unwrap_or(false)
            },
        ),
        cell_command("table.toggle_header_row", "Toggle header row", toggle_header_row)
            .active_when(|doc, selection| {
                cell_context(doc, selection)
                    .map(|ctx| row_is_header(doc, &ctx))
                    .unwrap_or(false)
            }),
        // Backspace at the start of the only cell of a 1x1 table removes the
        // whole table instead of joining into it.
        CommandSpec::new(
            "table.delete_single_cell",
            "Delete single-cell table",
            |doc, selection, _| {
                let ctx = single_cell_backspace_context(doc, selection).ok_or(NotApplicable)?;
                Ok(Edit::new(vec![Op::RemoveNode {
                    path: ctx.table_path.clone(),
                }])
                .source("table.delete_single_cell"))
            },
        )
        .applicable_when(|doc, selection| single_cell_backspace_context(doc, selection).is_some())
        .active_when(|_, _| false),
    ]
}

fn cell_command(
    id: &'static str,
    label: &'static str,
    build: impl Fn(&Document, &Selection, &CellContext) -> Result<Edit, NotApplicable>
    + Send
    + Sync
    + 'static,
) -> CommandSpec {
    CommandSpec::new(id, label, move |doc, selection, _args| {
        let ctx = cell_context(doc, selection).ok_or(NotApplicable)?;
        build(doc, selection, &ctx)
    })
    .applicable_when(|doc, selection| cell_context(doc, selection).is_some())
    .active_when(|_, _| false)
}

fn in_table(doc: &Document, selection: &Selection) -> bool {
    doc.ancestor_of_kind(&selection.head.path, kind::TABLE)
        .is_some()
}

pub(crate) struct CellContext {
    pub table_path: Path,
    pub row_ix: usize,
    pub cell_ix: usize,
}

impl CellContext {
    fn row_path(&self) -> Path {
        let mut p = self.table_path.clone();
        p.push(self.row_ix);
        p
    }

    fn cell_path(&self) -> Path {
        let mut p = self.row_path();
        p.push(self.cell_ix);
        p
    }

    fn table<'a>(&self, doc: &'a Document) -> Option<&'a ElementNode> {
        match doc.node_at(&self.table_path) {
            Some(Node::Element(el)) if el.kind == kind::TABLE => Some(el),
            _ => None,
        }
    }

    fn row<'a>(&self, doc: &'a Document) -> Option<&'a ElementNode> {
        match doc.node_at(&self.row_path()) {
            Some(Node::Element(el)) if el.kind == kind::TABLE_ROW => Some(el),
            _ => None,
        }
    }

    fn cell<'a>(&self, doc: &'a Document) -> Option<&'a ElementNode> {
        match doc.node_at(&self.cell_path()) {
            Some(Node::Element(el)) if el.kind == kind::TABLE_CELL => Some(el),
            _ => None,
        }
    }
}

/// Locates the cell, row, and table enclosing the selection head.
pub(crate) fn cell_context(doc: &Document, selection: &Selection) -> Option<CellContext> {
    cell_context_at(doc, &selection.head.path)
}

fn cell_context_at(doc: &Document, path: &[usize]) -> Option<CellContext> {
    let cell_path = doc.ancestor_of_kind(path, kind::TABLE_CELL)?;
    let (&cell_ix, row_path) = cell_path.split_last()?;
    let (&row_ix, table_path) = row_path.split_last()?;
    match doc.node_at(table_path) {
        Some(Node::Element(el)) if el.kind == kind::TABLE => Some(CellContext {
            table_path: table_path.to_vec(),
            row_ix,
            cell_ix,
        }),
        _ => None,
    }
}

/// The run of cells a merge would cover: both selection ends must sit in
/// distinct cells of the same row. Returns the context of the leftmost
/// cell and the number of cells spanned.
fn merge_span(doc: &Document, selection: &Selection) -> Option<(CellContext, usize)> {
    let anchor = cell_context_at(doc, &selection.anchor.path)?;
    let head = cell_context_at(doc, &selection.head.path)?;
    if anchor.table_path != head.table_path
        || anchor.row_ix != head.row_ix
        || anchor.cell_ix == head.cell_ix
    {
        return None;
    }
    let lo = anchor.cell_ix.min(head.cell_ix);
    let hi = anchor.cell_ix.max(head.cell_ix);
    Some((
        CellContext {
            table_path: anchor.table_path,
            row_ix: anchor.row_ix,
            cell_ix: lo,
        },
        hi - lo + 1,
    ))
}

fn empty_cell(header: bool) -> Node {
    let mut attrs = Attrs::default();
    if header {
        attrs.insert("header".to_string(), Value::Bool(true));
    }
    Node::element(kind::TABLE_CELL, attrs, vec![Node::paragraph("")])
}

fn insert_table(
    doc: &Document,
    selection: &Selection,
    args: Option<&Value>,
) -> Result<Edit, NotApplicable> {
    if in_table(doc, selection) {
        return Err(NotApplicable);
    }
    let rows = args
        .and_then(|a| a.get("rows"))
        .and_then(Value::as_u64)
        .unwrap_or(3)
        .max(1) as usize;
    let cols = args
        .and_then(|a| a.get("cols"))
        .and_then(Value::as_u64)
        .unwrap_or(3)
        .max(1) as usize;
    let with_header_row = args
        .and_then(|a| a.get("with_header_row"))
        .and_then(Value::as_bool)
        .unwrap_or(true);

    let table = Node::element(
        kind::TABLE,
        Attrs::default(),
        (0..rows)
            .map(|r| {
                let header = with_header_row && r == 0;
                Node::element(
                    kind::TABLE_ROW,
                    Attrs::default(),
                    (0..cols).map(|_| empty_cell(header)).collect(),
                )
            })
            .collect(),
    );

    let (parent, ix) = insertion_after_focus(doc, selection);
    let mut table_path = parent;
    table_path.push(ix);

    // Caret into the first cell's paragraph.
    let mut caret = table_path.clone();
    caret.extend([0, 0, 0, 0]);

    Ok(Edit::new(vec![Op::InsertNode {
        path: table_path,
        node: table,
    }])
    .selection_after(Selection::collapsed(Point::new(caret, 0)))
    .source("table.insert"))
}

fn add_row(
    doc: &Document,
    _selection: &Selection,
    ctx: &CellContext,
    delta: usize,
) -> Result<Edit, NotApplicable> {
    let row = ctx.row(doc).ok_or(NotApplicable)?;
    let width: usize = row.children.iter().map(cell_span).sum();

    let cells = (0..width.max(1)).map(|_| empty_cell(false)).collect();
    let node = Node::element(kind::TABLE_ROW, Attrs::default(), cells);

    let mut path = ctx.table_path.clone();
    path.push(ctx.row_ix + delta);

    // Caret into the first cell of the new row.
    let mut caret = path.clone();
    caret.extend([0, 0, 0]);

    Ok(Edit::new(vec![Op::InsertNode { path, node }])
        .selection_after(Selection::collapsed(Point::new(caret, 0)))
        .source("table.add_row"))
}

fn cell_span(cell: &Node) -> usize {
    match cell {
        Node::Element(el) => el.colspan(),
        _ => 1,
    }
}

fn add_col(
    doc: &Document,
    _selection: &Selection,
    ctx: &CellContext,
    delta: usize,
) -> Result<Edit, NotApplicable> {
    let table = ctx.table(doc).ok_or(NotApplicable)?;
    let col_ix = ctx.cell_ix + delta;

    let mut ops = Vec::new();
    for (row_ix, row) in table.children.iter().enumerate() {
        let Node::Element(row_el) = row else {
            continue;
        };
        let header = row_el
            .children
            .first()
            .and_then(|c| match c {
                Node::Element(el) => el.attr_bool("header"),
                _ => None,
            })
            .unwrap_or(false);
        let mut path = ctx.table_path.clone();
        path.push(row_ix);
        path.push(col_ix.min(row_el.children.len()));
        ops.push(Op::InsertNode {
            path,
            node: empty_cell(header),
        });
    }

    // Caret into the new cell of the current row.
    let mut caret = ctx.table_path.clone();
    caret.extend([ctx.row_ix, col_ix, 0, 0]);

    Ok(Edit::new(ops)
        .selection_after(Selection::collapsed(Point::new(caret, 0)))
        .source(if delta == 0 {
            "table.add_col_before"
        } else {
            "table.add_col_after"
        }))
}

fn delete_row(
    doc: &Document,
    _selection: &Selection,
    ctx: &CellContext,
) -> Result<Edit, NotApplicable> {
    let table = ctx.table(doc).ok_or(NotApplicable)?;
    if table.children.len() <= 1 {
        // Deleting the only row deletes the table.
        return Ok(Edit::new(vec![Op::RemoveNode {
            path: ctx.table_path.clone(),
        }])
        .source("table.delete_row"));
    }
    Ok(Edit::new(vec![Op::RemoveNode {
        path: ctx.row_path(),
    }])
    .source("table.delete_row"))
}

fn delete_col(
    doc: &Document,
    _selection: &Selection,
    ctx: &CellContext,
) -> Result<Edit, NotApplicable> {
    let table = ctx.table(doc).ok_or(NotApplicable)?;
    let only_column = table.children.iter().all(|row| match row {
        Node::Element(el) => el.children.len() <= 1,
        _ => true,
    });
    if only_column {
        // Deleting the only column deletes the table.
        return Ok(Edit::new(vec![Op::RemoveNode {
            path: ctx.table_path.clone(),
        }])
        .source("table.delete_col"));
    }

    let mut ops = Vec::new();
    for (row_ix, row) in table.children.iter().enumerate() {
        let Node::Element(row_el) = row else {
            continue;
        };
        if row_el.children.is_empty() {
            continue;
        }
        let mut path = ctx.table_path.clone();
        path.push(row_ix);
        path.push(ctx.cell_ix.min(row_el.children.len() - 1));
        ops.push(Op::RemoveNode { path });
    }

    Ok(Edit::new(ops).source("table.delete_col"))
}

/// Folds the selected run of cells into the leftmost one, summing
/// colspans and concatenating content.
fn merge_cells(doc: &Document, selection: &Selection) -> Result<Edit, NotApplicable> {
    let (ctx, count) = merge_span(doc, selection).ok_or(NotApplicable)?;
    let row = ctx.row(doc).ok_or(NotApplicable)?;
    let cell = ctx.cell(doc).ok_or(NotApplicable)?;

    let mut merged = cell.clone();
    let mut span = cell.colspan();
    for folded in row
        .children
        .iter()
        .skip(ctx.cell_ix + 1)
        .take(count - 1)
    {
        let Node::Element(folded) = folded else {
            return Err(NotApplicable);
        };
        span += folded.colspan();
        merged.children.extend(folded.children.iter().cloned());
    }
    merged
        .attrs
        .insert("colspan".to_string(), Value::from(span));

    // Remove right to left so earlier paths stay valid.
    let mut ops = Vec::new();
    for ix in (ctx.cell_ix + 1..ctx.cell_ix + count).rev() {
        let mut path = ctx.row_path();
        path.push(ix);
        ops.push(Op::RemoveNode { path });
    }
    ops.extend(replace_node(&ctx.cell_path(), Node::Element(merged)));

    Ok(Edit::new(ops).source("table.merge_cells"))
}

/// Breaks a spanning cell back into unit cells. Content stays in the
/// first; a vertical span grows the rows below instead of the row itself.
fn split_cell(
    doc: &Document,
    _selection: &Selection,
    ctx: &CellContext,
) -> Result<Edit, NotApplicable> {
    let cell = ctx.cell(doc).ok_or(NotApplicable)?;
    let colspan = cell.colspan();
    let rowspan = cell.rowspan();
    if colspan <= 1 && rowspan <= 1 {
        return Err(NotApplicable);
    }
    let header = cell.attr_bool("header").unwrap_or(false);

    let mut shrunk = cell.clone();
    shrunk.attrs.remove("colspan");
    shrunk.attrs.remove("rowspan");
    let mut ops = replace_node(&ctx.cell_path(), Node::Element(shrunk));

    for i in 1..colspan {
        let mut path = ctx.row_path();
        path.push(ctx.cell_ix + i);
        ops.push(Op::InsertNode {
            path,
            node: empty_cell(header),
        });
    }

    let table = ctx.table(doc).ok_or(NotApplicable)?;
    let last_row = (ctx.row_ix + rowspan).min(table.children.len());
    for row_ix in ctx.row_ix + 1..last_row {
        let row_len = match &table.children[row_ix] {
            Node::Element(el) => el.children.len(),
            _ => continue,
        };
        let mut path = ctx.table_path.clone();
        path.push(row_ix);
        path.push(ctx.cell_ix.min(row_len));
        ops.push(Op::InsertNode {
            path,
            node: empty_cell(false),
        });
    }

    Ok(Edit::new(ops).source("table.split_cell"))
}

fn row_is_header(doc: &Document, ctx: &CellContext) -> bool {
    ctx.row(doc).is_some_and(|row| {
        !row.children.is_empty()
            && row.children.iter().all(|cell| match cell {
                Node::Element(el) => el.attr_bool("header").unwrap_or(false),
                _ => false,
            })
    })
}

/// Flips the header flag on every cell of the current row.
fn toggle_header_row(
    doc: &Document,
    _selection: &Selection,
    ctx: &CellContext,
) -> Result<Edit, NotApplicable> {
    let row = ctx.row(doc).ok_or(NotApplicable)?;
    let make_header = !row_is_header(doc, ctx);

    let mut ops = Vec::new();
    for cell_ix in 0..row.children.len() {
        let mut path = ctx.row_path();
        path.push(cell_ix);
        let patch = if make_header {
            AttrPatch::set_one("header", Value::Bool(true))
        } else {
            AttrPatch {
                set: Attrs::default(),
                remove: vec!["header".to_string()],
            }
        };
        ops.push(Op::SetNodeAttrs { path, patch });
    }

    Ok(Edit::new(ops).source("table.toggle_header_row"))
}

/// True only for a collapsed selection at offset zero inside the sole,
/// empty-ish cell of a 1x1 table.
fn single_cell_backspace_context(doc: &Document, selection: &Selection) -> Option<CellContext> {
    if !selection.is_collapsed() || selection.head.offset != 0 {
        return None;
    }
    let ctx = cell_context(doc, selection)?;
    let table = ctx.table(doc)?;
    if table.children.len() != 1 {
        return None;
    }
    let row = ctx.row(doc)?;
    if row.children.len() != 1 {
        return None;
    }
    // The caret must sit at the very start of the cell's first block.
    let cell_path = ctx.cell_path();
    let inner = &selection.head.path[cell_path.len()..];
    if inner.iter().any(|&ix| ix != 0) {
        return None;
    }
    Some(ctx)
}
