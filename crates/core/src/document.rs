use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ops::{Op, Path};
use crate::schema::kind;

pub type Attrs = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Document {
    /// The document every session falls back to: one empty paragraph.
    pub fn empty() -> Self {
        Document {
            children: vec![Node::paragraph("")],
        }
    }

    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        let mut node = self.children.get(*path.first()?)?;
        for &ix in path.iter().skip(1) {
            node = match node {
                Node::Element(el) => el.children.get(ix)?,
                Node::Text(_) | Node::Void(_) => return None,
            };
        }
        Some(node)
    }

    pub fn node_at_mut(&mut self, path: &[usize]) -> Result<&mut Node, PathError> {
        let (&first, rest) = path
            .split_first()
            .ok_or_else(|| PathError("empty path".into()))?;
        let root = self
            .children
            .get_mut(first)
            .ok_or_else(|| PathError(format!("index {first} out of bounds at document root")))?;
        descend_mut(root, rest)
    }

    /// Nearest ancestor element of `kind` containing `path`, including the
    /// node at `path` itself.
    pub fn ancestor_of_kind(&self, path: &[usize], wanted: &str) -> Option<Path> {
        for len in (1..=path.len()).rev() {
            let candidate = &path[..len];
            if let Some(Node::Element(el)) = self.node_at(candidate) {
                if el.kind == wanted {
                    return Some(candidate.to_vec());
                }
            }
        }
        None
    }
}

fn descend_mut<'a>(node: &'a mut Node, path: &[usize]) -> Result<&'a mut Node, PathError> {
    let Some((&ix, rest)) = path.split_first() else {
        return Ok(node);
    };
    match node {
        Node::Element(el) => {
            let child = el
                .children
                .get_mut(ix)
                .ok_or_else(|| PathError(format!("index {ix} out of bounds")))?;
            descend_mut(child, rest)
        }
        Node::Text(_) | Node::Void(_) => Err(PathError("descended into a leaf".into())),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
    Void(VoidNode),
}

impl Node {
    pub fn element(kind: impl Into<String>, attrs: Attrs, children: Vec<Node>) -> Self {
        Node::Element(ElementNode {
            kind: kind.into(),
            attrs,
            children,
        })
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Node::element(kind::PARAGRAPH, Attrs::default(), vec![Node::text(text)])
    }

    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        let mut attrs = Attrs::default();
        attrs.insert("level".to_string(), Value::from(level));
        Node::element(kind::HEADING, attrs, vec![Node::text(text)])
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks: Marks::default(),
        })
    }

    pub fn marked_text(text: impl Into<String>, marks: Marks) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks,
        })
    }

    pub fn image(src: impl Into<String>, alt: Option<String>) -> Self {
        let mut attrs = Attrs::default();
        attrs.insert("src".to_string(), Value::String(src.into()));
        if let Some(alt) = alt {
            attrs.insert("alt".to_string(), Value::String(alt));
        }
        Node::Void(VoidNode {
            kind: kind::IMAGE.to_string(),
            attrs,
        })
    }

    pub fn mention(id: impl Into<String>, label: impl Into<String>) -> Self {
        let mut attrs = Attrs::default();
        attrs.insert("id".to_string(), Value::String(id.into()));
        attrs.insert("label".to_string(), Value::String(label.into()));
        Node::Void(VoidNode {
            kind: kind::MENTION.to_string(),
            attrs,
        })
    }

    pub fn divider() -> Self {
        Node::Void(VoidNode {
            kind: kind::DIVIDER.to_string(),
            attrs: Attrs::default(),
        })
    }

    pub fn kind(&self) -> &str {
        match self {
            Node::Element(el) => &el.kind,
            Node::Void(v) => &v.kind,
            Node::Text(_) => kind::TEXT,
        }
    }

    pub fn is_kind(&self, wanted: &str) -> bool {
        self.kind() == wanted
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub kind: String,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl ElementNode {
    pub fn attr_u64(&self, name: &str) -> Option<u64> {
        self.attrs.get(name).and_then(Value::as_u64)
    }

    pub fn attr_bool(&self, name: &str) -> Option<bool> {
        self.attrs.get(name).and_then(Value::as_bool)
    }

    /// Horizontal span of a table cell; anything other than an integer >= 1
    /// counts as 1.
    pub fn colspan(&self) -> usize {
        self.attr_u64("colspan").map(|v| v.max(1) as usize).unwrap_or(1)
    }

    pub fn rowspan(&self) -> usize {
        self.attr_u64("rowspan").map(|v| v.max(1) as usize).unwrap_or(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoidNode {
    pub kind: String,
    #[serde(default)]
    pub attrs: Attrs,
}

impl VoidNode {
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).and_then(Value::as_str)
    }

    /// Width a void occupies in the flattened inline text of its block.
    pub fn inline_len(&self) -> usize {
        1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Marks {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default)]
    pub highlight: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Marks {
    pub fn is_plain(&self) -> bool {
        *self == Marks::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Path,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub head: Point,
}

impl Selection {
    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            head: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }

    /// Anchor and head in document order.
    pub fn ordered(&self) -> (Point, Point) {
        let mut start = self.anchor.clone();
        let mut end = self.head.clone();
        if start.path == end.path {
            if end.offset < start.offset {
                std::mem::swap(&mut start, &mut end);
            }
            return (start, end);
        }
        if end.path < start.path {
            std::mem::swap(&mut start, &mut end);
        }
        (start, end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid path: {0}")]
pub struct PathError(pub String);

pub(crate) fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

/// Applies one op to the tree, keeping the selection pointing at the same
/// content, and returns the inverse op for the mutation log.
pub fn apply_op(doc: &mut Document, selection: &mut Selection, op: Op) -> Result<Op, PathError> {
    match op {
        Op::InsertText { path, offset, text } => {
            let text_node = text_node_mut(doc, &path)?;
            let offset = clamp_to_char_boundary(&text_node.text, offset);
            text_node.text.insert_str(offset, &text);
            shift_points_insert_text(selection, &path, offset, text.len());
            Ok(Op::RemoveText {
                path,
                range: offset..offset + text.len(),
            })
        }
        Op::RemoveText { path, range } => {
            let text_node = text_node_mut(doc, &path)?;
            let start = clamp_to_char_boundary(&text_node.text, range.start);
            let end = clamp_to_char_boundary(&text_node.text, range.end.min(text_node.text.len()));
            if start >= end {
                return Ok(Op::InsertText {
                    path,
                    offset: start,
                    text: String::new(),
                });
            }
            let removed = text_node.text[start..end].to_string();
            text_node.text.replace_range(start..end, "");
            shift_points_remove_text(selection, &path, start..end);
            Ok(Op::InsertText {
                path,
                offset: start,
                text: removed,
            })
        }
        Op::InsertNode { path, node } => {
            insert_node(doc, &path, node)?;
            shift_points_insert_node(selection, &path);
            Ok(Op::RemoveNode { path })
        }
        Op::RemoveNode { path } => {
            let removed = remove_node(doc, &path)?;
            shift_points_remove_node(selection, &path, &removed, doc);
            Ok(Op::InsertNode {
                path,
                node: removed,
            })
        }
        Op::SetNodeAttrs { path, patch } => {
            let node = doc.node_at_mut(&path)?;
            let old = match node {
                Node::Element(el) => patch_attrs(&mut el.attrs, &patch),
                Node::Void(v) => patch_attrs(&mut v.attrs, &patch),
                Node::Text(_) => return Err(PathError("text nodes carry no attrs".into())),
            };
            Ok(Op::SetNodeAttrs { path, patch: old })
        }
        Op::SetTextMarks { path, marks } => {
            let text_node = text_node_mut(doc, &path)?;
            let old = std::mem::replace(&mut text_node.marks, marks);
            Ok(Op::SetTextMarks { path, marks: old })
        }
    }
}

fn text_node_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut TextNode, PathError> {
    match doc.node_at_mut(path)? {
        Node::Text(t) => Ok(t),
        other => Err(PathError(format!("expected text node, found {}", other.kind()))),
    }
}

fn insert_node(doc: &mut Document, path: &[usize], node: Node) -> Result<(), PathError> {
    let (&index, parent_path) = path
        .split_last()
        .map(|(ix, p)| (ix, p))
        .ok_or_else(|| PathError("empty insert path".into()))?;

    let children = siblings_mut(doc, parent_path)?;
    if index > children.len() {
        return Err(PathError(format!(
            "insert index {index} out of bounds ({} children)",
            children.len()
        )));
    }
    children.insert(index, node);
    Ok(())
}

fn remove_node(doc: &mut Document, path: &[usize]) -> Result<Node, PathError> {
    let (&index, parent_path) = path
        .split_last()
        .map(|(ix, p)| (ix, p))
        .ok_or_else(|| PathError("empty remove path".into()))?;

    let children = siblings_mut(doc, parent_path)?;
    if index >= children.len() {
        return Err(PathError(format!(
            "remove index {index} out of bounds ({} children)",
            children.len()
        )));
    }
    Ok(children.remove(index))
}

fn siblings_mut<'a>(
    doc: &'a mut Document,
    parent_path: &[usize],
) -> Result<&'a mut Vec<Node>, PathError> {
    if parent_path.is_empty() {
        return Ok(&mut doc.children);
    }
    match doc.node_at_mut(parent_path)? {
        Node::Element(el) => Ok(&mut el.children),
        other => Err(PathError(format!(
            "parent {} is not a container",
            other.kind()
        ))),
    }
}

fn shift_points_insert_text(selection: &mut Selection, path: &[usize], offset: usize, len: usize) {
    for point in [&mut selection.anchor, &mut selection.head] {
        if point.path == path && point.offset >= offset {
            point.offset = point.offset.saturating_add(len);
        }
    }
}

fn shift_points_remove_text(
    selection: &mut Selection,
    path: &[usize],
    range: std::ops::Range<usize>,
) {
    let removed_len = range.end.saturating_sub(range.start);
    for point in [&mut selection.anchor, &mut selection.head] {
        if point.path != path || point.offset <= range.start {
            continue;
        }
        if point.offset >= range.end {
            point.offset = point.offset.saturating_sub(removed_len);
        } else {
            point.offset = range.start;
        }
    }
}

fn shift_points_insert_node(selection: &mut Selection, path: &[usize]) {
    let Some((&index, parent_path)) = path.split_last() else {
        return;
    };
    for point in [&mut selection.anchor, &mut selection.head] {
        if point.path.len() <= parent_path.len() || !point.path.starts_with(parent_path) {
            continue;
        }
        let depth = parent_path.len();
        if point.path[depth] >= index {
            point.path[depth] += 1;
        }
    }
}

fn shift_points_remove_node(
    selection: &mut Selection,
    path: &[usize],
    removed: &Node,
    doc_after_remove: &Document,
) {
    let Some((&index, parent_path)) = path.split_last() else {
        return;
    };

    // When a text run was folded into its left sibling (the defragmentation
    // pass inserts the run's text into the neighbor first, then removes the
    // node), points inside the removed run map into the neighbor.
    let merged_prefix = match (removed, index.checked_sub(1)) {
        (Node::Text(removed_text), Some(left_index)) => {
            let mut left_path = parent_path.to_vec();
            left_path.push(left_index);
            match doc_after_remove.node_at(&left_path) {
                Some(Node::Text(left))
                    if left.marks == removed_text.marks
                        && left.text.ends_with(&removed_text.text) =>
                {
                    Some(left.text.len().saturating_sub(removed_text.text.len()))
                }
                _ => None,
            }
        }
        _ => None,
    };

    for point in [&mut selection.anchor, &mut selection.head] {
        if point.path.len() <= parent_path.len() || !point.path.starts_with(parent_path) {
            continue;
        }
        let depth = parent_path.len();
        let ix = point.path[depth];
        if ix > index {
            point.path[depth] = ix - 1;
            continue;
        }
        if ix < index {
            continue;
        }

        if let (Some(prefix), Node::Text(removed_text)) = (merged_prefix, removed) {
            point.path.truncate(depth + 1);
            point.path[depth] = index - 1;
            point.offset = (prefix + point.offset).min(prefix + removed_text.text.len());
        } else {
            point.path.truncate(depth + 1);
            point.path[depth] = index.saturating_sub(1);
            point.offset = 0;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttrPatch {
    #[serde(default)]
    pub set: Attrs,
    #[serde(default)]
    pub remove: Vec<String>,
}

impl AttrPatch {
    pub fn set_one(name: impl Into<String>, value: Value) -> Self {
        let mut set = Attrs::default();
        set.insert(name.into(), value);
        AttrPatch {
            set,
            remove: Vec::new(),
        }
    }
}

fn patch_attrs(attrs: &mut Attrs, patch: &AttrPatch) -> AttrPatch {
    let mut old_set = Attrs::new();
    let mut old_remove = Vec::new();

    for (k, v) in &patch.set {
        if let Some(prev) = attrs.insert(k.clone(), v.clone()) {
            old_set.insert(k.clone(), prev);
        } else {
            old_remove.push(k.clone());
        }
    }
    for key in &patch.remove {
        if let Some(prev) = attrs.remove(key) {
            old_set.insert(key.clone(), prev);
        }
    }

    AttrPatch {
        set: old_set,
        remove: old_remove,
    }
}

/// Clamps a selection so both points address existing text nodes.
pub fn normalize_selection(doc: &Document, selection: &Selection) -> Selection {
    let fallback = first_text_point(doc).unwrap_or(Point {
        path: vec![0],
        offset: 0,
    });

    let anchor = clamp_point(doc, &selection.anchor).unwrap_or_else(|| {
        clamp_point(doc, &selection.head).unwrap_or_else(|| fallback.clone())
    });
    let head = clamp_point(doc, &selection.head).unwrap_or_else(|| anchor.clone());

    Selection { anchor, head }
}

pub fn first_text_point(doc: &Document) -> Option<Point> {
    fn walk(children: &[Node], path: &mut Vec<usize>) -> Option<Point> {
        for (ix, node) in children.iter().enumerate() {
            path.push(ix);
            match node {
                Node::Text(_) => {
                    let point = Point::new(path.clone(), 0);
                    path.pop();
                    return Some(point);
                }
                Node::Element(el) => {
                    if let Some(point) = walk(&el.children, path) {
                        path.pop();
                        return Some(point);
                    }
                }
                Node::Void(_) => {}
            }
            path.pop();
        }
        None
    }
    walk(&doc.children, &mut Vec::new())
}

fn clamp_point(doc: &Document, point: &Point) -> Option<Point> {
    if point.path.is_empty() || doc.children.is_empty() {
        return None;
    }

    let mut resolved: Path = Vec::new();
    let mut children: &[Node] = &doc.children;

    for &wanted in &point.path {
        if children.is_empty() {
            break;
        }
        let ix = wanted.min(children.len() - 1);
        resolved.push(ix);
        match &children[ix] {
            Node::Text(t) => {
                return Some(Point::new(
                    resolved,
                    clamp_to_char_boundary(&t.text, point.offset),
                ));
            }
            Node::Element(el) => children = &el.children,
            Node::Void(_) => break,
        }
    }

    // Path ran out above a text node; take the first text descendant.
    let sub = doc.node_at(&resolved)?;
    if let Node::Element(el) = sub {
        let subdoc = Document {
            children: el.children.clone(),
        };
        if let Some(inner) = first_text_point(&subdoc) {
            let mut path = resolved;
            path.extend(inner.path);
            return Some(Point::new(path, 0));
        }
    }
    None
}
