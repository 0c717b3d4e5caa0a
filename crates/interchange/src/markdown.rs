//! Markdown ingestion via comrak. Tables, task lists, and strikethrough
//! are enabled; `<u>`/`<mark>` inline HTML toggles map onto the underline
//! and highlight marks since Markdown has no syntax of its own for them.

use comrak::nodes::{AstNode, ListType, NodeValue};
use comrak::{parse_document, Arena, Options};

use scribe_core::{kind, Attrs, Document, Marks, Node};

fn options() -> Options {
    let mut options = Options::default();
    options.extension.table = true;
    options.extension.tasklist = true;
    options.extension.strikethrough = true;
    options
}

/// Parses Markdown into a document tree. Comrak accepts any input, so this
/// never fails; blank input yields the empty-paragraph document.
pub fn parse(source: &str) -> Document {
    if source.trim().is_empty() {
        return Document::empty();
    }

    let arena = Arena::new();
    let root = parse_document(&arena, source, &options());

    let mut children = Vec::new();
    for child in root.children() {
        convert_block(child, &mut children);
    }
    if children.is_empty() {
        return Document::empty();
    }
    Document { children }
}

fn convert_block<'a>(node: &'a AstNode<'a>, out: &mut Vec<Node>) {
    match &node.data.borrow().value {
        NodeValue::Paragraph => {
            out.push(inline_block(kind::PARAGRAPH, Attrs::default(), node));
        }
        NodeValue::Heading(heading) => {
            let mut attrs = Attrs::default();
            attrs.insert("level".to_string(), heading.level.into());
            out.push(inline_block(kind::HEADING, attrs, node));
        }
        NodeValue::List(list) => {
            out.push(convert_list(node, list.list_type));
        }
        NodeValue::BlockQuote => {
            let mut blocks = Vec::new();
            for child in node.children() {
                convert_block(child, &mut blocks);
            }
            if blocks.is_empty() {
                blocks.push(Node::paragraph(""));
            }
            out.push(Node::element(kind::BLOCKQUOTE, Attrs::default(), blocks));
        }
        NodeValue::CodeBlock(code) => {
            let text = code.literal.trim_end_matches('\n').to_string();
            out.push(Node::element(
                kind::CODE_BLOCK,
                Attrs::default(),
                vec![Node::text(text)],
            ));
        }
        NodeValue::ThematicBreak => out.push(Node::divider()),
        NodeValue::Table(_) => out.push(convert_table(node)),
        // Raw HTML blocks and anything else comrak emits at the top level
        // have no model counterpart; their text content is dropped.
        _ => {}
    }
}

fn inline_block<'a>(block_kind: &str, attrs: Attrs, node: &'a AstNode<'a>) -> Node {
    let mut marks = Marks::default();
    let mut children = Vec::new();
    for child in node.children() {
        convert_inline(child, &mut marks, &mut children);
    }
    if !children.iter().any(|n| matches!(n, Node::Text(_))) {
        children.push(Node::text(""));
    }
    Node::element(block_kind, attrs, children)
}

fn convert_list<'a>(node: &'a AstNode<'a>, list_type: ListType) -> Node {
    let is_task = node.children().any(|item| {
        matches!(item.data.borrow().value, NodeValue::TaskItem(_))
    });

    let list_kind = if is_task {
        kind::TASK_LIST
    } else if list_type == ListType::Ordered {
        kind::ORDERED_LIST
    } else {
        kind::BULLET_LIST
    };

    let mut items = Vec::new();
    for item in node.children() {
        let checked = match &item.data.borrow().value {
            NodeValue::TaskItem(state) => state.is_some(),
            NodeValue::Item(_) => false,
            _ => continue,
        };

        let mut blocks = Vec::new();
        for child in item.children() {
            convert_block(child, &mut blocks);
        }
        if blocks.is_empty() {
            blocks.push(Node::paragraph(""));
        }

        let item_node = if is_task {
            let mut attrs = Attrs::default();
            attrs.insert("checked".to_string(), checked.into());
            Node::element(kind::TASK_ITEM, attrs, blocks)
        } else {
            Node::element(kind::LIST_ITEM, Attrs::default(), blocks)
        };
        items.push(item_node);
    }

    if items.is_empty() {
        let item = if is_task {
            let mut attrs = Attrs::default();
            attrs.insert("checked".to_string(), false.into());
            Node::element(kind::TASK_ITEM, attrs, vec![Node::paragraph("")])
        } else {
            Node::element(kind::LIST_ITEM, Attrs::default(), vec![Node::paragraph("")])
        };
        items.push(item);
    }
    Node::element(list_kind, Attrs::default(), items)
}

fn convert_table<'a>(node: &'a AstNode<'a>) -> Node {
    let mut rows = Vec::new();
    for row in node.children() {
        let header = match &row.data.borrow().value {
            NodeValue::TableRow(header) => *header,
            _ => continue,
        };
        let mut cells = Vec::new();
        for cell in row.children() {
            if !matches!(cell.data.borrow().value, NodeValue::TableCell) {
                continue;
            }
            let mut attrs = Attrs::default();
            if header {
                attrs.insert("header".to_string(), true.into());
            }
            cells.push(Node::element(
                kind::TABLE_CELL,
                attrs,
                vec![inline_block(kind::PARAGRAPH, Attrs::default(), cell)],
            ));
        }
        rows.push(Node::element(kind::TABLE_ROW, Attrs::default(), cells));
    }
    Node::element(kind::TABLE, Attrs::default(), rows)
}

/// Inline conversion threads a running mark state through the siblings so
/// `<u>`/`</u>` style toggles apply to everything in between.
fn convert_inline<'a>(node: &'a AstNode<'a>, marks: &mut Marks, out: &mut Vec<Node>) {
    match &node.data.borrow().value {
        NodeValue::Text(text) => out.push(Node::marked_text(text.clone(), marks.clone())),
        NodeValue::SoftBreak | NodeValue::LineBreak => {
            out.push(Node::marked_text(" ", marks.clone()));
        }
        NodeValue::Code(code) => {
            let mut m = marks.clone();
            m.code = true;
            out.push(Node::marked_text(code.literal.clone(), m));
        }
        NodeValue::Emph => convert_wrapped(node, marks, out, |m| m.italic = true),
        NodeValue::Strong => convert_wrapped(node, marks, out, |m| m.bold = true),
        NodeValue::Strikethrough => convert_wrapped(node, marks, out, |m| m.strikethrough = true),
        NodeValue::Link(link) => {
            let url = link.url.clone();
            convert_wrapped(node, marks, out, move |m| m.link = Some(url.clone()));
        }
        NodeValue::Image(image) => {
            let alt = collect_text(node);
            let alt = (!alt.is_empty()).then_some(alt);
            if !image.url.is_empty() {
                out.push(Node::image(image.url.clone(), alt));
            }
        }
        NodeValue::HtmlInline(html) => match html.trim() {
            "<u>" => marks.underline = true,
            "</u>" => marks.underline = false,
            "<mark>" => marks.highlight = true,
            "</mark>" => marks.highlight = false,
            _ => {}
        },
        _ => {
            for child in node.children() {
                convert_inline(child, marks, out);
            }
        }
    }
}

fn convert_wrapped<'a>(
    node: &'a AstNode<'a>,
    marks: &Marks,
    out: &mut Vec<Node>,
    apply: impl Fn(&mut Marks),
) {
    let mut inner = marks.clone();
    apply(&mut inner);
    for child in node.children() {
        convert_inline(child, &mut inner, out);
    }
}

fn collect_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut out = String::new();
    fn walk<'a>(node: &'a AstNode<'a>, out: &mut String) {
        for child in node.children() {
            if let NodeValue::Text(text) = &child.data.borrow().value {
                out.push_str(text);
            }
            walk(child, out);
        }
    }
    walk(node, &mut out);
    out
}
