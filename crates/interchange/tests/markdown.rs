use scribe_core::{Document, Node};
use scribe_interchange::markdown;

fn runs(node: &Node) -> Vec<(&str, &scribe_core::Marks)> {
    let Node::Element(el) = node else {
        panic!("expected element");
    };
    el.children
        .iter()
        .map(|n| match n {
            Node::Text(t) => (t.text.as_str(), &t.marks),
            other => panic!("expected text run, found {other:?}"),
        })
        .collect()
}

#[test]
fn blank_input_yields_the_empty_paragraph_document() {
    assert_eq!(markdown::parse(""), Document::empty());
    assert_eq!(markdown::parse("   \n\n  "), Document::empty());
}

#[test]
fn headings_and_inline_marks() {
    let doc = markdown::parse("## Title\n\nHello **bold** and *italic* and `code`.\n");

    let Node::Element(h) = &doc.children[0] else {
        panic!("expected heading");
    };
    assert_eq!(h.kind, "heading");
    assert_eq!(h.attr_u64("level"), Some(2));

    let runs = runs(&doc.children[1]);
    assert_eq!(runs[0].0, "Hello ");
    assert!(runs[0].1.is_plain());
    assert_eq!(runs[1].0, "bold");
    assert!(runs[1].1.bold);
    assert_eq!(runs[2].0, " and ");
    assert_eq!(runs[3].0, "italic");
    assert!(runs[3].1.italic);
    assert_eq!(runs[5].0, "code");
    assert!(runs[5].1.code);
}

#[test]
fn strikethrough_and_links() {
    let doc = markdown::parse("~~gone~~ [site](https://example.com)\n");
    let runs = runs(&doc.children[0]);
    assert!(runs[0].1.strikethrough);
    assert_eq!(runs[2].0, "site");
    assert_eq!(runs[2].1.link.as_deref(), Some("https://example.com"));
}

#[test]
fn underline_and_highlight_html_toggles() {
    let doc = markdown::parse("a <u>under</u> b <mark>hot</mark> c\n");
    let runs = runs(&doc.children[0]);
    let under = runs.iter().find(|(text, _)| *text == "under").unwrap();
    assert!(under.1.underline);
    let hot = runs.iter().find(|(text, _)| *text == "hot").unwrap();
    assert!(hot.1.highlight);
    assert!(runs.last().unwrap().1.is_plain());
}

#[test]
fn task_lists_carry_checked_state() {
    let doc = markdown::parse("- [ ] one\n- [x] two\n");
    let Node::Element(list) = &doc.children[0] else {
        panic!("expected list");
    };
    assert_eq!(list.kind, "task_list");
    let checked: Vec<_> = list
        .children
        .iter()
        .map(|item| match item {
            Node::Element(el) => {
                assert_eq!(el.kind, "task_item");
                el.attr_bool("checked").unwrap()
            }
            other => panic!("expected item, found {other:?}"),
        })
        .collect();
    assert_eq!(checked, vec![false, true]);
}

#[test]
fn plain_lists_stay_plain() {
    let doc = markdown::parse("1. one\n2. two\n\n- bullet\n");
    assert!(matches!(
        &doc.children[0],
        Node::Element(el) if el.kind == "ordered_list"
    ));
    assert!(matches!(
        &doc.children[1],
        Node::Element(el) if el.kind == "bullet_list"
    ));
}

#[test]
fn tables_get_header_attrs_from_the_header_row() {
    let doc = markdown::parse("| a | b |\n| --- | --- |\n| c | d |\n");
    let Node::Element(table) = &doc.children[0] else {
        panic!("expected table");
    };
    assert_eq!(table.kind, "table");
    assert_eq!(table.children.len(), 2);

    let Node::Element(header_row) = &table.children[0] else {
        panic!("expected row");
    };
    for cell in &header_row.children {
        let Node::Element(cell) = cell else {
            panic!("expected cell");
        };
        assert_eq!(cell.attr_bool("header"), Some(true));
        assert!(matches!(
            &cell.children[0],
            Node::Element(p) if p.kind == "paragraph"
        ));
    }

    let Node::Element(body_row) = &table.children[1] else {
        panic!("expected row");
    };
    let Node::Element(cell) = &body_row.children[0] else {
        panic!("expected cell");
    };
    assert_eq!(cell.attr_bool("header"), None);
    scribe_core::validate(&doc).expect("parsed table satisfies the schema");
}

#[test]
fn images_code_blocks_and_dividers() {
    let doc = markdown::parse("![pic](https://example.com/x.png)\n\n---\n\n```\nlet x = 1;\n```\n");

    let Node::Element(p) = &doc.children[0] else {
        panic!("expected paragraph");
    };
    let image = p
        .children
        .iter()
        .find_map(|n| match n {
            Node::Void(v) if v.kind == "image" => Some(v),
            _ => None,
        })
        .expect("image void");
    assert_eq!(image.attr_str("src"), Some("https://example.com/x.png"));
    assert_eq!(image.attr_str("alt"), Some("pic"));

    assert!(matches!(&doc.children[1], Node::Void(v) if v.kind == "divider"));

    let Node::Element(code) = &doc.children[2] else {
        panic!("expected code block");
    };
    assert_eq!(code.kind, "code_block");
    assert!(matches!(
        &code.children[0],
        Node::Text(t) if t.text == "let x = 1;"
    ));
}

#[test]
fn parsed_documents_validate() {
    let doc = markdown::parse(
        "# H\n\npara **b**\n\n- [ ] t\n\n| a |\n| --- |\n| b |\n\n> quote\n",
    );
    scribe_core::validate(&doc).expect("ingested markdown satisfies the schema");
}
