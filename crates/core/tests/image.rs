use scribe_core::{Dispatcher, DispatchOutcome, Document, Node, Point, Selection};

const DATA_URI: &str = "data:image/png;base64,iVBORw0KGgo=";

fn paragraph_children(doc: &Document) -> &[Node] {
    let Node::Element(p) = &doc.children[0] else {
        panic!("expected paragraph");
    };
    &p.children
}

#[test]
fn image_lands_inline_between_the_split_text_runs() {
    let mut dispatcher = Dispatcher::with_standard(Document {
        children: vec![Node::paragraph("hello world")],
    });
    dispatcher.set_selection(Selection::collapsed(Point::new(vec![0, 0], 5)));

    let outcomes = dispatcher.dispatch(
        "image.insert",
        Some(serde_json::json!({ "src": DATA_URI })),
    );
    assert!(outcomes.iter().all(DispatchOutcome::is_committed));

    let children = paragraph_children(dispatcher.doc());
    assert_eq!(children.len(), 3);
    assert!(matches!(&children[0], Node::Text(t) if t.text == "hello"));
    let Node::Void(image) = &children[1] else {
        panic!("expected image void");
    };
    assert_eq!(image.kind, "image");
    assert_eq!(image.attr_str("src"), Some(DATA_URI));
    assert!(matches!(&children[2], Node::Text(t) if t.text == " world"));

    // Caret lands at the start of the trailing run.
    assert_eq!(dispatcher.selection().head, Point::new(vec![0, 2], 0));
}

#[test]
fn image_insert_without_src_is_rejected() {
    let mut dispatcher = Dispatcher::with_standard(Document::empty());

    for args in [None, Some(serde_json::json!({ "src": "" }))] {
        let outcomes = dispatcher.dispatch("image.insert", args);
        assert!(matches!(
            outcomes.as_slice(),
            [DispatchOutcome::Rejected { .. }]
        ));
    }
    assert_eq!(dispatcher.doc(), &Document::empty());
}

#[test]
fn explicit_drop_point_wins_over_the_selection() {
    let mut dispatcher = Dispatcher::with_standard(Document {
        children: vec![Node::paragraph("abcdef")],
    });
    dispatcher.set_selection(Selection::collapsed(Point::new(vec![0, 0], 1)));

    let outcomes = dispatcher.dispatch(
        "image.insert",
        Some(serde_json::json!({
            "src": DATA_URI,
            "at": { "path": [0, 0], "offset": 3 },
        })),
    );
    assert!(outcomes.iter().all(DispatchOutcome::is_committed));

    let children = paragraph_children(dispatcher.doc());
    assert!(matches!(&children[0], Node::Text(t) if t.text == "abc"));
    assert!(matches!(&children[1], Node::Void(v) if v.kind == "image"));
    assert!(matches!(&children[2], Node::Text(t) if t.text == "def"));
}

#[test]
fn explicit_drop_point_keeps_ranged_selection_text() {
    let mut dispatcher = Dispatcher::with_standard(Document {
        children: vec![Node::paragraph("abcdef")],
    });
    dispatcher.set_selection(Selection {
        anchor: Point::new(vec![0, 0], 1),
        head: Point::new(vec![0, 0], 4),
    });

    let outcomes = dispatcher.dispatch(
        "image.insert",
        Some(serde_json::json!({
            "src": DATA_URI,
            "at": { "path": [0, 0], "offset": 2 },
        })),
    );
    assert!(outcomes.iter().all(DispatchOutcome::is_committed));

    // The drop point is explicit, so the selected text is not replaced.
    let children = paragraph_children(dispatcher.doc());
    assert!(matches!(&children[0], Node::Text(t) if t.text == "ab"));
    assert!(matches!(&children[1], Node::Void(v) if v.kind == "image"));
    assert!(matches!(&children[2], Node::Text(t) if t.text == "cdef"));
}

#[test]
fn mention_is_an_inline_void_with_id_and_label() {
    let mut dispatcher = Dispatcher::with_standard(Document {
        children: vec![Node::paragraph("hi ")],
    });
    dispatcher.set_selection(Selection::collapsed(Point::new(vec![0, 0], 3)));

    let outcomes = dispatcher.dispatch(
        "mention.insert",
        Some(serde_json::json!({ "id": "u42", "label": "ana" })),
    );
    assert!(outcomes.iter().all(DispatchOutcome::is_committed));

    let children = paragraph_children(dispatcher.doc());
    assert_eq!(children.len(), 3);
    let Node::Void(mention) = &children[1] else {
        panic!("expected mention void");
    };
    assert_eq!(mention.kind, "mention");
    assert_eq!(mention.attr_str("id"), Some("u42"));
    assert_eq!(mention.attr_str("label"), Some("ana"));
}

#[test]
fn mention_without_id_is_rejected() {
    let mut dispatcher = Dispatcher::with_standard(Document::empty());
    let outcomes = dispatcher.dispatch(
        "mention.insert",
        Some(serde_json::json!({ "label": "ana" })),
    );
    assert!(matches!(
        outcomes.as_slice(),
        [DispatchOutcome::Rejected { .. }]
    ));
}

#[test]
fn divider_is_inserted_after_the_focus_block() {
    let mut dispatcher = Dispatcher::with_standard(Document {
        children: vec![Node::paragraph("above"), Node::paragraph("below")],
    });

    let outcomes = dispatcher.dispatch("insert.divider", None);
    assert!(outcomes.iter().all(DispatchOutcome::is_committed));

    let children = &dispatcher.doc().children;
    assert_eq!(children.len(), 3);
    assert!(matches!(&children[1], Node::Void(v) if v.kind == "divider"));
    assert!(matches!(&children[2], Node::Element(el) if el.kind == "paragraph"));
}
