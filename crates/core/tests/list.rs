use scribe_core::{
    Attrs, CapabilitySnapshot, Dispatcher, DispatchOutcome, Document, Node, Point, Selection,
};

fn bullet_doc(items: &[&str]) -> Document {
    let items = items
        .iter()
        .map(|text| Node::element("list_item", Attrs::default(), vec![Node::paragraph(*text)]))
        .collect();
    Document {
        children: vec![Node::element("bullet_list", Attrs::default(), items)],
    }
}

#[test]
fn toggle_bullet_wraps_and_unwraps() {
    let mut dispatcher = Dispatcher::with_standard(Document {
        children: vec![Node::paragraph("item one")],
    });

    let outcomes = dispatcher.dispatch("list.toggle_bullet", None);
    assert!(outcomes.iter().all(DispatchOutcome::is_committed));

    let Node::Element(list) = &dispatcher.doc().children[0] else {
        panic!("expected bullet_list");
    };
    assert_eq!(list.kind, "bullet_list");
    assert_eq!(list.children.len(), 1);
    assert_eq!(dispatcher.selection().head.path, vec![0, 0, 0, 0]);

    let snapshot = CapabilitySnapshot::compute(
        dispatcher.registry(),
        dispatcher.doc(),
        dispatcher.selection(),
        dispatcher.revision(),
    );
    assert!(snapshot.is_active("list.toggle_bullet"));
    assert!(!snapshot.is_active("list.toggle_ordered"));

    // Toggling again lifts the paragraph back out.
    let outcomes = dispatcher.dispatch("list.toggle_bullet", None);
    assert!(outcomes.iter().all(DispatchOutcome::is_committed));
    assert!(matches!(
        &dispatcher.doc().children[0],
        Node::Element(el) if el.kind == "paragraph"
    ));
    assert_eq!(dispatcher.selection().head.path, vec![0, 0]);
}

#[test]
fn toggling_a_different_kind_converts_the_list() {
    let mut dispatcher = Dispatcher::with_standard(bullet_doc(&["a", "b"]));
    dispatcher.set_selection(Selection::collapsed(Point::new(vec![0, 0, 0, 0], 0)));

    let outcomes = dispatcher.dispatch("list.toggle_ordered", None);
    assert!(outcomes.iter().all(DispatchOutcome::is_committed));
    let Node::Element(list) = &dispatcher.doc().children[0] else {
        panic!("expected list");
    };
    assert_eq!(list.kind, "ordered_list");
    assert!(list
        .children
        .iter()
        .all(|item| item.is_kind("list_item")));

    let outcomes = dispatcher.dispatch("list.toggle_task", None);
    assert!(outcomes.iter().all(DispatchOutcome::is_committed));
    let Node::Element(list) = &dispatcher.doc().children[0] else {
        panic!("expected list");
    };
    assert_eq!(list.kind, "task_list");
    for item in &list.children {
        let Node::Element(item) = item else {
            panic!("expected item");
        };
        assert_eq!(item.kind, "task_item");
        assert_eq!(item.attr_bool("checked"), Some(false));
    }
}

#[test]
fn unwrapping_a_middle_item_splits_the_list() {
    let mut dispatcher = Dispatcher::with_standard(bullet_doc(&["a", "b", "c"]));
    dispatcher.set_selection(Selection::collapsed(Point::new(vec![0, 1, 0, 0], 0)));

    let outcomes = dispatcher.dispatch("list.toggle_bullet", None);
    assert!(outcomes.iter().all(DispatchOutcome::is_committed));

    let children = &dispatcher.doc().children;
    assert_eq!(children.len(), 3);
    assert!(matches!(&children[0], Node::Element(el) if el.kind == "bullet_list"));
    assert!(matches!(&children[1], Node::Element(el) if el.kind == "paragraph"));
    assert!(matches!(&children[2], Node::Element(el) if el.kind == "bullet_list"));
    assert_eq!(dispatcher.selection().head.path, vec![1, 0]);
}

#[test]
fn unwrapping_the_first_item_keeps_the_rest_listed() {
    let mut dispatcher = Dispatcher::with_standard(bullet_doc(&["a", "b"]));
    dispatcher.set_selection(Selection::collapsed(Point::new(vec![0, 0, 0, 0], 0)));

    let outcomes = dispatcher.dispatch("list.toggle_bullet", None);
    assert!(outcomes.iter().all(DispatchOutcome::is_committed));

    let children = &dispatcher.doc().children;
    assert_eq!(children.len(), 2);
    assert!(matches!(&children[0], Node::Element(el) if el.kind == "paragraph"));
    let Node::Element(list) = &children[1] else {
        panic!("expected list");
    };
    assert_eq!(list.children.len(), 1);
}

#[test]
fn heading_and_blockquote_block_commands() {
    let mut dispatcher = Dispatcher::with_standard(Document {
        children: vec![Node::paragraph("title")],
    });

    let outcomes = dispatcher.dispatch(
        "block.set_heading",
        Some(serde_json::json!({ "level": 2 })),
    );
    assert!(outcomes.iter().all(DispatchOutcome::is_committed));
    let Node::Element(h) = &dispatcher.doc().children[0] else {
        panic!("expected heading");
    };
    assert_eq!(h.kind, "heading");
    assert_eq!(h.attr_u64("level"), Some(2));

    // Levels clamp to 1..=3.
    dispatcher.dispatch(
        "block.set_heading",
        Some(serde_json::json!({ "level": 9 })),
    );
    let Node::Element(h) = &dispatcher.doc().children[0] else {
        panic!("expected heading");
    };
    assert_eq!(h.attr_u64("level"), Some(3));

    dispatcher.dispatch("block.set_paragraph", None);
    let outcomes = dispatcher.dispatch("block.toggle_blockquote", None);
    assert!(outcomes.iter().all(DispatchOutcome::is_committed));
    let Node::Element(bq) = &dispatcher.doc().children[0] else {
        panic!("expected blockquote");
    };
    assert_eq!(bq.kind, "blockquote");
    assert!(matches!(
        &bq.children[0],
        Node::Element(el) if el.kind == "paragraph"
    ));

    let outcomes = dispatcher.dispatch("block.toggle_blockquote", None);
    assert!(outcomes.iter().all(DispatchOutcome::is_committed));
    assert!(matches!(
        &dispatcher.doc().children[0],
        Node::Element(el) if el.kind == "paragraph"
    ));
}

#[test]
fn code_block_flattens_marks_and_toggles_back() {
    let mut dispatcher = Dispatcher::with_standard(Document {
        children: vec![Node::paragraph("let x = 1;")],
    });
    dispatcher.set_selection(Selection {
        anchor: Point::new(vec![0, 0], 0),
        head: Point::new(vec![0, 0], 3),
    });
    dispatcher.dispatch("marks.toggle_bold", None);

    let outcomes = dispatcher.dispatch("block.toggle_code_block", None);
    assert!(outcomes.iter().all(DispatchOutcome::is_committed));
    let Node::Element(code) = &dispatcher.doc().children[0] else {
        panic!("expected code_block");
    };
    assert_eq!(code.kind, "code_block");
    let Some(Node::Text(t)) = code.children.first() else {
        panic!("expected text");
    };
    assert_eq!(t.text, "let x = 1;");
    assert!(t.marks.is_plain());

    let outcomes = dispatcher.dispatch("block.toggle_code_block", None);
    assert!(outcomes.iter().all(DispatchOutcome::is_committed));
    assert!(matches!(
        &dispatcher.doc().children[0],
        Node::Element(el) if el.kind == "paragraph"
    ));
}
