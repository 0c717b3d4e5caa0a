use scribe_core::{
    CapabilitySnapshot, Dispatcher, DispatchOutcome, Document, Marks, Node, Point, Selection,
};

fn doc_with(text: &str) -> Document {
    Document {
        children: vec![Node::paragraph(text)],
    }
}

fn runs(doc: &Document) -> Vec<(&str, &Marks)> {
    let Node::Element(p) = &doc.children[0] else {
        panic!("expected paragraph");
    };
    p.children
        .iter()
        .map(|n| match n {
            Node::Text(t) => (t.text.as_str(), &t.marks),
            other => panic!("expected text run, found {other:?}"),
        })
        .collect()
}

fn select(dispatcher: &mut Dispatcher, anchor: (Vec<usize>, usize), head: (Vec<usize>, usize)) {
    dispatcher.set_selection(Selection {
        anchor: Point::new(anchor.0, anchor.1),
        head: Point::new(head.0, head.1),
    });
}

#[test]
fn bold_over_range_splits_runs_at_the_boundaries() {
    let mut dispatcher = Dispatcher::with_standard(doc_with("hello world"));
    select(&mut dispatcher, (vec![0, 0], 0), (vec![0, 0], 5));

    let outcomes = dispatcher.dispatch("marks.toggle_bold", None);
    assert!(outcomes.iter().all(DispatchOutcome::is_committed));

    let doc = dispatcher.doc().clone();
    let runs = runs(&doc);
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].0, "hello");
    assert!(runs[0].1.bold);
    assert_eq!(runs[1].0, " world");
    assert!(!runs[1].1.bold);
    assert_eq!(dispatcher.selection().head, Point::new(vec![0, 0], 5));
}

#[test]
fn double_toggle_restores_the_original_run_layout() {
    let mut dispatcher = Dispatcher::with_standard(doc_with("hello world"));
    select(&mut dispatcher, (vec![0, 0], 0), (vec![0, 0], 5));

    dispatcher.dispatch("marks.toggle_bold", None);
    select(&mut dispatcher, (vec![0, 0], 0), (vec![0, 0], 5));
    dispatcher.dispatch("marks.toggle_bold", None);

    // Un-bolding re-fuses the runs: one plain leaf, as before.
    let doc = dispatcher.doc().clone();
    let runs = runs(&doc);
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].0, "hello world");
    assert!(runs[0].1.is_plain());
}

#[test]
fn partially_marked_range_gains_the_mark_everywhere() {
    let mut dispatcher = Dispatcher::with_standard(doc_with("hello world"));
    select(&mut dispatcher, (vec![0, 0], 0), (vec![0, 0], 5));
    dispatcher.dispatch("marks.toggle_bold", None);

    // "hello" is bold; select "lo wo" straddling the boundary.
    select(&mut dispatcher, (vec![0, 0], 3), (vec![0, 1], 3));
    dispatcher.dispatch("marks.toggle_bold", None);

    let doc = dispatcher.doc().clone();
    let runs = runs(&doc);
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].0, "hello wo");
    assert!(runs[0].1.bold);
    assert_eq!(runs[1].0, "rld");
    assert!(!runs[1].1.bold);
}

#[test]
fn caret_toggle_leaves_a_pending_marks_run() {
    let mut dispatcher = Dispatcher::with_standard(doc_with("hello"));
    dispatcher.set_selection(Selection::collapsed(Point::new(vec![0, 0], 5)));

    let outcomes = dispatcher.dispatch("marks.toggle_bold", None);
    assert!(outcomes.iter().all(DispatchOutcome::is_committed));

    let doc = dispatcher.doc().clone();
    let runs = runs(&doc);
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].0, "hello");
    assert!(!runs[0].1.bold);
    assert_eq!(runs[1].0, "");
    assert!(runs[1].1.bold);
    assert_eq!(dispatcher.selection().head, Point::new(vec![0, 1], 0));

    // The toolbar sees bold active at the caret now.
    let snapshot = CapabilitySnapshot::compute(
        dispatcher.registry(),
        dispatcher.doc(),
        dispatcher.selection(),
        dispatcher.revision(),
    );
    assert!(snapshot.is_active("marks.toggle_bold"));
}

#[test]
fn stacked_marks_combine_on_the_same_run() {
    let mut dispatcher = Dispatcher::with_standard(doc_with("note"));
    select(&mut dispatcher, (vec![0, 0], 0), (vec![0, 0], 4));
    dispatcher.dispatch("marks.toggle_bold", None);
    select(&mut dispatcher, (vec![0, 0], 0), (vec![0, 0], 4));
    dispatcher.dispatch("marks.toggle_italic", None);

    let doc = dispatcher.doc().clone();
    let runs = runs(&doc);
    assert_eq!(runs.len(), 1);
    assert!(runs[0].1.bold);
    assert!(runs[0].1.italic);
}

#[test]
fn set_and_unset_link() {
    let mut dispatcher = Dispatcher::with_standard(doc_with("click here"));
    select(&mut dispatcher, (vec![0, 0], 0), (vec![0, 0], 5));

    let outcomes = dispatcher.dispatch(
        "marks.set_link",
        Some(serde_json::json!({ "href": "https://example.com" })),
    );
    assert!(outcomes.iter().all(DispatchOutcome::is_committed));

    {
        let doc = dispatcher.doc().clone();
        let runs = runs(&doc);
        assert_eq!(runs[0].0, "click");
        assert_eq!(runs[0].1.link.as_deref(), Some("https://example.com"));
        assert_eq!(runs[1].1.link, None);
    }

    select(&mut dispatcher, (vec![0, 0], 0), (vec![0, 0], 5));
    let outcomes = dispatcher.dispatch("marks.unset_link", None);
    assert!(outcomes.iter().all(DispatchOutcome::is_committed));

    let doc = dispatcher.doc().clone();
    let runs = runs(&doc);
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].0, "click here");
    assert_eq!(runs[0].1.link, None);
}

#[test]
fn set_link_without_href_is_rejected() {
    let mut dispatcher = Dispatcher::with_standard(doc_with("text"));
    let outcomes = dispatcher.dispatch("marks.set_link", None);
    assert!(matches!(
        outcomes.as_slice(),
        [DispatchOutcome::Rejected { .. }]
    ));
}
