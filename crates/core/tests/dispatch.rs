use scribe_core::{
    ChangeNotice, Dispatcher, DispatchError, DispatchOutcome, Document, Node,
};

#[test]
fn unknown_commands_are_reported_not_panicked() {
    let mut dispatcher = Dispatcher::with_standard(Document::empty());
    let outcomes = dispatcher.dispatch("definitely.not.a.command", None);
    assert!(matches!(
        outcomes.as_slice(),
        [DispatchOutcome::Rejected {
            error: DispatchError::UnknownCommand(_),
            ..
        }]
    ));
    assert_eq!(dispatcher.revision(), 0);
}

#[test]
fn a_rejected_transaction_leaves_the_document_untouched() {
    let mut dispatcher = Dispatcher::with_standard(Document::empty());
    let before = dispatcher.doc().clone();

    let outcomes = dispatcher.dispatch("image.insert", Some(serde_json::json!({ "src": "" })));
    assert!(matches!(
        outcomes.as_slice(),
        [DispatchOutcome::Rejected {
            error: DispatchError::NotApplicable(_),
            ..
        }]
    ));

    assert_eq!(dispatcher.doc(), &before);
    assert_eq!(dispatcher.revision(), 0);
    assert!(dispatcher.log().is_empty());
}

#[test]
fn commits_bump_the_revision_and_record_inverses() {
    let mut dispatcher = Dispatcher::with_standard(Document::empty());

    let outcomes = dispatcher.dispatch("list.toggle_bullet", None);
    assert!(outcomes.iter().all(DispatchOutcome::is_committed));
    assert_eq!(dispatcher.revision(), 1);
    assert_eq!(dispatcher.log().len(), 1);
    assert!(!dispatcher.log()[0].inverse_ops.is_empty());

    match outcomes[0].notice() {
        Some(ChangeNotice::Edited { revision, source }) => {
            assert_eq!(*revision, 1);
            assert_eq!(source.as_deref(), Some("list.toggle_bullet"));
        }
        other => panic!("expected edit notice, got {other:?}"),
    }
}

#[test]
fn undo_replays_the_inverse_ops() {
    let mut dispatcher = Dispatcher::with_standard(Document::empty());
    dispatcher.dispatch("list.toggle_bullet", None);
    assert!(matches!(
        &dispatcher.doc().children[0],
        Node::Element(el) if el.kind == "bullet_list"
    ));

    let notice = dispatcher.undo().expect("log is non-empty");
    assert!(matches!(notice, ChangeNotice::Edited { .. }));
    assert!(matches!(
        &dispatcher.doc().children[0],
        Node::Element(el) if el.kind == "paragraph"
    ));
    assert!(dispatcher.log().is_empty());
}

#[test]
fn sequential_dispatches_commit_in_fifo_order() {
    let mut dispatcher = Dispatcher::with_standard(Document::empty());

    dispatcher.dispatch("list.toggle_bullet", None);
    dispatcher.dispatch("list.toggle_bullet", None);
    dispatcher.dispatch(
        "block.set_heading",
        Some(serde_json::json!({ "level": 1 })),
    );

    assert_eq!(dispatcher.revision(), 3);
    let sources: Vec<_> = dispatcher
        .log()
        .iter()
        .map(|entry| entry.source.clone())
        .collect();
    assert_eq!(
        sources,
        vec![
            Some("list.toggle_bullet".to_string()),
            Some("list.toggle_bullet".to_string()),
            Some("block.set_heading".to_string()),
        ]
    );
}

#[test]
fn rejections_do_not_block_later_dispatches() {
    let mut dispatcher = Dispatcher::with_standard(Document::empty());

    dispatcher.dispatch("nope", None);
    let outcomes = dispatcher.dispatch("list.toggle_bullet", None);
    assert!(outcomes.iter().all(DispatchOutcome::is_committed));
    assert_eq!(dispatcher.revision(), 1);
}

#[test]
fn set_selection_emits_a_selection_notice() {
    let mut dispatcher = Dispatcher::with_standard(Document::empty());
    let notice = dispatcher.set_selection(dispatcher.selection().clone());
    assert!(matches!(notice, ChangeNotice::SelectionMoved { revision: 1 }));
    assert!(dispatcher.log().is_empty());
}

#[test]
fn deferred_commands_resolve_with_late_arguments() {
    let mut dispatcher = Dispatcher::with_standard(Document::empty());

    let ticket = dispatcher.defer("image.insert");
    // Nothing dispatched yet.
    assert_eq!(dispatcher.revision(), 0);

    let outcomes = dispatcher
        .resolve(
            ticket,
            Some(serde_json::json!({ "src": "data:image/png;base64,AA==" })),
        )
        .expect("ticket is live");
    assert!(outcomes.iter().all(DispatchOutcome::is_committed));
    assert_eq!(dispatcher.revision(), 1);

    // A ticket only resolves once.
    assert!(matches!(
        dispatcher.resolve(ticket, None),
        Err(DispatchError::UnknownTicket(_))
    ));
}

#[test]
fn abandoned_tickets_cannot_be_resolved() {
    let mut dispatcher = Dispatcher::with_standard(Document::empty());
    let ticket = dispatcher.defer("image.insert");
    assert!(dispatcher.abandon(ticket));
    assert!(!dispatcher.abandon(ticket));
    assert!(matches!(
        dispatcher.resolve(ticket, None),
        Err(DispatchError::UnknownTicket(_))
    ));
}
