use std::cell::RefCell;
use std::rc::Rc;

use scribe_core::{
    CapabilitySnapshot, Dispatcher, Document, Synchronizer,
};

fn refresh(synchronizer: &mut Synchronizer, dispatcher: &Dispatcher) -> bool {
    synchronizer.refresh(
        dispatcher.registry(),
        dispatcher.doc(),
        dispatcher.selection(),
        dispatcher.revision(),
    )
}

#[test]
fn snapshot_reflects_applicability_and_active_state() {
    let dispatcher = Dispatcher::with_standard(Document::empty());
    let snapshot = CapabilitySnapshot::compute(
        dispatcher.registry(),
        dispatcher.doc(),
        dispatcher.selection(),
        dispatcher.revision(),
    );

    assert!(snapshot.is_applicable("table.insert"));
    assert!(!snapshot.is_applicable("table.delete_row"));
    assert!(!snapshot.is_applicable("list.toggle_task_checked"));
    assert!(snapshot.is_applicable("marks.toggle_bold"));
    assert!(!snapshot.is_active("marks.toggle_bold"));
    assert_eq!(snapshot.len(), dispatcher.registry().len());
}

#[test]
fn snapshot_is_replaced_never_mutated() {
    let mut dispatcher = Dispatcher::with_standard(Document::empty());
    let mut synchronizer = Synchronizer::new();
    refresh(&mut synchronizer, &dispatcher);
    let before = synchronizer.snapshot().clone();

    dispatcher.dispatch(
        "table.insert",
        Some(serde_json::json!({ "rows": 2, "cols": 2 })),
    );
    assert!(refresh(&mut synchronizer, &dispatcher));

    // The earlier snapshot is frozen in time.
    assert!(!before.is_applicable("table.delete_row"));
    assert!(synchronizer.snapshot().is_applicable("table.delete_row"));
    assert!(!synchronizer.snapshot().is_applicable("table.insert"));
    assert_eq!(synchronizer.snapshot().revision, dispatcher.revision());
}

#[test]
fn observers_are_published_to_synchronously() {
    let mut dispatcher = Dispatcher::with_standard(Document::empty());
    let mut synchronizer = Synchronizer::new();
    refresh(&mut synchronizer, &dispatcher);

    let seen: Rc<RefCell<Vec<u64>>> = Rc::default();
    let sink = seen.clone();
    synchronizer.subscribe(Box::new(move |snapshot: &CapabilitySnapshot| {
        sink.borrow_mut().push(snapshot.revision);
    }));

    // Subscription delivers the current snapshot immediately.
    assert_eq!(*seen.borrow(), vec![0]);

    dispatcher.dispatch(
        "table.insert",
        Some(serde_json::json!({ "rows": 2, "cols": 2 })),
    );
    refresh(&mut synchronizer, &dispatcher);
    assert_eq!(*seen.borrow(), vec![0, 1]);
}

#[test]
fn unsubscribed_observers_stop_receiving() {
    let mut dispatcher = Dispatcher::with_standard(Document::empty());
    let mut synchronizer = Synchronizer::new();
    refresh(&mut synchronizer, &dispatcher);

    let seen: Rc<RefCell<Vec<u64>>> = Rc::default();
    let sink = seen.clone();
    let id = synchronizer.subscribe(Box::new(move |snapshot: &CapabilitySnapshot| {
        sink.borrow_mut().push(snapshot.revision);
    }));

    assert!(synchronizer.unsubscribe(id));
    assert!(!synchronizer.unsubscribe(id));

    dispatcher.dispatch(
        "table.insert",
        Some(serde_json::json!({ "rows": 2, "cols": 2 })),
    );
    refresh(&mut synchronizer, &dispatcher);
    assert_eq!(*seen.borrow(), vec![0]);
}

#[test]
fn refresh_without_capability_changes_does_not_republish() {
    let mut dispatcher = Dispatcher::with_standard(Document::empty());
    let mut synchronizer = Synchronizer::new();
    refresh(&mut synchronizer, &dispatcher);

    // Moving the caret within the same paragraph changes no capability.
    dispatcher.set_selection(dispatcher.selection().clone());
    assert!(!refresh(&mut synchronizer, &dispatcher));
    assert_eq!(synchronizer.snapshot().revision, dispatcher.revision());
}
