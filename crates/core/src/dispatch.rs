//! Transaction dispatcher. Commands are queued first-in first-out and
//! applied one at a time against a prospective copy of the tree; only a
//! copy that survives normalization and validation is committed.

use std::collections::{HashMap, VecDeque};

use serde_json::Value;

use crate::command::{CommandRegistry, NotApplicable};
use crate::document::{
    apply_op, normalize_selection, Document, PathError, Selection,
};
use crate::ops::Op;
use crate::schema::{self, SchemaViolation};

/// Upper bound on normalization rounds per transaction. Each round either
/// settles or strictly shrinks the tree, so hitting this means a bug.
const NORMALIZE_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Applying,
}

/// What changed in a committed transaction. Handed to the synchronizer so
/// it can refresh capability snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeNotice {
    Edited {
        revision: u64,
        source: Option<String>,
    },
    SelectionMoved {
        revision: u64,
    },
}

impl ChangeNotice {
    pub fn revision(&self) -> u64 {
        match self {
            ChangeNotice::Edited { revision, .. } => *revision,
            ChangeNotice::SelectionMoved { revision } => *revision,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error(transparent)]
    NotApplicable(#[from] NotApplicable),
    #[error("rejected: {0}")]
    Schema(#[from] SchemaViolation),
    #[error("edit could not be applied: {0}")]
    InvalidEdit(#[from] PathError),
    #[error("normalization did not settle after {NORMALIZE_LIMIT} rounds")]
    NormalizeDiverged,
    #[error("unknown or already resolved ticket {0}")]
    UnknownTicket(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Committed {
        command: String,
        notice: ChangeNotice,
    },
    Rejected {
        command: String,
        error: DispatchError,
    },
}

impl DispatchOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, DispatchOutcome::Committed { .. })
    }

    pub fn notice(&self) -> Option<&ChangeNotice> {
        match self {
            DispatchOutcome::Committed { notice, .. } => Some(notice),
            DispatchOutcome::Rejected { .. } => None,
        }
    }
}

/// One committed transaction in the mutation log: the ops that undo it,
/// in application order.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub revision: u64,
    pub source: Option<String>,
    pub inverse_ops: Vec<Op>,
}

/// Handle for a command whose arguments are not ready yet, such as an
/// image insert waiting on asynchronous processing of its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeferredDispatch(pub u64);

struct Queued {
    command: String,
    args: Option<Value>,
}

pub struct Dispatcher {
    registry: CommandRegistry,
    doc: Document,
    selection: Selection,
    revision: u64,
    phase: Phase,
    queue: VecDeque<Queued>,
    log: Vec<LogEntry>,
    next_ticket: u64,
    deferred: HashMap<u64, String>,
}

impl Dispatcher {
    pub fn new(registry: CommandRegistry, doc: Document, selection: Selection) -> Self {
        let selection = normalize_selection(&doc, &selection);
        Self {
            registry,
            doc,
            selection,
            revision: 0,
            phase: Phase::Idle,
            queue: VecDeque::new(),
            log: Vec::new(),
            next_ticket: 0,
            deferred: HashMap::new(),
        }
    }

    /// A dispatcher over the full standard command set, with the caret at
    /// the first text position.
    pub fn with_standard(doc: Document) -> Self {
        let caret = crate::document::first_text_point(&doc).unwrap_or(crate::document::Point {
            path: vec![0],
            offset: 0,
        });
        Self::new(
            CommandRegistry::standard(),
            doc,
            Selection::collapsed(caret),
        )
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle && self.queue.is_empty()
    }

    /// Queues a command and, unless a transaction is already applying,
    /// drains the queue. Returns one outcome per drained command in
    /// dispatch order.
    pub fn dispatch(
        &mut self,
        command: impl Into<String>,
        args: Option<Value>,
    ) -> Vec<DispatchOutcome> {
        self.queue.push_back(Queued {
            command: command.into(),
            args,
        });
        if self.phase == Phase::Applying {
            return Vec::new();
        }
        self.drain()
    }

    fn drain(&mut self) -> Vec<DispatchOutcome> {
        let mut outcomes = Vec::new();
        while let Some(queued) = self.queue.pop_front() {
            self.phase = Phase::Applying;
            let result = self.run(&queued);
            self.phase = Phase::Idle;

            let outcome = match result {
                Ok(notice) => {
                    log::debug!(
                        "committed {:?} at revision {}",
                        queued.command,
                        notice.revision()
                    );
                    DispatchOutcome::Committed {
                        command: queued.command,
                        notice,
                    }
                }
                Err(error) => {
                    log::warn!("rejected {:?}: {error}", queued.command);
                    DispatchOutcome::Rejected {
                        command: queued.command,
                        error,
                    }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    fn run(&mut self, queued: &Queued) -> Result<ChangeNotice, DispatchError> {
        let spec = self
            .registry
            .get(&queued.command)
            .ok_or_else(|| DispatchError::UnknownCommand(queued.command.clone()))?;

        let edit = spec.build(&self.doc, &self.selection, queued.args.as_ref())?;

        // Everything happens on a prospective copy; the committed tree is
        // untouched until the copy has passed validation.
        let mut doc = self.doc.clone();
        let mut selection = self.selection.clone();
        let mut inverse_ops = Vec::new();

        for op in edit.ops {
            let inverse = apply_op(&mut doc, &mut selection, op)?;
            inverse_ops.push(inverse);
        }
        if let Some(after) = edit.selection_after {
            selection = after;
        }

        self.normalize_to_fixpoint(&mut doc, &mut selection, &mut inverse_ops)?;
        schema::validate(&doc)?;
        let selection = normalize_selection(&doc, &selection);

        // Commit.
        self.doc = doc;
        self.selection = selection;
        self.revision += 1;
        inverse_ops.reverse();
        self.log.push(LogEntry {
            revision: self.revision,
            source: edit.source.clone(),
            inverse_ops,
        });

        Ok(ChangeNotice::Edited {
            revision: self.revision,
            source: edit.source,
        })
    }

    fn normalize_to_fixpoint(
        &self,
        doc: &mut Document,
        selection: &mut Selection,
        inverse_ops: &mut Vec<Op>,
    ) -> Result<(), DispatchError> {
        for _ in 0..NORMALIZE_LIMIT {
            let ops = schema::normalize_ops(doc);
            if ops.is_empty() {
                return Ok(());
            }
            for op in ops {
                let inverse = apply_op(doc, selection, op)?;
                inverse_ops.push(inverse);
            }
        }
        Err(DispatchError::NormalizeDiverged)
    }

    /// Moves the caret without going through a command. The selection is
    /// clamped onto real content first.
    pub fn set_selection(&mut self, selection: Selection) -> ChangeNotice {
        self.selection = normalize_selection(&self.doc, &selection);
        self.revision += 1;
        ChangeNotice::SelectionMoved {
            revision: self.revision,
        }
    }

    /// Reserves a ticket for a command to be dispatched later, once its
    /// arguments exist.
    pub fn defer(&mut self, command: impl Into<String>) -> DeferredDispatch {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let command = command.into();
        log::debug!("deferred {command:?} as ticket {ticket}");
        self.deferred.insert(ticket, command);
        DeferredDispatch(ticket)
    }

    /// Dispatches a deferred command with its now-available arguments.
    pub fn resolve(
        &mut self,
        ticket: DeferredDispatch,
        args: Option<Value>,
    ) -> Result<Vec<DispatchOutcome>, DispatchError> {
        let command = self
            .deferred
            .remove(&ticket.0)
            .ok_or(DispatchError::UnknownTicket(ticket.0))?;
        Ok(self.dispatch(command, args))
    }

    /// Drops a deferred ticket, for example when image processing failed
    /// and nothing will be inserted.
    pub fn abandon(&mut self, ticket: DeferredDispatch) -> bool {
        self.deferred.remove(&ticket.0).is_some()
    }

    /// Reverts the most recent committed transaction by replaying its
    /// inverse ops. Returns `None` when the log is empty.
    pub fn undo(&mut self) -> Option<ChangeNotice> {
        let entry = self.log.pop()?;
        let mut doc = self.doc.clone();
        let mut selection = self.selection.clone();
        for op in entry.inverse_ops {
            if let Err(err) = apply_op(&mut doc, &mut selection, op) {
                log::warn!("undo of revision {} failed: {err}", entry.revision);
                return None;
            }
        }
        self.doc = doc;
        self.selection = normalize_selection(&self.doc, &selection);
        self.revision += 1;
        Some(ChangeNotice::Edited {
            revision: self.revision,
            source: Some("undo".to_string()),
        })
    }
}
