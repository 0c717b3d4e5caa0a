mod block;
mod inline;
mod insert;
mod list;
mod marks;
mod table;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::document::{Document, Selection};
use crate::ops::Edit;

/// A command's preconditions were not met. The dispatcher reports this as
/// a no-op; it is never a hard failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("command is not applicable to the current selection")]
pub struct NotApplicable;

type Predicate = Arc<dyn Fn(&Document, &Selection) -> bool + Send + Sync>;
type BuildFn =
    Arc<dyn Fn(&Document, &Selection, Option<&Value>) -> Result<Edit, NotApplicable> + Send + Sync>;

/// A registered command: a dry-run applicability check, an active-state
/// check (toolbar highlight), and a pure edit builder. None of the three
/// touch the document; they only read it.
#[derive(Clone)]
pub struct CommandSpec {
    pub id: &'static str,
    pub label: &'static str,
    applicable: Predicate,
    active: Predicate,
    build: BuildFn,
}

impl CommandSpec {
    pub fn new(
        id: &'static str,
        label: &'static str,
        build: impl Fn(&Document, &Selection, Option<&Value>) -> Result<Edit, NotApplicable>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            id,
            label,
            applicable: Arc::new(|_, _| true),
            active: Arc::new(|_, _| false),
            build: Arc::new(build),
        }
    }

    pub fn applicable_when(
        mut self,
        f: impl Fn(&Document, &Selection) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.applicable = Arc::new(f);
        self
    }

    pub fn active_when(
        mut self,
        f: impl Fn(&Document, &Selection) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.active = Arc::new(f);
        self
    }

    pub fn is_applicable(&self, doc: &Document, selection: &Selection) -> bool {
        (self.applicable)(doc, selection)
    }

    pub fn is_active(&self, doc: &Document, selection: &Selection) -> bool {
        (self.active)(doc, selection)
    }

    pub fn build(
        &self,
        doc: &Document,
        selection: &Selection,
        args: Option<&Value>,
    ) -> Result<Edit, NotApplicable> {
        (self.build)(doc, selection, args)
    }
}

pub struct CommandRegistry {
    commands: Vec<CommandSpec>,
    index: HashMap<&'static str, usize>,
}

impl CommandRegistry {
    pub fn new(commands: impl IntoIterator<Item = CommandSpec>) -> Self {
        let commands: Vec<CommandSpec> = commands.into_iter().collect();
        let index = commands
            .iter()
            .enumerate()
            .map(|(ix, c)| (c.id, ix))
            .collect();
        Self { commands, index }
    }

    /// The full toolbar command set.
    pub fn standard() -> Self {
        let mut commands = Vec::new();
        commands.extend(marks::commands());
        commands.extend(block::commands());
        commands.extend(list::commands());
        commands.extend(table::commands());
        commands.extend(insert::commands());
        Self::new(commands)
    }

    pub fn get(&self, id: &str) -> Option<&CommandSpec> {
        self.index.get(id).map(|&ix| &self.commands[ix])
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandSpec> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
