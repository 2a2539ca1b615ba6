//! Per-section ledger of commands, outputs and return codes.
use std::collections::HashMap;

use super::cache::VariableCache;
use super::output::Item;
use crate::error::ProcessLaunchError;
use crate::exec::ExecResult;

/// Return code recorded for a command that never started.
pub const LAUNCH_FAILED_CODE: i32 = -1;

/// A command and what it produced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandRecord {
    /// The command line as run (or printed).
    pub command: String,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Exit code.
    pub return_code: i32,
}

impl CommandRecord {
    /// Record `result` as the outcome of `command`.
    #[must_use]
    pub fn new(command: &str, result: ExecResult) -> Self {
        Self {
            command: command.to_string(),
            stdout: result.stdout,
            stderr: result.stderr,
            return_code: result.code,
        }
    }

    /// Record of a command that could not be started; `stderr` holds the
    /// launch error.
    #[must_use]
    pub fn launch_failed(command: &str, error: &ProcessLaunchError) -> Self {
        Self {
            command: command.to_string(),
            stderr: error.to_string(),
            return_code: LAUNCH_FAILED_CODE,
            ..Self::default()
        }
    }

    /// Record of a command that was printed instead of run.
    #[must_use]
    pub fn printed(command: &str) -> Self {
        Self {
            command: command.to_string(),
            ..Self::default()
        }
    }
}

/// A filtered item together with the variable scope it was listed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedItem {
    /// The matched item.
    pub item: Item,
    /// Ancestor values visible when the item was discovered.
    pub scope: VariableCache,
}

/// Runtime state of one level of a section's tree.
#[derive(Debug, Clone, Default)]
pub struct NodeState {
    /// Display name of the node.
    pub name: String,
    /// List commands issued for this level, in order.
    pub list_commands: Vec<CommandRecord>,
    /// Every parsed item of this level's listings.
    pub raw_output: Vec<Item>,
    /// Items selected for sweeping, in discovery order.
    pub filtered_items: Vec<ScopedItem>,
    /// Code of the most recent action on this level.
    pub last_return_code: i32,
    sweep_pool: Vec<(String, CommandRecord)>,
    swept: HashMap<String, usize>,
}

impl NodeState {
    /// Fresh state for the node called `name`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Forget listings and filtered items; the sweep pool is kept.
    pub fn reset_listing(&mut self) {
        self.list_commands.clear();
        self.raw_output.clear();
        self.filtered_items.clear();
    }

    /// Most recent list command, if any.
    #[must_use]
    pub fn last_list_command(&self) -> Option<&CommandRecord> {
        self.list_commands.last()
    }

    /// Sweep records in insertion order.
    #[must_use]
    pub fn sweep_pool(&self) -> &[(String, CommandRecord)] {
        &self.sweep_pool
    }

    /// Sweep record for the item identified by `identity`.
    #[must_use]
    pub fn sweep_record(&self, identity: &str) -> Option<&CommandRecord> {
        self.swept
            .get(identity)
            .and_then(|&i| self.sweep_pool.get(i))
            .map(|(_, record)| record)
    }

    /// Whether `identity` has already been swept.
    #[must_use]
    pub fn has_swept(&self, identity: &str) -> bool {
        self.swept.contains_key(identity)
    }

    /// Append a sweep record. Returns `false` and keeps the existing record
    /// if `identity` was already swept.
    pub fn record_sweep(&mut self, identity: &str, record: CommandRecord) -> bool {
        if self.has_swept(identity) {
            return false;
        }
        self.swept.insert(identity.to_string(), self.sweep_pool.len());
        self.sweep_pool.push((identity.to_string(), record));
        true
    }
}

/// Runtime state of one section.
#[derive(Debug, Clone, Default)]
pub struct SectionState {
    /// The section was dropped by the protected-run policy.
    pub skipped: bool,
    /// Code of the most recent action on the section.
    pub last_return_code: i32,
    /// One entry per tree level, root first.
    pub nodes: Vec<NodeState>,
}

impl SectionState {
    /// Number of items the root listing produced.
    #[must_use]
    pub fn listed_count(&self) -> usize {
        self.nodes.first().map_or(0, |n| n.raw_output.len())
    }

    /// Number of root items that passed the filter.
    #[must_use]
    pub fn matched_count(&self) -> usize {
        self.nodes.first().map_or(0, |n| n.filtered_items.len())
    }

    /// Root node state.
    #[must_use]
    pub fn root(&self) -> Option<&NodeState> {
        self.nodes.first()
    }
}

/// Section name to runtime state.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    sections: HashMap<String, SectionState>,
}

impl ResultStore {
    /// State of `section`, if it has been listed.
    #[must_use]
    pub fn section(&self, section: &str) -> Option<&SectionState> {
        self.sections.get(section)
    }

    pub(super) fn section_mut(&mut self, section: &str) -> Option<&mut SectionState> {
        self.sections.get_mut(section)
    }

    /// Replace the state of `section`.
    pub(super) fn reset(&mut self, section: &str, state: SectionState) {
        self.sections.insert(section.to_string(), state);
    }
}
