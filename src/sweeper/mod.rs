//! List and sweep engine.
//!
//! A [`Sweeper`] walks each section's action tree depth-first. Listing runs
//! parent before children; sweeping re-lists every child level just before it
//! is swept and finishes children before their parent.
pub mod cache;
pub mod output;
pub mod results;

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Profile;
use crate::config::section::{SectionNode, SectionSpec};
use crate::error::{ConfigError, SweepError};
use crate::exec::{Executor, run_with_retry};
use crate::logging::Log;
use cache::{VariableCache, render_child_options};
use output::{Filter, filter_items, parse_output};
use results::{CommandRecord, NodeState, ResultStore, ScopedItem, SectionState};

/// Print commands instead of running them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BashAction {
    /// Print the root list command; run nothing.
    List,
    /// List normally, print the sweep commands.
    Sweep,
}

/// Caller-supplied knobs for a run.
#[derive(Debug, Clone, Default)]
pub struct SweeperOptions {
    /// Filter that overrides every profile filter.
    pub filter_override: Option<String>,
    /// Print commands instead of running them.
    pub bash_action: Option<BashAction>,
}

/// Result of a list or sweep action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The action ran to completion with this aggregate code.
    Completed {
        /// Exit code, 0 on success.
        return_code: i32,
    },
    /// The section was dropped by the protected-run policy.
    Skipped,
}

impl ActionOutcome {
    /// Exit code of the action; skipped actions report 0.
    #[must_use]
    pub const fn return_code(&self) -> i32 {
        match self {
            Self::Completed { return_code } => *return_code,
            Self::Skipped => 0,
        }
    }

    /// Whether the section was skipped.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// Recursive list/sweep engine over a loaded [`Profile`].
pub struct Sweeper<'p> {
    profile: &'p Profile,
    executor: Arc<dyn Executor>,
    log: Arc<dyn Log>,
    options: SweeperOptions,
    filters: HashMap<String, Filter>,
    results: ResultStore,
    last_return_code: i32,
}

impl std::fmt::Debug for Sweeper<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sweeper")
            .field("options", &self.options)
            .field("filters", &self.filters.len())
            .field("last_return_code", &self.last_return_code)
            .finish_non_exhaustive()
    }
}

impl<'p> Sweeper<'p> {
    /// Create an engine and compile every section's filter.
    ///
    /// A section uses, in order of priority, the override in `options`, its
    /// own `common_filter`, then the profile's `common_filter`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidFilter`] if a pattern does not compile,
    /// or [`ConfigError::MissingKey`] if a section ends up with no filter.
    pub fn new(
        profile: &'p Profile,
        executor: Arc<dyn Executor>,
        log: Arc<dyn Log>,
        options: SweeperOptions,
    ) -> Result<Self, ConfigError> {
        let mut filters = HashMap::new();
        for section in profile.sections() {
            let pattern = options
                .filter_override
                .as_deref()
                .or(section.common_filter.as_deref())
                .or(profile.settings().common_filter.as_deref())
                .ok_or_else(|| ConfigError::MissingKey {
                    section: crate::config::GLOBAL_SECTION.to_string(),
                    key: "common_filter".to_string(),
                })?;
            filters.insert(section.name.clone(), Filter::new(pattern)?);
        }

        Ok(Self {
            profile,
            executor,
            log,
            options,
            filters,
            results: ResultStore::default(),
            last_return_code: 0,
        })
    }

    /// Whether `name` is declared in the profile.
    #[must_use]
    pub fn is_section_present(&self, name: &str) -> bool {
        self.profile.contains(name)
    }

    /// Sticky run-wide code: the most recent non-zero outcome, or 0.
    #[must_use]
    pub const fn last_return_code(&self) -> i32 {
        self.last_return_code
    }

    /// Everything recorded so far.
    #[must_use]
    pub const fn results(&self) -> &ResultStore {
        &self.results
    }

    /// Filter in effect for `name`.
    #[must_use]
    pub fn filter(&self, name: &str) -> Option<&Filter> {
        self.filters.get(name)
    }

    fn section_spec(&self, name: &str) -> Result<&'p SectionSpec, SweepError> {
        self.profile
            .section(name)
            .ok_or_else(|| SweepError::SectionNotPresent {
                section: name.to_string(),
            })
    }

    /// List section `name` and every level of its tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the section is unknown, a command cannot be
    /// launched, or listing output cannot be parsed.
    pub fn list_action(&mut self, name: &str) -> Result<ActionOutcome, SweepError> {
        let section = self.section_spec(name)?;

        if section.protected_run && self.last_return_code != 0 {
            self.log.warn(&format!(
                "dropping protected section '{name}' due to previous error (rc {})",
                self.last_return_code
            ));
            self.results.reset(
                name,
                SectionState {
                    skipped: true,
                    ..SectionState::default()
                },
            );
            return Ok(ActionOutcome::Skipped);
        }

        let nodes = section.nodes().iter().map(|n| NodeState::new(&n.name)).collect();
        self.results.reset(
            name,
            SectionState {
                nodes,
                ..SectionState::default()
            },
        );

        let result = if self.options.bash_action == Some(BashAction::List) {
            let command = section.root.list_action.clone();
            self.log.dry_run(&command);
            if let Some(state) = self.node_state_mut(name, 0) {
                state.list_commands.push(CommandRecord::printed(&command));
            }
            Ok(0)
        } else {
            self.list_branch(section, &section.root, 0, VariableCache::new())
        };

        self.finish(name, result)
    }

    /// Sweep every filtered item of section `name`, children first.
    ///
    /// # Errors
    ///
    /// Returns an error if the section is unknown, a command cannot be
    /// launched, or a child listing cannot be parsed.
    pub fn sweep_action(&mut self, name: &str) -> Result<ActionOutcome, SweepError> {
        let section = self.section_spec(name)?;

        match self.results.section(name) {
            Some(state) if state.skipped => return Ok(ActionOutcome::Skipped),
            Some(_) => {}
            None => {
                self.log.debug(&format!("section '{name}' was never listed"));
                return Ok(ActionOutcome::Completed { return_code: 0 });
            }
        }

        let result = self.sweep_node(section, &section.root, 0);
        self.finish(name, result)
    }

    /// Fold an action's result into the section state and the sticky code.
    fn finish(
        &mut self,
        name: &str,
        result: Result<i32, SweepError>,
    ) -> Result<ActionOutcome, SweepError> {
        let code = match &result {
            Ok(code) => *code,
            Err(_) if self.last_return_code == 0 => 1,
            Err(_) => self.last_return_code,
        };
        if code != 0 {
            self.last_return_code = code;
        }
        if let Some(state) = self.results.section_mut(name) {
            state.last_return_code = code;
        }
        result.map(|return_code| ActionOutcome::Completed { return_code })
    }

    fn node_state(&self, section: &str, depth: usize) -> Option<&NodeState> {
        self.results.section(section)?.nodes.get(depth)
    }

    fn node_state_mut(&mut self, section: &str, depth: usize) -> Option<&mut NodeState> {
        self.results.section_mut(section)?.nodes.get_mut(depth)
    }

    /// Scope for the children of `item`: its own scope plus its key value.
    fn child_scope(node: &SectionNode, scoped: &ScopedItem) -> VariableCache {
        let mut scope = scoped.scope.clone();
        scope.set(
            &node.cache_key(),
            scoped.item.key_value(&node.key).unwrap_or_default(),
        );
        scope
    }

    /// List `node` and, for every item it selects, the levels below it.
    fn list_branch(
        &mut self,
        section: &SectionSpec,
        node: &SectionNode,
        depth: usize,
        scope: VariableCache,
    ) -> Result<i32, SweepError> {
        let (code, selected) = self.list_level(section, node, depth, scope)?;
        if code != 0 {
            return Ok(code);
        }

        if let Some(child) = node.child.as_deref() {
            for scoped in &selected {
                let scope = Self::child_scope(node, scoped);
                let code = self.list_branch(section, child, depth + 1, scope)?;
                if code != 0 {
                    return Ok(code);
                }
            }
        }
        Ok(0)
    }

    /// Run one list command for `node` and store what it selects.
    ///
    /// The root level is filtered; levels listed under a parent item take
    /// every parsed item.
    fn list_level(
        &mut self,
        section: &SectionSpec,
        node: &SectionNode,
        depth: usize,
        mut scope: VariableCache,
    ) -> Result<(i32, Vec<ScopedItem>), SweepError> {
        let command = match node.child_options.as_deref() {
            Some(spec) if depth > 0 => {
                format!("{} {}", node.list_action, render_child_options(spec, &mut scope))
            }
            _ => node.list_action.clone(),
        };

        self.log.debug(&format!("listing '{}': {command}", node.name));
        let record = CommandRecord::new(&command, self.executor.run(&command)?);
        let code = record.return_code;
        let stdout = record.stdout.clone();

        if let Some(state) = self.node_state_mut(&section.name, depth) {
            state.list_commands.push(record);
            state.last_return_code = code;
        }
        if code != 0 {
            self.log.warn(&format!("failed to list '{}' (rc {code})", node.name));
            return Ok((code, Vec::new()));
        }

        let items = parse_output(node.output_format, &stdout)?;
        let selected = if depth == 0 {
            self.filters.get(&section.name).map_or_else(Vec::new, |filter| {
                filter_items(&items, filter, node.filter_field.as_deref())
            })
        } else {
            items.clone()
        };
        let selected: Vec<ScopedItem> = selected
            .into_iter()
            .map(|item| ScopedItem {
                item,
                scope: scope.clone(),
            })
            .collect();

        if let Some(state) = self.node_state_mut(&section.name, depth) {
            state.raw_output.extend(items);
            state.filtered_items.extend(selected.iter().cloned());
        }
        Ok((0, selected))
    }

    /// Re-list `child` once per filtered item of `parent`.
    fn refresh_level(
        &mut self,
        section: &SectionSpec,
        parent: &SectionNode,
        child: &SectionNode,
        depth: usize,
    ) -> Result<i32, SweepError> {
        let parents = self
            .node_state(&section.name, depth)
            .map(|s| s.filtered_items.clone())
            .unwrap_or_default();
        if let Some(state) = self.node_state_mut(&section.name, depth + 1) {
            state.reset_listing();
        }

        for scoped in &parents {
            let scope = Self::child_scope(parent, scoped);
            let (code, _) = self.list_level(section, child, depth + 1, scope)?;
            if code != 0 {
                return Ok(code);
            }
        }
        Ok(0)
    }

    /// Sweep the levels below `node`, then `node`'s own items.
    fn sweep_node(
        &mut self,
        section: &SectionSpec,
        node: &SectionNode,
        depth: usize,
    ) -> Result<i32, SweepError> {
        let indent = "  ".repeat(depth + 1);
        self.log.info(&format!("{indent}==> '{}'", node.name));

        let mut aggregate = 0;
        if let Some(child) = node.child.as_deref() {
            let code = self.refresh_level(section, node, child, depth)?;
            if code != 0 {
                return Ok(code);
            }
            aggregate = self.sweep_node(section, child, depth + 1)?;
        }

        let policy = self.profile.settings().sweep_result;
        let items = self
            .node_state(&section.name, depth)
            .map(|s| s.filtered_items.clone())
            .unwrap_or_default();
        let total = items.len();

        for (index, scoped) in items.iter().enumerate() {
            let Some(key) = scoped.item.key_value(&node.key) else {
                self.log.warn(&format!(
                    "{indent}skipping item without a usable '{}' value: {}",
                    node.key, scoped.item
                ));
                continue;
            };
            if self
                .node_state(&section.name, depth)
                .is_some_and(|s| s.has_swept(&key))
            {
                self.log.debug(&format!("{indent}'{key}' already swept"));
                continue;
            }
            self.log.info(&format!("{indent}> {}: {key}", total - index));

            let code = self.sweep_item(section, node, depth, &key, &indent)?;
            aggregate = policy.fold(aggregate, code);
        }

        if let Some(state) = self.node_state_mut(&section.name, depth) {
            state.last_return_code = aggregate;
        }
        Ok(aggregate)
    }

    /// Run (or print) the sweep command for one item and record it.
    fn sweep_item(
        &mut self,
        section: &SectionSpec,
        node: &SectionNode,
        depth: usize,
        key: &str,
        indent: &str,
    ) -> Result<i32, SweepError> {
        let command = node.sweep_action.replacen("{}", key, 1);

        let record = if self.options.bash_action == Some(BashAction::Sweep) {
            self.log.dry_run(&command);
            CommandRecord::printed(&command)
        } else {
            let result = match run_with_retry(
                self.executor.as_ref(),
                &command,
                section.retry,
                self.log.as_ref(),
            ) {
                Ok(result) => result,
                Err(e) => {
                    if let Some(state) = self.node_state_mut(&section.name, depth) {
                        state.record_sweep(key, CommandRecord::launch_failed(&command, &e));
                    }
                    return Err(e.into());
                }
            };
            let record = CommandRecord::new(&command, result);
            if record.return_code == 0 {
                let out = record.stdout.trim_end();
                if !out.is_empty() {
                    self.log.info(&format!("{indent}{out}"));
                }
            } else {
                self.log.error(&format!(
                    "{indent}({}) '{command}' ERROR: {}",
                    record.return_code,
                    record.stderr.trim_end()
                ));
            }
            record
        };

        let code = record.return_code;
        if let Some(state) = self.node_state_mut(&section.name, depth) {
            state.record_sweep(key, record);
        }
        Ok(code)
    }
}
