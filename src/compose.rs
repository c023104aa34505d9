//! The immutable task builder.
//!
//! A [`ComposeTask`] accumulates actions, dependencies, targets and staleness
//! rules through chained `add_*` calls. Each call returns a new builder, so a
//! common base can be forked into several specialized tasks:
//!
//! ```rust
//! use taskweave::{Action, ComposeTask, Param};
//!
//! let base = ComposeTask::new()
//!     .add_actions(["mkdir -p tmp"])
//!     .add_file_deps(["setup.py"]);
//!
//! let report = base
//!     .add_actions([Action::new("python report.py {} {}")
//!         .param(Param::file_dep("data.csv"))
//!         .param(Param::target("report.html"))])
//!     .add_name("report");
//!
//! let record = report.compile().unwrap();
//! assert_eq!(record.name.as_deref(), Some("report"));
//! assert!(base.compile().unwrap().name.is_none());
//! ```
use std::collections::HashSet;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::action::Action;
use crate::callable::{Callable, Predicate, TaskRef, normalize_task_reference};
use crate::error::ComposeError;
use crate::record::{CompiledAction, TaskRecord, non_empty, unique};
use crate::uptodate::{Config, UpToDate};

/// An action as stored in the builder, before compilation.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskAction {
    /// A command line, passed through unchanged.
    Shell(String),
    /// A closure, passed through unchanged.
    Callable(Callable),
    /// A template, substituted at compile time.
    Template(Action),
}

impl From<&str> for TaskAction {
    fn from(value: &str) -> Self {
        TaskAction::Shell(value.to_string())
    }
}

impl From<String> for TaskAction {
    fn from(value: String) -> Self {
        TaskAction::Shell(value)
    }
}

impl From<Callable> for TaskAction {
    fn from(value: Callable) -> Self {
        TaskAction::Callable(value)
    }
}

impl From<Action> for TaskAction {
    fn from(value: Action) -> Self {
        TaskAction::Template(value)
    }
}

/// Actions as they appear in a declarative task definition.
#[derive(Deserialize)]
#[serde(untagged)]
enum ActionDef {
    Shell(String),
    Template(Action),
}

impl From<ActionDef> for TaskAction {
    fn from(value: ActionDef) -> Self {
        match value {
            ActionDef::Shell(command) => TaskAction::Shell(command),
            ActionDef::Template(action) => TaskAction::Template(action),
        }
    }
}

/// The keys accepted by [`ComposeTask::update_field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Actions,
    FileDep,
    TaskDep,
    Targets,
    ResultDeps,
    ConfigChanged,
    RunOnce,
    Name,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::Actions,
        Field::FileDep,
        Field::TaskDep,
        Field::Targets,
        Field::ResultDeps,
        Field::ConfigChanged,
        Field::RunOnce,
        Field::Name,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Actions => "actions",
            Field::FileDep => "file_dep",
            Field::TaskDep => "task_dep",
            Field::Targets => "targets",
            Field::ResultDeps => "result_deps",
            Field::ConfigChanged => "config_changed",
            Field::RunOnce => "run_once",
            Field::Name => "name",
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            Field::Actions => "a list of command strings or action templates",
            Field::FileDep | Field::Targets => "a list of paths",
            Field::TaskDep | Field::ResultDeps => "a list of task names",
            Field::ConfigChanged => "an object",
            Field::RunOnce => "a boolean",
            Field::Name => "a string",
        }
    }

    /// Parse a batch of values for this field out of JSON.
    pub fn parse(&self, value: serde_json::Value) -> Result<Update, ComposeError> {
        Ok(match self {
            Field::Actions => Update::Actions(
                self.decode::<Vec<ActionDef>>(value)?
                    .into_iter()
                    .map(Into::into)
                    .collect(),
            ),
            Field::FileDep => Update::FileDeps(self.decode(value)?),
            Field::TaskDep => Update::TaskDeps(normalize_all(self.decode(value)?)),
            Field::Targets => Update::Targets(self.decode(value)?),
            Field::ResultDeps => Update::ResultDeps(normalize_all(self.decode(value)?)),
            Field::ConfigChanged => Update::ConfigChanged(self.decode(value)?),
            Field::RunOnce => Update::RunOnce(self.decode(value)?),
            Field::Name => Update::Name(self.decode(value)?),
        })
    }

    fn decode<T: DeserializeOwned>(&self, value: serde_json::Value) -> Result<T, ComposeError> {
        serde_json::from_value(value).map_err(|source| ComposeError::TypeMismatch {
            field: self.as_str(),
            expected: self.expected(),
            source,
        })
    }
}

impl FromStr for Field {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| ComposeError::UnknownField(s.to_string()))
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A batch of values for one field of a [`ComposeTask`].
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Actions(Vec<TaskAction>),
    FileDeps(Vec<Utf8PathBuf>),
    TaskDeps(Vec<String>),
    Targets(Vec<Utf8PathBuf>),
    ResultDeps(Vec<String>),
    ConfigChanged(Config),
    RunOnce(bool),
    UptodateEntries(Vec<Predicate>),
    Name(String),
}

fn normalize_all(names: Vec<String>) -> Vec<String> {
    names.into_iter().map(normalize_task_reference).collect()
}

/// An immutable, composable task definition.
///
/// Every sequence only ever grows, keeping insertion order. Nothing is
/// compiled or validated until [`ComposeTask::compile`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComposeTask {
    actions: Vec<TaskAction>,
    file_dep: Vec<Utf8PathBuf>,
    task_dep: Vec<String>,
    targets: Vec<Utf8PathBuf>,
    uptodate: UpToDate,
    name: Option<String>,
}

impl ComposeTask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Build a task from a JSON object keyed by field name.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ComposeError> {
        let object: serde_json::Map<String, serde_json::Value> = serde_json::from_value(value)
            .map_err(|source| ComposeError::TypeMismatch {
                field: "task",
                expected: "an object",
                source,
            })?;

        object
            .into_iter()
            .try_fold(Self::new(), |task, (key, value)| task.update_field(&key, value))
    }

    pub fn actions(&self) -> &[TaskAction] {
        &self.actions
    }

    pub fn file_dep(&self) -> &[Utf8PathBuf] {
        &self.file_dep
    }

    pub fn task_dep(&self) -> &[String] {
        &self.task_dep
    }

    pub fn targets(&self) -> &[Utf8PathBuf] {
        &self.targets
    }

    pub fn uptodate(&self) -> &UpToDate {
        &self.uptodate
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Apply a batch of values to the field it belongs to.
    ///
    /// Sequences are extended, staleness updates are routed to
    /// [`UpToDate`]. A name is only accepted while the task is unnamed, use
    /// [`ComposeTask::add_name`] to rename.
    pub fn update(&self, update: Update) -> Result<Self, ComposeError> {
        let current = self.name.as_deref().filter(|name| !name.is_empty());
        if let (Some(current), Update::Name(rejected)) = (current, &update) {
            return Err(ComposeError::NameAlreadySet {
                current: current.to_string(),
                rejected: rejected.clone(),
            });
        }

        Ok(self.apply(update))
    }

    /// Like [`ComposeTask::update`], with the field given by name and the
    /// batch given as JSON.
    pub fn update_field(&self, key: &str, value: serde_json::Value) -> Result<Self, ComposeError> {
        let field: Field = key.parse()?;
        self.update(field.parse(value)?)
    }

    fn apply(&self, update: Update) -> Self {
        let mut next = self.clone();

        match update {
            Update::Actions(actions) => next.actions.extend(actions),
            Update::FileDeps(paths) => next.file_dep.extend(paths),
            Update::TaskDeps(names) => next.task_dep.extend(names),
            Update::Targets(paths) => next.targets.extend(paths),
            Update::ResultDeps(names) => next.uptodate = self.uptodate.update_result_deps(names),
            Update::ConfigChanged(config) => {
                next.uptodate = self.uptodate.update_config_changed(config)
            }
            Update::RunOnce(run_once) => next.uptodate = self.uptodate.update_run_once(run_once),
            Update::UptodateEntries(predicates) => {
                next.uptodate = self.uptodate.update_extra_entries(predicates)
            }
            Update::Name(name) => next.name = Some(name),
        }

        next
    }

    /// Append actions: command lines, callables, or [`Action`] templates.
    pub fn add_actions<I, A>(&self, actions: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<TaskAction>,
    {
        self.apply(Update::Actions(
            actions.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn add_file_deps<I, P>(&self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.apply(Update::FileDeps(paths.into_iter().map(Into::into).collect()))
    }

    /// Append tasks that must run first, given by name or by callable.
    pub fn add_task_deps<'a, I, R>(&self, tasks: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<TaskRef<'a>>,
    {
        self.apply(Update::TaskDeps(
            tasks.into_iter().map(normalize_task_reference).collect(),
        ))
    }

    pub fn add_targets<I, P>(&self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.apply(Update::Targets(paths.into_iter().map(Into::into).collect()))
    }

    /// Make this task stale whenever one of `tasks` yields a different result.
    pub fn add_result_dep<'a, I, R>(&self, tasks: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<TaskRef<'a>>,
    {
        self.apply(Update::ResultDeps(
            tasks.into_iter().map(normalize_task_reference).collect(),
        ))
    }

    /// Make this task stale whenever the merged config changes.
    pub fn add_config_dependency<I, K, V>(&self, config: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<serde_json::Value>,
    {
        self.apply(Update::ConfigChanged(
            config
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        ))
    }

    /// Set the name, replacing any existing one.
    pub fn add_name(&self, name: impl Into<String>) -> Self {
        self.apply(Update::Name(name.into()))
    }

    pub fn toggle_run_once(&self) -> Self {
        self.apply(Update::RunOnce(!self.uptodate.run_once()))
    }

    pub fn add_uptodate_entry(&self, predicate: Predicate) -> Self {
        self.apply(Update::UptodateEntries(vec![predicate]))
    }

    /// Compile into the record handed to the execution engine.
    ///
    /// Templates are substituted, and a template whose command line was
    /// already emitted, by a plain action or another template, is dropped.
    /// Plain actions are always kept. Their file dependencies and targets are lifted into
    /// the task, and every template string is added to the fingerprinted
    /// config so that editing the command itself makes the task stale.
    pub fn compile(&self) -> Result<TaskRecord, ComposeError> {
        let mut actions = Vec::with_capacity(self.actions.len());
        let mut emitted = HashSet::new();
        let mut file_dep = self.file_dep.clone();
        let mut targets = self.targets.clone();
        let mut uptodate = self.uptodate.clone();

        for action in &self.actions {
            let template = match action {
                TaskAction::Shell(command) => {
                    emitted.insert(command.clone());
                    actions.push(CompiledAction::Shell(command.clone()));
                    continue;
                }
                TaskAction::Callable(callable) => {
                    actions.push(CompiledAction::Callable(callable.clone()));
                    continue;
                }
                TaskAction::Template(template) => template,
            };

            let compiled = template.compile()?;

            let lifted_deps = template.file_deps();
            let lifted_targets = template.targets();
            tracing::trace!(
                action = %compiled,
                file_deps = ?lifted_deps,
                targets = ?lifted_targets,
                "lifting template dependencies"
            );
            file_dep.extend(lifted_deps.into_iter().map(Utf8Path::to_path_buf));
            targets.extend(lifted_targets.into_iter().map(Utf8Path::to_path_buf));

            let base = template.base_str().into_owned();
            uptodate = uptodate.update_config_changed(Config::from([(
                base.clone(),
                serde_json::Value::String(base),
            )]));

            if emitted.insert(compiled.clone()) {
                actions.push(CompiledAction::Shell(compiled));
            } else {
                tracing::debug!(action = %compiled, "skipping duplicate compiled action");
            }
        }

        let record = TaskRecord {
            actions: non_empty(actions),
            file_dep: non_empty(unique(file_dep)),
            task_dep: non_empty(self.task_dep.clone()),
            targets: non_empty(unique(targets)),
            uptodate: non_empty(uptodate.compile()),
            name: self.name.clone().filter(|name| !name.is_empty()),
        };

        tracing::debug!(
            name = ?record.name,
            actions = record.actions.as_ref().map_or(0, Vec::len),
            file_dep = record.file_dep.as_ref().map_or(0, Vec::len),
            targets = record.targets.as_ref().map_or(0, Vec::len),
            uptodate = record.uptodate.as_ref().map_or(0, Vec::len),
            "compiled task"
        );

        Ok(record)
    }
}
