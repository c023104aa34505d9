use std::collections::HashSet;
use std::hash::Hash;

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::callable::Callable;
use crate::uptodate::Check;

/// An action after compilation, either a fully substituted command line or
/// a callable handed to the engine as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CompiledAction {
    Shell(String),
    Callable(Callable),
}

impl CompiledAction {
    /// The command line of a shell action.
    pub fn as_shell(&self) -> Option<&str> {
        match self {
            CompiledAction::Shell(command) => Some(command),
            CompiledAction::Callable(_) => None,
        }
    }
}

/// The compiled task definition consumed by the execution engine.
///
/// A field is `None` when there is nothing to report, and is then left out of
/// the serialized record entirely. The engine treats a missing key
/// differently from an empty one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<CompiledAction>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_dep: Option<Vec<Utf8PathBuf>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_dep: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<Utf8PathBuf>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptodate: Option<Vec<Check>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl TaskRecord {
    /// Names of the keys present in the record, in serialization order.
    pub fn keys(&self) -> Vec<&'static str> {
        [
            ("actions", self.actions.is_some()),
            ("file_dep", self.file_dep.is_some()),
            ("task_dep", self.task_dep.is_some()),
            ("targets", self.targets.is_some()),
            ("uptodate", self.uptodate.is_some()),
            ("name", self.name.is_some()),
        ]
        .into_iter()
        .filter_map(|(key, present)| present.then_some(key))
        .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub(crate) fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

/// Drop repeated items, keeping the first occurrence of each.
pub(crate) fn unique<T>(items: Vec<T>) -> Vec<T>
where
    T: Eq + Hash + Clone,
{
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
