//! Staleness rules of a task, compiled into the `uptodate` checks the
//! execution engine evaluates before running any action.
use std::collections::BTreeMap;

use serde::Serialize;

use crate::callable::Predicate;

/// Arbitrary caller-chosen values whose change makes a task stale.
pub type Config = BTreeMap<String, serde_json::Value>;

/// A single staleness check, in the form handed to the execution engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Check {
    /// Stale whenever the named task produced a different result.
    ResultDep { task: String },
    /// Up to date after the first successful run.
    RunOnce,
    /// Stale whenever the fingerprint of `config` changes.
    ConfigChanged { config: Config },
    /// Opaque check evaluated by the engine.
    Predicate(Predicate),
}

/// Accumulated staleness rules.
///
/// Every `update_*` method returns a new value, the receiver is never touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpToDate {
    result_deps: Vec<String>,
    config_changed: Option<Config>,
    run_once: bool,
    extra_entries: Vec<Predicate>,
}

impl UpToDate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn result_deps(&self) -> &[String] {
        &self.result_deps
    }

    pub fn config_changed(&self) -> Option<&Config> {
        self.config_changed.as_ref()
    }

    pub fn run_once(&self) -> bool {
        self.run_once
    }

    pub fn extra_entries(&self) -> &[Predicate] {
        &self.extra_entries
    }

    /// Append task names whose results gate staleness.
    pub fn update_result_deps<I, S>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut result_deps = self.result_deps.clone();
        result_deps.extend(names.into_iter().map(Into::into));

        Self {
            result_deps,
            ..self.clone()
        }
    }

    /// Shallow merge `config` into the fingerprinted config. Entries from
    /// `config` overwrite existing entries with the same key.
    pub fn update_config_changed(&self, config: Config) -> Self {
        let merged = match &self.config_changed {
            None => config,
            Some(current) => {
                let mut merged = current.clone();
                for (key, value) in config {
                    if let Some(old) = merged.get(&key).filter(|old| **old != value) {
                        tracing::debug!(
                            key = %key,
                            old = %old,
                            new = %value,
                            "config value overwritten"
                        );
                    }
                    merged.insert(key, value);
                }
                merged
            }
        };

        Self {
            config_changed: Some(merged),
            ..self.clone()
        }
    }

    pub fn update_run_once(&self, run_once: bool) -> Self {
        Self {
            run_once,
            ..self.clone()
        }
    }

    /// Append opaque checks. They are kept verbatim, duplicates included.
    pub fn update_extra_entries<I>(&self, predicates: I) -> Self
    where
        I: IntoIterator<Item = Predicate>,
    {
        let mut extra_entries = self.extra_entries.clone();
        extra_entries.extend(predicates);

        Self {
            extra_entries,
            ..self.clone()
        }
    }

    /// Compile into checks. The order is fixed: result dependencies, then
    /// run-once, then the config fingerprint, then the extra entries.
    pub fn compile(&self) -> Vec<Check> {
        let mut compiled: Vec<Check> = self
            .result_deps
            .iter()
            .map(|task| Check::ResultDep { task: task.clone() })
            .collect();

        if self.run_once {
            compiled.push(Check::RunOnce);
        }

        if let Some(config) = self.config_changed.as_ref().filter(|c| !c.is_empty()) {
            compiled.push(Check::ConfigChanged {
                config: config.clone(),
            });
        }

        compiled.extend(self.extra_entries.iter().cloned().map(Check::Predicate));
        compiled
    }
}
