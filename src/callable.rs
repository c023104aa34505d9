//! Opaque callable references: actions implemented in Rust, staleness
//! predicates, and the task references that can name either.
use std::borrow::Cow;
use std::fmt::Debug;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Conventional prefix of task-defining functions, stripped from task references.
pub const TASK_PREFIX: &str = "task_";

/// Action function pointer, type-erased so that any closure can be stored in a task.
type ActionFnPtr = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Staleness predicate pointer, returns `true` when the task is up to date.
type PredicateFnPtr = Arc<dyn Fn() -> bool + Send + Sync>;

/// A named action implemented as a Rust closure instead of a shell command.
///
/// The execution engine receives it unchanged. Two callables are equal only
/// when they share the same name and the same underlying closure.
#[derive(Clone)]
pub struct Callable {
    name: Cow<'static, str>,
    func: ActionFnPtr,
}

impl Callable {
    pub fn new<F>(name: impl Into<Cow<'static, str>>, func: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the wrapped closure.
    pub fn call(&self) -> anyhow::Result<()> {
        (self.func)()
    }
}

impl Debug for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Callable({})", self.name)
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.func, &other.func)
    }
}

impl Serialize for Callable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("callable", self.name())?;
        map.end()
    }
}

/// An extra staleness check passed through to the execution engine as-is.
#[derive(Clone)]
pub struct Predicate {
    name: Cow<'static, str>,
    func: PredicateFnPtr,
}

impl Predicate {
    pub fn new<F>(name: impl Into<Cow<'static, str>>, func: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate the predicate, `true` means up to date.
    pub fn check(&self) -> bool {
        (self.func)()
    }
}

impl Debug for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Predicate({})", self.name)
    }
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.func, &other.func)
    }
}

impl Serialize for Predicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("name", self.name())?;
        map.end()
    }
}

/// Something that names a task: either a bare name or a callable whose name
/// follows the `task_<name>` convention.
#[derive(Debug, Clone)]
pub enum TaskRef<'a> {
    Name(Cow<'a, str>),
    Callable(&'a Callable),
}

impl TaskRef<'_> {
    /// The raw identifier, before normalization.
    pub fn identifier(&self) -> &str {
        match self {
            TaskRef::Name(name) => name.as_ref(),
            TaskRef::Callable(callable) => callable.name(),
        }
    }
}

impl<'a> From<&'a str> for TaskRef<'a> {
    fn from(value: &'a str) -> Self {
        TaskRef::Name(Cow::Borrowed(value))
    }
}

impl<'a> From<&'a String> for TaskRef<'a> {
    fn from(value: &'a String) -> Self {
        TaskRef::Name(Cow::Borrowed(value))
    }
}

impl From<String> for TaskRef<'_> {
    fn from(value: String) -> Self {
        TaskRef::Name(Cow::Owned(value))
    }
}

impl<'a> From<&'a Callable> for TaskRef<'a> {
    fn from(value: &'a Callable) -> Self {
        TaskRef::Callable(value)
    }
}

/// Resolve a task reference to the name the execution engine registers it
/// under, dropping a leading [`TASK_PREFIX`].
pub fn normalize_task_reference<'a>(reference: impl Into<TaskRef<'a>>) -> String {
    let reference = reference.into();
    let identifier = reference.identifier();

    identifier
        .strip_prefix(TASK_PREFIX)
        .unwrap_or(identifier)
        .to_string()
}
