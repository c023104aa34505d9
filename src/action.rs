//! Parameterized shell actions.
//!
//! An [`Action`] is a command template with anonymous `{}` slots and one
//! [`Param`] per slot. Parameters marked as file dependencies or targets are
//! substituted like any other value, and are additionally reported through
//! [`Action::file_deps`] and [`Action::targets`] so that the owning task can
//! track them.
//!
//! `{{` and `}}` stand for literal braces. Any other brace is copied as-is, so
//! templates such as `echo ${HOME}` need no escaping.
use std::borrow::Cow;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use crate::error::ComposeError;

/// A single template parameter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Param {
    /// Substituted verbatim, non-string values are rendered as JSON.
    Value(serde_json::Value),
    /// A path the task reads.
    FileDep(Utf8PathBuf),
    /// A path the task produces.
    Target(Utf8PathBuf),
}

impl Param {
    pub fn value(value: impl Into<serde_json::Value>) -> Self {
        Param::Value(value.into())
    }

    pub fn file_dep(path: impl Into<Utf8PathBuf>) -> Self {
        Param::FileDep(path.into())
    }

    pub fn target(path: impl Into<Utf8PathBuf>) -> Self {
        Param::Target(path.into())
    }

    /// The underlying value as it is substituted into a template.
    pub fn unwrap_value(&self) -> Cow<'_, str> {
        match self {
            Param::Value(serde_json::Value::String(value)) => Cow::Borrowed(value),
            Param::Value(value) => Cow::Owned(value.to_string()),
            Param::FileDep(path) | Param::Target(path) => Cow::Borrowed(path.as_str()),
        }
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::value(value)
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::value(value)
    }
}

/// The template of an action, either a single line or words joined by spaces.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Base {
    Line(String),
    Words(Vec<String>),
}

impl Base {
    pub fn joined(&self) -> Cow<'_, str> {
        match self {
            Base::Line(line) => Cow::Borrowed(line),
            Base::Words(words) => Cow::Owned(words.join(" ")),
        }
    }
}

impl From<&str> for Base {
    fn from(value: &str) -> Self {
        Base::Line(value.to_string())
    }
}

impl From<String> for Base {
    fn from(value: String) -> Self {
        Base::Line(value)
    }
}

impl<S: Into<String>> From<Vec<S>> for Base {
    fn from(value: Vec<S>) -> Self {
        Base::Words(value.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String> + Clone> From<&[S]> for Base {
    fn from(value: &[S]) -> Self {
        Base::Words(value.iter().cloned().map(Into::into).collect())
    }
}

/// A command template together with the parameters that fill its slots.
///
/// The slot count is only checked by [`Action::compile`], so a malformed
/// action can be built and stored in a task, but never compiled.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Action {
    base: Base,
    #[serde(default)]
    parameters: Vec<Param>,
}

impl Action {
    pub fn new(base: impl Into<Base>) -> Self {
        Self {
            base: base.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameters<I, P>(base: impl Into<Base>, parameters: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Param>,
    {
        Self {
            base: base.into(),
            parameters: parameters.into_iter().map(Into::into).collect(),
        }
    }

    /// Append one more parameter.
    pub fn param(mut self, param: impl Into<Param>) -> Self {
        self.parameters.push(param.into());
        self
    }

    pub fn base(&self) -> &Base {
        &self.base
    }

    pub fn parameters(&self) -> &[Param] {
        &self.parameters
    }

    /// The template as a single string.
    pub fn base_str(&self) -> Cow<'_, str> {
        self.base.joined()
    }

    /// Check that the template has exactly one slot per parameter.
    pub fn validate(&self) -> Result<(), ComposeError> {
        let base = self.base_str();
        self.check_arity(&base, &split_slots(&base))
    }

    /// Substitute every slot, left to right, with its parameter.
    pub fn compile(&self) -> Result<String, ComposeError> {
        let base = self.base_str();
        let chunks = split_slots(&base);
        self.check_arity(&base, &chunks)?;

        if self.parameters.is_empty() {
            return Ok(base.into_owned());
        }

        let mut compiled = String::with_capacity(base.len());
        let mut params = self.parameters.iter();
        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 {
                if let Some(param) = params.next() {
                    compiled.push_str(&param.unwrap_value());
                }
            }
            compiled.push_str(chunk);
        }

        tracing::trace!(base = %base, action = %compiled, "compiled action template");
        Ok(compiled)
    }

    /// Paths of all file dependency parameters, in parameter order.
    pub fn file_deps(&self) -> Vec<&Utf8Path> {
        self.parameters
            .iter()
            .filter_map(|param| match param {
                Param::FileDep(path) => Some(path.as_path()),
                _ => None,
            })
            .collect()
    }

    /// Paths of all target parameters, in parameter order.
    pub fn targets(&self) -> Vec<&Utf8Path> {
        self.parameters
            .iter()
            .filter_map(|param| match param {
                Param::Target(path) => Some(path.as_path()),
                _ => None,
            })
            .collect()
    }

    fn check_arity(&self, base: &str, chunks: &[String]) -> Result<(), ComposeError> {
        let slots = chunks.len() - 1;
        if slots != self.parameters.len() {
            return Err(ComposeError::TemplateArity {
                base: base.to_string(),
                slots,
                parameters: self.parameters.len(),
            });
        }
        Ok(())
    }
}

/// Split a template at its `{}` slots, resolving `{{` and `}}` escapes.
/// The result always holds one more chunk than there are slots.
fn split_slots(template: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('{', Some('{')) | ('}', Some('}')) => {
                chars.next();
                current.push(c);
            }
            ('{', Some('}')) => {
                chars.next();
                chunks.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }

    chunks.push(current);
    chunks
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("hello there {}!", &["Friend"], true)]
    #[case("hello there {} {} {}!", &["Friend", "And", "Another"], true)]
    #[case("hello there {}!", &["Friend", "Or", "Foe?"], false)]
    #[case("hello there!", &["Friend"], false)]
    #[case("hello there!", &["Friend", "Or", "Foe?"], false)]
    #[case("hello there {} {}!", &["Friend"], false)]
    fn test_arity(#[case] base: &str, #[case] parameters: &[&str], #[case] ok: bool) {
        let action = Action::with_parameters(base, parameters.iter().copied());
        let result = action.compile();

        assert_eq!(result.is_ok(), ok, "{result:?}");
        match result {
            Ok(compiled) => assert!(compiled.starts_with("hello there ")),
            Err(ComposeError::TemplateArity {
                slots, parameters: n, ..
            }) => {
                assert_eq!(n, parameters.len());
                assert_ne!(slots, n);
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn test_compile() {
        let action = Action::with_parameters("hello {}!", ["Friend"]);
        assert_eq!(action.compile().unwrap(), "hello Friend!");

        let action = Action::new("hello!");
        assert_eq!(action.compile().unwrap(), "hello!");
    }

    #[test]
    fn test_words_are_joined() {
        let action = Action::new(vec!["python", "script.py", "{}"]).param("--csv");

        assert_eq!(action.base_str(), "python script.py {}");
        assert_eq!(action.compile().unwrap(), "python script.py --csv");
    }

    #[test]
    fn test_markers_are_unwrapped() {
        let action = Action::new("python script.py {} {} {}")
            .param("--csv")
            .param(Param::file_dep("pyproject.toml"))
            .param(Param::target("target.csv"));

        assert_eq!(
            action.compile().unwrap(),
            "python script.py --csv pyproject.toml target.csv"
        );
        assert_eq!(action.file_deps(), [Utf8Path::new("pyproject.toml")]);
        assert_eq!(action.targets(), [Utf8Path::new("target.csv")]);
    }

    #[test]
    fn test_non_string_values() {
        let action = Action::new("sleep {} && echo {}")
            .param(Param::value(3))
            .param(Param::value(true));

        assert_eq!(action.compile().unwrap(), "sleep 3 && echo true");
    }

    #[test]
    fn test_other_braces_are_literal() {
        let action = Action::new("echo ${HOME} {} {{}} {0}").param("x");

        assert!(action.validate().is_ok());
        assert_eq!(action.compile().unwrap(), "echo ${HOME} x {} {0}");
    }

    #[test]
    fn test_no_parameters_keeps_base() {
        let action = Action::new("echo {{literal}}");
        assert_eq!(action.compile().unwrap(), "echo {{literal}}");
    }

    #[test]
    fn test_deserialize() {
        let action: Action = serde_json::from_value(serde_json::json!({
            "base": ["cp", "{}", "{}"],
            "parameters": [{ "file_dep": "a.txt" }, { "target": "b.txt" }]
        }))
        .unwrap();

        assert_eq!(action.compile().unwrap(), "cp a.txt b.txt");
        assert_eq!(action.file_deps(), [Utf8Path::new("a.txt")]);
    }
}
