use thiserror::Error;

/// Errors raised while updating or compiling a task definition.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// The number of `{}` slots in a template differs from its parameter count.
    #[error(
        "Template '{base}' has {slots} placeholder(s) but {parameters} parameter(s) were given"
    )]
    TemplateArity {
        base: String,
        slots: usize,
        parameters: usize,
    },

    #[error("'{0}' is not a field of a task definition")]
    UnknownField(String),

    #[error("Field '{field}' expects {expected}:\n{source}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The generic update path never replaces a name, `add_name` does.
    #[error("Task is already named '{current}', refusing to rename it to '{rejected}'")]
    NameAlreadySet { current: String, rejected: String },
}

#[cfg(feature = "fingerprint")]
#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("Couldn't read file.\n{0}")]
    Io(#[from] std::io::Error),

    #[error("Couldn't compile glob pattern.\n{0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Couldn't run glob.\n{0}")]
    Glob(#[from] glob::GlobError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),

    #[error("Couldn't encode path contents.\n{0}")]
    Encode(#[from] ciborium::ser::Error<std::io::Error>),
}
