use std::fmt::Display;

/// Join the parts of a command line with single spaces.
///
/// ```rust
/// assert_eq!(taskweave::command(["python", "-m", "pytest"]), "python -m pytest");
/// assert_eq!(taskweave::command([&"sleep" as &dyn std::fmt::Display, &3]), "sleep 3");
/// ```
pub fn command<I>(parts: I) -> String
where
    I: IntoIterator,
    I::Item: Display,
{
    parts
        .into_iter()
        .map(|part| part.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use camino::Utf8Path;

    use super::*;

    #[test]
    fn test_command() {
        assert_eq!(command(["mkdir", "-p", "tmp"]), "mkdir -p tmp");
        assert_eq!(command(Vec::<String>::new()), "");
        assert_eq!(
            command([Utf8Path::new("bin/run"), Utf8Path::new("out.csv")]),
            "bin/run out.csv"
        );
    }
}
