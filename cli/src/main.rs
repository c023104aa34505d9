use std::collections::BTreeMap;
use std::fs;
use std::process::ExitCode;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use console::style;
use serde_json::{Map, Value};
use taskweave::{ComposeTask, Field, TaskRecord, fingerprint};

#[derive(Parser, Debug)]
#[command(name = "taskweave", version, about = "Compile composable task definitions")]
struct Args {
    /// Log more, repeat for even more.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile task definitions from a JSON file and print the records.
    Compile {
        /// A single task object, or an object mapping task names to task
        /// objects. A map holding only a task named `config_changed` is read
        /// as a single task.
        file: Utf8PathBuf,
    },
    /// Print the content fingerprint of a set of files.
    Fingerprint {
        #[arg(required = true)]
        paths: Vec<Utf8PathBuf>,
    },
    /// List source files below a directory.
    Sources {
        dir: Utf8PathBuf,
        #[arg(long, default_value = "py")]
        ext: String,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    taskweave::init_logging(match args.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    });

    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", style("error:").red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Compile { file } => {
            let text = fs::read_to_string(&file).with_context(|| format!("reading {file}"))?;
            let value: Value =
                serde_json::from_str(&text).with_context(|| format!("parsing {file}"))?;

            let output = match compile_definitions(value)? {
                Compiled::Single(record) => record.to_json_pretty()?,
                Compiled::Many(records) => serde_json::to_string_pretty(&records)?,
            };
            println!("{output}");
        }
        Command::Fingerprint { paths } => {
            let hash = fingerprint::create_path_content_hash(paths.as_slice())?;
            println!("{hash}");
        }
        Command::Sources { dir, ext } => {
            for path in fingerprint::find_source_files(&dir, &ext)? {
                println!("{path}");
            }
        }
    }

    Ok(())
}

#[derive(Debug)]
enum Compiled {
    Single(TaskRecord),
    Many(BTreeMap<String, TaskRecord>),
}

/// An object whose values are all objects is a map of named tasks, anything
/// else is one task. Tasks in a map are named after their key unless they
/// carry a name of their own.
fn compile_definitions(value: Value) -> Result<Compiled> {
    let object = match value {
        Value::Object(object) if is_task_map(&object) => object,
        value => {
            let record = ComposeTask::from_json(value)?.compile()?;
            return Ok(Compiled::Single(record));
        }
    };

    let mut records = BTreeMap::new();
    for (key, definition) in object {
        let task = ComposeTask::from_json(definition).with_context(|| format!("task '{key}'"))?;
        let task = if task.name().is_some() {
            task
        } else {
            task.add_name(&key)
        };

        let record = task.compile().with_context(|| format!("task '{key}'"))?;
        tracing::info!(task = %key, "compiled");
        records.insert(key, record);
    }

    Ok(Compiled::Many(records))
}

/// `config_changed` is the only task field holding an object, so an object
/// of objects with any other key cannot be a single task.
fn is_task_map(object: &Map<String, Value>) -> bool {
    object.values().all(Value::is_object)
        && object.keys().any(|key| key != Field::ConfigChanged.as_str())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_single_task() {
        let compiled = compile_definitions(json!({
            "actions": ["mkdir -p tmp", "mkdir -p tmp2"],
            "config_changed": { "x": 2, "y": 4 },
            "file_dep": ["setup.py"]
        }))
        .unwrap();

        let Compiled::Single(record) = compiled else {
            panic!("expected a single record");
        };
        assert_eq!(record.keys(), ["actions", "file_dep", "uptodate"]);
    }

    #[test]
    fn test_named_tasks() {
        let compiled = compile_definitions(json!({
            "build": { "actions": ["cargo build"] },
            "test": { "actions": ["cargo test"], "task_dep": ["build"], "name": "check" }
        }))
        .unwrap();

        let Compiled::Many(records) = compiled else {
            panic!("expected named records");
        };
        assert_eq!(records["build"].name.as_deref(), Some("build"));
        assert_eq!(records["test"].name.as_deref(), Some("check"));
    }

    #[test]
    fn test_tasks_named_like_fields() {
        let compiled = compile_definitions(json!({
            "name": { "actions": ["echo name"] },
            "actions": { "actions": ["echo actions"], "file_dep": ["in.txt"] }
        }))
        .unwrap();

        let Compiled::Many(records) = compiled else {
            panic!("expected named records");
        };
        assert_eq!(records["name"].name.as_deref(), Some("name"));
        assert_eq!(records["actions"].name.as_deref(), Some("actions"));
        assert_eq!(records["actions"].keys(), ["actions", "file_dep", "name"]);
    }

    #[test]
    fn test_config_only_task() {
        let compiled = compile_definitions(json!({
            "config_changed": { "version": 3 }
        }))
        .unwrap();

        let Compiled::Single(record) = compiled else {
            panic!("expected a single record");
        };
        assert_eq!(record.keys(), ["uptodate"]);
    }

    #[test]
    fn test_errors_name_the_task() {
        let error = compile_definitions(json!({
            "broken": { "actions": [{ "base": "echo {}" }] }
        }))
        .unwrap_err();

        assert!(format!("{error:#}").contains("task 'broken'"));
    }
}
