use std::thread;

use serde_json::json;
use taskweave::{Action, Check, ComposeTask, Param};

fn main_task() -> ComposeTask {
    ComposeTask::new()
        .add_actions(["mkdir -p tmp"])
        .add_config_dependency([("x", 2)])
        .add_config_dependency([("y", 4)])
        .add_file_deps(["dodo.py", "setup.py"])
        .add_result_dep(["other_task"])
        .add_actions(["mkdir -p tmp2"])
}

#[test]
fn compiles_end_to_end() {
    let record = main_task().compile().unwrap();

    assert_eq!(
        serde_json::to_value(&record).unwrap(),
        json!({
            "actions": ["mkdir -p tmp", "mkdir -p tmp2"],
            "file_dep": ["dodo.py", "setup.py"],
            "uptodate": [
                { "kind": "result_dep", "task": "other_task" },
                { "kind": "config_changed", "config": { "x": 2, "y": 4 } }
            ]
        })
    );
}

#[test]
fn lifts_template_dependencies() {
    let record = main_task()
        .add_actions([Action::new("python script.py {} {} {}")
            .param("--csv")
            .param(Param::file_dep("pyproject.toml"))
            .param(Param::target("target.csv"))])
        .add_targets(["target.csv"])
        .compile()
        .unwrap();

    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(
        json["actions"][2],
        "python script.py --csv pyproject.toml target.csv"
    );
    assert_eq!(
        json["file_dep"],
        json!(["dodo.py", "setup.py", "pyproject.toml"])
    );
    assert_eq!(json["targets"], json!(["target.csv"]));
    assert_eq!(
        json["uptodate"][1]["config"]["python script.py {} {} {}"],
        "python script.py {} {} {}"
    );
}

#[test]
fn forks_share_a_base() {
    let base = main_task();

    let handles: Vec<_> = ["lint", "test", "docs"]
        .into_iter()
        .map(|name| {
            let base = base.clone();
            thread::spawn(move || base.add_name(name).compile().unwrap())
        })
        .collect();

    for (handle, name) in handles.into_iter().zip(["lint", "test", "docs"]) {
        let record = handle.join().unwrap();
        assert_eq!(record.name.as_deref(), Some(name));
        assert!(matches!(
            record.uptodate.as_deref(),
            Some([Check::ResultDep { .. }, Check::ConfigChanged { .. }])
        ));
    }

    assert!(base.compile().unwrap().name.is_none());
}
