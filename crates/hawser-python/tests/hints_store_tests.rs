//! Runtime hint ingestion and the persisted inference store.

use std::io::Cursor;

use hawser_python::hints::{apply_records, load_store, read_records, save_store, HintRecord};
use hawser_python::inference::{self, Ctx};
use hawser_python::objects::{DefId, Entity};
use hawser_python::project::Project;
use hawser_python::textual::Textual;
use tempfile::TempDir;

fn project_with(files: &[(&str, &str)]) -> (TempDir, Project) {
    let dir = TempDir::new().unwrap();
    let project = Project::open(dir.path()).unwrap();
    for (path, content) in files {
        let resource = project.workspace().create_file(path).unwrap();
        project.workspace().write(&resource, content).unwrap();
    }
    (dir, project)
}

fn abs_path(project: &Project, relative: &str) -> String {
    project
        .workspace()
        .root()
        .join(relative)
        .to_string_lossy()
        .into_owned()
}

fn str_textual() -> Textual {
    Textual::Builtin {
        kind: "str".to_string(),
        params: Vec::new(),
    }
}

#[test]
fn hint_records_contribute_parameter_evidence() {
    let (_dir, project) = project_with(&[("mod.py", "def f(a):\n    return a\n")]);
    let record = HintRecord {
        callee: Textual::Defined {
            path: abs_path(&project, "mod.py"),
            name: "f".to_string(),
        },
        args: vec![str_textual()],
        returned: Textual::Builtin {
            kind: "int".to_string(),
            params: Vec::new(),
        },
    };
    assert_eq!(apply_records(&project, &[record]), 1);

    let resource = project.workspace().resource("mod.py").unwrap();
    let entry = project.resource_to_module(&resource).unwrap();
    let ctx = Ctx::new(&project);
    assert_eq!(
        inference::parameter_entity(&ctx, &entry, DefId(0), 0),
        Entity::str()
    );
}

#[test]
fn records_with_unresolvable_callees_are_discarded() {
    let (_dir, project) = project_with(&[("mod.py", "def f(a):\n    return a\n")]);
    let records = vec![
        HintRecord {
            callee: Textual::Defined {
                path: "/somewhere/else/entirely.py".to_string(),
                name: "f".to_string(),
            },
            args: Vec::new(),
            returned: Textual::Unknown,
        },
        HintRecord {
            callee: Textual::Defined {
                path: abs_path(&project, "mod.py"),
                name: "no_such_function".to_string(),
            },
            args: Vec::new(),
            returned: Textual::Unknown,
        },
    ];
    assert_eq!(apply_records(&project, &records), 0);
}

#[test]
fn stream_reader_feeds_the_project() {
    let (_dir, project) = project_with(&[("mod.py", "def f(a):\n    return a\n")]);
    let line = format!(
        "[[\"defined\", {:?}, \"f\"], [[\"builtin\", \"str\"]], [\"builtin\", \"str\"]]\n",
        abs_path(&project, "mod.py")
    );
    let records = read_records(Cursor::new(line));
    assert_eq!(records.len(), 1);
    assert_eq!(apply_records(&project, &records), 1);
}

#[test]
fn store_round_trips_through_a_fresh_project() {
    let (dir, project) = project_with(&[("mod.py", "def f(a):\n    return a\n")]);
    let record = HintRecord {
        callee: Textual::Defined {
            path: abs_path(&project, "mod.py"),
            name: "f".to_string(),
        },
        args: vec![str_textual()],
        returned: str_textual(),
    };
    apply_records(&project, &[record]);
    save_store(&project).unwrap();
    drop(project);

    let reloaded = Project::open(dir.path()).unwrap();
    let applied = load_store(&reloaded).unwrap();
    assert_eq!(applied, 1);

    let resource = reloaded.workspace().resource("mod.py").unwrap();
    let entry = reloaded.resource_to_module(&resource).unwrap();
    let ctx = Ctx::new(&reloaded);
    assert_eq!(
        inference::parameter_entity(&ctx, &entry, DefId(0), 0),
        Entity::str()
    );
}

#[test]
fn store_folder_is_not_analyzed_as_source() {
    let (_dir, project) = project_with(&[("mod.py", "def f(a):\n    return a\n")]);
    save_store(&project).unwrap();
    let files = project.workspace().source_files().unwrap();
    assert!(files.iter().all(|r| !r.path().starts_with(".hawser")));
}

#[test]
fn unknown_store_content_is_ignored() {
    let (_dir, project) = project_with(&[("mod.py", "def f(a):\n    return a\n")]);
    let workspace = project.workspace();
    workspace.create_folder(".hawser").unwrap();
    let file = workspace.create_file(".hawser/objectdb.json").unwrap();
    workspace
        .write(
            &file,
            r#"{"version": 99, "a_new_section": [1, 2], "modules": {}}"#,
        )
        .unwrap();
    assert_eq!(load_store(&project).unwrap(), 0);
}

#[test]
fn textual_entity_roundtrip_for_defined_objects() {
    let (_dir, project) = project_with(&[(
        "mod.py",
        "class C:\n    def m(self):\n        pass\ndef f():\n    pass\n",
    )]);
    let resource = project.workspace().resource("mod.py").unwrap();
    let entry = project.resource_to_module(&resource).unwrap();
    let ctx = Ctx::new(&project);

    let class_entity = Entity::Class(entry.id, DefId(0));
    let function_entity = Entity::Function(entry.id, DefId(2));
    let method_entity = Entity::Function(entry.id, DefId(1));
    let instance = Entity::instance_of(class_entity.clone());

    for entity in [class_entity, function_entity, method_entity, instance] {
        let textual = hawser_python::textual::entity_to_textual(&ctx, &entity);
        let back = hawser_python::textual::textual_to_entity(&ctx, &textual);
        assert_eq!(back, entity, "textual round-trip for {:?}", textual);
    }
}

#[test]
fn method_dotted_name_includes_class() {
    let (_dir, project) = project_with(&[(
        "mod.py",
        "class C:\n    def m(self):\n        pass\n",
    )]);
    let resource = project.workspace().resource("mod.py").unwrap();
    let entry = project.resource_to_module(&resource).unwrap();
    assert_eq!(hawser_python::textual::dotted_name(&entry, DefId(1)), "C.m");
}
