//! Rename operation: soundness, scoping, cross-module edits and
//! preconditions.

use hawser_core::error::HawserError;
use hawser_core::task::TaskHandle;
use hawser_python::ops::rename::{Rename, RenameOptions};
use hawser_python::project::Project;
use tempfile::TempDir;

fn project_with(files: &[(&str, &str)]) -> (TempDir, Project) {
    let dir = TempDir::new().unwrap();
    let project = Project::open(dir.path()).unwrap();
    for (path, content) in files {
        if let Some(parent) = std::path::Path::new(path).parent() {
            let parent = parent.to_string_lossy();
            if !parent.is_empty() && !project.workspace().has_resource(&parent) {
                project.workspace().create_folder(&parent).unwrap();
            }
        }
        let resource = project.workspace().create_file(path).unwrap();
        project.workspace().write(&resource, content).unwrap();
    }
    (dir, project)
}

fn rename_in_file(
    project: &Project,
    path: &str,
    offset: usize,
    new_name: &str,
) -> Vec<(String, String)> {
    let resource = project.workspace().resource(path).unwrap();
    let rename = Rename::new(project, &resource, offset).unwrap();
    rename
        .changes(new_name, &RenameOptions::default(), &TaskHandle::new())
        .unwrap()
        .into_iter()
        .map(|edit| (edit.resource.path().to_string(), edit.new_text))
        .collect()
}

#[test]
fn rename_local_variable_leaves_module_level_untouched() {
    let source = "def f():\n    a_var = 10\n    return a_var\na_var = 20\n";
    let (_dir, project) = project_with(&[("mod.py", source)]);
    let offset = source.find("a_var").unwrap();

    let edits = rename_in_file(&project, "mod.py", offset, "b_var");
    assert_eq!(edits.len(), 1);
    let (_, new_text) = &edits[0];
    assert_eq!(
        new_text,
        "def f():\n    b_var = 10\n    return b_var\na_var = 20\n"
    );
}

#[test]
fn rename_there_and_back_restores_original_text() {
    let source = "def f():\n    a_var = 10\n    return a_var\na_var = 20\n";
    let (_dir, project) = project_with(&[("mod.py", source)]);
    let resource = project.workspace().resource("mod.py").unwrap();
    let offset = source.find("a_var").unwrap();

    let edits = rename_in_file(&project, "mod.py", offset, "b_var");
    project.workspace().write(&resource, &edits[0].1).unwrap();

    let back_offset = edits[0].1.find("b_var").unwrap();
    let back = rename_in_file(&project, "mod.py", back_offset, "a_var");
    assert_eq!(back[0].1, source);
}

#[test]
fn rename_touches_definition_and_importers() {
    let (_dir, project) = project_with(&[
        ("main.py", "from util import helper\nhelper()\n"),
        ("util.py", "def helper():\n    pass\n"),
    ]);
    let offset = "def ".len();
    let edits = rename_in_file(&project, "util.py", offset, "assist");
    assert_eq!(edits.len(), 2);
    let main = edits.iter().find(|(p, _)| p == "main.py").unwrap();
    let util = edits.iter().find(|(p, _)| p == "util.py").unwrap();
    assert_eq!(main.1, "from util import assist\nassist()\n");
    assert_eq!(util.1, "def assist():\n    pass\n");
}

#[test]
fn rename_method_in_hierarchy() {
    let source = concat!(
        "class Base:\n",
        "    def run(self):\n",
        "        pass\n",
        "class Sub(Base):\n",
        "    def run(self):\n",
        "        pass\n",
    );
    let (_dir, project) = project_with(&[("mod.py", source)]);
    let resource = project.workspace().resource("mod.py").unwrap();
    let offset = source.find("run").unwrap();

    let rename = Rename::new(&project, &resource, offset).unwrap();
    let options = RenameOptions {
        in_hierarchy: true,
        ..RenameOptions::default()
    };
    let edits = rename
        .changes("execute", &options, &TaskHandle::new())
        .unwrap();
    assert_eq!(edits.len(), 1);
    assert!(!edits[0].new_text.contains("def run"));
    assert_eq!(edits[0].replaced_offsets.len(), 2);
}

#[test]
fn rename_rejects_invalid_new_name() {
    let source = "value = 1\n";
    let (_dir, project) = project_with(&[("mod.py", source)]);
    let resource = project.workspace().resource("mod.py").unwrap();
    let rename = Rename::new(&project, &resource, 0).unwrap();

    for bad in ["1bad", "has space", "", "class"] {
        let err = rename
            .changes(bad, &RenameOptions::default(), &TaskHandle::new())
            .unwrap_err();
        assert!(
            matches!(err, HawserError::Precondition { .. }),
            "{} should be rejected",
            bad
        );
    }
}

#[test]
fn rename_rejects_identical_name() {
    let source = "value = 1\n";
    let (_dir, project) = project_with(&[("mod.py", source)]);
    let resource = project.workspace().resource("mod.py").unwrap();
    let rename = Rename::new(&project, &resource, 0).unwrap();
    assert!(matches!(
        rename.changes("value", &RenameOptions::default(), &TaskHandle::new()),
        Err(HawserError::Precondition { .. })
    ));
}

#[test]
fn rename_requires_an_identifier_at_offset() {
    let source = "value = 1\n";
    let (_dir, project) = project_with(&[("mod.py", source)]);
    let resource = project.workspace().resource("mod.py").unwrap();
    // Offset of the `=` sign.
    let err = Rename::new(&project, &resource, 6).unwrap_err();
    assert!(matches!(err, HawserError::BadIdentifier { .. }));
}

#[test]
fn renaming_original_keeps_alias_spelling() {
    let (_dir, project) = project_with(&[
        ("main.py", "from util import helper as h\nh()\n"),
        ("util.py", "def helper():\n    pass\n"),
    ]);
    let offset = "def ".len();
    let edits = rename_in_file(&project, "util.py", offset, "assist");
    let util = edits.iter().find(|(p, _)| p == "util.py").unwrap();
    assert_eq!(util.1, "def assist():\n    pass\n");
    if let Some((_, main_text)) = edits.iter().find(|(p, _)| p == "main.py") {
        // The alias spelling `h` survives; only the original is renamed.
        assert!(main_text.contains("import assist as h"));
        assert!(main_text.contains("h()"));
    }
}
