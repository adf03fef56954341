//! Occurrence finder behavior: identity matching, filters, ordering,
//! laziness and cancellation.

use hawser_core::task::TaskHandle;
use hawser_python::occurrences::{find_occurrences, FindOptions, Occurrence, OccurrenceFinder};
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

fn occurrences_at(
    project: &Project,
    path: &str,
    needle_offset: usize,
    options: FindOptions,
) -> Vec<Occurrence> {
    let resource = project.workspace().resource(path).unwrap();
    find_occurrences(project, &resource, needle_offset, options).unwrap()
}

fn as_tuples(occurrences: &[Occurrence]) -> Vec<(String, usize, usize)> {
    occurrences
        .iter()
        .map(|o| (o.resource.path().to_string(), o.start, o.end))
        .collect()
}

#[test]
fn local_binding_does_not_leak_to_module_level() {
    let source = "def f():\n    a_var = 10\n    return a_var\na_var = 20\n";
    let (_dir, project) = project_with(&[("mod.py", source)]);
    let offset = source.find("a_var").unwrap();

    let found = occurrences_at(&project, "mod.py", offset, FindOptions::default());
    assert_eq!(found.len(), 2, "local rename targets exactly two offsets");
    // Both inside the function body, none at module level.
    let module_level = source.rfind("a_var").unwrap();
    assert!(found.iter().all(|o| o.start != module_level));
}

#[test]
fn definition_site_is_marked_written() {
    let source = "a = 1\nb = a\nc = b\n";
    let (_dir, project) = project_with(&[("mod.py", source)]);
    let found = occurrences_at(&project, "mod.py", 0, FindOptions::default());
    assert_eq!(found.len(), 2);
    let written: Vec<bool> = found.iter().map(|o| o.is_written).collect();
    assert_eq!(written.iter().filter(|w| **w).count(), 1);
    assert!(found[0].is_written, "the definition comes first");
}

#[test]
fn alias_and_original_are_one_occurrence_set() {
    let (_dir, project) = project_with(&[
        ("main.py", "from pkg.mod import g as h\nh()\n"),
        ("pkg/__init__.py", ""),
        ("pkg/mod.py", "def g():\n    pass\n"),
    ]);
    let main_source = "from pkg.mod import g as h\nh()\n";
    let offset = main_source.rfind('h').unwrap();
    let found = occurrences_at(&project, "main.py", offset, FindOptions::default());

    let tuples = as_tuples(&found);
    let in_main = tuples.iter().filter(|(p, _, _)| p == "main.py").count();
    let in_mod = tuples.iter().filter(|(p, _, _)| p == "pkg/mod.py").count();
    assert_eq!(in_main, 3, "import name, alias binding and use");
    assert_eq!(in_mod, 1, "the definition in the imported module");
}

#[test]
fn imports_filter_excludes_import_statements() {
    let (_dir, project) = project_with(&[
        ("main.py", "from util import helper\nhelper()\n"),
        ("util.py", "def helper():\n    pass\n"),
    ]);
    let main_source = "from util import helper\nhelper()\n";
    let offset = main_source.rfind("helper").unwrap();

    let all = occurrences_at(&project, "main.py", offset, FindOptions::default());
    let without_imports = occurrences_at(
        &project,
        "main.py",
        offset,
        FindOptions {
            imports: false,
            ..FindOptions::default()
        },
    );
    assert_eq!(all.len(), 3);
    assert_eq!(without_imports.len(), 2);
}

#[test]
fn results_are_ordered_and_idempotent() {
    let (_dir, project) = project_with(&[
        ("a_first.py", "from shared import thing\nx = thing\n"),
        ("shared.py", "thing = 1\n"),
    ]);
    let offset = 0; // `thing` definition in shared.py
    let first = occurrences_at(&project, "shared.py", offset, FindOptions::default());
    let second = occurrences_at(&project, "shared.py", offset, FindOptions::default());
    assert_eq!(as_tuples(&first), as_tuples(&second));

    // Resource enumeration order, then in-file offset order.
    let tuples = as_tuples(&first);
    let mut sorted = tuples.clone();
    sorted.sort();
    assert_eq!(tuples, sorted);
}

#[test]
fn strings_and_comments_are_not_occurrences() {
    let source = "value = 1\n# value in a comment\ntext = 'value in a string'\nuse = value\n";
    let (_dir, project) = project_with(&[("mod.py", source)]);
    let found = occurrences_at(&project, "mod.py", 0, FindOptions::default());
    assert_eq!(found.len(), 2);
}

#[test]
fn unsure_mode_reports_unresolved_attribute_receivers() {
    let (_dir, project) = project_with(&[
        ("c.py", "class C:\n    def __init__(self):\n        self.flag = 1\n"),
        ("use.py", "def use(thing):\n    return thing.flag\n"),
    ]);
    let c_source = "class C:\n    def __init__(self):\n        self.flag = 1\n";
    let offset = c_source.find("flag").unwrap();

    let sure_only = occurrences_at(&project, "c.py", offset, FindOptions::default());
    assert_eq!(sure_only.len(), 1);

    let with_unsure = occurrences_at(
        &project,
        "c.py",
        offset,
        FindOptions {
            unsure: true,
            ..FindOptions::default()
        },
    );
    assert_eq!(with_unsure.len(), 2);
    assert_eq!(with_unsure.iter().filter(|o| o.is_unsure).count(), 1);
}

#[test]
fn hierarchy_filter_includes_related_methods() {
    let source = concat!(
        "class Base:\n",
        "    def run(self):\n",
        "        pass\n",
        "class Sub(Base):\n",
        "    def run(self):\n",
        "        pass\n",
    );
    let (_dir, project) = project_with(&[("mod.py", source)]);
    let offset = source.find("run").unwrap();

    let plain = occurrences_at(&project, "mod.py", offset, FindOptions::default());
    assert_eq!(plain.len(), 1);

    let hierarchy = occurrences_at(
        &project,
        "mod.py",
        offset,
        FindOptions {
            in_hierarchy: true,
            ..FindOptions::default()
        },
    );
    assert_eq!(hierarchy.len(), 2, "the subclass override is included");
}

#[test]
fn cancelled_task_yields_nothing_further() {
    let (_dir, project) = project_with(&[
        ("a.py", "shared = 1\n"),
        ("b.py", "from a import shared\nuse = shared\n"),
    ]);
    let resource = project.workspace().resource("a.py").unwrap();
    let finder =
        OccurrenceFinder::new(&project, &resource, 0, FindOptions::default()).unwrap();
    let task = TaskHandle::new();
    task.stop();
    let collected: Vec<_> = finder.occurrences(task).unwrap().collect();
    assert!(collected.is_empty());
}

#[test]
fn job_events_fire_per_resource() {
    use hawser_core::task::JobObserver;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counter(Arc<AtomicUsize>);
    impl JobObserver for Counter {
        fn started_job(&mut self, _name: &str) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn finished_job(&mut self) {}
    }

    let (_dir, project) = project_with(&[
        ("a.py", "shared = 1\n"),
        ("b.py", "import a\n"),
    ]);
    let resource = project.workspace().resource("a.py").unwrap();
    let finder =
        OccurrenceFinder::new(&project, &resource, 0, FindOptions::default()).unwrap();
    let task = TaskHandle::new();
    let count = Arc::new(AtomicUsize::new(0));
    task.add_observer(Box::new(Counter(count.clone())));
    let _: Vec<_> = finder.occurrences(task).unwrap().collect();
    assert_eq!(count.load(Ordering::SeqCst), 2, "one job per source file");
}
