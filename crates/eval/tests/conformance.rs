//! End-to-end scenarios driven by the templates in `conformance/eval/`.
//!
//! Each fixture is a `.tvz` template resolved with a `ManualScheduler`;
//! the tests then fire actions the way a renderer would and check the
//! resulting global state and reaction matches. Templates under
//! `errors/` must fail resolution with a FATAL, line-tagged error.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use traceviz_eval::{
    documenter, load_document, BoolStream, Document, LoadError, ManualScheduler, Value, ValueMap,
};

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("conformance")
        .join("eval")
}

fn load(name: &str) -> (Document, Rc<ManualScheduler>) {
    let scheduler = Rc::new(ManualScheduler::new());
    let path = fixture_dir().join(format!("{}.tvz", name));
    let doc = load_document(&path, scheduler.clone())
        .unwrap_or_else(|e| panic!("Failed to load {}: {}", name, e));
    (doc, scheduler)
}

fn global(doc: &Document, key: &str) -> Value {
    doc.global
        .get(key)
        .unwrap()
        .unwrap_or_else(|| panic!("no global {}", key))
}

#[test]
fn nested_if_else() {
    let (doc, _) = load("if_else");
    for (num, text, is_one) in [(0, "none", 0), (1, "one", 1), (5, "several", 0)] {
        let local = ValueMap::from_entries([("num", Value::int(num))]);
        doc.interactions.update("item", "click", &local).unwrap();
        assert_eq!(global(&doc, "number_text").as_string().unwrap(), text);
        assert_eq!(global(&doc, "is_one").as_int().unwrap(), is_one);
    }
}

#[test]
fn unmatched_action_is_a_no_op() {
    let (doc, _) = load("if_else");
    let local = ValueMap::from_entries([("num", Value::int(1))]);
    doc.interactions.update("item", "hover", &local).unwrap();
    doc.interactions.update("row", "click", &local).unwrap();
    assert_eq!(global(&doc, "number_text").as_string().unwrap(), "");
}

fn item(name: &str, num: i64, start: i64, end: i64) -> ValueMap {
    ValueMap::from_entries([
        ("name", Value::string(name)),
        ("num", Value::int(num)),
        ("start", Value::int(start)),
        ("end", Value::int(end)),
    ])
}

fn matching(streams: &[BoolStream]) -> Vec<usize> {
    streams
        .iter()
        .enumerate()
        .filter(|(_, s)| s.get())
        .map(|(i, _)| i)
        .collect()
}

#[test]
fn reaction_match_sets() {
    let (doc, _) = load("reaction_match");
    let i = &doc.interactions;
    let items = [
        item("thing1", 1, 100, 200),
        item("thing2", 2, 2000, 2200),
        item("thing3", 3, 1000, 1600),
    ];
    let matcher = i.match_reaction("item", "highlight");
    let streams: Vec<BoolStream> = items.iter().map(|m| matcher.matches(m).unwrap()).collect();
    assert_eq!(matching(&streams), vec![0]);

    let hover = |t: i64| ValueMap::from_entries([("time", Value::int(t))]);
    i.update("timeline", "hover", &hover(1500)).unwrap();
    assert_eq!(matching(&streams), vec![0, 2]);

    i.update("timeline", "hover", &hover(2100)).unwrap();
    i.update("item", "call-out", &items[1]).unwrap();
    assert_eq!(matching(&streams), vec![1]);

    i.update("item", "click", &items[0]).unwrap();
    assert_eq!(
        global(&doc, "selected_names").as_string_set().unwrap().len(),
        1
    );
    assert_eq!(matching(&streams), vec![0, 1]);

    i.update("mode", "edit", &ValueMap::new()).unwrap();
    assert_eq!(matching(&streams), Vec::<usize>::new());
}

#[test]
fn reaction_streams_emit_only_on_change() {
    let (doc, _) = load("reaction_match");
    let i = &doc.interactions;
    let stream = i
        .match_reaction("item", "highlight")
        .matches(&item("thing3", 3, 1000, 1600))
        .unwrap();
    let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
    let s = seen.clone();
    let _sub = stream.subscribe(move |b| s.borrow_mut().push(b));
    for t in [1100, 1200, 1700, 1800] {
        i.update(
            "timeline",
            "hover",
            &ValueMap::from_entries([("time", Value::int(t))]),
        )
        .unwrap();
    }
    assert_eq!(*seen.borrow(), vec![false, true, false]);
}

#[test]
fn changed_reaction_is_debounced() {
    let (doc, scheduler) = load("changed");
    let i = &doc.interactions;
    let flash = i
        .match_reaction("row", "flash")
        .matches(&ValueMap::new())
        .unwrap();
    let click = |name: &str| ValueMap::from_entries([("name", Value::string(name))]);

    assert!(!flash.get());
    i.update("row", "click", &click("a")).unwrap();
    assert!(flash.get());
    scheduler.advance(99);
    assert!(flash.get());
    i.update("row", "click", &click("a")).unwrap();
    scheduler.advance(1);
    assert!(!flash.get(), "same value must not restart the timer");

    i.update("row", "click", &click("b")).unwrap();
    scheduler.advance(50);
    i.update("row", "click", &click("c")).unwrap();
    scheduler.advance(50);
    assert!(flash.get());
    scheduler.advance(50);
    assert!(!flash.get());
}

#[test]
fn documenter_output_is_stable() {
    let (doc, _) = load("documented");
    let expected = std::fs::read_to_string(fixture_dir().join("documented.doc.txt")).unwrap();
    let first = documenter::pretty_print(&doc.interactions);
    assert_eq!(first, expected);

    let (again, _) = load("documented");
    assert_eq!(documenter::pretty_print(&again.interactions), first);
}

#[test]
fn watch_sees_shared_global() {
    let (doc, _) = load("documented");
    let levels = Rc::new(std::cell::RefCell::new(Vec::new()));
    let l = levels.clone();
    let teardown = traceviz_eval::Teardown::new();
    doc.interactions.watch(
        "zoom",
        move |args| l.borrow_mut().push(args.expect_double("level").unwrap()),
        &teardown,
    );
    global(&doc, "zoom").fold(&Value::double(3.0), false, true);
    assert_eq!(*levels.borrow(), vec![1.5, 3.0]);
}

fn run_error_fixture(path: &Path) {
    let scheduler = Rc::new(ManualScheduler::new());
    match load_document(path, scheduler) {
        Ok(_) => panic!("expected {} to fail", path.display()),
        Err(LoadError::Configuration(e)) => {
            assert!(e.is_fatal(), "{}: {}", path.display(), e);
            let prefix = format!("{}:", path.display());
            assert!(
                e.message.starts_with(&prefix),
                "{}: message lacks location: {}",
                path.display(),
                e.message
            );
        }
        Err(other) => panic!("{}: unexpected error {}", path.display(), other),
    }
}

#[test]
fn malformed_templates_fail_resolution() {
    let dir = fixture_dir().join("errors");
    let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|x| x == "tvz"))
        .collect();
    paths.sort();
    assert!(paths.len() >= 5);
    for path in paths {
        run_error_fixture(&path);
    }
}
