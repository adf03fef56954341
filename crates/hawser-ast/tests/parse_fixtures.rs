//! Whole-file parses over realistic sources.

use hawser_ast::nodes::{ExprKind, StmtKind};
use hawser_ast::parser::{parse, parse_tolerant};

const FIXTURE: &str = r#"#!/usr/bin/env python
# -*- coding: utf-8 -*-
"""Module docstring spanning
two lines."""
import os
import os.path as osp
from collections import OrderedDict

REGISTRY = {}

class Handler(object):
    default_limit = 10

    def __init__(self, name, limit=None):
        self.name = name
        self.limit = limit or Handler.default_limit
        self.items = []

    def add(self, item):
        self.items.append(item)
        return len(self.items)

    @staticmethod
    def describe():
        return 'handler'

def iter_names(handlers):
    for handler in handlers:
        if handler.name:
            yield handler.name

def main():
    handler = Handler('main')
    try:
        with open('data.txt') as stream:
            for line in stream:
                handler.add(line.strip())
    except IOError as err:
        raise
    finally:
        pass
    names = [h.name for h in [handler] if h is not None]
    pairs = {n: len(n) for n in names}
    total = sum(len(n) for n in names)
    return names, pairs, total

if __name__ == '__main__':
    main()
"#;

#[test]
fn fixture_parses_cleanly() {
    let module = parse(FIXTURE).unwrap();
    assert!(module.recovered.is_empty());

    let kinds: Vec<&StmtKind> = module.body.iter().map(|s| &s.kind).collect();
    // docstring, imports, assignment, class, two functions, main guard
    assert_eq!(module.body.len(), 9);
    assert!(matches!(kinds[0], StmtKind::Expr(e) if matches!(e.kind, ExprKind::Str)));
    assert!(matches!(kinds[1], StmtKind::Import { .. }));
    assert!(matches!(kinds[2], StmtKind::Import { .. }));
    assert!(matches!(kinds[3], StmtKind::ImportFrom { .. }));
    assert!(matches!(kinds[4], StmtKind::Assign { .. }));
    assert!(matches!(kinds[5], StmtKind::ClassDef { .. }));
    assert!(matches!(kinds[8], StmtKind::If { .. }));
}

#[test]
fn fixture_class_structure() {
    let module = parse(FIXTURE).unwrap();
    let StmtKind::ClassDef { name, bases, body, .. } = &module.body[5].kind else {
        panic!("expected the class definition");
    };
    assert_eq!(name, "Handler");
    assert_eq!(bases.len(), 1);
    // class attribute + three methods
    assert_eq!(body.len(), 4);
    let StmtKind::FunctionDef { name, params, .. } = &body[1].kind else {
        panic!("expected __init__");
    };
    assert_eq!(name, "__init__");
    assert_eq!(params.args.len(), 3);
    assert!(params.args[2].default.is_some());
}

#[test]
fn fixture_linenos_match_source() {
    let module = parse(FIXTURE).unwrap();
    for (stmt, needle) in [
        (&module.body[5], "class Handler"),
        (&module.body[6], "def iter_names"),
        (&module.body[7], "def main"),
    ] {
        let expected = FIXTURE[..FIXTURE.find(needle).unwrap()]
            .matches('\n')
            .count() as u32
            + 1;
        assert_eq!(stmt.lineno, expected, "lineno for {}", needle);
    }
}

#[test]
fn damaged_fixture_recovers_per_statement() {
    let damaged = FIXTURE.replace("REGISTRY = {}", "REGISTRY = = {}");
    assert!(parse(&damaged).is_err());

    let module = parse_tolerant(&damaged);
    assert_eq!(module.recovered.len(), 1);
    // Everything else still parsed.
    assert_eq!(module.body.len(), 8);
}
