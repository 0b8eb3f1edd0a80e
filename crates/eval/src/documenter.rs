//! Deterministic, human-readable dump of an interaction set.

use crate::interactions::Interactions;
use crate::predicate::Predicate;
use crate::update::Update;
use crate::value_ref::ValueRef;

/// Indenting line writer.
#[derive(Default)]
pub struct DocWriter {
    out: String,
    depth: usize,
}

impl DocWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    /// Write `head`, then everything `body` writes one level deeper.
    pub fn nested(&mut self, head: &str, body: impl FnOnce(&mut DocWriter)) {
        self.line(head);
        self.depth += 1;
        body(self);
        self.depth -= 1;
    }

    pub fn finish(self) -> String {
        self.out
    }
}

pub trait Documented {
    fn document(&self, w: &mut DocWriter);
}

impl Documented for ValueRef {
    fn document(&self, w: &mut DocWriter) {
        w.line(&self.to_string());
    }
}

impl Documented for Predicate {
    fn document(&self, w: &mut DocWriter) {
        match self {
            Predicate::True | Predicate::False => w.line(self.name()),
            Predicate::Not(child) => w.nested("not", |w| child.document(w)),
            Predicate::And(children) | Predicate::Or(children) => {
                w.nested(self.name(), |w| document_all(children, w))
            }
            Predicate::Equals(a, b)
            | Predicate::LessThan(a, b)
            | Predicate::GreaterThan(a, b)
            | Predicate::PrefixOf(a, b)
            | Predicate::Includes {
                container: a,
                item: b,
            } => w.nested(self.name(), |w| {
                a.document(w);
                b.document(w);
            }),
            Predicate::Changed { value, since_ms } => {
                let head = if *since_ms == 0 {
                    "changed".to_string()
                } else {
                    format!("changed since {}ms", since_ms)
                };
                w.nested(&head, |w| value.document(w))
            }
        }
    }
}

impl Documented for Update {
    fn document(&self, w: &mut DocWriter) {
        match self {
            Update::Set { target, source }
            | Update::SetIfEmpty { target, source }
            | Update::SetOrClear { target, source }
            | Update::Toggle { target, source }
            | Update::Extend { target, source } => w.nested(self.name(), |w| {
                target.document(w);
                source.document(w);
            }),
            Update::Clear(targets) => w.nested("clear", |w| document_all(targets, w)),
            Update::Do(updates) => w.nested("do", |w| document_all(updates, w)),
            Update::If {
                predicate,
                then,
                otherwise,
            } => w.nested("if", |w| {
                predicate.document(w);
                w.nested("then", |w| document_all(then, w));
                if let Some(otherwise) = otherwise {
                    w.nested("else", |w| document_all(otherwise, w));
                }
            }),
            Update::Switch(cases) => w.nested("switch", |w| {
                for case in cases {
                    w.nested("case", |w| {
                        case.predicate.document(w);
                        document_all(&case.updates, w);
                    });
                }
            }),
        }
    }
}

impl Documented for Interactions {
    fn document(&self, w: &mut DocWriter) {
        w.nested("interactions", |w| {
            for a in self.actions() {
                w.nested(&format!("action {}/{}", a.target, a.kind), |w| {
                    document_all(&a.updates, w)
                });
            }
            for r in self.reactions() {
                w.nested(&format!("reaction {}/{}", r.target, r.kind), |w| {
                    r.predicate.document(w)
                });
            }
            for watch in self.watches() {
                w.nested(&format!("watch {}", watch.kind), |w| {
                    for (key, value) in watch.args.iter() {
                        w.line(&format!(
                            "arg {}: {} = {}",
                            key,
                            value.type_name(),
                            value.display_string()
                        ));
                    }
                });
            }
        });
    }
}

fn document_all<D: Documented>(items: &[D], w: &mut DocWriter) {
    for item in items {
        item.document(w);
    }
}

/// Render every action, reaction and watch in declaration order.
pub fn pretty_print(interactions: &Interactions) -> String {
    let mut w = DocWriter::new();
    interactions.document(&mut w);
    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global_state::GlobalState;
    use crate::interactions::{Action, InteractionsBuilder, Reaction, Watch};
    use crate::predicate::EvalContext;
    use crate::scheduler::ManualScheduler;
    use crate::update::Case;
    use crate::value::Value;
    use crate::value_map::ValueMap;
    use std::rc::Rc;

    #[test]
    fn prints_every_declaration() {
        let global = GlobalState::new();
        global.publish();
        let ctx = EvalContext::new(global, Rc::new(ManualScheduler::new()));
        let mut b = InteractionsBuilder::new();
        b.action(Action {
            target: "row".into(),
            kind: "click".into(),
            updates: vec![Update::Switch(vec![Case {
                predicate: Predicate::True,
                updates: vec![Update::Clear(vec![ValueRef::Global("sel".into())])],
            }])],
        })
        .reaction(Reaction {
            target: "row".into(),
            kind: "highlight".into(),
            predicate: Predicate::Changed {
                value: ValueRef::Local("id".into()),
                since_ms: 300,
            },
        })
        .watch(Watch {
            kind: "zoom".into(),
            args: ValueMap::from_entries([("level", Value::int(2))]),
        });
        let i = b.build(ctx).unwrap();
        let expected = "\
interactions
  action row/click
    switch
      case
        true
        clear
          global-ref sel
  reaction row/highlight
    changed since 300ms
      local-ref id
  watch zoom
    arg level: int = 2
";
        assert_eq!(pretty_print(&i), expected);
    }
}
