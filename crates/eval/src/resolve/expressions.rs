//! Predicates, updates, actions, reactions and watches.

use traceviz_core::Element;

use super::Resolver;
use crate::error::ConfigurationError;
use crate::interactions::{Action, Reaction, Watch};
use crate::predicate::Predicate;
use crate::update::{Case, Update};
use crate::value_ref::ValueRef;

impl Resolver<'_> {
    pub(super) fn action(&self, el: &Element) -> Result<Action, ConfigurationError> {
        Ok(Action {
            target: self.attr(el, "target")?.to_string(),
            kind: self.attr(el, "type")?.to_string(),
            updates: self.updates(&self.elements(el)?)?,
        })
    }

    pub(super) fn reaction(&self, el: &Element) -> Result<Reaction, ConfigurationError> {
        let target = self.attr(el, "target")?.to_string();
        let kind = self.attr(el, "type")?.to_string();
        let child = self.exactly(el, 1)?[0];
        Ok(Reaction {
            target,
            kind,
            predicate: self.predicate(child)?,
        })
    }

    pub(super) fn watch(&self, el: &Element) -> Result<Watch, ConfigurationError> {
        let kind = self.attr(el, "type")?.to_string();
        let child = self.exactly(el, 1)?[0];
        Ok(Watch {
            kind,
            args: self.value_map(child)?,
        })
    }

    pub(super) fn predicate(&self, el: &Element) -> Result<Predicate, ConfigurationError> {
        match el.name.as_str() {
            "true" => {
                self.exactly(el, 0)?;
                Ok(Predicate::True)
            }
            "false" => {
                self.exactly(el, 0)?;
                Ok(Predicate::False)
            }
            "not" => {
                let child = self.exactly(el, 1)?[0];
                Ok(Predicate::not(self.predicate(child)?))
            }
            "and" | "or" => {
                let children = self
                    .elements(el)?
                    .into_iter()
                    .map(|c| self.predicate(c))
                    .collect::<Result<Vec<_>, _>>()?;
                let built = if el.name == "and" {
                    Predicate::and(children)
                } else {
                    Predicate::or(children)
                };
                built.map_err(|e| self.err(el, e.message))
            }
            "equals" => self
                .operands(el)
                .map(|(a, b)| Predicate::Equals(a, b)),
            "less-than" => self
                .operands(el)
                .map(|(a, b)| Predicate::LessThan(a, b)),
            "greater-than" => self
                .operands(el)
                .map(|(a, b)| Predicate::GreaterThan(a, b)),
            "includes" => self
                .operands(el)
                .map(|(container, item)| Predicate::Includes { container, item }),
            "prefix-of" => self
                .operands(el)
                .map(|(a, b)| Predicate::PrefixOf(a, b)),
            "changed" => {
                let child = self.exactly(el, 1)?[0];
                let since_ms = match el.attr("since-ms").or_else(|| el.attr("sinceMs")) {
                    Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                        self.err(el, format!("since-ms '{}' is not a duration in ms", raw))
                    })?,
                    None => 0,
                };
                Ok(Predicate::Changed {
                    value: self.value_ref(child)?,
                    since_ms,
                })
            }
            _ => Err(self.err(el, "expected a predicate")),
        }
    }

    fn operands(&self, el: &Element) -> Result<(ValueRef, ValueRef), ConfigurationError> {
        let children = self.exactly(el, 2)?;
        Ok((self.value_ref(children[0])?, self.value_ref(children[1])?))
    }

    fn updates(&self, els: &[&Element]) -> Result<Vec<Update>, ConfigurationError> {
        els.iter().map(|el| self.update(el)).collect()
    }

    pub(super) fn update(&self, el: &Element) -> Result<Update, ConfigurationError> {
        match el.name.as_str() {
            "set" => self
                .operands(el)
                .map(|(target, source)| Update::Set { target, source }),
            "set-if-empty" => self
                .operands(el)
                .map(|(target, source)| Update::SetIfEmpty { target, source }),
            "set-or-clear" => self
                .operands(el)
                .map(|(target, source)| Update::SetOrClear { target, source }),
            "toggle" => self
                .operands(el)
                .map(|(target, source)| Update::Toggle { target, source }),
            "extend" => self
                .operands(el)
                .map(|(target, source)| Update::Extend { target, source }),
            "clear" => {
                let targets = self
                    .elements(el)?
                    .into_iter()
                    .map(|c| self.value_ref(c))
                    .collect::<Result<Vec<_>, _>>()?;
                if targets.is_empty() {
                    return Err(self.err(el, "expected at least one target"));
                }
                Ok(Update::Clear(targets))
            }
            "do" => Ok(Update::Do(self.updates(&self.elements(el)?)?)),
            "if" => self.if_update(el),
            "switch" => {
                let cases = self
                    .elements(el)?
                    .into_iter()
                    .map(|c| self.case(c))
                    .collect::<Result<Vec<_>, _>>()?;
                if cases.is_empty() {
                    return Err(self.err(el, "expected at least one <case>"));
                }
                Ok(Update::Switch(cases))
            }
            _ => Err(self.err(el, "expected an update")),
        }
    }

    /// `<if>PREDICATE<then>..</then>[<else>..</else>]</if>`
    fn if_update(&self, el: &Element) -> Result<Update, ConfigurationError> {
        let children = self.elements(el)?;
        if !(2..=3).contains(&children.len()) {
            return Err(self.err(
                el,
                format!(
                    "expected a predicate, <then> and optional <else>, got {} child element(s)",
                    children.len()
                ),
            ));
        }
        let predicate = self.predicate(children[0])?;
        let then_el = children[1];
        if then_el.name != "then" {
            return Err(self.err(then_el, "expected <then>"));
        }
        let then = self.updates(&self.elements(then_el)?)?;
        let otherwise = match children.get(2) {
            Some(else_el) if else_el.name == "else" => {
                Some(self.updates(&self.elements(else_el)?)?)
            }
            Some(other) => return Err(self.err(other, "expected <else>")),
            None => None,
        };
        Ok(Update::If {
            predicate,
            then,
            otherwise,
        })
    }

    /// `<case>PREDICATE UPDATE...</case>`
    fn case(&self, el: &Element) -> Result<Case, ConfigurationError> {
        if el.name != "case" {
            return Err(self.err(el, "expected <case>"));
        }
        let children = self.elements(el)?;
        let Some((first, rest)) = children.split_first() else {
            return Err(self.err(el, "expected a predicate"));
        };
        Ok(Case {
            predicate: self.predicate(first)?,
            updates: self.updates(rest)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global_state::GlobalState;

    fn resolver() -> Resolver<'static> {
        let global = GlobalState::new();
        global
            .insert("sel", crate::value::Value::string(""))
            .unwrap();
        global.publish();
        Resolver {
            file: "e.tvz",
            global,
        }
    }

    fn el(src: &str) -> Element {
        traceviz_core::parse_template(src, "e.tvz").unwrap()
    }

    #[test]
    fn and_with_one_child_is_fatal() {
        let err = resolver().predicate(&el("<and><true/></and>")).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(
            err.message,
            "e.tvz:1: <and>: <and> needs at least two children, got 1"
        );
    }

    #[test]
    fn binary_predicates_need_two_operands() {
        let err = resolver()
            .predicate(&el("<equals><int>1</int></equals>"))
            .unwrap_err();
        assert!(err.message.contains("expected 2 child element(s), got 1"));
    }

    #[test]
    fn changed_accepts_both_attribute_spellings() {
        for src in [
            r#"<changed since-ms="250"><global-ref key="sel"/></changed>"#,
            r#"<changed sinceMs="250"><global-ref key="sel"/></changed>"#,
        ] {
            match resolver().predicate(&el(src)).unwrap() {
                Predicate::Changed { since_ms, .. } => assert_eq!(since_ms, 250),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn if_requires_then() {
        let err = resolver()
            .update(&el("<if><true/><else/></if>"))
            .unwrap_err();
        assert!(err.message.contains("<else>: expected <then>"));
        let ok = resolver()
            .update(&el("<if><true/><then/><else/></if>"))
            .unwrap();
        assert!(matches!(ok, Update::If { otherwise: Some(_), .. }));
    }

    #[test]
    fn switch_cases_take_predicate_then_updates() {
        let u = resolver()
            .update(&el(
                r#"<switch>
                     <case><false/><clear><global-ref key="sel"/></clear></case>
                     <case><true/></case>
                   </switch>"#,
            ))
            .unwrap();
        match u {
            Update::Switch(cases) => {
                assert_eq!(cases.len(), 2);
                assert_eq!(cases[0].updates.len(), 1);
                assert!(cases[1].updates.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_update_is_fatal() {
        let err = resolver().update(&el("<frobnicate/>")).unwrap_err();
        assert_eq!(err.message, "e.tvz:1: <frobnicate>: expected an update");
    }
}
