use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::expr::Expr;
use crate::registry::StateView;

/// How a [`StateMatcher::Compare`] relates its two sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    LessThan,
    LessOrEqual,
    Equal,
    NotEqual,
    GreaterOrEqual,
    GreaterThan,
}

impl Comparison {
    /// `None` means the operands were unordered (a NaN was involved); only
    /// `NotEqual` holds then.
    fn holds(self, ordering: Option<Ordering>) -> bool {
        match (self, ordering) {
            (Comparison::NotEqual, None) => true,
            (_, None) => false,
            (Comparison::LessThan, Some(o)) => o == Ordering::Less,
            (Comparison::LessOrEqual, Some(o)) => o != Ordering::Greater,
            (Comparison::Equal, Some(o)) => o == Ordering::Equal,
            (Comparison::NotEqual, Some(o)) => o != Ordering::Equal,
            (Comparison::GreaterOrEqual, Some(o)) => o != Ordering::Less,
            (Comparison::GreaterThan, Some(o)) => o == Ordering::Greater,
        }
    }
}

/// A boolean predicate over simulation state. Never cached: every call to
/// [`matches`](StateMatcher::matches) reads the state afresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateMatcher {
    Always,
    Never,
    And(Vec<StateMatcher>),
    Or(Vec<StateMatcher>),
    Not(Box<StateMatcher>),
    /// The boolean sense of an expression.
    Truthy(Expr),
    Compare {
        left: Expr,
        comparison: Comparison,
        right: Expr,
    },
}

impl StateMatcher {
    pub fn matches<S: StateView + ?Sized>(&self, state: &S) -> Result<bool, EngineError> {
        match self {
            StateMatcher::Always => Ok(true),
            StateMatcher::Never => Ok(false),
            StateMatcher::And(children) => {
                for child in children {
                    if !child.matches(state)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            StateMatcher::Or(children) => {
                for child in children {
                    if child.matches(state)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            StateMatcher::Not(inner) => Ok(!inner.matches(state)?),
            StateMatcher::Truthy(expr) => expr.as_boolean(state),
            StateMatcher::Compare {
                left,
                comparison,
                right,
            } => {
                let l = left.as_number(state)?;
                let r = right.as_number(state)?;
                Ok(comparison.holds(l.partial_cmp(&r)))
            }
        }
    }

    pub fn compare(left: impl Into<Expr>, comparison: Comparison, right: impl Into<Expr>) -> Self {
        StateMatcher::Compare {
            left: left.into(),
            comparison,
            right: right.into(),
        }
    }

    /// True once `entity` holds at least `threshold` units.
    pub fn quantity_at_least(entity: &str, threshold: impl Into<Expr>) -> Self {
        Self::compare(Expr::quantity_of(entity), Comparison::GreaterOrEqual, threshold)
    }

    pub fn not(inner: StateMatcher) -> Self {
        StateMatcher::Not(Box::new(inner))
    }

    /// Entity keys read by this matcher.
    pub fn referenced_entities(&self) -> Vec<&str> {
        match self {
            StateMatcher::Always | StateMatcher::Never => Vec::new(),
            StateMatcher::And(children) | StateMatcher::Or(children) => children
                .iter()
                .flat_map(|c| c.referenced_entities())
                .collect(),
            StateMatcher::Not(inner) => inner.referenced_entities(),
            StateMatcher::Truthy(expr) => expr.referenced_entities(),
            StateMatcher::Compare { left, right, .. } => {
                let mut refs = left.referenced_entities();
                refs.extend(right.referenced_entities());
                refs
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::EntityDefinition;
    use crate::registry::EntityRegistry;
    use crate::test_utils::registry_with;

    #[test]
    fn constants() {
        let state = EntityRegistry::default();
        assert!(StateMatcher::Always.matches(&state).unwrap());
        assert!(!StateMatcher::Never.matches(&state).unwrap());
        assert!(StateMatcher::not(StateMatcher::Never).matches(&state).unwrap());
    }

    #[test]
    fn composites() {
        let state = EntityRegistry::default();
        let and = StateMatcher::And(vec![StateMatcher::Always, StateMatcher::Never]);
        let or = StateMatcher::Or(vec![StateMatcher::Never, StateMatcher::Always]);
        assert!(!and.matches(&state).unwrap());
        assert!(or.matches(&state).unwrap());
        assert!(StateMatcher::And(vec![]).matches(&state).unwrap());
        assert!(!StateMatcher::Or(vec![]).matches(&state).unwrap());
    }

    #[test]
    fn quantity_threshold_reads_live_state() {
        let state = registry_with(vec![EntityDefinition::builder("wood").starting_quantity(5).build()]);
        assert!(StateMatcher::quantity_at_least("wood", 5).matches(&state).unwrap());
        assert!(!StateMatcher::quantity_at_least("wood", 6).matches(&state).unwrap());
    }

    #[test]
    fn nan_comparisons_are_false_except_not_equal() {
        let state = EntityRegistry::default();
        let nan = Expr::ratio_of(Expr::number(1), Expr::number(0));
        for comparison in [
            Comparison::LessThan,
            Comparison::LessOrEqual,
            Comparison::Equal,
            Comparison::GreaterOrEqual,
            Comparison::GreaterThan,
        ] {
            let m = StateMatcher::compare(nan.clone(), comparison, Expr::number(1));
            assert!(!m.matches(&state).unwrap(), "{comparison:?}");
        }
        let m = StateMatcher::compare(nan, Comparison::NotEqual, Expr::number(1));
        assert!(m.matches(&state).unwrap());
    }

    #[test]
    fn missing_entity_propagates() {
        let state = EntityRegistry::default();
        let err = StateMatcher::quantity_at_least("gold", 1).matches(&state).unwrap_err();
        assert_eq!(err, EngineError::MissingEntity("gold".into()));
    }

    #[test]
    fn truthy_uses_expression_sense() {
        let state = EntityRegistry::default();
        assert!(StateMatcher::Truthy(Expr::number(2)).matches(&state).unwrap());
        assert!(!StateMatcher::Truthy(Expr::boolean(false)).matches(&state).unwrap());
    }
}
