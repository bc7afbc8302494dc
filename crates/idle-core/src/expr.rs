//! The expression language every configured value is written in.
//!
//! An [`Expr`] is an immutable tree evaluated on demand against a
//! [`StateView`]. Evaluation never mutates anything, so evaluating the same
//! tree twice against the same state gives the same answer. Composite nodes
//! evaluate their left operand fully before the right one.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::number::BigNumber;
use crate::registry::StateView;

// ---------------------------------------------------------------------------
// Literal values
// ---------------------------------------------------------------------------

/// A literal carried by [`Expr::Literal`].
///
/// Only native number tokens read as [`Value::Number`]; a quoted string is
/// always [`Value::Text`], even when it looks numeric.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Number(BigNumber),
    Text(String),
}

impl Value {
    pub fn as_number(&self) -> BigNumber {
        match self {
            Value::Number(n) => *n,
            Value::Boolean(true) => BigNumber::ONE,
            Value::Boolean(false) => BigNumber::ZERO,
            Value::Text(s) => s.parse().unwrap_or(BigNumber::NAN),
        }
    }

    pub fn as_boolean(&self) -> bool {
        match self {
            Value::Number(n) => *n != BigNumber::ZERO,
            Value::Boolean(b) => *b,
            Value::Text(s) => !s.is_empty(),
        }
    }

    pub fn as_string(&self) -> String {
        match self {
            Value::Number(n) => n.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Text(s) => s.clone(),
        }
    }
}

impl Serialize for Value {
    /// Numbers that survive an `f64` round trip are written natively; larger
    /// ones fall back to their decimal string.
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Number(n) => {
                let native = n.to_f64();
                if BigNumber::from_f64(native) != *n {
                    n.serialize(serializer)
                } else if native.fract() == 0.0 && native.abs() < 9.0e15 {
                    serializer.serialize_i64(native as i64)
                } else {
                    serializer.serialize_f64(native)
                }
            }
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl serde::de::Visitor<'_> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a boolean, number or string")
    }

    fn visit_bool<E: serde::de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Boolean(v))
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Number(BigNumber::from(v)))
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Number(BigNumber::from(v)))
    }

    fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Number(BigNumber::from_f64(v)))
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::Text(v.to_owned()))
    }

    fn visit_string<E: serde::de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::Text(v))
    }
}

// ---------------------------------------------------------------------------
// Property buckets
// ---------------------------------------------------------------------------

/// Which part of an entity a reference reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyBucket {
    Quantity,
    Progress,
    Costs,
    Requirements,
    Inputs,
    Outputs,
    FixedInputs,
    FixedOutputs,
    Upkeep,
    MinimumOutputs,
    Custom,
}

impl PropertyBucket {
    /// Buckets that hold one property per counterpart key.
    pub const MAPS: [PropertyBucket; 9] = [
        PropertyBucket::Costs,
        PropertyBucket::Requirements,
        PropertyBucket::Inputs,
        PropertyBucket::Outputs,
        PropertyBucket::FixedInputs,
        PropertyBucket::FixedOutputs,
        PropertyBucket::Upkeep,
        PropertyBucket::MinimumOutputs,
        PropertyBucket::Custom,
    ];

    pub fn is_map(self) -> bool {
        !matches!(self, PropertyBucket::Quantity | PropertyBucket::Progress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PropertyBucket::Quantity => "quantity",
            PropertyBucket::Progress => "progress",
            PropertyBucket::Costs => "costs",
            PropertyBucket::Requirements => "requirements",
            PropertyBucket::Inputs => "inputs",
            PropertyBucket::Outputs => "outputs",
            PropertyBucket::FixedInputs => "fixed_inputs",
            PropertyBucket::FixedOutputs => "fixed_outputs",
            PropertyBucket::Upkeep => "upkeep",
            PropertyBucket::MinimumOutputs => "minimum_outputs",
            PropertyBucket::Custom => "custom",
        }
    }
}

impl fmt::Display for PropertyBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyBucket {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        std::iter::once(PropertyBucket::Quantity)
            .chain(std::iter::once(PropertyBucket::Progress))
            .chain(PropertyBucket::MAPS)
            .find(|bucket| bucket.as_str() == s)
            .ok_or_else(|| EngineError::UnsupportedOperation(format!("unknown property bucket {s:?}")))
    }
}

/// Points at one value of one entity: `entity.bucket[sub_key]`.
///
/// `sub_key` is ignored for the `quantity` and `progress` buckets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityPropertyReference {
    pub entity: String,
    pub bucket: PropertyBucket,
    #[serde(default)]
    pub sub_key: String,
}

/// Result of [`Expr::as_container`].
#[derive(Debug, Clone, PartialEq)]
pub enum Container {
    List(Vec<Expr>),
    Map(BTreeMap<String, BigNumber>),
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// An expression node. Closed set of variants, evaluated by exhaustive match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Literal(Value),
    Sum(Box<Expr>, Box<Expr>),
    Difference(Box<Expr>, Box<Expr>),
    Product(Box<Expr>, Box<Expr>),
    /// `a / b`; NaN when `b` is zero.
    RatioOf(Box<Expr>, Box<Expr>),
    Min(Box<Expr>, Box<Expr>),
    Max(Box<Expr>, Box<Expr>),
    List(Vec<Expr>),
    EntityProperty(EntityPropertyReference),
}

impl Expr {
    pub fn number(v: impl Into<BigNumber>) -> Self {
        Expr::Literal(Value::Number(v.into()))
    }

    pub fn boolean(v: bool) -> Self {
        Expr::Literal(Value::Boolean(v))
    }

    pub fn text(v: impl Into<String>) -> Self {
        Expr::Literal(Value::Text(v.into()))
    }

    pub fn sum(left: Expr, right: Expr) -> Self {
        Expr::Sum(Box::new(left), Box::new(right))
    }

    pub fn difference(left: Expr, right: Expr) -> Self {
        Expr::Difference(Box::new(left), Box::new(right))
    }

    pub fn product(left: Expr, right: Expr) -> Self {
        Expr::Product(Box::new(left), Box::new(right))
    }

    pub fn ratio_of(numerator: Expr, denominator: Expr) -> Self {
        Expr::RatioOf(Box::new(numerator), Box::new(denominator))
    }

    pub fn min(a: Expr, b: Expr) -> Self {
        Expr::Min(Box::new(a), Box::new(b))
    }

    pub fn max(a: Expr, b: Expr) -> Self {
        Expr::Max(Box::new(a), Box::new(b))
    }

    pub fn list(items: Vec<Expr>) -> Self {
        Expr::List(items)
    }

    pub fn property(entity: impl Into<String>, bucket: PropertyBucket, sub_key: impl Into<String>) -> Self {
        Expr::EntityProperty(EntityPropertyReference {
            entity: entity.into(),
            bucket,
            sub_key: sub_key.into(),
        })
    }

    /// Shorthand for a reference to an entity's quantity.
    pub fn quantity_of(entity: impl Into<String>) -> Self {
        Self::property(entity, PropertyBucket::Quantity, "")
    }

    pub fn as_number<S: StateView + ?Sized>(&self, state: &S) -> Result<BigNumber, EngineError> {
        self.number_within(state, &mut Vec::new())
    }

    /// `visiting` holds the definition expressions currently being expanded,
    /// so a property that reads itself fails instead of recursing forever.
    fn number_within<S: StateView + ?Sized>(
        &self,
        state: &S,
        visiting: &mut Vec<EntityPropertyReference>,
    ) -> Result<BigNumber, EngineError> {
        Ok(match self {
            Expr::Literal(v) => v.as_number(),
            Expr::Sum(l, r) => {
                let left = l.number_within(state, visiting)?;
                left + r.number_within(state, visiting)?
            }
            Expr::Difference(l, r) => {
                let left = l.number_within(state, visiting)?;
                left - r.number_within(state, visiting)?
            }
            Expr::Product(l, r) => {
                let left = l.number_within(state, visiting)?;
                left * r.number_within(state, visiting)?
            }
            Expr::RatioOf(a, b) => {
                let numerator = a.number_within(state, visiting)?;
                let denominator = b.number_within(state, visiting)?;
                if denominator.is_zero() {
                    BigNumber::NAN
                } else {
                    numerator / denominator
                }
            }
            Expr::Min(a, b) => {
                let left = a.number_within(state, visiting)?;
                left.min(b.number_within(state, visiting)?)
            }
            Expr::Max(a, b) => {
                let left = a.number_within(state, visiting)?;
                left.max(b.number_within(state, visiting)?)
            }
            Expr::List(_) => {
                return Err(EngineError::UnsupportedOperation(
                    "a list has no numeric value".into(),
                ));
            }
            Expr::EntityProperty(reference) => read_property(reference, state, visiting)?,
        })
    }

    /// Boolean sense of the node: non-zero for numbers.
    ///
    /// `Product` is the exception: it is true when the product *is* zero.
    /// Configurations written against that behaviour depend on it.
    pub fn as_boolean<S: StateView + ?Sized>(&self, state: &S) -> Result<bool, EngineError> {
        match self {
            Expr::Literal(v) => Ok(v.as_boolean()),
            Expr::Product(..) => Ok(self.as_number(state)?.is_zero()),
            Expr::List(items) => Ok(!items.is_empty()),
            Expr::EntityProperty(reference) => match custom_literal(reference, state)? {
                Some(v) => Ok(v.as_boolean()),
                None => Ok(self.as_number(state)? != BigNumber::ZERO),
            },
            _ => Ok(self.as_number(state)? != BigNumber::ZERO),
        }
    }

    pub fn as_string<S: StateView + ?Sized>(&self, state: &S) -> Result<String, EngineError> {
        match self {
            Expr::Literal(v) => Ok(v.as_string()),
            Expr::List(items) => {
                let parts = items
                    .iter()
                    .map(|item| item.as_string(state))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("[{}]", parts.join(", ")))
            }
            Expr::EntityProperty(reference) => match custom_literal(reference, state)? {
                Some(v) => Ok(v.as_string()),
                None => Ok(self.as_number(state)?.to_string()),
            },
            _ => Ok(self.as_number(state)?.to_string()),
        }
    }

    /// Only lists and references to map buckets are containers.
    pub fn as_container<S: StateView + ?Sized>(&self, state: &S) -> Result<Container, EngineError> {
        match self {
            Expr::List(items) => Ok(Container::List(items.clone())),
            Expr::EntityProperty(reference) if reference.bucket.is_map() => {
                let entity = state.require_entity(&reference.entity)?;
                let values = entity
                    .bucket(reference.bucket)
                    .map(|props| {
                        props
                            .iter()
                            .map(|(key, prop)| (key.clone(), prop.value()))
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(Container::Map(values))
            }
            other => Err(EngineError::UnsupportedOperation(format!(
                "{} is not a container",
                other.kind_name()
            ))),
        }
    }

    /// Every entity key this expression reads, in tree order.
    pub fn referenced_entities(&self) -> Vec<&str> {
        self.property_references()
            .into_iter()
            .map(|reference| reference.entity.as_str())
            .collect()
    }

    /// Every property reference in this expression, in tree order.
    pub fn property_references(&self) -> Vec<&EntityPropertyReference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a EntityPropertyReference>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Sum(l, r)
            | Expr::Difference(l, r)
            | Expr::Product(l, r)
            | Expr::RatioOf(l, r)
            | Expr::Min(l, r)
            | Expr::Max(l, r) => {
                l.collect_references(out);
                r.collect_references(out);
            }
            Expr::List(items) => items.iter().for_each(|item| item.collect_references(out)),
            Expr::EntityProperty(reference) => out.push(reference),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Expr::Literal(_) => "literal",
            Expr::Sum(..) => "sum",
            Expr::Difference(..) => "difference",
            Expr::Product(..) => "product",
            Expr::RatioOf(..) => "ratio",
            Expr::Min(..) => "min",
            Expr::Max(..) => "max",
            Expr::List(_) => "list",
            Expr::EntityProperty(_) => "entity property",
        }
    }
}

/// Live property value, else the definition's base expression, else zero.
fn read_property<S: StateView + ?Sized>(
    reference: &EntityPropertyReference,
    state: &S,
    visiting: &mut Vec<EntityPropertyReference>,
) -> Result<BigNumber, EngineError> {
    let entity = state.require_entity(&reference.entity)?;
    match reference.bucket {
        PropertyBucket::Quantity => Ok(entity.quantity()),
        PropertyBucket::Progress => Ok(entity.progress()),
        bucket => {
            if let Some(prop) = entity.property(bucket, &reference.sub_key) {
                return Ok(prop.value());
            }
            let Some(expr) = entity.definition().expression(bucket, &reference.sub_key) else {
                return Ok(BigNumber::ZERO);
            };
            if visiting.contains(reference) {
                return Err(EngineError::UnsupportedOperation(format!(
                    "{}.{}[{}] depends on itself",
                    reference.entity, bucket, reference.sub_key
                )));
            }
            visiting.push(reference.clone());
            let value = expr.number_within(state, visiting);
            visiting.pop();
            value
        }
    }
}

/// Custom properties may be configured as text or boolean literals; those read
/// back in their own form rather than as numbers.
fn custom_literal<'s, S: StateView + ?Sized>(
    reference: &EntityPropertyReference,
    state: &'s S,
) -> Result<Option<&'s Value>, EngineError> {
    if reference.bucket != PropertyBucket::Custom {
        return Ok(None);
    }
    let entity = state.require_entity(&reference.entity)?;
    Ok(match entity.definition().custom.get(&reference.sub_key) {
        Some(Expr::Literal(v @ (Value::Text(_) | Value::Boolean(_)))) => Some(v),
        _ => None,
    })
}

impl From<BigNumber> for Expr {
    fn from(v: BigNumber) -> Self {
        Expr::number(v)
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Self {
        Expr::number(v)
    }
}

impl From<i32> for Expr {
    fn from(v: i32) -> Self {
        Expr::number(v)
    }
}

impl From<bool> for Expr {
    fn from(v: bool) -> Self {
        Expr::boolean(v)
    }
}

impl From<&str> for Expr {
    fn from(v: &str) -> Self {
        Expr::text(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::EntityRegistry;
    use crate::test_utils::{num, registry_with};

    fn empty() -> EntityRegistry {
        EntityRegistry::default()
    }

    #[test]
    fn literal_forms() {
        let state = empty();
        assert_eq!(Expr::number(3).as_number(&state).unwrap(), num(3.0));
        assert!(Expr::number(3).as_boolean(&state).unwrap());
        assert!(!Expr::number(0).as_boolean(&state).unwrap());
        assert_eq!(Expr::boolean(true).as_number(&state).unwrap(), BigNumber::ONE);
        assert_eq!(Expr::boolean(false).as_string(&state).unwrap(), "false");
        assert_eq!(Expr::text("12").as_number(&state).unwrap(), num(12.0));
        assert!(Expr::text("wood").as_number(&state).unwrap().is_nan());
        assert_eq!(Expr::text("wood").as_string(&state).unwrap(), "wood");
    }

    #[test]
    fn arithmetic_nodes() {
        let state = empty();
        let e = Expr::difference(Expr::number(10), Expr::number(4));
        assert_eq!(e.as_number(&state).unwrap(), num(6.0));
        let e = Expr::product(Expr::number(3), Expr::number(4));
        assert_eq!(e.as_number(&state).unwrap(), num(12.0));
        let e = Expr::min(Expr::number(3), Expr::number(4));
        assert_eq!(e.as_number(&state).unwrap(), num(3.0));
        let e = Expr::max(Expr::number(3), Expr::number(4));
        assert_eq!(e.as_number(&state).unwrap(), num(4.0));
        let e = Expr::sum(Expr::number(3), Expr::number(4));
        assert_eq!(e.as_string(&state).unwrap(), "7");
    }

    #[test]
    fn ratio_of_zero_is_nan() {
        let state = empty();
        let e = Expr::ratio_of(Expr::number(5), Expr::number(0));
        let v = e.as_number(&state).unwrap();
        assert!(v.is_nan());
        assert_ne!(v, v);
        assert!(e.as_boolean(&state).unwrap());
    }

    #[test]
    fn product_boolean_is_true_when_zero() {
        let state = empty();
        assert!(Expr::product(Expr::number(0), Expr::number(5)).as_boolean(&state).unwrap());
        assert!(!Expr::product(Expr::number(2), Expr::number(5)).as_boolean(&state).unwrap());
    }

    #[test]
    fn arithmetic_nodes_are_not_containers() {
        let state = empty();
        let err = Expr::difference(Expr::number(1), Expr::number(1))
            .as_container(&state)
            .unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedOperation(_)));
        assert!(Expr::product(Expr::number(1), Expr::number(1)).as_container(&state).is_err());
    }

    #[test]
    fn list_is_a_container() {
        let state = empty();
        let list = Expr::list(vec![Expr::number(1), Expr::text("a")]);
        match list.as_container(&state).unwrap() {
            Container::List(items) => assert_eq!(items.len(), 2),
            other => panic!("expected list, got {other:?}"),
        }
        assert_eq!(list.as_string(&state).unwrap(), "[1, a]");
        assert!(list.as_number(&state).is_err());
    }

    #[test]
    fn missing_entity_reference_fails() {
        let state = empty();
        let err = Expr::quantity_of("gold").as_number(&state).unwrap_err();
        assert_eq!(err, EngineError::MissingEntity("gold".into()));
    }

    #[test]
    fn reads_quantity_and_properties() {
        let state = registry_with(vec![
            crate::definition::EntityDefinition::builder("wood")
                .starting_quantity(5)
                .build(),
            crate::definition::EntityDefinition::builder("mill")
                .starting_quantity(2)
                .input("wood", 3)
                .custom("flavour", Expr::text("sawdust"))
                .build(),
        ]);
        assert_eq!(Expr::quantity_of("wood").as_number(&state).unwrap(), num(5.0));
        let input = Expr::property("mill", PropertyBucket::Inputs, "wood");
        assert_eq!(input.as_number(&state).unwrap(), num(3.0));
        let absent = Expr::property("mill", PropertyBucket::Outputs, "wood");
        assert_eq!(absent.as_number(&state).unwrap(), BigNumber::ZERO);
        let flavour = Expr::property("mill", PropertyBucket::Custom, "flavour");
        assert_eq!(flavour.as_string(&state).unwrap(), "sawdust");

        match Expr::property("mill", PropertyBucket::Inputs, "").as_container(&state).unwrap() {
            Container::Map(map) => assert_eq!(map.get("wood"), Some(&num(3.0))),
            other => panic!("expected map, got {other:?}"),
        }
    }

    #[test]
    fn evaluation_is_repeatable() {
        let state = registry_with(vec![
            crate::definition::EntityDefinition::builder("wood")
                .starting_quantity(7)
                .build(),
        ]);
        let e = Expr::ratio_of(Expr::quantity_of("wood"), Expr::number(2));
        assert_eq!(e.as_number(&state).unwrap(), e.as_number(&state).unwrap());
    }

    #[test]
    fn self_referencing_property_fails_instead_of_recursing() {
        let mut registry = EntityRegistry::new();
        let miner = crate::definition::EntityDefinition::builder("miner")
            .cost(
                "gold",
                Expr::sum(
                    Expr::number(1),
                    Expr::property("miner", PropertyBucket::Costs, "gold"),
                ),
            )
            .build();
        registry
            .insert(crate::entity::GameEntity::new(std::sync::Arc::new(miner)))
            .unwrap();

        let cost = Expr::property("miner", PropertyBucket::Costs, "gold");
        let err = cost.as_number(&registry).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedOperation(msg) if msg.contains("miner.costs[gold]")));
        assert!(registry.rebuild_properties(&BTreeMap::new()).is_err());
    }

    #[test]
    fn mutual_references_fail_and_chains_resolve() {
        let mut registry = EntityRegistry::new();
        let a = crate::definition::EntityDefinition::builder("a")
            .custom("x", Expr::property("b", PropertyBucket::Custom, "y"))
            .custom("z", Expr::property("b", PropertyBucket::Custom, "w"))
            .build();
        let b = crate::definition::EntityDefinition::builder("b")
            .custom("y", Expr::property("a", PropertyBucket::Custom, "x"))
            .custom("w", Expr::number(4))
            .build();
        for def in [a, b] {
            registry
                .insert(crate::entity::GameEntity::new(std::sync::Arc::new(def)))
                .unwrap();
        }

        let looped = Expr::property("a", PropertyBucket::Custom, "x");
        assert!(matches!(
            looped.as_number(&registry),
            Err(EngineError::UnsupportedOperation(_))
        ));
        let chained = Expr::product(
            Expr::number(2),
            Expr::property("a", PropertyBucket::Custom, "z"),
        );
        assert_eq!(chained.as_number(&registry).unwrap(), num(8.0));
    }

    #[test]
    fn quoted_literals_stay_text() {
        for text in ["12", "1e5", "NaN"] {
            let value: Value = serde_json::from_str(&format!("\"{text}\"")).unwrap();
            assert_eq!(value, Value::Text(text.into()));
        }
        let value: Value = serde_json::from_str("12").unwrap();
        assert_eq!(value, Value::Number(num(12.0)));
        let value: Value = serde_json::from_str("true").unwrap();
        assert_eq!(value, Value::Boolean(true));
    }

    #[test]
    fn number_literals_serialize_natively() {
        let json = serde_json::to_string(&Expr::number(3)).unwrap();
        assert_eq!(json, r#"{"literal":3}"#);
        let json = serde_json::to_string(&Value::Number(num(12.5))).unwrap();
        assert_eq!(json, "12.5");
        let huge = Value::Number("3e500".parse().unwrap());
        let back: Value = serde_json::from_str(&serde_json::to_string(&huge).unwrap()).unwrap();
        assert_eq!(back.as_number(), huge.as_number());
    }

    #[test]
    fn bucket_names_parse() {
        assert_eq!("fixed_inputs".parse::<PropertyBucket>().unwrap(), PropertyBucket::FixedInputs);
        assert!(matches!(
            "production".parse::<PropertyBucket>(),
            Err(EngineError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn deserializes_from_json() {
        let json = r#"{"product": [{"literal": 2}, {"entity_property": {"entity": "wood", "bucket": "quantity"}}]}"#;
        let e: Expr = serde_json::from_str(json).unwrap();
        assert_eq!(e, Expr::product(Expr::number(2), Expr::quantity_of("wood")));
    }
}
