//! Serde data file structs for entity and modifier definitions.
//!
//! These mirror [`EntityDefinition`] but with defaults for every optional
//! field, and accept plain literals anywhere an expression is expected, so
//! `outputs: { "food": 3 }` reads the same as the full expression tree
//! `outputs: { "food": { "literal": 3 } }`.

use std::collections::BTreeMap;

use idle_core::definition::EntityDefinition;
use idle_core::expr::{Expr, Value};
use idle_core::matcher::StateMatcher;
use idle_core::modifier::ModifierDefinition;
use idle_core::number::BigNumber;
use serde::Deserialize;

// ===========================================================================
// Expressions
// ===========================================================================

/// An expression as written in a data file: either a bare literal or a
/// full expression tree.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ExprData {
    Literal(Value),
    Tree(Expr),
}

impl From<ExprData> for Expr {
    fn from(data: ExprData) -> Self {
        match data {
            ExprData::Literal(value) => Expr::Literal(value),
            ExprData::Tree(expr) => expr,
        }
    }
}

fn into_exprs(map: BTreeMap<String, ExprData>) -> BTreeMap<String, Expr> {
    map.into_iter().map(|(k, v)| (k, v.into())).collect()
}

// ===========================================================================
// Entities
// ===========================================================================

/// An entity definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityData {
    pub key: String,
    /// Display name; defaults to the key.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub starting_quantity: BigNumber,
    #[serde(default)]
    pub costs: BTreeMap<String, ExprData>,
    #[serde(default)]
    pub requirements: BTreeMap<String, ExprData>,
    #[serde(default)]
    pub inputs: BTreeMap<String, ExprData>,
    #[serde(default)]
    pub outputs: BTreeMap<String, ExprData>,
    #[serde(default)]
    pub fixed_inputs: BTreeMap<String, ExprData>,
    #[serde(default)]
    pub fixed_outputs: BTreeMap<String, ExprData>,
    #[serde(default)]
    pub upkeep: BTreeMap<String, ExprData>,
    #[serde(default)]
    pub minimum_outputs: BTreeMap<String, ExprData>,
    #[serde(default)]
    pub custom: BTreeMap<String, ExprData>,
    #[serde(default)]
    pub quantity_cap: Option<ExprData>,
    #[serde(default)]
    pub calculated_quantity: Option<ExprData>,
    #[serde(default)]
    pub progress_per_tick: Option<ExprData>,
    #[serde(default = "default_true")]
    pub scale_production_on_available_inputs: bool,
    #[serde(default)]
    pub hidden_when: Option<StateMatcher>,
    #[serde(default)]
    pub disabled_when: Option<StateMatcher>,
    #[serde(default)]
    pub available_when: Option<StateMatcher>,
    #[serde(default)]
    pub modifiers: Vec<ModifierDefinition>,
    #[serde(default = "default_true")]
    pub buyable: bool,
}

fn default_true() -> bool {
    true
}

impl EntityData {
    pub fn into_definition(self) -> EntityDefinition {
        EntityDefinition {
            name: self.name.unwrap_or_else(|| self.key.clone()),
            key: self.key,
            types: self.types.into_iter().collect(),
            starting_quantity: self.starting_quantity,
            costs: into_exprs(self.costs),
            requirements: into_exprs(self.requirements),
            inputs: into_exprs(self.inputs),
            outputs: into_exprs(self.outputs),
            fixed_inputs: into_exprs(self.fixed_inputs),
            fixed_outputs: into_exprs(self.fixed_outputs),
            upkeep: into_exprs(self.upkeep),
            minimum_outputs: into_exprs(self.minimum_outputs),
            custom: into_exprs(self.custom),
            quantity_cap: self.quantity_cap.map(Into::into),
            calculated_quantity: self.calculated_quantity.map(Into::into),
            progress_per_tick: self.progress_per_tick.map(Into::into),
            scale_production_on_available_inputs: self.scale_production_on_available_inputs,
            hidden_when: self.hidden_when.unwrap_or(StateMatcher::Never),
            disabled_when: self.disabled_when.unwrap_or(StateMatcher::Never),
            available_when: self.available_when.unwrap_or(StateMatcher::Always),
            modifiers: self.modifiers,
            buyable: self.buyable,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
