//! Immutable per-kind entity configuration and its builder.

use std::collections::{BTreeMap, BTreeSet};

use crate::expr::{Expr, PropertyBucket};
use crate::matcher::StateMatcher;
use crate::modifier::ModifierDefinition;
use crate::number::BigNumber;

/// Everything that describes one kind of entity. Shared between the
/// configuration and every live [`GameEntity`](crate::entity::GameEntity)
/// through an `Arc`.
///
/// Each map goes from counterpart entity key to a per-unit expression.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDefinition {
    pub key: String,
    pub name: String,
    pub types: BTreeSet<String>,
    pub starting_quantity: BigNumber,
    pub costs: BTreeMap<String, Expr>,
    /// Quantities of other entities that must be held to buy this one.
    pub requirements: BTreeMap<String, Expr>,
    pub inputs: BTreeMap<String, Expr>,
    pub outputs: BTreeMap<String, Expr>,
    /// Flat per-tick consumption, independent of quantity.
    pub fixed_inputs: BTreeMap<String, Expr>,
    /// Flat per-tick production, independent of quantity.
    pub fixed_outputs: BTreeMap<String, Expr>,
    pub upkeep: BTreeMap<String, Expr>,
    /// Output floors that apply even when nothing is producible.
    pub minimum_outputs: BTreeMap<String, Expr>,
    pub custom: BTreeMap<String, Expr>,
    pub quantity_cap: Option<Expr>,
    /// When set, quantity is derived from this expression between ticks
    /// instead of accumulating.
    pub calculated_quantity: Option<Expr>,
    pub progress_per_tick: Option<Expr>,
    pub scale_production_on_available_inputs: bool,
    pub hidden_when: StateMatcher,
    pub disabled_when: StateMatcher,
    pub available_when: StateMatcher,
    /// Modifiers that only apply while this entity is owned.
    pub modifiers: Vec<ModifierDefinition>,
    pub buyable: bool,
}

impl EntityDefinition {
    pub fn builder(key: impl Into<String>) -> EntityDefinitionBuilder {
        EntityDefinitionBuilder::new(key)
    }

    /// The expressions backing a map bucket. `None` for `quantity`/`progress`.
    pub fn bucket(&self, bucket: PropertyBucket) -> Option<&BTreeMap<String, Expr>> {
        match bucket {
            PropertyBucket::Quantity | PropertyBucket::Progress => None,
            PropertyBucket::Costs => Some(&self.costs),
            PropertyBucket::Requirements => Some(&self.requirements),
            PropertyBucket::Inputs => Some(&self.inputs),
            PropertyBucket::Outputs => Some(&self.outputs),
            PropertyBucket::FixedInputs => Some(&self.fixed_inputs),
            PropertyBucket::FixedOutputs => Some(&self.fixed_outputs),
            PropertyBucket::Upkeep => Some(&self.upkeep),
            PropertyBucket::MinimumOutputs => Some(&self.minimum_outputs),
            PropertyBucket::Custom => Some(&self.custom),
        }
    }

    pub fn expression(&self, bucket: PropertyBucket, sub_key: &str) -> Option<&Expr> {
        self.bucket(bucket)?.get(sub_key)
    }

    pub fn has_type(&self, tag: &str) -> bool {
        self.types.contains(tag)
    }

    /// Every entity key this definition points at: map keys of the
    /// counterpart buckets plus references inside expressions and matchers.
    /// Custom property names are not entity keys and are skipped.
    pub fn referenced_entities(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        for bucket in PropertyBucket::MAPS {
            let Some(map) = self.bucket(bucket) else {
                continue;
            };
            for (key, expr) in map {
                if bucket != PropertyBucket::Custom {
                    out.insert(key.as_str());
                }
                out.extend(expr.referenced_entities());
            }
        }
        for expr in [&self.quantity_cap, &self.calculated_quantity, &self.progress_per_tick]
            .into_iter()
            .flatten()
        {
            out.extend(expr.referenced_entities());
        }
        for matcher in [&self.hidden_when, &self.disabled_when, &self.available_when] {
            out.extend(matcher.referenced_entities());
        }
        out
    }
}

/// Flat builder for [`EntityDefinition`]. Every setter returns `Self`.
#[derive(Debug, Clone)]
pub struct EntityDefinitionBuilder {
    def: EntityDefinition,
}

impl EntityDefinitionBuilder {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            def: EntityDefinition {
                name: key.clone(),
                key,
                types: BTreeSet::new(),
                starting_quantity: BigNumber::ZERO,
                costs: BTreeMap::new(),
                requirements: BTreeMap::new(),
                inputs: BTreeMap::new(),
                outputs: BTreeMap::new(),
                fixed_inputs: BTreeMap::new(),
                fixed_outputs: BTreeMap::new(),
                upkeep: BTreeMap::new(),
                minimum_outputs: BTreeMap::new(),
                custom: BTreeMap::new(),
                quantity_cap: None,
                calculated_quantity: None,
                progress_per_tick: None,
                scale_production_on_available_inputs: true,
                hidden_when: StateMatcher::Never,
                disabled_when: StateMatcher::Never,
                available_when: StateMatcher::Always,
                modifiers: Vec::new(),
                buyable: true,
            },
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.def.name = name.into();
        self
    }

    pub fn with_type(mut self, tag: impl Into<String>) -> Self {
        self.def.types.insert(tag.into());
        self
    }

    pub fn starting_quantity(mut self, quantity: impl Into<BigNumber>) -> Self {
        self.def.starting_quantity = quantity.into();
        self
    }

    pub fn cost(mut self, entity: impl Into<String>, per_unit: impl Into<Expr>) -> Self {
        self.def.costs.insert(entity.into(), per_unit.into());
        self
    }

    pub fn requirement(mut self, entity: impl Into<String>, threshold: impl Into<Expr>) -> Self {
        self.def.requirements.insert(entity.into(), threshold.into());
        self
    }

    /// Consumed per unit of this entity when producing.
    pub fn input(mut self, entity: impl Into<String>, per_unit: impl Into<Expr>) -> Self {
        self.def.inputs.insert(entity.into(), per_unit.into());
        self
    }

    /// Like [`input`](Self::input), with the per-unit amount limited by `cap`.
    pub fn input_capped(
        self,
        entity: impl Into<String>,
        per_unit: impl Into<Expr>,
        cap: impl Into<Expr>,
    ) -> Self {
        self.input(entity, Expr::min(per_unit.into(), cap.into()))
    }

    pub fn output(mut self, entity: impl Into<String>, per_unit: impl Into<Expr>) -> Self {
        self.def.outputs.insert(entity.into(), per_unit.into());
        self
    }

    pub fn output_capped(
        self,
        entity: impl Into<String>,
        per_unit: impl Into<Expr>,
        cap: impl Into<Expr>,
    ) -> Self {
        self.output(entity, Expr::min(per_unit.into(), cap.into()))
    }

    pub fn fixed_input(mut self, entity: impl Into<String>, per_tick: impl Into<Expr>) -> Self {
        self.def.fixed_inputs.insert(entity.into(), per_tick.into());
        self
    }

    pub fn fixed_output(mut self, entity: impl Into<String>, per_tick: impl Into<Expr>) -> Self {
        self.def.fixed_outputs.insert(entity.into(), per_tick.into());
        self
    }

    pub fn upkeep(mut self, entity: impl Into<String>, per_unit: impl Into<Expr>) -> Self {
        self.def.upkeep.insert(entity.into(), per_unit.into());
        self
    }

    /// Flat output floor; produced even when quantity is zero.
    pub fn minimum_output(mut self, entity: impl Into<String>, amount: impl Into<Expr>) -> Self {
        self.def.minimum_outputs.insert(entity.into(), amount.into());
        self
    }

    pub fn custom(mut self, name: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.def.custom.insert(name.into(), value.into());
        self
    }

    pub fn quantity_cap(mut self, cap: impl Into<Expr>) -> Self {
        self.def.quantity_cap = Some(cap.into());
        self
    }

    pub fn calculated_quantity(mut self, value: impl Into<Expr>) -> Self {
        self.def.calculated_quantity = Some(value.into());
        self
    }

    pub fn progress_per_tick(mut self, per_tick: impl Into<Expr>) -> Self {
        self.def.progress_per_tick = Some(per_tick.into());
        self
    }

    pub fn scale_production(mut self, scale: bool) -> Self {
        self.def.scale_production_on_available_inputs = scale;
        self
    }

    pub fn hidden_when(mut self, matcher: StateMatcher) -> Self {
        self.def.hidden_when = matcher;
        self
    }

    pub fn disabled_when(mut self, matcher: StateMatcher) -> Self {
        self.def.disabled_when = matcher;
        self
    }

    pub fn hidden_and_disabled_when(mut self, matcher: StateMatcher) -> Self {
        self.def.hidden_when = matcher.clone();
        self.def.disabled_when = matcher;
        self
    }

    pub fn available_when(mut self, matcher: StateMatcher) -> Self {
        self.def.available_when = matcher;
        self
    }

    pub fn modifier(mut self, modifier: ModifierDefinition) -> Self {
        self.def.modifiers.push(modifier);
        self
    }

    pub fn unbuyable(mut self) -> Self {
        self.def.buyable = false;
        self
    }

    pub fn build(self) -> EntityDefinition {
        self.def
    }
}
