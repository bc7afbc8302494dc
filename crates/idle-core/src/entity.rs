//! Live entity state and per-tick production planning.
//!
//! A [`GameEntity`] never mutates other entities. The engine asks every
//! entity for a [`ProductionPlan`] against the pre-tick state, then applies
//! all plans together, so no entity observes another's partial update.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::definition::EntityDefinition;
use crate::error::EngineError;
use crate::expr::{Expr, PropertyBucket};
use crate::number::BigNumber;
use crate::property::ModifiableProperty;
use crate::registry::StateView;

/// Live properties of one entity, grouped by bucket then counterpart key.
pub type PropertyTable = BTreeMap<PropertyBucket, BTreeMap<String, ModifiableProperty>>;

// ---------------------------------------------------------------------------
// Tick plan
// ---------------------------------------------------------------------------

/// What one entity wants to do this tick, computed from the pre-tick state.
/// Amounts are absolute, keyed by the counterpart entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductionPlan {
    /// Units able to produce after input limits.
    pub producible: BigNumber,
    pub consumed: Vec<(String, BigNumber)>,
    pub produced: Vec<(String, BigNumber)>,
    pub upkeep_consumed: Vec<(String, BigNumber)>,
    /// Units of this entity lost to an upkeep shortfall.
    pub upkeep_loss: BigNumber,
    pub fixed_consumed: Vec<(String, BigNumber)>,
    pub fixed_produced: Vec<(String, BigNumber)>,
    pub progress: BigNumber,
}

impl ProductionPlan {
    /// Scale input-driven consumption and production by `share`.
    pub fn ration(&mut self, share: BigNumber) {
        self.producible *= share;
        let amounts = self
            .consumed
            .iter_mut()
            .chain(&mut self.produced)
            .chain(&mut self.fixed_consumed)
            .chain(&mut self.fixed_produced);
        for (_, amount) in amounts {
            *amount *= share;
        }
    }
}

fn push_amount(list: &mut Vec<(String, BigNumber)>, key: &str, amount: BigNumber) {
    if amount.is_nan() || amount.is_zero() {
        return;
    }
    list.push((key.to_string(), amount));
}

// ---------------------------------------------------------------------------
// GameEntity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GameEntity {
    definition: Arc<EntityDefinition>,
    quantity: BigNumber,
    progress: BigNumber,
    properties: PropertyTable,
    quantity_change_per_tick: BigNumber,
}

impl GameEntity {
    /// A fresh entity at its starting quantity. Properties are filled in by
    /// the registry once every entity exists.
    pub fn new(definition: Arc<EntityDefinition>) -> Self {
        Self {
            quantity: definition.starting_quantity,
            definition,
            progress: BigNumber::ZERO,
            properties: PropertyTable::new(),
            quantity_change_per_tick: BigNumber::ZERO,
        }
    }

    pub fn key(&self) -> &str {
        &self.definition.key
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &EntityDefinition {
        &self.definition
    }

    pub fn shared_definition(&self) -> &Arc<EntityDefinition> {
        &self.definition
    }

    pub fn quantity(&self) -> BigNumber {
        self.quantity
    }

    pub fn progress(&self) -> BigNumber {
        self.progress
    }

    /// Net quantity change over the last tick.
    pub fn quantity_change_per_tick(&self) -> BigNumber {
        self.quantity_change_per_tick
    }

    pub fn property(&self, bucket: PropertyBucket, sub_key: &str) -> Option<&ModifiableProperty> {
        self.properties.get(&bucket)?.get(sub_key)
    }

    pub fn bucket(&self, bucket: PropertyBucket) -> Option<&BTreeMap<String, ModifiableProperty>> {
        self.properties.get(&bucket)
    }

    pub fn properties(&self) -> &PropertyTable {
        &self.properties
    }

    pub fn has_custom_property(&self, name: &str) -> bool {
        self.property(PropertyBucket::Custom, name).is_some()
    }

    pub(crate) fn replace_property(
        &mut self,
        bucket: PropertyBucket,
        sub_key: &str,
        property: ModifiableProperty,
    ) {
        if let Some(slot) = self
            .properties
            .get_mut(&bucket)
            .and_then(|props| props.get_mut(sub_key))
        {
            *slot = property;
        }
    }

    pub(crate) fn set_properties(&mut self, table: PropertyTable) {
        self.properties = table;
    }

    pub(crate) fn record_change(&mut self, delta: BigNumber) {
        self.quantity_change_per_tick = delta;
    }

    /// Evaluate every configured expression against `state`, producing a
    /// fresh property table. Effects already applied to an existing property
    /// are carried over onto the new base.
    pub fn evaluate_properties<S: StateView + ?Sized>(
        &self,
        universal: &BTreeMap<String, Expr>,
        state: &S,
    ) -> Result<PropertyTable, EngineError> {
        let mut table = PropertyTable::new();
        for bucket in PropertyBucket::MAPS {
            let Some(own) = self.definition.bucket(bucket) else {
                continue;
            };
            let mut entries: BTreeMap<&String, &Expr> = BTreeMap::new();
            if bucket == PropertyBucket::Custom {
                entries.extend(universal.iter());
            }
            entries.extend(own.iter());

            let mut props = BTreeMap::new();
            for (key, expr) in entries {
                let base = expr.as_number(state)?;
                let prop = match self.property(bucket, key) {
                    Some(existing) => {
                        let mut prop = existing.clone();
                        prop.rebase(base, state)?;
                        prop
                    }
                    None => ModifiableProperty::new(key.as_str(), base),
                };
                props.insert(key.clone(), prop);
            }
            if !props.is_empty() {
                table.insert(bucket, props);
            }
        }
        Ok(table)
    }

    // -- Mutation -----------------------------------------------------------

    /// Add `by` to the quantity, clamped to `[0, cap]`. NaN deltas are ignored.
    pub fn change_quantity(&mut self, by: BigNumber, cap: Option<BigNumber>) {
        if by.is_nan() {
            return;
        }
        self.set_quantity(self.quantity + by, cap);
    }

    /// Set the quantity, clamped to `[0, cap]`. NaN is ignored.
    pub fn set_quantity(&mut self, quantity: BigNumber, cap: Option<BigNumber>) {
        if quantity.is_nan() {
            return;
        }
        let mut clamped = quantity.max(BigNumber::ZERO);
        if let Some(cap) = cap {
            clamped = clamped.min(cap.max(BigNumber::ZERO));
        }
        self.quantity = clamped;
    }

    /// Advance progress. Reaching 1 completes one unit: progress drops by 1
    /// and quantity rises by exactly 1. Returns whether a unit completed.
    pub fn change_progress(&mut self, by: BigNumber, cap: Option<BigNumber>) -> bool {
        if by.is_nan() {
            return false;
        }
        self.progress += by;
        if self.progress >= BigNumber::ONE {
            self.progress -= BigNumber::ONE;
            self.change_quantity(BigNumber::ONE, cap);
            return true;
        }
        self.change_quantity(BigNumber::ZERO, cap);
        false
    }

    pub fn set_progress(&mut self, progress: BigNumber) {
        if !progress.is_nan() {
            self.progress = progress.max(BigNumber::ZERO);
        }
    }

    // -- Queries against state ---------------------------------------------

    /// The cap expression evaluated now. A NaN cap counts as no cap.
    pub fn cap<S: StateView + ?Sized>(&self, state: &S) -> Result<Option<BigNumber>, EngineError> {
        match &self.definition.quantity_cap {
            Some(expr) => {
                let cap = expr.as_number(state)?;
                Ok((!cap.is_nan()).then_some(cap))
            }
            None => Ok(None),
        }
    }

    pub fn is_hidden<S: StateView + ?Sized>(&self, state: &S) -> Result<bool, EngineError> {
        self.definition.hidden_when.matches(state)
    }

    pub fn is_disabled<S: StateView + ?Sized>(&self, state: &S) -> Result<bool, EngineError> {
        self.definition.disabled_when.matches(state)
    }

    pub fn is_enabled<S: StateView + ?Sized>(&self, state: &S) -> Result<bool, EngineError> {
        Ok(!self.is_disabled(state)?)
    }

    pub fn is_available<S: StateView + ?Sized>(&self, state: &S) -> Result<bool, EngineError> {
        self.definition.available_when.matches(state)
    }

    /// Every requirement entity holds at least its threshold.
    pub fn requirements_met<S: StateView + ?Sized>(&self, state: &S) -> Result<bool, EngineError> {
        let Some(requirements) = self.bucket(PropertyBucket::Requirements) else {
            return Ok(true);
        };
        for (key, threshold) in requirements {
            let held = state.require_entity(key)?.quantity();
            if !(held >= threshold.value()) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// How many units can produce this tick given available inputs.
    ///
    /// With scaling enabled each input limits production to
    /// `available / required`. With scaling disabled any input short of
    /// `required * quantity` stops production entirely.
    pub fn determine_production<S: StateView + ?Sized>(
        &self,
        state: &S,
        cap: Option<BigNumber>,
    ) -> Result<BigNumber, EngineError> {
        if self.is_disabled(state)? {
            return Ok(BigNumber::ZERO);
        }
        let quantity = self.effective_quantity(cap);
        let mut producible = quantity;
        let Some(inputs) = self.bucket(PropertyBucket::Inputs) else {
            return Ok(producible);
        };
        for (key, required) in inputs {
            let required = required.value();
            if required.is_zero() {
                continue;
            }
            let available = state.require_entity(key)?.quantity();
            if self.definition.scale_production_on_available_inputs {
                let supported = (available / required).min(quantity);
                producible = if supported.is_nan() {
                    BigNumber::ZERO
                } else {
                    producible.min(supported)
                };
            } else if !(available >= required * quantity) {
                return Ok(BigNumber::ZERO);
            }
        }
        Ok(producible.max(BigNumber::ZERO))
    }

    /// Plan this entity's tick. Reads only; the engine applies the plan.
    pub fn plan_tick<S: StateView + ?Sized>(
        &self,
        state: &S,
        cap: Option<BigNumber>,
    ) -> Result<ProductionPlan, EngineError> {
        let mut plan = ProductionPlan::default();
        let enabled = self.is_enabled(state)?;
        let quantity = self.effective_quantity(cap);

        plan.producible = self.determine_production(state, cap)?;

        if enabled {
            self.plan_outputs(&mut plan);
            if let Some(inputs) = self.bucket(PropertyBucket::Inputs) {
                for (key, required) in inputs {
                    push_amount(&mut plan.consumed, key, plan.producible * required.value());
                }
            }
            if quantity.is_positive() {
                self.plan_fixed(state, &mut plan)?;
            }
            if let Some(expr) = &self.definition.progress_per_tick {
                let step = expr.as_number(state)?;
                if !step.is_nan() {
                    plan.progress = step;
                }
            }
        }

        self.plan_upkeep(state, quantity, &mut plan)?;
        Ok(plan)
    }

    fn plan_outputs(&self, plan: &mut ProductionPlan) {
        let minimums = self.bucket(PropertyBucket::MinimumOutputs);
        let minimum_for = |key: &str| minimums.and_then(|m| m.get(key)).map(|p| p.value());

        if let Some(outputs) = self.bucket(PropertyBucket::Outputs) {
            for (key, rate) in outputs {
                let mut amount = plan.producible * rate.value();
                if let Some(floor) = minimum_for(key) {
                    amount = amount.max(floor);
                }
                push_amount(&mut plan.produced, key, amount);
            }
        }
        if let Some(minimums) = minimums {
            let outputs = self.bucket(PropertyBucket::Outputs);
            for (key, floor) in minimums {
                if outputs.is_some_and(|o| o.contains_key(key)) {
                    continue;
                }
                push_amount(&mut plan.produced, key, floor.value());
            }
        }
    }

    /// Flat per-tick consumption and production, all or nothing.
    fn plan_fixed<S: StateView + ?Sized>(
        &self,
        state: &S,
        plan: &mut ProductionPlan,
    ) -> Result<(), EngineError> {
        if let Some(inputs) = self.bucket(PropertyBucket::FixedInputs) {
            for (key, amount) in inputs {
                let available = state.require_entity(key)?.quantity();
                if !(available >= amount.value()) {
                    // Neither consume nor produce.
                    return Ok(());
                }
            }
            for (key, amount) in inputs {
                push_amount(&mut plan.fixed_consumed, key, amount.value());
            }
        }
        if let Some(outputs) = self.bucket(PropertyBucket::FixedOutputs) {
            for (key, amount) in outputs {
                push_amount(&mut plan.fixed_produced, key, amount.value());
            }
        }
        Ok(())
    }

    /// Consume `quantity * per_unit` of each upkeep resource, or whatever is
    /// available. On a shortfall only
    /// `quantity * min(available / required)` units stay supported; the rest
    /// are lost.
    fn plan_upkeep<S: StateView + ?Sized>(
        &self,
        state: &S,
        quantity: BigNumber,
        plan: &mut ProductionPlan,
    ) -> Result<(), EngineError> {
        let Some(upkeep) = self.bucket(PropertyBucket::Upkeep) else {
            return Ok(());
        };
        if !quantity.is_positive() {
            return Ok(());
        }
        let mut supported_ratio = BigNumber::ONE;
        for (key, per_unit) in upkeep {
            let required = quantity * per_unit.value();
            if required.is_nan() || !required.is_positive() {
                continue;
            }
            let available = state.require_entity(key)?.quantity();
            push_amount(&mut plan.upkeep_consumed, key, required.min(available));
            let ratio = available / required;
            if ratio < supported_ratio {
                supported_ratio = ratio.max(BigNumber::ZERO);
            }
        }
        let supported = quantity * supported_ratio;
        plan.upkeep_loss = (quantity - supported).max(BigNumber::ZERO);
        Ok(())
    }

    fn effective_quantity(&self, cap: Option<BigNumber>) -> BigNumber {
        match cap {
            Some(cap) => self.quantity.min(cap),
            None => self.quantity,
        }
    }
}

impl fmt::Display for GameEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GameEntity({}) x {}", self.name(), self.quantity)
    }
}
