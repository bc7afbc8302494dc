//! The simulation engine: owns the live economy and orchestrates the tick
//! pipeline.
//!
//! # Architecture
//!
//! The `Engine` owns:
//! - An [`EntityRegistry`] of live [`GameEntity`] values
//! - The modifier slots (global and entity-attached), with their applied effects
//! - A [`HookRegistry`] consulted while planning production
//! - A [`SimState`] (tick counter, accumulator) and a [`SimulationStrategy`]
//! - An [`EventBus`] for typed simulation events
//!
//! # Tick Pipeline
//!
//! Each `step()` runs:
//! 1. **Modifiers** -- attach or detach modifiers whose activation flipped
//! 2. **Plan** -- every entity plans against the pre-tick state; planned
//!    amounts pass through hooks
//! 3. **Apply** -- ration over-demanded inputs, aggregate deltas, clamp to
//!    caps, upkeep losses, progress
//! 4. **Refresh** -- calculated quantities, property re-evaluation
//! 5. **Post-tick** -- deliver buffered events to listeners
//! 6. **Bookkeeping** -- update tick counter, compute state hash

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use slotmap::SecondaryMap;

use crate::config::GameConfiguration;
use crate::entity::{GameEntity, ProductionPlan};
use crate::error::{ConfigError, EngineError};
use crate::event::{Event, EventBus, EventKind, PassiveListener};
use crate::expr::{Expr, PropertyBucket};
use crate::hook::{EngineHook, HookAction, HookContext, HookRegistry};
use crate::id::{EntityId, HookId, ModifierId};
use crate::modifier::{ModifierDefinition, ModifierEffect, PropertyAddress};
use crate::number::{BigNumber, Ticks};
use crate::property::ModifiableProperty;
use crate::query::EntitySnapshot;
use crate::registry::{EntityRegistry, StateView};
use crate::sim::{AdvanceResult, SimState, SimulationStrategy, StateHash};

// ---------------------------------------------------------------------------
// Modifier slots
// ---------------------------------------------------------------------------

/// Runtime state of one modifier definition.
#[derive(Debug)]
struct ModifierSlot {
    id: ModifierId,
    definition: Arc<ModifierDefinition>,
    /// The entity that carries this modifier, if it is attached to one.
    owner: Option<EntityId>,
    active: bool,
    /// Every property this modifier currently holds an effect on.
    applied: Vec<(PropertyAddress, ModifierEffect)>,
}

/// One entity's plan for the current tick.
#[derive(Debug)]
struct PlannedTick {
    entity: EntityId,
    plan: ProductionPlan,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The core simulation engine.
#[derive(Debug)]
pub struct Engine {
    registry: EntityRegistry,

    /// Custom properties every entity receives.
    universal: BTreeMap<String, Expr>,

    /// Global modifiers first, then attached ones in entity order.
    modifiers: Vec<ModifierSlot>,

    hooks: HookRegistry,

    event_bus: EventBus,

    /// Simulation state (tick counter, accumulator).
    sim_state: SimState,

    strategy: SimulationStrategy,

    /// Whether the simulation is paused.
    paused: bool,

    /// The most recently computed state hash.
    last_state_hash: u64,
}

impl Engine {
    /// Build an engine in tick mode.
    pub fn new(config: GameConfiguration) -> Result<Self, ConfigError> {
        Self::with_strategy(config, SimulationStrategy::Tick)
    }

    /// Build an engine from a validated configuration.
    ///
    /// Every entity starts at its starting quantity; properties are evaluated
    /// against that starting state, then calculated quantities and modifier
    /// activation are resolved once before the first tick.
    pub fn with_strategy(
        config: GameConfiguration,
        strategy: SimulationStrategy,
    ) -> Result<Self, ConfigError> {
        let (definitions, global_modifiers, hooks, universal) = config.into_parts();

        let mut registry = EntityRegistry::new();
        let mut attached = Vec::new();
        for definition in definitions {
            let owned = definition.modifiers.clone();
            let id = registry.insert(GameEntity::new(definition))?;
            attached.extend(owned.into_iter().map(|m| (Some(id), m)));
        }
        registry.rebuild_properties(&universal)?;

        let modifiers = global_modifiers
            .into_iter()
            .map(|m| (None, m))
            .chain(attached)
            .enumerate()
            .map(|(index, (owner, definition))| ModifierSlot {
                id: ModifierId(index as u32),
                definition: Arc::new(definition),
                owner,
                active: false,
                applied: Vec::new(),
            })
            .collect();

        let mut hook_registry = HookRegistry::new();
        for hook in hooks {
            hook_registry.register(hook);
        }

        let mut engine = Self {
            registry,
            universal,
            modifiers,
            hooks: hook_registry,
            event_bus: EventBus::default(),
            sim_state: SimState::new(),
            strategy,
            paused: false,
            last_state_hash: 0,
        };
        engine.refresh()?;
        engine.refresh_modifiers()?;
        engine.last_state_hash = engine.compute_state_hash();

        tracing::debug!(
            entities = engine.registry.len(),
            modifiers = engine.modifiers.len(),
            hooks = engine.hooks.len(),
            "engine constructed"
        );
        Ok(engine)
    }

    // -----------------------------------------------------------------------
    // Entity access
    // -----------------------------------------------------------------------

    /// Look up a live entity by key.
    pub fn entity(&self, key: &str) -> Result<&GameEntity, EngineError> {
        self.registry.require_entity(key)
    }

    pub fn entity_id(&self, key: &str) -> Option<EntityId> {
        self.registry.id_of(key)
    }

    pub fn entity_key(&self, id: EntityId) -> Option<&str> {
        self.registry.get(id).map(|e| e.key())
    }

    pub fn quantity(&self, key: &str) -> Result<BigNumber, EngineError> {
        Ok(self.entity(key)?.quantity())
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Evaluate an expression against the current state.
    pub fn evaluate(&self, expr: &Expr) -> Result<BigNumber, EngineError> {
        expr.as_number(&self.registry)
    }

    pub fn snapshot_entity(&self, key: &str) -> Result<EntitySnapshot, EngineError> {
        let id = self.registry.require_id(key)?;
        EntitySnapshot::capture(id, self.entity(key)?, &self.registry)
    }

    /// Snapshots of every entity in registration order.
    pub fn snapshot_all(&self) -> Result<Vec<EntitySnapshot>, EngineError> {
        self.registry
            .iter()
            .map(|(id, entity)| EntitySnapshot::capture(id, entity, &self.registry))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Direct mutation
    // -----------------------------------------------------------------------

    /// Add `by` to an entity's quantity, clamped to `[0, cap]`.
    pub fn change_quantity(
        &mut self,
        key: &str,
        by: impl Into<BigNumber>,
    ) -> Result<BigNumber, EngineError> {
        let id = self.registry.require_id(key)?;
        let cap = self.entity(key)?.cap(&self.registry)?;
        if let Some(entity) = self.registry.get_mut(id) {
            entity.change_quantity(by.into(), cap);
        }
        self.refresh()?;
        self.quantity(key)
    }

    /// Set an entity's quantity, clamped to `[0, cap]`.
    pub fn set_quantity(
        &mut self,
        key: &str,
        quantity: impl Into<BigNumber>,
    ) -> Result<BigNumber, EngineError> {
        let id = self.registry.require_id(key)?;
        let cap = self.entity(key)?.cap(&self.registry)?;
        if let Some(entity) = self.registry.get_mut(id) {
            entity.set_quantity(quantity.into(), cap);
        }
        self.refresh()?;
        self.quantity(key)
    }

    /// Advance an entity's progress. Returns whether a unit completed.
    pub fn change_progress(
        &mut self,
        key: &str,
        by: impl Into<BigNumber>,
    ) -> Result<bool, EngineError> {
        let id = self.registry.require_id(key)?;
        let cap = self.entity(key)?.cap(&self.registry)?;
        let completed = match self.registry.get_mut(id) {
            Some(entity) => entity.change_progress(by.into(), cap),
            None => false,
        };
        if completed {
            self.event_bus.emit(Event::ProgressCompleted {
                entity: id,
                tick: self.sim_state.tick,
            });
            self.refresh()?;
        }
        Ok(completed)
    }

    // -----------------------------------------------------------------------
    // Buying
    // -----------------------------------------------------------------------

    /// Buy up to `quantity` units of an entity, paying its costs.
    ///
    /// The request is floored to whole units and limited by what the costs
    /// allow and by headroom under the cap. With `all_or_none` a partial
    /// purchase is refused instead, leaving every quantity untouched.
    /// Returns the number of units bought.
    pub fn buy(
        &mut self,
        key: &str,
        quantity: impl Into<BigNumber>,
        all_or_none: bool,
    ) -> Result<BigNumber, EngineError> {
        let requested = quantity.into().floor();
        let id = self.registry.require_id(key)?;
        let state = &self.registry;
        let entity = state.require_entity(key)?;

        let buyable = entity.definition().buyable
            && entity.is_available(state)?
            && !entity.is_disabled(state)?;
        if !buyable {
            tracing::debug!(entity = key, "buy rejected: not buyable");
            return Err(EngineError::NotBuyable(key.to_string()));
        }
        if !entity.requirements_met(state)? {
            tracing::debug!(entity = key, "buy rejected: requirements not met");
            return Err(EngineError::RequirementsNotMet(key.to_string()));
        }
        if !requested.is_positive() {
            return Ok(BigNumber::ZERO);
        }

        let mut affordable = requested;
        let mut payments = Vec::new();
        if let Some(costs) = entity.bucket(PropertyBucket::Costs) {
            for (cost_key, per_unit) in costs {
                let per_unit = per_unit.value();
                if per_unit.is_nan() {
                    affordable = BigNumber::ZERO;
                    continue;
                }
                if !per_unit.is_positive() {
                    continue;
                }
                let payer = state.require_entity(cost_key)?;
                affordable = affordable.min(whole_units(payer.quantity(), per_unit));
                payments.push((state.require_id(cost_key)?, per_unit, payer.cap(state)?));
            }
        }
        let cap = entity.cap(state)?;
        if let Some(cap) = cap {
            let headroom = (cap - entity.quantity()).floor().max(BigNumber::ZERO);
            affordable = affordable.min(headroom);
        }
        let affordable = affordable.max(BigNumber::ZERO);

        if all_or_none && affordable < requested {
            tracing::debug!(
                entity = key,
                requested = %requested,
                affordable = %affordable,
                "buy rejected: cannot afford all"
            );
            return Ok(BigNumber::ZERO);
        }
        if affordable.is_zero() {
            return Ok(BigNumber::ZERO);
        }

        for (payer, per_unit, payer_cap) in payments {
            if let Some(payer) = self.registry.get_mut(payer) {
                payer.change_quantity(-(per_unit * affordable), payer_cap);
            }
        }
        if let Some(entity) = self.registry.get_mut(id) {
            entity.change_quantity(affordable, cap);
        }
        self.event_bus.emit(Event::EntityBought {
            entity: id,
            quantity: affordable,
            tick: self.sim_state.tick,
        });
        tracing::trace!(entity = key, quantity = %affordable, "bought");

        self.refresh()?;
        Ok(affordable)
    }

    // -----------------------------------------------------------------------
    // Hooks
    // -----------------------------------------------------------------------

    pub fn register_hook(&mut self, hook: EngineHook) -> HookId {
        self.hooks.register(hook)
    }

    /// Returns whether the hook was registered.
    pub fn unregister_hook(&mut self, id: HookId) -> bool {
        self.hooks.unregister(id)
    }

    // -----------------------------------------------------------------------
    // Modifiers
    // -----------------------------------------------------------------------

    /// Whether the modifier with `key` is currently applied.
    pub fn is_modifier_active(&self, key: &str) -> Option<bool> {
        self.modifiers
            .iter()
            .find(|slot| slot.definition.key == key)
            .map(|slot| slot.active)
    }

    pub fn modifier_id(&self, key: &str) -> Option<ModifierId> {
        self.modifiers
            .iter()
            .find(|slot| slot.definition.key == key)
            .map(|slot| slot.id)
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Stop recording events of this kind.
    pub fn suppress_event(&mut self, kind: EventKind) {
        self.event_bus.suppress(kind);
    }

    /// Register a listener called at the end of every step.
    pub fn on_event(&mut self, kind: EventKind, listener: PassiveListener) {
        self.event_bus.on(kind, listener);
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    // -----------------------------------------------------------------------
    // State hash / pause / resume
    // -----------------------------------------------------------------------

    /// Get the most recently computed state hash.
    pub fn state_hash(&self) -> u64 {
        self.last_state_hash
    }

    pub fn sim_state(&self) -> &SimState {
        &self.sim_state
    }

    pub fn tick(&self) -> Ticks {
        self.sim_state.tick
    }

    pub fn strategy(&self) -> SimulationStrategy {
        self.strategy
    }

    /// Pause the simulation. While paused, `advance()` and `step()` are
    /// no-ops; buying and direct mutation still work.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume the simulation.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Returns true if the simulation is currently paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // -----------------------------------------------------------------------
    // Advance
    // -----------------------------------------------------------------------

    /// Advance the simulation according to the configured strategy.
    ///
    /// - **Tick mode**: `dt` is ignored; exactly one step runs.
    /// - **Delta mode**: `dt` is accumulated; as many fixed steps run as fit.
    pub fn advance(&mut self, dt: Ticks) -> Result<AdvanceResult, EngineError> {
        if self.paused {
            return Ok(AdvanceResult::default());
        }
        let mut result = AdvanceResult::default();

        match self.strategy {
            SimulationStrategy::Tick => {
                self.step_internal(&mut result)?;
            }
            SimulationStrategy::Delta { fixed_timestep } => {
                self.sim_state.accumulator += dt;
                let step_size = fixed_timestep.max(1);
                while self.sim_state.accumulator >= step_size {
                    self.sim_state.accumulator -= step_size;
                    self.step_internal(&mut result)?;
                }
            }
        }

        Ok(result)
    }

    /// Run exactly one step, whatever the strategy.
    pub fn step(&mut self) -> Result<AdvanceResult, EngineError> {
        if self.paused {
            return Ok(AdvanceResult::default());
        }
        let mut result = AdvanceResult::default();
        self.step_internal(&mut result)?;
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Internal: single step
    // -----------------------------------------------------------------------

    fn step_internal(&mut self, result: &mut AdvanceResult) -> Result<(), EngineError> {
        let before = self.quantities();

        // Phase 1: Modifiers -- flip activation between ticks.
        self.refresh_modifiers()?;

        // Phase 2: Plan -- read-only against the pre-tick state.
        let (caps, mut plans) = self.phase_plan()?;

        // Phase 3: Apply -- all plans at once.
        self.ration_inputs(&mut plans);
        self.phase_apply(&caps, &plans);

        // Phase 4: Refresh -- derived quantities and properties.
        self.refresh()?;
        self.record_changes(&before);

        // Phase 5: Post-tick -- deliver buffered events.
        self.event_bus.deliver();

        // Phase 6: Bookkeeping.
        self.sim_state.tick += 1;
        self.last_state_hash = self.compute_state_hash();

        result.steps_run += 1;
        Ok(())
    }

    fn quantities(&self) -> SecondaryMap<EntityId, BigNumber> {
        self.registry
            .iter()
            .map(|(id, entity)| (id, entity.quantity()))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Phase 1: Modifiers
    // -----------------------------------------------------------------------

    /// Attach every modifier that should be active and is not, and detach
    /// every one that is applied but should no longer be.
    fn refresh_modifiers(&mut self) -> Result<(), EngineError> {
        for index in 0..self.modifiers.len() {
            let slot = &self.modifiers[index];
            let owner_present = match slot.owner {
                Some(owner) => self
                    .registry
                    .get(owner)
                    .is_some_and(|e| e.quantity().is_positive()),
                None => true,
            };
            let should_be_active =
                owner_present && slot.definition.active_when.matches(&self.registry)?;
            if should_be_active == slot.active {
                continue;
            }
            if should_be_active {
                self.attach_modifier(index)?;
            } else {
                self.detach_modifier(index)?;
            }
        }
        Ok(())
    }

    /// Properties are cloned out, modified, and written back only once every
    /// effect has resolved, so a failing effect leaves nothing half-applied.
    fn attach_modifier(&mut self, index: usize) -> Result<(), EngineError> {
        let slot = &self.modifiers[index];
        let mut pending: HashMap<PropertyAddress, ModifiableProperty> = HashMap::new();
        let mut applied = Vec::new();

        for (effect_index, effect) in slot.definition.effects.iter().enumerate() {
            let modifier_effect = ModifierEffect::new(slot.id, effect_index, effect.clone());
            for address in effect.affectable_properties(&self.registry)? {
                let property = match pending.entry(address.clone()) {
                    Entry::Occupied(e) => e.into_mut(),
                    Entry::Vacant(e) => {
                        let Some(current) = self.registry.property(&address) else {
                            continue;
                        };
                        e.insert(current.clone())
                    }
                };
                property.add_effect(modifier_effect.clone(), &self.registry)?;
                applied.push((address, modifier_effect.clone()));
            }
        }

        for (address, property) in pending {
            self.registry.replace_property(&address, property);
        }

        let slot = &mut self.modifiers[index];
        slot.active = true;
        slot.applied = applied;
        tracing::debug!(
            modifier = %slot.definition.key,
            properties = slot.applied.len(),
            tick = self.sim_state.tick,
            "modifier activated"
        );
        self.event_bus.emit(Event::ModifierActivated {
            modifier: slot.id,
            tick: self.sim_state.tick,
        });
        Ok(())
    }

    fn detach_modifier(&mut self, index: usize) -> Result<(), EngineError> {
        let mut pending: HashMap<PropertyAddress, ModifiableProperty> = HashMap::new();
        for (address, effect) in &self.modifiers[index].applied {
            let property = match pending.entry(address.clone()) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => {
                    let Some(current) = self.registry.property(address) else {
                        continue;
                    };
                    e.insert(current.clone())
                }
            };
            property.remove_effect(effect, &self.registry)?;
        }

        for (address, property) in pending {
            self.registry.replace_property(&address, property);
        }

        let slot = &mut self.modifiers[index];
        slot.active = false;
        slot.applied.clear();
        tracing::debug!(
            modifier = %slot.definition.key,
            tick = self.sim_state.tick,
            "modifier deactivated"
        );
        self.event_bus.emit(Event::ModifierDeactivated {
            modifier: slot.id,
            tick: self.sim_state.tick,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Phase 2: Plan
    // -----------------------------------------------------------------------

    fn phase_plan(
        &self,
    ) -> Result<(SecondaryMap<EntityId, Option<BigNumber>>, Vec<PlannedTick>), EngineError> {
        let mut caps = SecondaryMap::new();
        for (id, entity) in self.registry.iter() {
            caps.insert(id, entity.cap(&self.registry)?);
        }

        let mut plans = Vec::with_capacity(self.registry.len());
        for (id, entity) in self.registry.iter() {
            let cap = caps.get(id).copied().flatten();
            let mut plan = entity.plan_tick(&self.registry, cap)?;
            if !self.hooks.is_empty() {
                self.run_hooks(HookAction::WillProduce, entity, &mut plan.produced);
                self.run_hooks(HookAction::WillProduce, entity, &mut plan.fixed_produced);
                self.run_hooks(HookAction::WillConsume, entity, &mut plan.consumed);
                self.run_hooks(HookAction::WillConsume, entity, &mut plan.fixed_consumed);
            }
            plans.push(PlannedTick { entity: id, plan });
        }
        Ok((caps, plans))
    }

    fn run_hooks(
        &self,
        action: HookAction,
        actor: &GameEntity,
        amounts: &mut [(String, BigNumber)],
    ) {
        for (subject, amount) in amounts.iter_mut() {
            *amount = self.hooks.apply(
                action,
                HookContext {
                    actor: actor.key().to_string(),
                    subject: subject.clone(),
                    actor_quantity: actor.quantity(),
                    quantity: *amount,
                    tick: self.sim_state.tick,
                },
            );
        }
    }

    // -----------------------------------------------------------------------
    // Phase 3: Apply
    // -----------------------------------------------------------------------

    /// Every plan read its inputs from the same pre-tick stock. Where the
    /// combined demand for a resource exceeds what upkeep leaves of it, each
    /// consumer of that resource is scaled by the same share.
    fn ration_inputs(&self, plans: &mut [PlannedTick]) {
        let mut reserved: SecondaryMap<EntityId, BigNumber> = SecondaryMap::new();
        let mut demand: SecondaryMap<EntityId, BigNumber> = SecondaryMap::new();
        for PlannedTick { plan, .. } in plans.iter() {
            for (key, amount) in &plan.upkeep_consumed {
                if let Some(id) = self.registry.id_of(key) {
                    add_delta(&mut reserved, id, *amount);
                }
            }
            for (key, amount) in plan.consumed.iter().chain(&plan.fixed_consumed) {
                if let Some(id) = self.registry.id_of(key) {
                    add_delta(&mut demand, id, *amount);
                }
            }
        }

        let mut shares: SecondaryMap<EntityId, BigNumber> = SecondaryMap::new();
        for (id, wanted) in &demand {
            let Some(entity) = self.registry.get(id) else {
                continue;
            };
            let upkeep = reserved.get(id).copied().unwrap_or(BigNumber::ZERO);
            let available = (entity.quantity() - upkeep).max(BigNumber::ZERO);
            if *wanted > available {
                tracing::debug!(
                    entity = entity.key(),
                    wanted = %wanted,
                    available = %available,
                    "inputs over-demanded"
                );
                shares.insert(id, available / *wanted);
            }
        }
        if shares.is_empty() {
            return;
        }

        for PlannedTick { plan, .. } in plans.iter_mut() {
            let share = plan
                .consumed
                .iter()
                .chain(&plan.fixed_consumed)
                .filter_map(|(key, _)| self.registry.id_of(key))
                .filter_map(|id| shares.get(id).copied())
                .fold(BigNumber::ONE, BigNumber::min);
            if share < BigNumber::ONE {
                plan.ration(share);
            }
        }
    }

    fn phase_apply(
        &mut self,
        caps: &SecondaryMap<EntityId, Option<BigNumber>>,
        plans: &[PlannedTick],
    ) {
        let tick = self.sim_state.tick;
        let mut deltas: SecondaryMap<EntityId, BigNumber> = SecondaryMap::new();

        for PlannedTick { entity: actor, plan } in plans {
            let actor = *actor;
            for (key, amount) in plan.produced.iter().chain(&plan.fixed_produced) {
                let Some(target) = self.registry.id_of(key) else {
                    continue;
                };
                if add_delta(&mut deltas, target, *amount) {
                    self.event_bus.emit(Event::EntityProduced {
                        producer: actor,
                        entity: target,
                        quantity: *amount,
                        tick,
                    });
                }
            }
            for (key, amount) in plan.consumed.iter().chain(&plan.fixed_consumed) {
                let Some(target) = self.registry.id_of(key) else {
                    continue;
                };
                if add_delta(&mut deltas, target, -*amount) {
                    self.event_bus.emit(Event::EntityConsumed {
                        consumer: actor,
                        entity: target,
                        quantity: *amount,
                        tick,
                    });
                }
            }
            for (key, amount) in &plan.upkeep_consumed {
                let Some(target) = self.registry.id_of(key) else {
                    continue;
                };
                if add_delta(&mut deltas, target, -*amount) {
                    self.event_bus.emit(Event::UpkeepConsumed {
                        consumer: actor,
                        entity: target,
                        quantity: *amount,
                        tick,
                    });
                }
            }
        }

        for (id, delta) in &deltas {
            let cap = caps.get(id).copied().flatten();
            if let Some(entity) = self.registry.get_mut(id) {
                entity.change_quantity(*delta, cap);
            }
        }

        for PlannedTick { entity: id, plan } in plans {
            let id = *id;
            let cap = caps.get(id).copied().flatten();
            let Some(entity) = self.registry.get_mut(id) else {
                continue;
            };

            if plan.upkeep_loss.is_positive() {
                tracing::warn!(
                    entity = entity.key(),
                    lost = %plan.upkeep_loss,
                    tick,
                    "upkeep shortfall"
                );
                entity.change_quantity(-plan.upkeep_loss, cap);
                self.event_bus.emit(Event::UpkeepShortfall {
                    entity: id,
                    lost: plan.upkeep_loss,
                    tick,
                });
            }

            if !plan.progress.is_zero() && entity.change_progress(plan.progress, cap) {
                self.event_bus
                    .emit(Event::ProgressCompleted { entity: id, tick });
            }
        }
    }

    // -----------------------------------------------------------------------
    // Phase 4: Refresh
    // -----------------------------------------------------------------------

    /// Re-derive everything that depends on quantities: calculated
    /// quantities, clamping to caps that may have moved, then every property
    /// table.
    fn refresh(&mut self) -> Result<(), EngineError> {
        self.apply_calculated_quantities()?;
        self.clamp_to_caps()?;
        self.registry.rebuild_properties(&self.universal)
    }

    fn clamp_to_caps(&mut self) -> Result<(), EngineError> {
        let mut caps = Vec::new();
        for (id, entity) in self.registry.iter() {
            if let Some(cap) = entity.cap(&self.registry)? {
                caps.push((id, cap));
            }
        }
        for (id, cap) in caps {
            if let Some(entity) = self.registry.get_mut(id) {
                entity.change_quantity(BigNumber::ZERO, Some(cap));
            }
        }
        Ok(())
    }

    fn apply_calculated_quantities(&mut self) -> Result<(), EngineError> {
        let mut updates = Vec::new();
        for (id, entity) in self.registry.iter() {
            if let Some(expr) = &entity.definition().calculated_quantity {
                let value = expr.as_number(&self.registry)?;
                updates.push((id, value, entity.cap(&self.registry)?));
            }
        }
        for (id, value, cap) in updates {
            if let Some(entity) = self.registry.get_mut(id) {
                entity.set_quantity(value, cap);
            }
        }
        Ok(())
    }

    fn record_changes(&mut self, before: &SecondaryMap<EntityId, BigNumber>) {
        let ids: Vec<EntityId> = self.registry.ids().to_vec();
        for id in ids {
            let Some(entity) = self.registry.get_mut(id) else {
                continue;
            };
            let previous = before.get(id).copied().unwrap_or(BigNumber::ZERO);
            entity.record_change(entity.quantity() - previous);
        }
    }

    // -----------------------------------------------------------------------
    // Phase 6: Bookkeeping
    // -----------------------------------------------------------------------

    /// Compute a deterministic hash of the current simulation state.
    fn compute_state_hash(&self) -> u64 {
        let mut hasher = StateHash::new();
        hasher.write_u64(self.sim_state.tick);

        // Registration order is fixed by the configuration.
        for (_, entity) in self.registry.iter() {
            hasher.write_str(entity.key());
            hasher.write_big_number(entity.quantity());
            hasher.write_big_number(entity.progress());
        }
        for slot in &self.modifiers {
            hasher.write(&[slot.active as u8]);
        }

        hasher.finish()
    }
}

/// Whole units `available` pays for at `per_unit` each. The quotient can land
/// just under an integer, so the next unit is checked by multiplication.
fn whole_units(available: BigNumber, per_unit: BigNumber) -> BigNumber {
    let units = (available / per_unit).floor();
    let next = units + BigNumber::ONE;
    if next * per_unit <= available {
        next
    } else {
        units
    }
}

/// Add a non-NaN amount to the running delta. Returns whether it counted.
fn add_delta(
    deltas: &mut SecondaryMap<EntityId, BigNumber>,
    id: EntityId,
    amount: BigNumber,
) -> bool {
    if amount.is_nan() || amount.is_zero() {
        return false;
    }
    match deltas.get_mut(id) {
        Some(delta) => *delta += amount,
        None => {
            deltas.insert(id, amount);
        }
    }
    true
}

impl StateView for Engine {
    fn entity(&self, key: &str) -> Option<&GameEntity> {
        self.registry.entity(key)
    }

    fn entity_id(&self, key: &str) -> Option<EntityId> {
        self.registry.id_of(key)
    }

    fn entities(&self) -> Box<dyn Iterator<Item = &GameEntity> + '_> {
        self.registry.entities()
    }
}
