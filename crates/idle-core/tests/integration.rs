//! Integration tests for the idle simulation engine.
//!
//! These tests exercise end-to-end behavior across the full engine pipeline:
//! configuration validation, production, upkeep, buying, modifiers, hooks,
//! events, and determinism.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use idle_core::config::GameConfiguration;
use idle_core::definition::EntityDefinition;
use idle_core::engine::Engine;
use idle_core::error::{ConfigError, EngineError};
use idle_core::event::{Event, EventKind};
use idle_core::expr::{Expr, PropertyBucket};
use idle_core::hook::HookBuilder;
use idle_core::matcher::{Comparison, StateMatcher};
use idle_core::modifier::{EffectKind, ModifierDefinition};
use idle_core::number::BigNumber;
use idle_core::sim::SimulationStrategy;
use idle_core::test_utils::*;

fn quantity(engine: &Engine, key: &str) -> BigNumber {
    engine.quantity(key).unwrap()
}

fn build(defs: Vec<EntityDefinition>) -> Engine {
    Engine::new(GameConfiguration::from_entities(defs).unwrap()).unwrap()
}

// ===========================================================================
// Village economy
// ===========================================================================

#[test]
fn village_first_ticks() {
    let mut engine = village_engine();

    // Farms: 2 * 3 food. Workers: 3 * 2 wood, eating 3 food.
    engine.step().unwrap();
    assert_eq!(quantity(&engine, "food"), num(23.0));
    assert_eq!(quantity(&engine, "wood"), num(36.0));

    engine.step().unwrap();
    assert_eq!(quantity(&engine, "food"), num(26.0));
    assert_eq!(quantity(&engine, "wood"), num(42.0));
    assert_eq!(quantity(&engine, "farm"), num(2.0));
    assert_eq!(quantity(&engine, "worker"), num(3.0));

    let wood = engine.entity("wood").unwrap();
    assert_eq!(wood.quantity_change_per_tick(), num(6.0));
}

#[test]
fn farm_cost_escalates_with_each_purchase() {
    let mut engine = village_engine();
    let cost = |engine: &Engine| {
        engine
            .snapshot_entity("farm")
            .unwrap()
            .property(PropertyBucket::Costs, "wood")
            .unwrap()
    };
    assert_eq!(cost(&engine), num(14.0));

    assert_eq!(engine.buy("farm", 1, true).unwrap(), num(1.0));
    assert_eq!(quantity(&engine, "wood"), num(16.0));
    assert_eq!(cost(&engine), num(16.0));

    // 16 wood buys exactly one more at the new price.
    assert_eq!(engine.buy("farm", 3, false).unwrap(), num(1.0));
    assert_eq!(quantity(&engine, "wood"), BigNumber::ZERO);
    assert_eq!(quantity(&engine, "farm"), num(4.0));
}

#[test]
fn worker_purchases_stop_at_housing_cap() {
    let mut engine = village_engine();
    // Two huts house four workers; three already live there.
    assert_eq!(engine.buy("worker", 5, false).unwrap(), num(1.0));
    assert_eq!(quantity(&engine, "food"), num(10.0));
    assert_eq!(engine.buy("worker", 1, true).unwrap(), BigNumber::ZERO);

    engine.buy("hut", 1, true).unwrap();
    assert_eq!(engine.buy("worker", 1, true).unwrap(), num(1.0));
    assert_eq!(quantity(&engine, "worker"), num(5.0));
}

#[test]
fn sawmill_requires_three_huts() {
    let mut engine = village_engine();
    assert_eq!(
        engine.buy("sawmill", 1, false).unwrap_err(),
        EngineError::RequirementsNotMet("sawmill".into())
    );

    engine.buy("hut", 1, true).unwrap();
    assert_eq!(quantity(&engine, "wood"), num(15.0));

    // Requirements hold now but 15 wood does not cover 40.
    assert_eq!(engine.buy("sawmill", 1, false).unwrap(), BigNumber::ZERO);
    assert_eq!(engine.buy("sawmill", 1, true).unwrap(), BigNumber::ZERO);
    assert_eq!(quantity(&engine, "wood"), num(15.0));
}

#[test]
fn resources_are_not_buyable() {
    let mut engine = village_engine();
    assert_eq!(
        engine.buy("food", 1, false).unwrap_err(),
        EngineError::NotBuyable("food".into())
    );
}

#[test]
fn granary_doubles_farm_output_and_raises_food_cap() {
    let mut engine = village_engine();
    engine.set_quantity("planks", 5).unwrap();
    assert_eq!(engine.buy("granary", 1, true).unwrap(), num(1.0));
    assert_eq!(quantity(&engine, "planks"), BigNumber::ZERO);
    assert_eq!(engine.is_modifier_active("granary_bonus"), Some(false));

    engine.step().unwrap();
    assert_eq!(engine.is_modifier_active("granary_bonus"), Some(true));
    // 20 + 2 farms * 6 - 3 eaten.
    assert_eq!(quantity(&engine, "food"), num(29.0));

    let snapshot = engine.snapshot_entity("food").unwrap();
    assert_eq!(snapshot.cap, Some(num(150.0)));
}

#[test]
fn purchases_are_reported_as_events() {
    let mut engine = village_engine();
    let bought = Rc::new(RefCell::new(Vec::new()));
    let sink = bought.clone();
    engine.on_event(
        EventKind::EntityBought,
        Box::new(move |event| {
            if let Event::EntityBought { quantity, .. } = event {
                sink.borrow_mut().push(*quantity);
            }
        }),
    );

    engine.buy("hut", 1, true).unwrap();
    assert!(bought.borrow().is_empty());

    // Delivered at the end of the next step.
    engine.step().unwrap();
    assert_eq!(*bought.borrow(), vec![num(1.0)]);
}

#[test]
fn suppressed_events_are_never_buffered() {
    let mut engine = village_engine();
    engine.suppress_event(EventKind::EntityProduced);
    engine.step().unwrap();
    assert_eq!(engine.event_bus().total_emitted(EventKind::EntityProduced), 0);
    assert!(engine.event_bus().total_emitted(EventKind::UpkeepConsumed) > 0);
}

// ===========================================================================
// Configuration
// ===========================================================================

#[test]
fn duplicate_entity_keys_fail_construction() {
    let err = GameConfiguration::from_entities(vec![
        EntityDefinition::builder("wood").build(),
        EntityDefinition::builder("wood").starting_quantity(5).build(),
    ])
    .unwrap_err();
    assert_eq!(err, ConfigError::DuplicateEntityKey("wood".into()));
}

#[test]
fn failing_initial_evaluation_is_a_config_error() {
    // A container-only expression cannot be a number.
    let config = GameConfiguration::from_entities(vec![
        EntityDefinition::builder("wood")
            .custom("bad", Expr::list(vec![Expr::number(1)]))
            .build(),
    ])
    .unwrap();
    let err = Engine::new(config).unwrap_err();
    assert!(matches!(err, ConfigError::Evaluation(EngineError::UnsupportedOperation(_))));
}

#[test]
fn universal_custom_properties_reach_every_entity() {
    let mut universal = BTreeMap::new();
    universal.insert("era".to_string(), Expr::number(1));
    let config = GameConfiguration::new(
        vec![
            EntityDefinition::builder("wood").build(),
            EntityDefinition::builder("stone").custom("era", 2).build(),
        ],
        Vec::new(),
        Vec::new(),
        universal,
    )
    .unwrap();
    let engine = Engine::new(config).unwrap();
    let era = |key: &str| {
        engine
            .snapshot_entity(key)
            .unwrap()
            .property(PropertyBucket::Custom, "era")
    };
    assert_eq!(era("wood"), Some(num(1.0)));
    // The entity's own definition wins.
    assert_eq!(era("stone"), Some(num(2.0)));
}

// ===========================================================================
// Production rules
// ===========================================================================

#[test]
fn scaling_disabled_blocks_partial_production() {
    let mut engine = build(vec![
        EntityDefinition::builder("ore").starting_quantity(5).build(),
        EntityDefinition::builder("forge")
            .starting_quantity(3)
            .input("ore", 2)
            .output("ingot", 1)
            .scale_production(false)
            .build(),
        EntityDefinition::builder("ingot").build(),
    ]);
    engine.step().unwrap();
    assert_eq!(quantity(&engine, "ingot"), BigNumber::ZERO);
    assert_eq!(quantity(&engine, "ore"), num(5.0));

    engine.set_quantity("ore", 6).unwrap();
    engine.step().unwrap();
    assert_eq!(quantity(&engine, "ingot"), num(3.0));
    assert_eq!(quantity(&engine, "ore"), BigNumber::ZERO);
}

#[test]
fn scaling_enabled_produces_what_inputs_allow() {
    let mut engine = build(vec![
        EntityDefinition::builder("ore").starting_quantity(5).build(),
        EntityDefinition::builder("forge")
            .starting_quantity(3)
            .input("ore", 2)
            .output("ingot", 1)
            .build(),
        EntityDefinition::builder("ingot").build(),
    ]);
    engine.step().unwrap();
    assert!(approx(quantity(&engine, "ingot"), 2.5));
    assert!(approx(quantity(&engine, "ore"), 0.0));
}

#[test]
fn disabled_entities_do_not_produce() {
    let mut engine = build(vec![
        EntityDefinition::builder("switch").build(),
        EntityDefinition::builder("generator")
            .starting_quantity(1)
            .output("power", 5)
            .disabled_when(StateMatcher::compare(
                Expr::quantity_of("switch"),
                Comparison::Equal,
                0,
            ))
            .build(),
        EntityDefinition::builder("power").build(),
    ]);
    engine.step().unwrap();
    assert_eq!(quantity(&engine, "power"), BigNumber::ZERO);

    engine.set_quantity("switch", 1).unwrap();
    engine.step().unwrap();
    assert_eq!(quantity(&engine, "power"), num(5.0));
}

#[test]
fn fixed_production_runs_flat_per_tick() {
    let mut engine = build(vec![
        EntityDefinition::builder("coal").starting_quantity(5).build(),
        EntityDefinition::builder("plant")
            .starting_quantity(10)
            .fixed_input("coal", 2)
            .fixed_output("power", 7)
            .build(),
        EntityDefinition::builder("power").build(),
    ]);
    engine.step().unwrap();
    engine.step().unwrap();
    assert_eq!(quantity(&engine, "coal"), num(1.0));
    assert_eq!(quantity(&engine, "power"), num(14.0));

    // One coal left: nothing burns, nothing is made.
    engine.step().unwrap();
    assert_eq!(quantity(&engine, "coal"), num(1.0));
    assert_eq!(quantity(&engine, "power"), num(14.0));
}

#[test]
fn starving_workers_shrink_until_supported() {
    let mut engine = build(vec![
        EntityDefinition::builder("food").starting_quantity(6).build(),
        EntityDefinition::builder("worker")
            .starting_quantity(10)
            .upkeep("food", 2)
            .build(),
    ]);
    let shortfalls = Rc::new(RefCell::new(Vec::new()));
    let sink = shortfalls.clone();
    engine.on_event(
        EventKind::UpkeepShortfall,
        Box::new(move |event| {
            if let Event::UpkeepShortfall { lost, .. } = event {
                sink.borrow_mut().push(*lost);
            }
        }),
    );

    // 20 food needed, 6 available: 3 workers stay.
    engine.step().unwrap();
    assert_eq!(quantity(&engine, "food"), BigNumber::ZERO);
    assert!(approx(quantity(&engine, "worker"), 3.0));

    // Nothing left to eat.
    engine.step().unwrap();
    assert_eq!(quantity(&engine, "worker"), BigNumber::ZERO);
    assert_eq!(shortfalls.borrow().len(), 2);
    assert!(approx(shortfalls.borrow()[0], 7.0));
}

#[test]
fn progress_entities_complete_over_ticks() {
    let mut engine = build(vec![
        EntityDefinition::builder("scientist").starting_quantity(2).build(),
        EntityDefinition::builder("discovery")
            .progress_per_tick(Expr::product(
                Expr::number(0.25),
                Expr::quantity_of("scientist"),
            ))
            .build(),
    ]);
    engine.step().unwrap();
    assert_eq!(quantity(&engine, "discovery"), BigNumber::ZERO);
    engine.step().unwrap();
    assert_eq!(quantity(&engine, "discovery"), num(1.0));
    assert!(approx(engine.entity("discovery").unwrap().progress(), 0.0));
    assert_eq!(
        engine.event_bus().total_emitted(EventKind::ProgressCompleted),
        1
    );
}

// ===========================================================================
// Modifiers and hooks
// ===========================================================================

#[test]
fn wildcard_modifier_reaches_every_producer() {
    let boost = ModifierDefinition::new("sunny", StateMatcher::Always).affecting(
        "*",
        PropertyBucket::Outputs,
        "food",
        EffectKind::Add,
        1,
    );
    let config = GameConfiguration::new(
        vec![
            EntityDefinition::builder("farm")
                .starting_quantity(1)
                .output("food", 2)
                .build(),
            EntityDefinition::builder("orchard")
                .starting_quantity(1)
                .output("food", 4)
                .build(),
            EntityDefinition::builder("mine")
                .starting_quantity(1)
                .output("ore", 1)
                .build(),
            EntityDefinition::builder("food").build(),
            EntityDefinition::builder("ore").build(),
        ],
        vec![boost],
        Vec::new(),
        BTreeMap::new(),
    )
    .unwrap();
    let mut engine = Engine::new(config).unwrap();
    assert_eq!(engine.is_modifier_active("sunny"), Some(true));

    engine.step().unwrap();
    assert_eq!(quantity(&engine, "food"), num(3.0 + 5.0));
    assert_eq!(quantity(&engine, "ore"), num(1.0));
}

#[test]
fn modifier_targeting_costs_fails_at_construction() {
    let discount = ModifierDefinition::new("sale", StateMatcher::Always).affecting(
        "hut",
        PropertyBucket::Costs,
        "wood",
        EffectKind::Multiply,
        0.5,
    );
    let config = GameConfiguration::new(
        vec![
            EntityDefinition::builder("wood").build(),
            EntityDefinition::builder("hut").cost("wood", 10).build(),
        ],
        vec![discount],
        Vec::new(),
        BTreeMap::new(),
    )
    .unwrap();
    let err = Engine::new(config).unwrap_err();
    assert!(matches!(err, ConfigError::Evaluation(EngineError::UnsupportedOperation(_))));
}

#[test]
fn consume_hooks_adjust_inputs_only() {
    let mut engine = build(vec![
        EntityDefinition::builder("ore").starting_quantity(10).build(),
        EntityDefinition::builder("smelter")
            .starting_quantity(2)
            .input("ore", 2)
            .output("bar", 1)
            .build(),
        EntityDefinition::builder("bar").build(),
    ]);
    engine.register_hook(
        HookBuilder::new()
            .when_any_entity()
            .consumes("ore")
            .then_execute(|ctx| ctx.quantity * BigNumber::from(0.5))
            .build(),
    );
    engine.step().unwrap();
    assert_eq!(quantity(&engine, "ore"), num(8.0));
    assert_eq!(quantity(&engine, "bar"), num(2.0));
}

#[test]
fn hooks_see_actor_quantity_and_tick() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let hook = HookBuilder::new()
        .when_entity("farm")
        .produces_any()
        .then_execute(move |ctx| {
            sink.borrow_mut().push((ctx.actor_quantity, ctx.tick));
            ctx.quantity
        })
        .build();
    let config = GameConfiguration::new(
        vec![
            EntityDefinition::builder("farm")
                .starting_quantity(4)
                .output("food", 1)
                .build(),
            EntityDefinition::builder("food").build(),
        ],
        Vec::new(),
        vec![hook],
        BTreeMap::new(),
    )
    .unwrap();
    let mut engine = Engine::new(config).unwrap();
    engine.step().unwrap();
    engine.step().unwrap();
    assert_eq!(*seen.borrow(), vec![(num(4.0), 0), (num(4.0), 1)]);
}

// ===========================================================================
// Time and determinism
// ===========================================================================

#[test]
fn delta_strategy_runs_whole_steps() {
    let config = GameConfiguration::from_entities(vec![
        EntityDefinition::builder("farm")
            .starting_quantity(1)
            .output("food", 1)
            .build(),
        EntityDefinition::builder("food").build(),
    ])
    .unwrap();
    let mut engine =
        Engine::with_strategy(config, SimulationStrategy::Delta { fixed_timestep: 10 }).unwrap();
    assert_eq!(engine.advance(25).unwrap().steps_run, 2);
    assert_eq!(engine.advance(5).unwrap().steps_run, 1);
    assert_eq!(quantity(&engine, "food"), num(3.0));
    assert_eq!(engine.sim_state().accumulator, 0);
}

#[test]
fn identical_runs_hash_identically() {
    let run = || {
        let mut engine = village_engine();
        for tick in 0..50 {
            if tick % 7 == 0 {
                let _ = engine.buy("farm", 1, false);
            }
            if tick % 11 == 0 {
                let _ = engine.buy("hut", 1, true);
            }
            engine.step().unwrap();
        }
        engine.state_hash()
    };
    assert_eq!(run(), run());
}

#[test]
fn offline_progress_matches_stepping() {
    let config = || GameConfiguration::from_entities(chain_definitions(3)).unwrap();
    let mut stepped = Engine::new(config()).unwrap();
    for _ in 0..100 {
        stepped.step().unwrap();
    }
    let mut jumped =
        Engine::with_strategy(config(), SimulationStrategy::Delta { fixed_timestep: 1 }).unwrap();
    assert_eq!(jumped.advance(100).unwrap().steps_run, 100);
    assert_eq!(stepped.state_hash(), jumped.state_hash());
}
