//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::GameConfiguration;
use crate::definition::EntityDefinition;
use crate::engine::Engine;
use crate::entity::GameEntity;
use crate::expr::{Expr, PropertyBucket};
use crate::matcher::StateMatcher;
use crate::modifier::{EffectDefinition, EffectKind, EntityPropertyEffect, ModifierDefinition};
use crate::number::BigNumber;
use crate::registry::EntityRegistry;
use crate::sim::SimulationStrategy;

// ===========================================================================
// Number helpers
// ===========================================================================

pub fn num(v: f64) -> BigNumber {
    BigNumber::from(v)
}

/// Relative comparison for values that went through float arithmetic.
pub fn approx(actual: BigNumber, expected: f64) -> bool {
    let actual = actual.to_f64();
    if expected == 0.0 {
        return actual.abs() < 1e-9;
    }
    ((actual - expected) / expected).abs() < 1e-9
}

// ===========================================================================
// Registry / effect constructors
// ===========================================================================

/// A registry holding `defs` with properties evaluated and no universal
/// custom properties. Skips configuration validation.
pub fn registry_with(defs: Vec<EntityDefinition>) -> EntityRegistry {
    let mut registry = EntityRegistry::new();
    for def in defs {
        registry
            .insert(GameEntity::new(Arc::new(def)))
            .expect("test entity keys are unique");
    }
    registry
        .rebuild_properties(&BTreeMap::new())
        .expect("test properties evaluate");
    registry
}

/// An effect on `subject`'s output `sub_key`.
pub fn effect_on(
    subject: &str,
    sub_key: &str,
    kind: EffectKind,
    value: Expr,
) -> EffectDefinition {
    EffectDefinition::EntityProperty(EntityPropertyEffect {
        subject: subject.into(),
        bucket: PropertyBucket::Outputs,
        sub_key: sub_key.to_string(),
        value,
        kind,
    })
}

// ===========================================================================
// Sample economies
// ===========================================================================

/// A small village: farms feed workers, workers chop wood, wood buys farms
/// and huts, a sawmill turns wood into planks, and a granary doubles farm
/// output once built.
pub fn village_definitions() -> Vec<EntityDefinition> {
    vec![
        EntityDefinition::builder("food")
            .with_type("resource")
            .starting_quantity(20)
            .quantity_cap(Expr::sum(
                Expr::number(100),
                Expr::product(Expr::number(50), Expr::quantity_of("granary")),
            ))
            .unbuyable()
            .build(),
        EntityDefinition::builder("wood")
            .with_type("resource")
            .starting_quantity(30)
            .quantity_cap(500)
            .unbuyable()
            .build(),
        EntityDefinition::builder("planks")
            .with_type("resource")
            .unbuyable()
            .build(),
        EntityDefinition::builder("farm")
            .with_type("building")
            .starting_quantity(2)
            .cost(
                "wood",
                Expr::sum(
                    Expr::number(10),
                    Expr::product(Expr::number(2), Expr::quantity_of("farm")),
                ),
            )
            .output("food", 3)
            .build(),
        EntityDefinition::builder("worker")
            .with_type("population")
            .starting_quantity(3)
            .cost("food", 10)
            .quantity_cap(Expr::product(Expr::number(2), Expr::quantity_of("hut")))
            .upkeep("food", 1)
            .output("wood", 2)
            .build(),
        EntityDefinition::builder("hut")
            .with_type("building")
            .starting_quantity(2)
            .cost("wood", 15)
            .build(),
        EntityDefinition::builder("sawmill")
            .with_type("building")
            .cost("wood", 40)
            .requirement("hut", 3)
            .input("wood", 4)
            .output("planks", 1)
            .build(),
        EntityDefinition::builder("granary")
            .with_type("building")
            .cost("planks", 5)
            .modifier(
                ModifierDefinition::new("granary_bonus", StateMatcher::Always).affecting(
                    "farm",
                    PropertyBucket::Outputs,
                    "food",
                    EffectKind::Multiply,
                    2,
                ),
            )
            .build(),
    ]
}

pub fn village_config() -> GameConfiguration {
    GameConfiguration::from_entities(village_definitions()).expect("village config is valid")
}

pub fn village_engine() -> Engine {
    Engine::new(village_config()).expect("village engine builds")
}

/// `n` independent producer chains, each `ore -> smelter -> bar`, for
/// benchmarks.
pub fn chain_definitions(n: usize) -> Vec<EntityDefinition> {
    let mut defs = Vec::with_capacity(n * 4);
    for i in 0..n {
        let ore = format!("ore{i}");
        let bar = format!("bar{i}");
        defs.push(EntityDefinition::builder(format!("mine{i}"))
            .starting_quantity(5)
            .output(ore.as_str(), 2)
            .build());
        defs.push(EntityDefinition::builder(ore.as_str()).build());
        defs.push(EntityDefinition::builder(format!("smelter{i}"))
            .starting_quantity(3)
            .input(ore.as_str(), 3)
            .output(bar.as_str(), 1)
            .build());
        defs.push(EntityDefinition::builder(bar.as_str()).build());
    }
    defs
}

pub fn chain_engine(n: usize, strategy: SimulationStrategy) -> Engine {
    let config = GameConfiguration::from_entities(chain_definitions(n)).expect("chain config");
    Engine::with_strategy(config, strategy).expect("chain engine builds")
}
