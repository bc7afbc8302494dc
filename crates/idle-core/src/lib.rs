//! Idle Core -- the simulation engine for idle and incremental games.
//!
//! This crate provides arbitrary-magnitude numbers, a lazily-evaluated
//! expression layer, modifier-augmented properties, state matchers, and the
//! tick-driven economy of typed entities that every idle game built on it
//! depends on.
//!
//! # Tick Pipeline
//!
//! Each call to [`engine::Engine::step`] advances the economy by one tick
//! through the following phases:
//!
//! 1. **Modifiers** -- Attach or detach modifiers whose activation flipped.
//! 2. **Plan** -- Every entity plans production, consumption and upkeep
//!    against the pre-tick state. Hooks adjust planned amounts.
//! 3. **Apply** -- All plans are applied together; quantities are clamped to
//!    `[0, cap]` using caps evaluated before the tick.
//! 4. **Refresh** -- Calculated quantities and property values are
//!    re-evaluated against the new state.
//! 5. **Post-tick** -- Buffered events are delivered to listeners.
//! 6. **Bookkeeping** -- Increment tick counter and compute the state hash.
//!
//! # Explicit State
//!
//! Nothing holds a back-reference to the engine. Expressions, matchers and
//! effects take the state they read as a [`registry::StateView`]:
//!
//! ```rust,ignore
//! let rate = Expr::product(Expr::number(2), Expr::quantity_of("worker"));
//! let value = rate.as_number(engine.registry())?;
//! ```
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- Owns the economy and runs the tick pipeline.
//! - [`config::GameConfiguration`] -- Validated definitions, modifiers, hooks.
//! - [`definition::EntityDefinition`] -- Immutable per-kind configuration,
//!   built with [`definition::EntityDefinitionBuilder`].
//! - [`entity::GameEntity`] -- Live quantity, progress and properties.
//! - [`expr::Expr`] -- Expression tree over entity state.
//! - [`matcher::StateMatcher`] -- Boolean conditions over entity state.
//! - [`property::ModifiableProperty`] -- Base value folded through effects.
//! - [`number::BigNumber`] -- Mantissa/exponent number with a NaN sentinel.
//! - [`event::EventBus`] -- Buffered typed events with passive listeners.
//! - [`hook::HookRegistry`] -- Synchronous production/consumption hooks.

pub mod config;
pub mod definition;
pub mod engine;
pub mod entity;
pub mod error;
pub mod event;
pub mod expr;
pub mod hook;
pub mod id;
pub mod matcher;
pub mod modifier;
pub mod number;
pub mod property;
pub mod query;
pub mod registry;
pub mod sim;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
