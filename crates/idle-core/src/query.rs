//! Read-only query API for inspecting simulation state.
//!
//! Provides snapshot types that aggregate engine state into convenient views
//! for display binding. All types are owned copies -- no references into
//! internal engine storage.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::entity::GameEntity;
use crate::error::EngineError;
use crate::expr::PropertyBucket;
use crate::id::EntityId;
use crate::number::BigNumber;
use crate::registry::StateView;

// ---------------------------------------------------------------------------
// Entity snapshot
// ---------------------------------------------------------------------------

/// An aggregated, read-only view of a single entity.
///
/// Matchers are evaluated at capture time, so the flags reflect the state the
/// snapshot was taken from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySnapshot {
    /// The entity's id in the registry.
    pub id: EntityId,
    pub key: String,
    pub name: String,
    /// Type tags, sorted.
    pub types: Vec<String>,
    pub quantity: BigNumber,
    /// Progress toward the next unit as a 0..1 fraction.
    pub progress: BigNumber,
    /// Net change over the last tick.
    pub quantity_change_per_tick: BigNumber,
    pub cap: Option<BigNumber>,
    pub hidden: bool,
    pub disabled: bool,
    pub available: bool,
    /// Calculated property values, per bucket then counterpart key.
    pub properties: BTreeMap<PropertyBucket, BTreeMap<String, BigNumber>>,
}

impl EntitySnapshot {
    pub fn capture<S: StateView + ?Sized>(
        id: EntityId,
        entity: &GameEntity,
        state: &S,
    ) -> Result<Self, EngineError> {
        let properties = entity
            .properties()
            .iter()
            .map(|(bucket, props)| {
                let values = props
                    .iter()
                    .map(|(key, prop)| (key.clone(), prop.value()))
                    .collect();
                (*bucket, values)
            })
            .collect();

        Ok(Self {
            id,
            key: entity.key().to_string(),
            name: entity.name().to_string(),
            types: entity.definition().types.iter().cloned().collect(),
            quantity: entity.quantity(),
            progress: entity.progress(),
            quantity_change_per_tick: entity.quantity_change_per_tick(),
            cap: entity.cap(state)?,
            hidden: entity.is_hidden(state)?,
            disabled: entity.is_disabled(state)?,
            available: entity.is_available(state)?,
            properties,
        })
    }

    /// Value of one calculated property, if the entity has it.
    pub fn property(&self, bucket: PropertyBucket, sub_key: &str) -> Option<BigNumber> {
        self.properties.get(&bucket)?.get(sub_key).copied()
    }
}
