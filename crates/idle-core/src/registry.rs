use std::collections::{BTreeMap, HashMap};

use slotmap::SlotMap;

use crate::entity::GameEntity;
use crate::error::{ConfigError, EngineError};
use crate::expr::Expr;
use crate::id::EntityId;
use crate::modifier::PropertyAddress;
use crate::property::ModifiableProperty;

/// Read-only access to the live economy. Every expression, matcher and
/// effect evaluates against one of these.
pub trait StateView {
    fn entity(&self, key: &str) -> Option<&GameEntity>;

    fn entity_id(&self, key: &str) -> Option<EntityId>;

    /// All live entities in registration order.
    fn entities(&self) -> Box<dyn Iterator<Item = &GameEntity> + '_>;

    fn require_entity(&self, key: &str) -> Result<&GameEntity, EngineError> {
        self.entity(key)
            .ok_or_else(|| EngineError::MissingEntity(key.to_string()))
    }
}

/// Owns every live [`GameEntity`], addressable by [`EntityId`] or by key.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: SlotMap<EntityId, GameEntity>,
    by_key: HashMap<String, EntityId>,
    order: Vec<EntityId>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity. Keys must be unique.
    pub fn insert(&mut self, entity: GameEntity) -> Result<EntityId, ConfigError> {
        let key = entity.key().to_string();
        if self.by_key.contains_key(&key) {
            return Err(ConfigError::DuplicateEntityKey(key));
        }
        let id = self.entities.insert(entity);
        self.by_key.insert(key, id);
        self.order.push(id);
        Ok(id)
    }

    pub fn get(&self, id: EntityId) -> Option<&GameEntity> {
        self.entities.get(id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut GameEntity> {
        self.entities.get_mut(id)
    }

    pub fn id_of(&self, key: &str) -> Option<EntityId> {
        self.by_key.get(key).copied()
    }

    pub fn require_id(&self, key: &str) -> Result<EntityId, EngineError> {
        self.id_of(key)
            .ok_or_else(|| EngineError::MissingEntity(key.to_string()))
    }

    /// Entity ids in registration order.
    pub fn ids(&self) -> &[EntityId] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &GameEntity)> + '_ {
        self.order.iter().map(|&id| (id, &self.entities[id]))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn property(&self, address: &PropertyAddress) -> Option<&ModifiableProperty> {
        self.entities
            .get(address.entity)?
            .property(address.bucket, &address.sub_key)
    }

    /// Write back a property previously cloned out with [`property`](Self::property).
    pub fn replace_property(&mut self, address: &PropertyAddress, property: ModifiableProperty) {
        if let Some(entity) = self.entities.get_mut(address.entity) {
            entity.replace_property(address.bucket, &address.sub_key, property);
        }
    }

    /// Re-evaluate every entity's properties against the current state.
    ///
    /// All tables are computed before any is written, so each entity sees
    /// the same snapshot. Applied modifier effects are preserved.
    pub fn rebuild_properties(
        &mut self,
        universal: &BTreeMap<String, Expr>,
    ) -> Result<(), EngineError> {
        let mut tables = Vec::with_capacity(self.order.len());
        for &id in &self.order {
            tables.push((id, self.entities[id].evaluate_properties(universal, self)?));
        }
        for (id, table) in tables {
            if let Some(entity) = self.entities.get_mut(id) {
                entity.set_properties(table);
            }
        }
        Ok(())
    }
}

impl StateView for EntityRegistry {
    fn entity(&self, key: &str) -> Option<&GameEntity> {
        self.by_key.get(key).and_then(|&id| self.entities.get(id))
    }

    fn entity_id(&self, key: &str) -> Option<EntityId> {
        self.id_of(key)
    }

    fn entities(&self) -> Box<dyn Iterator<Item = &GameEntity> + '_> {
        Box::new(self.order.iter().map(|&id| &self.entities[id]))
    }
}
