use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::definition::EntityDefinition;
use crate::error::ConfigError;
use crate::expr::{Expr, PropertyBucket};
use crate::hook::EngineHook;
use crate::modifier::{EffectDefinition, ModifierDefinition, Subject};

/// A validated set of definitions ready to start an engine.
///
/// Validation runs once, in [`GameConfiguration::new`]; an invalid
/// configuration is never constructed.
#[derive(Debug)]
pub struct GameConfiguration {
    entities: Vec<Arc<EntityDefinition>>,
    modifiers: Vec<ModifierDefinition>,
    hooks: Vec<EngineHook>,
    universal_custom_properties: BTreeMap<String, Expr>,
}

impl GameConfiguration {
    pub fn new(
        entities: Vec<EntityDefinition>,
        modifiers: Vec<ModifierDefinition>,
        hooks: Vec<EngineHook>,
        universal_custom_properties: BTreeMap<String, Expr>,
    ) -> Result<Self, ConfigError> {
        let mut keys = HashSet::with_capacity(entities.len());
        for def in &entities {
            if def.key.is_empty() {
                return Err(ConfigError::EmptyEntityKey);
            }
            if !keys.insert(def.key.as_str()) {
                return Err(ConfigError::DuplicateEntityKey(def.key.clone()));
            }
            if def.starting_quantity.is_negative() || def.starting_quantity.is_nan() {
                return Err(ConfigError::NegativeStartingQuantity(def.key.clone()));
            }
        }

        for def in &entities {
            if let Some(missing) = def.referenced_entities().into_iter().find(|r| !keys.contains(r)) {
                return Err(ConfigError::UnknownEntityReference {
                    entity: def.key.clone(),
                    referenced: missing.to_string(),
                });
            }
        }

        if let Some(cycle) = find_property_cycle(&entities) {
            return Err(ConfigError::CyclicReference(cycle));
        }

        let mut modifier_keys = HashSet::new();
        let attached = entities.iter().flat_map(|def| def.modifiers.iter());
        for modifier in modifiers.iter().chain(attached) {
            if !modifier_keys.insert(modifier.key.as_str()) {
                return Err(ConfigError::DuplicateModifierKey(modifier.key.clone()));
            }
            if let Some(missing) = modifier_references(modifier).into_iter().find(|r| !keys.contains(r)) {
                return Err(ConfigError::UnknownEntityReference {
                    entity: modifier.key.clone(),
                    referenced: missing.to_string(),
                });
            }
        }

        for expr in universal_custom_properties.values() {
            if let Some(missing) = expr.referenced_entities().into_iter().find(|r| !keys.contains(r)) {
                return Err(ConfigError::UnknownEntityReference {
                    entity: "*".to_string(),
                    referenced: missing.to_string(),
                });
            }
        }

        tracing::debug!(
            entities = entities.len(),
            modifiers = modifier_keys.len(),
            hooks = hooks.len(),
            "configuration validated"
        );

        Ok(Self {
            entities: entities.into_iter().map(Arc::new).collect(),
            modifiers,
            hooks,
            universal_custom_properties,
        })
    }

    /// A configuration with entities only.
    pub fn from_entities(entities: Vec<EntityDefinition>) -> Result<Self, ConfigError> {
        Self::new(entities, Vec::new(), Vec::new(), BTreeMap::new())
    }

    pub fn entities(&self) -> &[Arc<EntityDefinition>] {
        &self.entities
    }

    pub fn entity(&self, key: &str) -> Option<&EntityDefinition> {
        self.entities.iter().find(|d| d.key == key).map(|d| d.as_ref())
    }

    pub fn modifiers(&self) -> &[ModifierDefinition] {
        &self.modifiers
    }

    pub fn hooks(&self) -> &[EngineHook] {
        &self.hooks
    }

    pub fn universal_custom_properties(&self) -> &BTreeMap<String, Expr> {
        &self.universal_custom_properties
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Vec<Arc<EntityDefinition>>,
        Vec<ModifierDefinition>,
        Vec<EngineHook>,
        BTreeMap<String, Expr>,
    ) {
        (
            self.entities,
            self.modifiers,
            self.hooks,
            self.universal_custom_properties,
        )
    }
}

/// One map-bucket property: `entity.bucket[sub_key]`.
type PropertyNode<'a> = (&'a str, PropertyBucket, &'a str);

/// Depth-first walk over the references between map-bucket property
/// expressions. Returns the first loop found, rendered as a path.
fn find_property_cycle(entities: &[EntityDefinition]) -> Option<String> {
    let by_key: HashMap<&str, &EntityDefinition> =
        entities.iter().map(|def| (def.key.as_str(), def)).collect();
    let mut finished = HashSet::new();
    let mut path = Vec::new();
    for def in entities {
        for bucket in PropertyBucket::MAPS {
            for sub_key in def.bucket(bucket).into_iter().flat_map(|map| map.keys()) {
                let node = (def.key.as_str(), bucket, sub_key.as_str());
                if let Some(cycle) = visit_property(node, &by_key, &mut finished, &mut path) {
                    return Some(cycle);
                }
            }
        }
    }
    None
}

fn visit_property<'a>(
    node: PropertyNode<'a>,
    by_key: &HashMap<&'a str, &'a EntityDefinition>,
    finished: &mut HashSet<PropertyNode<'a>>,
    path: &mut Vec<PropertyNode<'a>>,
) -> Option<String> {
    if finished.contains(&node) {
        return None;
    }
    if let Some(start) = path.iter().position(|seen| *seen == node) {
        let looped: Vec<String> = path[start..]
            .iter()
            .chain(std::iter::once(&node))
            .map(|(entity, bucket, sub_key)| format!("{entity}.{bucket}[{sub_key}]"))
            .collect();
        return Some(looped.join(" -> "));
    }
    let expr = by_key
        .get(node.0)
        .and_then(|def| def.expression(node.1, node.2));
    if let Some(expr) = expr {
        path.push(node);
        for reference in expr.property_references() {
            if !reference.bucket.is_map() {
                continue;
            }
            let next = (reference.entity.as_str(), reference.bucket, reference.sub_key.as_str());
            if let Some(cycle) = visit_property(next, by_key, finished, path) {
                return Some(cycle);
            }
        }
        path.pop();
    }
    finished.insert(node);
    None
}

fn modifier_references(modifier: &ModifierDefinition) -> Vec<&str> {
    let mut refs = modifier.active_when.referenced_entities();
    for effect in &modifier.effects {
        match effect {
            EffectDefinition::EntityProperty(e) => {
                if let Subject::Entity(key) = &e.subject {
                    refs.push(key);
                }
                refs.push(&e.sub_key);
                refs.extend(e.value.referenced_entities());
            }
        }
    }
    refs
}
