//! Modifiers and the effects they apply to entity properties.
//!
//! A [`ModifierDefinition`] owns a list of [`EffectDefinition`]s and an
//! activation matcher. While active, each effect attaches a
//! [`ModifierEffect`] to every property it resolves to; when the matcher
//! flips back the same effects are detached. The engine performs both
//! between ticks.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::expr::{Expr, PropertyBucket};
use crate::id::{EntityId, ModifierId};
use crate::matcher::StateMatcher;
use crate::number::BigNumber;
use crate::registry::StateView;

/// Subject key meaning "every registered entity".
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Add,
    Subtract,
    Multiply,
}

/// Which entities an effect targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Subject {
    All,
    Entity(String),
}

impl From<String> for Subject {
    fn from(s: String) -> Self {
        if s == WILDCARD {
            Subject::All
        } else {
            Subject::Entity(s)
        }
    }
}

impl From<&str> for Subject {
    fn from(s: &str) -> Self {
        Subject::from(s.to_string())
    }
}

impl From<Subject> for String {
    fn from(s: Subject) -> Self {
        match s {
            Subject::All => WILDCARD.to_string(),
            Subject::Entity(key) => key,
        }
    }
}

/// Where a live property sits: `entity.bucket[sub_key]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyAddress {
    pub entity: EntityId,
    pub bucket: PropertyBucket,
    pub sub_key: String,
}

/// Apply `kind` of `value` to `bucket[sub_key]` on the subject entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPropertyEffect {
    pub subject: Subject,
    pub bucket: PropertyBucket,
    pub sub_key: String,
    pub value: Expr,
    pub kind: EffectKind,
}

impl EntityPropertyEffect {
    /// Resolve the live properties this effect attaches to.
    ///
    /// Only `inputs` and `outputs` are valid targets. A wildcard subject
    /// skips entities lacking the sub-key; a named subject lacking it is an
    /// error.
    pub fn affectable_properties<S: StateView + ?Sized>(
        &self,
        state: &S,
    ) -> Result<Vec<PropertyAddress>, EngineError> {
        if !matches!(self.bucket, PropertyBucket::Inputs | PropertyBucket::Outputs) {
            return Err(EngineError::UnsupportedOperation(format!(
                "modifier effects cannot target the {} bucket",
                self.bucket
            )));
        }
        let address = |key: &str| -> Result<PropertyAddress, EngineError> {
            let entity = state
                .entity_id(key)
                .ok_or_else(|| EngineError::MissingEntity(key.to_string()))?;
            Ok(PropertyAddress {
                entity,
                bucket: self.bucket,
                sub_key: self.sub_key.clone(),
            })
        };
        match &self.subject {
            Subject::Entity(key) => {
                let entity = state.require_entity(key)?;
                if entity.property(self.bucket, &self.sub_key).is_none() {
                    return Err(EngineError::MissingProperty {
                        entity: key.clone(),
                        bucket: self.bucket,
                        sub_key: self.sub_key.clone(),
                    });
                }
                Ok(vec![address(key)?])
            }
            Subject::All => state
                .entities()
                .filter(|e| e.property(self.bucket, &self.sub_key).is_some())
                .map(|e| address(e.key()))
                .collect(),
        }
    }

    pub fn calculate_effect<S: StateView + ?Sized>(
        &self,
        current: BigNumber,
        state: &S,
    ) -> Result<BigNumber, EngineError> {
        let operand = self.value.as_number(state)?;
        Ok(match self.kind {
            EffectKind::Add => current + operand,
            EffectKind::Subtract => current - operand,
            EffectKind::Multiply => current * operand,
        })
    }
}

/// The effect kinds a modifier can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectDefinition {
    EntityProperty(EntityPropertyEffect),
}

impl EffectDefinition {
    pub fn affectable_properties<S: StateView + ?Sized>(
        &self,
        state: &S,
    ) -> Result<Vec<PropertyAddress>, EngineError> {
        match self {
            EffectDefinition::EntityProperty(e) => e.affectable_properties(state),
        }
    }

    pub fn calculate_effect<S: StateView + ?Sized>(
        &self,
        current: BigNumber,
        state: &S,
    ) -> Result<BigNumber, EngineError> {
        match self {
            EffectDefinition::EntityProperty(e) => e.calculate_effect(current, state),
        }
    }
}

/// A named bundle of effects gated by a matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierDefinition {
    pub key: String,
    #[serde(default = "always")]
    pub active_when: StateMatcher,
    #[serde(default)]
    pub effects: Vec<EffectDefinition>,
}

fn always() -> StateMatcher {
    StateMatcher::Always
}

impl ModifierDefinition {
    pub fn new(key: impl Into<String>, active_when: StateMatcher) -> Self {
        Self {
            key: key.into(),
            active_when,
            effects: Vec::new(),
        }
    }

    pub fn with_effect(mut self, effect: EffectDefinition) -> Self {
        self.effects.push(effect);
        self
    }

    /// Shorthand for an effect on another entity's inputs or outputs.
    pub fn affecting(
        self,
        subject: impl Into<Subject>,
        bucket: PropertyBucket,
        sub_key: impl Into<String>,
        kind: EffectKind,
        value: impl Into<Expr>,
    ) -> Self {
        self.with_effect(EffectDefinition::EntityProperty(EntityPropertyEffect {
            subject: subject.into(),
            bucket,
            sub_key: sub_key.into(),
            value: value.into(),
            kind,
        }))
    }
}

/// One applied (modifier, effect) pair, as recorded on a property.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierEffect {
    pub modifier: ModifierId,
    pub effect_index: usize,
    pub effect: Arc<EffectDefinition>,
}

impl ModifierEffect {
    pub fn new(modifier: ModifierId, effect_index: usize, effect: EffectDefinition) -> Self {
        Self {
            modifier,
            effect_index,
            effect: Arc::new(effect),
        }
    }
}
