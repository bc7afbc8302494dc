use crate::expr::PropertyBucket;

/// Errors raised while evaluating expressions or mutating the live economy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("entity {0} does not exist")]
    MissingEntity(String),
    #[error("entity {entity} has no {bucket} property {sub_key:?}")]
    MissingProperty {
        entity: String,
        bucket: PropertyBucket,
        sub_key: String,
    },
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    #[error("entity {0} cannot be bought")]
    NotBuyable(String),
    #[error("requirements for {0} are not met")]
    RequirementsNotMet(String),
}

/// Errors raised while validating a [`GameConfiguration`](crate::config::GameConfiguration).
/// Any of these is fatal: no engine is produced.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("duplicate entity key: {0}")]
    DuplicateEntityKey(String),
    #[error("entity key must not be empty")]
    EmptyEntityKey,
    #[error("duplicate modifier key: {0}")]
    DuplicateModifierKey(String),
    #[error("entity {entity} references unknown entity {referenced}")]
    UnknownEntityReference { entity: String, referenced: String },
    #[error("entity {0} has a negative starting quantity")]
    NegativeStartingQuantity(String),
    #[error("property depends on itself: {0}")]
    CyclicReference(String),
    #[error("failed to evaluate initial properties: {0}")]
    Evaluation(#[from] EngineError),
}
