//! Synchronous interception points inside tick resolution.
//!
//! A hook is selected by an action plus an actor (the entity doing the work)
//! and a subject (the entity being produced or consumed); either side may be
//! the wildcard `"*"`. Matching hooks run in registration order, each
//! receiving the amount returned by the previous one.

use std::fmt;

use crate::id::HookId;
use crate::modifier::WILDCARD;
use crate::number::{BigNumber, Ticks};

/// Where in the tick a hook fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookAction {
    /// Before an output amount is added to its target.
    WillProduce,
    /// Before an input amount is removed from its source.
    WillConsume,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HookSelector {
    pub action: HookAction,
    pub actor: String,
    pub subject: String,
}

impl HookSelector {
    pub fn matches(&self, action: HookAction, actor: &str, subject: &str) -> bool {
        self.action == action
            && (self.actor == WILDCARD || self.actor == actor)
            && (self.subject == WILDCARD || self.subject == subject)
    }
}

/// What a hook sees. Owned so hooks can keep it.
#[derive(Debug, Clone, PartialEq)]
pub struct HookContext {
    pub actor: String,
    pub subject: String,
    pub actor_quantity: BigNumber,
    pub quantity: BigNumber,
    pub tick: Ticks,
}

/// A hook: selector plus callback from input to output.
pub struct HookDefinition<I, O> {
    pub selector: HookSelector,
    pub function: Box<dyn Fn(&I) -> O>,
}

impl<I, O> fmt::Debug for HookDefinition<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookDefinition")
            .field("selector", &self.selector)
            .field("function", &"<fn>")
            .finish()
    }
}

/// The hooks the engine calls: given the context, return the amount to use.
pub type EngineHook = HookDefinition<HookContext, BigNumber>;

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Flat builder for production hooks.
///
/// ```rust,ignore
/// let hook = HookBuilder::new()
///     .when_entity("farm")
///     .produces("food")
///     .then_execute(|ctx| ctx.quantity * BigNumber::from(2))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct HookBuilder {
    action: HookAction,
    actor: String,
    subject: String,
}

impl Default for HookBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HookBuilder {
    pub fn new() -> Self {
        Self {
            action: HookAction::WillProduce,
            actor: WILDCARD.to_string(),
            subject: WILDCARD.to_string(),
        }
    }

    pub fn when_entity(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn when_any_entity(mut self) -> Self {
        self.actor = WILDCARD.to_string();
        self
    }

    pub fn produces(mut self, subject: impl Into<String>) -> Self {
        self.action = HookAction::WillProduce;
        self.subject = subject.into();
        self
    }

    pub fn produces_any(mut self) -> Self {
        self.action = HookAction::WillProduce;
        self.subject = WILDCARD.to_string();
        self
    }

    pub fn consumes(mut self, subject: impl Into<String>) -> Self {
        self.action = HookAction::WillConsume;
        self.subject = subject.into();
        self
    }

    pub fn consumes_any(mut self) -> Self {
        self.action = HookAction::WillConsume;
        self.subject = WILDCARD.to_string();
        self
    }

    pub fn then_execute<F>(self, function: F) -> HookBuilderWithFunction
    where
        F: Fn(&HookContext) -> BigNumber + 'static,
    {
        HookBuilderWithFunction {
            selector: HookSelector {
                action: self.action,
                actor: self.actor,
                subject: self.subject,
            },
            function: Box::new(function),
        }
    }
}

/// A [`HookBuilder`] that has its callback and can be built.
pub struct HookBuilderWithFunction {
    selector: HookSelector,
    function: Box<dyn Fn(&HookContext) -> BigNumber>,
}

impl HookBuilderWithFunction {
    pub fn build(self) -> EngineHook {
        HookDefinition {
            selector: self.selector,
            function: self.function,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Registered hooks in registration order.
#[derive(Debug, Default)]
pub struct HookRegistry {
    hooks: Vec<(HookId, EngineHook)>,
    next_id: u32,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: EngineHook) -> HookId {
        let id = HookId(self.next_id);
        self.next_id += 1;
        self.hooks.push((id, hook));
        id
    }

    /// Returns whether a hook with that id existed.
    pub fn unregister(&mut self, id: HookId) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|(hid, _)| *hid != id);
        self.hooks.len() != before
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Thread `context.quantity` through every matching hook.
    pub fn apply(&self, action: HookAction, mut context: HookContext) -> BigNumber {
        for (_, hook) in &self.hooks {
            if hook.selector.matches(action, &context.actor, &context.subject) {
                context.quantity = (hook.function)(&context);
            }
        }
        context.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(actor: &str, subject: &str, quantity: f64) -> HookContext {
        HookContext {
            actor: actor.into(),
            subject: subject.into(),
            actor_quantity: BigNumber::ONE,
            quantity: BigNumber::from(quantity),
            tick: 0,
        }
    }

    #[test]
    fn builder_defaults_to_wildcards() {
        let hook = HookBuilder::new().then_execute(|c| c.quantity).build();
        assert_eq!(hook.selector.actor, "*");
        assert_eq!(hook.selector.subject, "*");
        assert_eq!(hook.selector.action, HookAction::WillProduce);
    }

    #[test]
    fn selector_filters_by_actor_and_subject() {
        let hook = HookBuilder::new()
            .when_entity("farm")
            .produces("food")
            .then_execute(|c| c.quantity)
            .build();
        assert!(hook.selector.matches(HookAction::WillProduce, "farm", "food"));
        assert!(!hook.selector.matches(HookAction::WillProduce, "mine", "food"));
        assert!(!hook.selector.matches(HookAction::WillProduce, "farm", "wood"));
        assert!(!hook.selector.matches(HookAction::WillConsume, "farm", "food"));
    }

    #[test]
    fn hooks_chain_in_registration_order() {
        let mut hooks = HookRegistry::new();
        hooks.register(
            HookBuilder::new()
                .produces_any()
                .then_execute(|c| c.quantity + BigNumber::ONE)
                .build(),
        );
        hooks.register(
            HookBuilder::new()
                .when_entity("farm")
                .produces("food")
                .then_execute(|c| c.quantity * BigNumber::from(2))
                .build(),
        );
        let out = hooks.apply(HookAction::WillProduce, ctx("farm", "food", 3.0));
        assert_eq!(out, BigNumber::from(8));
        let other = hooks.apply(HookAction::WillProduce, ctx("mine", "ore", 3.0));
        assert_eq!(other, BigNumber::from(4));
        let untouched = hooks.apply(HookAction::WillConsume, ctx("farm", "food", 3.0));
        assert_eq!(untouched, BigNumber::from(3));
    }

    #[test]
    fn unregister_removes_hook() {
        let mut hooks = HookRegistry::new();
        let id = hooks.register(HookBuilder::new().then_execute(|_| BigNumber::ZERO).build());
        assert_eq!(hooks.len(), 1);
        assert!(hooks.unregister(id));
        assert!(!hooks.unregister(id));
        assert!(hooks.is_empty());
    }
}
