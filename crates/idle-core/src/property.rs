use std::hash::{Hash, Hasher};

use crate::error::EngineError;
use crate::modifier::ModifierEffect;
use crate::number::BigNumber;
use crate::registry::StateView;

/// A number made of a base value and an ordered chain of modifier effects.
///
/// The cached value is always `base` folded left to right through every
/// applied effect; it is recomputed on every add or remove, so readers never
/// see a stale value. Equality and hashing look at the base and the effect
/// chain, never at the cached value.
#[derive(Debug, Clone)]
pub struct ModifiableProperty {
    name: String,
    base: BigNumber,
    applied: Vec<ModifierEffect>,
    calculated: BigNumber,
}

impl ModifiableProperty {
    pub fn new(name: impl Into<String>, base: BigNumber) -> Self {
        Self {
            name: name.into(),
            base,
            applied: Vec::new(),
            calculated: base,
        }
    }

    pub fn with_effects<S: StateView + ?Sized>(
        name: impl Into<String>,
        base: BigNumber,
        effects: Vec<ModifierEffect>,
        state: &S,
    ) -> Result<Self, EngineError> {
        let mut prop = Self {
            name: name.into(),
            base,
            applied: effects,
            calculated: base,
        };
        prop.recalculate(state)?;
        Ok(prop)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> BigNumber {
        self.base
    }

    pub fn value(&self) -> BigNumber {
        self.calculated
    }

    pub fn applied_effects(&self) -> &[ModifierEffect] {
        &self.applied
    }

    /// Append an effect and recompute. On failure the property is unchanged.
    pub fn add_effect<S: StateView + ?Sized>(
        &mut self,
        effect: ModifierEffect,
        state: &S,
    ) -> Result<(), EngineError> {
        self.applied.push(effect);
        if let Err(e) = self.recalculate(state) {
            self.applied.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Remove the first structurally equal effect and recompute. Returns
    /// whether anything was removed; removing an absent effect is a no-op.
    pub fn remove_effect<S: StateView + ?Sized>(
        &mut self,
        effect: &ModifierEffect,
        state: &S,
    ) -> Result<bool, EngineError> {
        let Some(pos) = self.applied.iter().position(|e| e == effect) else {
            return Ok(false);
        };
        self.applied.remove(pos);
        self.recalculate(state)?;
        Ok(true)
    }

    /// Replace the base and re-fold the chain.
    pub fn rebase<S: StateView + ?Sized>(
        &mut self,
        base: BigNumber,
        state: &S,
    ) -> Result<(), EngineError> {
        self.base = base;
        self.recalculate(state)
    }

    /// Re-fold the chain against current state. Needed when an effect's
    /// operand references another entity whose quantity has moved.
    pub fn recalculate<S: StateView + ?Sized>(&mut self, state: &S) -> Result<(), EngineError> {
        let mut value = self.base;
        for applied in &self.applied {
            value = applied.effect.calculate_effect(value, state)?;
        }
        self.calculated = value;
        Ok(())
    }

    /// Compare calculated values; NaN is never equal.
    pub fn value_equals(&self, other: BigNumber) -> bool {
        self.calculated == other
    }

    pub fn value_cmp(&self, other: BigNumber) -> Option<std::cmp::Ordering> {
        self.calculated.partial_cmp(&other)
    }
}

impl PartialEq for ModifiableProperty {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base && self.applied == other.applied
    }
}

impl Hash for ModifiableProperty {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.base.hash(state);
        for applied in &self.applied {
            applied.modifier.hash(state);
            applied.effect_index.hash(state);
        }
    }
}

impl std::fmt::Display for ModifiableProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Property({}) x {}", self.name, self.calculated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use crate::id::ModifierId;
    use crate::modifier::{EffectKind, ModifierEffect};
    use crate::registry::EntityRegistry;
    use crate::test_utils::{effect_on, num};

    fn effect(id: u32, kind: EffectKind, value: f64) -> ModifierEffect {
        ModifierEffect::new(ModifierId(id), 0, effect_on("*", "food", kind, Expr::number(value)))
    }

    #[test]
    fn value_is_base_without_effects() {
        let prop = ModifiableProperty::new("food", num(3.0));
        assert_eq!(prop.value(), num(3.0));
        assert_eq!(prop.to_string(), "Property(food) x 3");
    }

    #[test]
    fn effects_fold_in_order() {
        let state = EntityRegistry::default();
        let add = effect(0, EffectKind::Add, 2.0);
        let mul = effect(1, EffectKind::Multiply, 3.0);

        let mut prop = ModifiableProperty::new("food", num(1.0));
        prop.add_effect(add.clone(), &state).unwrap();
        prop.add_effect(mul.clone(), &state).unwrap();
        assert_eq!(prop.value(), num(9.0));

        let mut reversed = ModifiableProperty::new("food", num(1.0));
        reversed.add_effect(mul, &state).unwrap();
        reversed.add_effect(add.clone(), &state).unwrap();
        assert_eq!(reversed.value(), num(5.0));

        assert!(prop.remove_effect(&add, &state).unwrap());
        assert_eq!(prop.value(), num(3.0));
    }

    #[test]
    fn removing_absent_effect_is_noop() {
        let state = EntityRegistry::default();
        let mut prop = ModifiableProperty::new("food", num(4.0));
        let removed = prop
            .remove_effect(&effect(7, EffectKind::Subtract, 1.0), &state)
            .unwrap();
        assert!(!removed);
        assert_eq!(prop.value(), num(4.0));
    }

    #[test]
    fn equality_ignores_calculated_value() {
        let state = EntityRegistry::default();
        let a = ModifiableProperty::new("a", num(2.0));
        let b = ModifiableProperty::with_effects(
            "b",
            num(2.0),
            vec![effect(0, EffectKind::Add, 0.0)],
            &state,
        )
        .unwrap();
        assert_eq!(a.value(), b.value());
        assert_ne!(a, b);
        assert_eq!(a, ModifiableProperty::new("a", num(2.0)));
    }

    #[test]
    fn failed_add_leaves_property_unchanged() {
        let state = EntityRegistry::default();
        let bad = ModifierEffect::new(
            ModifierId(0),
            0,
            effect_on("*", "food", EffectKind::Add, Expr::quantity_of("ghost")),
        );
        let mut prop = ModifiableProperty::new("food", num(1.0));
        assert!(prop.add_effect(bad, &state).is_err());
        assert!(prop.applied_effects().is_empty());
        assert_eq!(prop.value(), num(1.0));
    }

    #[test]
    fn named_comparisons() {
        let prop = ModifiableProperty::new("food", num(2.0));
        assert!(prop.value_equals(num(2.0)));
        assert_eq!(prop.value_cmp(num(3.0)), Some(std::cmp::Ordering::Less));
    }
}
