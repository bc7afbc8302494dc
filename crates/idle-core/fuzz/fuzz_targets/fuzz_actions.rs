#![no_main]
use arbitrary::Arbitrary;
use idle_core::number::BigNumber;
use idle_core::test_utils::*;
use libfuzzer_sys::fuzz_target;

const KEYS: [&str; 8] = [
    "food", "wood", "planks", "farm", "worker", "hut", "sawmill", "granary",
];

/// A player action against the village economy.
#[derive(Arbitrary, Debug)]
enum FuzzOp {
    Step,
    Advance { ticks: u8 },
    Buy { entity: u8, quantity: i16, all_or_none: bool },
    ChangeQuantity { entity: u8, by: i32 },
    ChangeProgress { entity: u8, by: f32 },
    Pause,
    Resume,
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    ops: Vec<FuzzOp>,
}

fn key(index: u8) -> &'static str {
    KEYS[index as usize % KEYS.len()]
}

fuzz_target!(|input: FuzzInput| {
    let mut engine = village_engine();

    // Limit operations to prevent timeouts.
    let max_ops = input.ops.len().min(200);

    // Rejected actions are fine; panics and negative quantities are not.
    for op in &input.ops[..max_ops] {
        match op {
            FuzzOp::Step => {
                let _ = engine.step();
            }
            FuzzOp::Advance { ticks } => {
                let _ = engine.advance(u64::from(*ticks % 32));
            }
            FuzzOp::Buy { entity, quantity, all_or_none } => {
                let _ = engine.buy(key(*entity), i64::from(*quantity), *all_or_none);
            }
            FuzzOp::ChangeQuantity { entity, by } => {
                let _ = engine.change_quantity(key(*entity), i64::from(*by));
            }
            FuzzOp::ChangeProgress { entity, by } => {
                let _ = engine.change_progress(key(*entity), BigNumber::from_f64(f64::from(*by)));
            }
            FuzzOp::Pause => engine.pause(),
            FuzzOp::Resume => engine.resume(),
        }

        for (_, entity) in engine.registry().iter() {
            assert!(!entity.quantity().is_negative(), "{} went negative", entity.key());
        }
    }
});
