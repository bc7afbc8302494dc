//! Headless idle game: a village economy driven without any UI.
//!
//! Builds a small economy in code, buys buildings whenever they are
//! affordable, and prints a summary every ten ticks. Set `RUST_LOG=debug`
//! to see modifier flips and rejected purchases.
//!
//! Run with: `cargo run -p idle-core --example headless_idle`

use idle_core::config::GameConfiguration;
use idle_core::definition::EntityDefinition;
use idle_core::engine::Engine;
use idle_core::error::EngineError;
use idle_core::event::{Event, EventKind};
use idle_core::expr::{Expr, PropertyBucket};
use idle_core::hook::HookBuilder;
use idle_core::matcher::StateMatcher;
use idle_core::modifier::{EffectKind, ModifierDefinition};
use idle_core::number::BigNumber;
use tracing_subscriber::EnvFilter;

fn definitions() -> Vec<EntityDefinition> {
    vec![
        EntityDefinition::builder("gold")
            .starting_quantity(50)
            .unbuyable()
            .build(),
        EntityDefinition::builder("miner")
            .starting_quantity(1)
            .cost(
                "gold",
                Expr::sum(
                    Expr::number(15),
                    Expr::product(Expr::number(5), Expr::quantity_of("miner")),
                ),
            )
            .output("gold", 2)
            .build(),
        EntityDefinition::builder("bank")
            .cost("gold", 200)
            .requirement("miner", 5)
            .modifier(
                ModifierDefinition::new("interest", StateMatcher::Always).affecting(
                    "*",
                    PropertyBucket::Outputs,
                    "gold",
                    EffectKind::Multiply,
                    1.5,
                ),
            )
            .build(),
    ]
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Every tenth tick the miners strike a vein.
    let lucky = HookBuilder::new()
        .when_entity("miner")
        .produces("gold")
        .then_execute(|ctx| {
            if ctx.tick % 10 == 9 {
                ctx.quantity * BigNumber::from(3)
            } else {
                ctx.quantity
            }
        })
        .build();

    let config = GameConfiguration::new(
        definitions(),
        Vec::new(),
        vec![lucky],
        Default::default(),
    )?;
    let mut engine = Engine::new(config)?;

    engine.on_event(
        EventKind::EntityBought,
        Box::new(|event| {
            if let Event::EntityBought { quantity, tick, .. } = event {
                println!("  tick {tick}: bought {quantity}");
            }
        }),
    );

    for _ in 0..60 {
        for key in ["bank", "miner"] {
            match engine.buy(key, 1, true) {
                Ok(_) | Err(EngineError::RequirementsNotMet(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        engine.step()?;

        if engine.tick() % 10 == 0 {
            println!(
                "tick {:>3}  gold {:>10}  miners {:>3}  banks {:>2}  (+{}/tick)",
                engine.tick(),
                engine.quantity("gold")?.floor(),
                engine.quantity("miner")?,
                engine.quantity("bank")?,
                engine.entity("gold")?.quantity_change_per_tick(),
            );
        }
    }

    println!("final state hash: {:#018x}", engine.state_hash());
    Ok(())
}
