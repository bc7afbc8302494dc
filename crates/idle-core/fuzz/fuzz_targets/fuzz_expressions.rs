#![no_main]
use idle_core::expr::Expr;
use idle_core::test_utils::*;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary JSON expression trees evaluated against a live economy.
    // Returning Err is fine; panicking is not.
    let Ok(expr) = serde_json::from_slice::<Expr>(data) else {
        return;
    };
    let engine = village_engine();
    let _ = engine.evaluate(&expr);
    let _ = expr.as_boolean(&engine);
    let _ = expr.as_string(&engine);
    let _ = expr.as_container(&engine);
});
