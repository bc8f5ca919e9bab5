#![no_main]
use grove::{Parser, ParserConfig};
use libfuzzer_sys::fuzz_target;

#[path = "../../crates/grove/tests/common/mod.rs"]
mod common;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let grammar = common::arithmetic();

    let memoize_rules = ParserConfig {
        memoize_rules: true,
        ..ParserConfig::default()
    };
    let memo_off = ParserConfig {
        enable_memoization: false,
        ..ParserConfig::default()
    };
    let Ok(memoized) = Parser::new(&grammar).with_config(memoize_rules).parse(input) else {
        return;
    };
    let Ok(plain) = Parser::new(&grammar).with_config(memo_off).parse(input) else {
        return;
    };

    // Memoization must never change the outcome
    assert_eq!(memoized.matched, plain.matched);
    assert_eq!(memoized.end, plain.end);
    assert_eq!(memoized.nodes, plain.nodes);
    assert_eq!(memoized.report, plain.report);
});
