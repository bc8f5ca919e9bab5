//! Tests for packrat memoization and cut

mod common;

use grove::grammar::{Grammar, GrammarBuilder};
use grove::parse::{ParseOutcome, Parser, ParserConfig};

fn parse_with(grammar: &Grammar, config: ParserConfig, input: &str) -> ParseOutcome {
    Parser::new(grammar).with_config(config).parse(input).unwrap()
}

fn memo_off() -> ParserConfig {
    ParserConfig {
        enable_memoization: false,
        ..ParserConfig::default()
    }
}

/// `Memo(word) "!" / Memo(word) "?"`
fn shared_prefix() -> Grammar {
    let mut b = GrammarBuilder::new();
    let letter = b.char_range('a', 'z');
    let letters = b.one_or_more(letter);
    let word = b.capture("word", letters);
    let word = b.memo(word);
    let bang = b.literal("!");
    let question = b.literal("?");
    let shout = b.sequence([word, bang]);
    let shout = b.capture("shout", shout);
    let ask = b.sequence([word, question]);
    let ask = b.capture("ask", ask);
    let root = b.choice([shout, ask]);
    b.root(root);
    b.build().unwrap()
}

/// `(Memo(stmt) ";" cut?)*`
fn statements(with_cut: bool) -> Grammar {
    let mut b = GrammarBuilder::new();
    let letter = b.char_range('a', 'z');
    let letters = b.one_or_more(letter);
    let stmt = b.capture("stmt", letters);
    let stmt = b.memo(stmt);
    let semi = b.literal(";");
    let item = if with_cut {
        let cut = b.cut();
        b.sequence([stmt, semi, cut])
    } else {
        b.sequence([stmt, semi])
    };
    let root = b.zero_or_more(item);
    b.root(root);
    b.build().unwrap()
}

#[test]
fn test_memo_hit_replays_subtree() {
    let grammar = shared_prefix();
    let outcome = parse_with(&grammar, ParserConfig::default(), "hello?");

    assert!(outcome.is_success());
    assert_eq!(outcome.render(), "ask(hello)");
    assert_eq!(outcome.memo.hits, 1);
    assert_eq!(outcome.memo.stored, 1);
    assert_eq!(outcome.stats.memo_hits, 1);
}

#[test]
fn test_disabled_memoization_gives_same_tree() {
    let grammar = shared_prefix();
    let memoized = parse_with(&grammar, ParserConfig::default(), "hello?");
    let plain = parse_with(&grammar, memo_off(), "hello?");

    assert_eq!(plain.render(), memoized.render());
    assert_eq!(plain.nodes, memoized.nodes);
    assert_eq!(plain.memo.hits, 0);
    assert_eq!(plain.memo.stored, 0);
}

#[test]
fn test_memoized_failure_reports_same_error() {
    let grammar = shared_prefix();
    let memoized = parse_with(&grammar, ParserConfig::default(), "hello.");
    let plain = parse_with(&grammar, memo_off(), "hello.");

    assert!(!memoized.is_success());
    assert_eq!(memoized.report, plain.report);
    assert_eq!(memoized.report.position, 5);
    assert!(memoized.report.expected.contains(&"\"!\"".to_string()));
    assert!(memoized.report.expected.contains(&"\"?\"".to_string()));
}

#[test]
fn test_memoize_rules_caches_named_expressions() {
    let grammar = common::arithmetic();
    let config = ParserConfig {
        memoize_rules: true,
        ..ParserConfig::default()
    };
    let input = "(1 + 2) * (3 - 4) ^ 2";
    let memoized = parse_with(&grammar, config, input);
    let plain = parse_with(&grammar, memo_off(), input);

    assert!(memoized.is_success());
    assert_eq!(memoized.nodes, plain.nodes);
    assert!(memoized.memo.stored > 0);
}

#[test]
fn test_cut_evicts_entries_behind_it() {
    let with_cut = statements(true);
    let without_cut = statements(false);
    let input = "a;bb;c;";

    let cut = parse_with(&with_cut, ParserConfig::default(), input);
    let kept = parse_with(&without_cut, ParserConfig::default(), input);

    assert!(cut.is_success());
    assert_eq!(cut.render(), "a, bb, c");
    assert_eq!(cut.nodes, kept.nodes);
    assert_eq!(cut.end, kept.end);

    // One entry per statement plus the failed attempt at the end.
    assert_eq!(cut.memo.stored, 4);
    assert_eq!(kept.memo.stored, 4);
    assert_eq!(cut.memo.evictions, 3);
    assert_eq!(kept.memo.evictions, 0);
}

#[test]
fn test_cut_does_not_change_failures() {
    let with_cut = statements(true);
    let without_cut = statements(false);
    let config = ParserConfig::default();

    let cut = parse_with(&with_cut, config.clone(), "a;b;c");
    let kept = parse_with(&without_cut, config, "a;b;c");

    assert!(!cut.is_success());
    assert_eq!(cut.report, kept.report);
    assert_eq!(cut.report.position, 5);
}

#[test]
fn test_bounded_memo_table() {
    let grammar = common::arithmetic();
    let unbounded = ParserConfig {
        memoize_rules: true,
        ..ParserConfig::default()
    };
    let bounded = ParserConfig {
        max_memo_entries: Some(2),
        ..unbounded.clone()
    };
    let input = "1 * (2 + 3) - 4 / (5 - 6)";

    let full = parse_with(&grammar, unbounded, input);
    let small = parse_with(&grammar, bounded, input);

    assert!(small.is_success());
    assert_eq!(small.nodes, full.nodes);
    assert!(small.memo.evictions > 0);
    assert_eq!(full.memo.evictions, 0);
}

/// `guard(Memo("a" "b" "c") "z") Memo("a" "b" "c")`, with the memo node shared.
fn guarded(guard: fn(&mut GrammarBuilder, grove::ExprId) -> grove::ExprId) -> Grammar {
    let mut b = GrammarBuilder::new();
    let a = b.literal("a");
    let bee = b.literal("b");
    let c = b.literal("c");
    let abc = b.sequence([a, bee, c]);
    let abc = b.memo(abc);
    let z = b.literal("z");
    let abcz = b.sequence([abc, z]);
    let guarded = guard(&mut b, abcz);
    let root = b.sequence([guarded, abc]);
    b.root(root);
    b.build().unwrap()
}

#[test]
fn test_entry_from_negative_lookahead_keeps_errors() {
    let grammar = guarded(|b, expr| b.not(expr));
    let plain = parse_with(&grammar, memo_off(), "abx");
    let memoized = parse_with(&grammar, ParserConfig::default(), "abx");

    assert_eq!(plain.report.position, 2);
    assert_eq!(plain.report.expected, ["\"c\""]);
    assert_eq!(memoized.report, plain.report);
    assert_eq!(memoized.memo.hits, 0);
    assert_eq!(memoized.memo.stored, 2);
}

#[test]
fn test_entry_from_token_keeps_leaf_errors() {
    let grammar = guarded(|b, expr| {
        let token = b.token(expr);
        b.optional(token)
    });
    let plain = parse_with(&grammar, memo_off(), "abx");
    let memoized = parse_with(&grammar, ParserConfig::default(), "abx");

    assert_eq!(plain.report.position, 2);
    assert_eq!(plain.report.expected, ["\"c\""]);
    assert_eq!(memoized.report, plain.report);
    assert_eq!(memoized.memo.hits, 0);
}
