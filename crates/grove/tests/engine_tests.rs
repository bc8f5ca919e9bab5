//! Tests for expression evaluation through the public parser API

mod common;

use grove::grammar::{CharSet, Grammar, GrammarBuilder, RepeatKind};
use grove::parse::{ParseEvent, Parser, ParserConfig, TraceLog};
use grove::{GroveError, Source};

#[test]
fn test_choice_takes_first_match() {
    let mut b = GrammarBuilder::new();
    let short = b.literal("a");
    let long = b.literal("ab");
    let choice = b.choice([short, long]);
    let rest = b.zero_or_more(long);
    let root = b.sequence([choice, rest]);
    b.root(root);
    let grammar = b.build().unwrap();
    let parser = Parser::new(&grammar);

    // Ordered choice commits to "a" and never retries "ab".
    assert_eq!(parser.recognize("a").unwrap(), Some(1));
    assert_eq!(parser.recognize("ab").unwrap(), None);
}

fn repeat_parser(grammar: &Grammar) -> Parser<'_> {
    let config = ParserConfig {
        require_full_match: false,
        ..ParserConfig::default()
    };
    Parser::new(grammar).with_config(config)
}

fn repeat_grammar(kind: RepeatKind) -> Grammar {
    let mut b = GrammarBuilder::new();
    let x = b.literal("x");
    let repeat = b.repeat(x, kind);
    b.root(repeat);
    b.build().unwrap()
}

#[test]
fn test_repetition_variants() {
    let many = repeat_grammar(RepeatKind::ZeroOrMore);
    let some = repeat_grammar(RepeatKind::OneOrMore);

    assert_eq!(repeat_parser(&many).recognize("").unwrap(), Some(0));
    assert_eq!(repeat_parser(&many).recognize("xxxy").unwrap(), Some(3));
    assert_eq!(repeat_parser(&some).recognize("").unwrap(), None);
    assert_eq!(repeat_parser(&some).recognize("xy").unwrap(), Some(1));
}

#[test]
fn test_optional_matches_at_most_once() {
    let maybe = repeat_grammar(RepeatKind::Optional);

    assert_eq!(repeat_parser(&maybe).recognize("xx").unwrap(), Some(1));
    assert_eq!(repeat_parser(&maybe).recognize("y").unwrap(), Some(0));
}

#[test]
fn test_lookahead_does_not_consume() {
    let mut b = GrammarBuilder::new();
    let keyword = b.literal("if");
    let letter = b.char_range('a', 'z');
    let letters = b.one_or_more(letter);
    let not_keyword = b.not(keyword);
    let ident = b.sequence([not_keyword, letters]);
    let peek = b.lookahead(letters);
    let root = b.sequence([peek, ident]);
    b.root(root);
    let grammar = b.build().unwrap();
    let parser = Parser::new(&grammar);

    assert_eq!(parser.recognize("name").unwrap(), Some(4));
    assert_eq!(parser.recognize("iffy").unwrap(), None);
}

#[test]
fn test_unicode_char_classes() {
    let mut b = GrammarBuilder::new();
    let greek = b.char_set(CharSet::range('α', 'ω'));
    let word = b.one_or_more(greek);
    let word = b.capture("word", word);
    b.root(word);
    let grammar = b.build().unwrap();

    let outcome = Parser::new(&grammar).parse("λόγος").unwrap();
    // 'ό' is outside the plain α-ω range
    assert!(!outcome.is_success());
    assert_eq!(outcome.report.position, 2);

    let outcome = Parser::new(&grammar).parse("λογ").unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.end, "λογ".len());
}

#[test]
fn test_labels_mark_fields() {
    let mut b = GrammarBuilder::new();
    let letter = b.char_range('a', 'z');
    let name = b.capture("name", letter);
    let digit = b.char_range('0', '9');
    let value = b.capture("value", digit);
    let eq = b.literal("=");
    let key = b.label("key", name);
    let val = b.label("val", value);
    let pair = b.sequence([key, eq, val]);
    let pair = b.capture("pair", pair);
    b.root(pair);
    let grammar = b.build().unwrap();

    let outcome = Parser::new(&grammar).parse("x=4").unwrap();
    let pair = outcome.root().unwrap();
    let source = Source::new("x=4");
    assert_eq!(pair.child_by_label("key").unwrap().text(&source), "x");
    assert_eq!(pair.child_by_label("val").unwrap().text(&source), "4");
}

#[test]
fn test_arithmetic_tree() {
    let grammar = common::arithmetic();
    let parser = Parser::new(&grammar);

    let outcome = parser.parse(" (1 + 2) * -3 ").unwrap();
    assert!(outcome.is_success(), "{}", outcome.render());
    assert_eq!(outcome.render(), "mul(add(1, 2), neg(3))");
}

#[test]
fn test_recognize_rejects_captures() {
    let grammar = common::arithmetic();
    let error = Parser::new(&grammar).recognize("1+2").unwrap_err();
    assert!(matches!(
        error,
        GroveError::UnsupportedOperation {
            operation: "recognition",
            ..
        }
    ));
}

#[test]
fn test_recognize_without_captures() {
    let mut b = GrammarBuilder::new();
    let a = b.literal("a");
    let rec = b.reference("A");
    let grow = b.sequence([rec, a]);
    let body = b.choice([grow, a]);
    b.rule("A", body).root(body);
    let grammar = b.build().unwrap();

    assert_eq!(Parser::new(&grammar).recognize("aaa").unwrap(), Some(3));
}

#[test]
fn test_events_are_balanced() {
    let grammar = common::arithmetic();
    let mut log = TraceLog::default();
    let outcome = Parser::new(&grammar)
        .parse_with_events("1+2", &mut log)
        .unwrap();
    assert!(outcome.is_success());

    let enters = log
        .events()
        .iter()
        .filter(|e| matches!(e, ParseEvent::Enter { .. }))
        .count();
    let exits = log
        .events()
        .iter()
        .filter(|e| matches!(e, ParseEvent::Exit { .. }))
        .count();
    assert_eq!(enters, exits);
    assert_eq!(enters, outcome.stats.expressions_evaluated);
    assert!(
        log.events()
            .iter()
            .any(|e| matches!(e, ParseEvent::SeedGrown { .. }))
    );
    assert!(log.dump(&grammar).contains("seed Expr @0..3"));
}

#[test]
fn test_stats_are_collected() {
    let grammar = common::arithmetic();
    let outcome = Parser::new(&grammar).parse("1*2+3").unwrap();

    assert!(outcome.stats.expressions_evaluated > 0);
    assert!(outcome.stats.seeds_grown >= 3);
    assert!(outcome.stats.max_depth > 1);
    assert_eq!(outcome.stats.memo_hits, 0);
}

#[test]
fn test_rejected_alternatives_count_as_backtracks() {
    let mut b = GrammarBuilder::new();
    let long = b.literal("ab");
    let short = b.literal("a");
    let choice = b.choice([long, short]);
    b.root(choice);
    let grammar = b.build().unwrap();

    let mut log = TraceLog::default();
    let outcome = Parser::new(&grammar)
        .parse_with_events("a", &mut log)
        .unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.stats.backtracks, 1);
    assert!(log.events().contains(&ParseEvent::Backtrack {
        expr: long,
        position: 0
    }));
}
