//! Grammars shared by the integration tests.

#![allow(dead_code)]

use grove::grammar::{CharSet, ExprId, Grammar, GrammarBuilder, Group};

fn token(b: &mut GrammarBuilder, text: &str) -> ExprId {
    let literal = b.literal(text);
    b.token(literal)
}

fn binary(b: &mut GrammarBuilder, name: &str, expr: ExprId, op: &str) -> ExprId {
    let op = token(b, op);
    let seq = b.sequence([expr, op, expr]);
    b.capture(name, seq)
}

/// Arithmetic over integers with whitespace, parentheses, prefix minus,
/// right-associative `^` and left-associative `* / + -`.
pub fn arithmetic() -> Grammar {
    arithmetic_with(|_, root| root)
}

/// [`arithmetic`] with the root replaced by `wrap(root)`.
pub fn arithmetic_with(wrap: impl FnOnce(&mut GrammarBuilder, ExprId) -> ExprId) -> Grammar {
    let mut b = GrammarBuilder::new();
    let space = b.char_set(CharSet::one_of(" \t\n"));
    let ws = b.zero_or_more(space);

    let digit = b.char_range('0', '9');
    let digits = b.one_or_more(digit);
    let number = b.token(digits);
    b.name(number, "number");
    let number = b.capture("num", number);

    let expr = b.reference("Expr");
    let open = token(&mut b, "(");
    let close = token(&mut b, ")");
    let inner = b.floor(expr, i32::MIN);
    let paren = b.sequence([open, inner, close]);

    let minus = token(&mut b, "-");
    let neg = b.sequence([minus, expr]);
    let neg = b.capture("neg", neg);

    let pow = binary(&mut b, "pow", expr, "^");
    let mul = binary(&mut b, "mul", expr, "*");
    let div = binary(&mut b, "div", expr, "/");
    let add = binary(&mut b, "add", expr, "+");
    let sub = binary(&mut b, "sub", expr, "-");

    let cluster = b.cluster([
        Group::new(5, [number, paren]),
        Group::new(4, [neg]),
        Group::right(3, [pow]),
        Group::left(2, [mul, div]),
        Group::left(1, [add, sub]),
    ]);
    let root = b.sequence([ws, cluster]);
    let root = wrap(&mut b, root);
    b.rule("Expr", cluster).whitespace(ws).root(root);
    b.build().expect("arithmetic grammar is valid")
}

/// `A = A "a" / "a"`, each application captured as `A`.
pub fn left_recursive_a() -> Grammar {
    let mut b = GrammarBuilder::new();
    let a = b.literal("a");
    let rec = b.reference("A");
    let grow = b.sequence([rec, a]);
    let grow = b.capture("A", grow);
    let leaf = b.capture("a", a);
    let body = b.choice([grow, leaf]);
    b.rule("A", body).root(body);
    b.build().expect("left-recursive grammar is valid")
}

/// `E = E "-" E / num` as a simple left-recursive rule.
pub fn subtraction(left_assoc: bool) -> Grammar {
    let mut b = GrammarBuilder::new();
    let digit = b.char_range('0', '9');
    let number = b.capture("num", digit);
    let rec = b.reference("E");
    let minus = b.literal("-");
    let sub = b.sequence([rec, minus, rec]);
    let sub = b.capture("sub", sub);
    let body = b.choice([sub, number]);
    let rule = b.left_recursive(body, left_assoc);
    b.rule("E", rule).root(rule);
    b.build().expect("subtraction grammar is valid")
}
