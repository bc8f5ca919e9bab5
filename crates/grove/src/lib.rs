//! # Grove
//!
//! A packrat parsing-expression-grammar engine with native support for left
//! recursion and operator precedence.
//!
//! ## Overview
//!
//! - **Grammar graphs**: grammars are arenas of typed expressions addressed by
//!   stable [`ExprId`] handles; cycles are allowed and references are resolved
//!   while building
//! - **Packrat memoization**: memo keys cover the expression, the position and
//!   every custom state, so cached results are always safe to replay
//! - **Left recursion**: left-recursive rules are detected ahead of time and
//!   parsed by seed growing, with precedence clusters for operator grammars
//! - **Transactional custom state**: extensions plug per-parse state into the
//!   engine through a snapshot/commit/restore/uncommit protocol
//! - **Farthest-failure diagnostics**: failures report what was expected at the
//!   farthest position reached, with a caret-marked source snippet
//!
//! ## Quick Start
//!
//! ```rust
//! use grove::grammar::{GrammarBuilder, Group};
//! use grove::Parser;
//!
//! let mut b = GrammarBuilder::new();
//! let digit = b.char_range('0', '9');
//! let digits = b.one_or_more(digit);
//! let number = b.capture("num", digits);
//!
//! let expr = b.reference("Expr");
//! let plus = b.literal("+");
//! let star = b.literal("*");
//! let add = b.sequence([expr, plus, expr]);
//! let add = b.capture("add", add);
//! let mul = b.sequence([expr, star, expr]);
//! let mul = b.capture("mul", mul);
//!
//! let cluster = b.cluster([
//!     Group::new(3, [number]),
//!     Group::left(2, [mul]),
//!     Group::left(1, [add]),
//! ]);
//! b.rule("Expr", cluster).root(cluster);
//! let grammar = b.build().unwrap();
//!
//! let outcome = Parser::new(&grammar).parse("1+2*3").unwrap();
//! assert_eq!(outcome.render(), "add(1, mul(2, 3))");
//! ```
//!
//! ## Modules
//!
//! - [`grammar`]: expression graph, builder and preprocessing passes
//! - [`parse`]: parser, parse state, memoization, error handling and tracing
//! - [`tree`]: parse trees produced by captures
//! - [`source`] and [`text`]: input text, offsets and line/column positions
//! - [`error`]: fatal errors and syntax diagnostics

pub mod error;
pub mod grammar;
pub mod parse;
pub mod source;
pub mod text;
pub mod tree;

pub use error::{GrammarError, GroveError, SyntaxError};
pub use grammar::{ExprId, Grammar, GrammarBuilder};
pub use parse::{ParseOutcome, Parser, ParserConfig};
pub use source::Source;
pub use tree::ParseNode;
