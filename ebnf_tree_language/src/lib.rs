/*!
	Parse EBNF grammar text into an immutable token tree that keeps every byte
	of the source, including comments and whitespace.

	```
	use ebnf_tree_language::{TokenKind, parse_grammar};

	let grammar = parse_grammar(r#"greeting = "hello" , "world" ;"#).unwrap();
	let rule = grammar.rule("greeting").unwrap();
	assert_eq!(rule.rhs.kind(), TokenKind::Concatenation);
	assert!(grammar.check_identifiers(&Default::default()).is_ok());
	```
*/

pub mod error;
pub mod lexer;
pub mod loader;
pub mod parser;
pub mod references;
pub mod token;
pub mod visitor;

pub use crate::error::{
	LoadError,
	NestingError,
	ParseError,
	ParseErrorKind,
	StructureError,
	TerminalError,
	ValidationError,
};
pub use crate::lexer::{PResult, quote_terminal};
pub use crate::loader::{GrammarLoader, GrammarSource};
pub use crate::parser::{MAX_NESTING, grammar_parser, parse_grammar};
pub use crate::references::ReferenceCollector;
pub use crate::token::{ExceptionParts, Grammar, IdentifierName, Node, ParseToken, RangeBounds, RuleParts, TokenKind};
pub use crate::visitor::{TokenVisitor, VisitAction, walk};
