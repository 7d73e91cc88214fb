use std::collections::BTreeSet;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use nom::error::{ContextError, ErrorKind, FromExternalError, ParseError as NomParseError};
use nom::Offset;
use nom_language::error::{VerboseError, VerboseErrorKind, convert_error};
use thiserror::Error;

use crate::token::{IdentifierName, ParseToken, TokenKind};

/// A malformed terminal literal.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TerminalError {
	#[error("unknown escape sequence `\\{0}`")]
	InvalidEscape(char),
	#[error("invalid unicode escape `\\u{0}`, expected exactly 4 hex digits")]
	InvalidUnicodeEscape(String),
	#[error("unpaired surrogate `\\u{0:04X}`")]
	UnpairedSurrogate(u16),
	#[error("terminal has no closing quote")]
	Unterminated,
}

/// A token that could not be built because its shape is wrong.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StructureError {
	#[error("{kind} token must have non-empty text")]
	EmptyText { kind: TokenKind },
	#[error("`{name}` is not a valid identifier")]
	InvalidIdentifier { name: String },
	#[error("{kind} `{text}` needs {expected} significant children but has {found}")]
	ChildCount {
		kind: TokenKind,
		text: String,
		expected: &'static str,
		found: usize,
	},
	#[error("{kind} `{text}`: {slot} must be {expected} but is {found}")]
	ChildKind {
		kind: TokenKind,
		text: String,
		slot: &'static str,
		expected: &'static str,
		found: TokenKind,
	},
	#[error("{kind} `{text}` is missing its {slot}")]
	MissingChild {
		kind: TokenKind,
		text: String,
		slot: &'static str,
	},
	#[error("{kind} text `{text}` does not spell its value `{value}`")]
	TextMismatch {
		kind: TokenKind,
		text: String,
		value: String,
	},
	#[error("expected a grammar token but got {found}")]
	NotAGrammar { found: TokenKind },
}

/// Brackets nested past what the parser will recurse into.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("brackets nested more than {limit} deep")]
pub struct NestingError {
	pub limit: usize,
}

/// Why grammar text could not be turned into a token tree.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
	#[error(transparent)]
	Terminal(#[from] TerminalError),
	#[error(transparent)]
	Structure(#[from] StructureError),
	#[error(transparent)]
	Nesting(#[from] NestingError),
	#[error("{0}")]
	Syntax(String),
}

/// A grammar parse failure with the position it happened at.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{line}:{column}: {kind}")]
pub struct ParseError {
	/// Byte offset into the grammar text.
	pub offset: usize,
	/// 1-based line.
	pub line: usize,
	/// 1-based column, counted in characters.
	pub column: usize,
	pub kind: ParseErrorKind,
}

impl ParseError {
	pub(crate) fn at(source: &str, offset: usize, kind: ParseErrorKind) -> Self {
		let before = &source[.. offset];
		let line = before.matches('\n').count() + 1;
		let line_start = before.rfind('\n').map_or(0, |index| index + 1);
		let column = before[line_start ..].chars().count() + 1;
		Self {
			offset,
			line,
			column,
			kind,
		}
	}
}

/// Semantic problems found by [`Grammar::check_identifiers`](crate::Grammar::check_identifiers).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
	#[error("duplicate rule identifiers: {}", rule_names(.rules))]
	DuplicateIdentifiers {
		/// Every rule whose name is declared more than once, in source order per name.
		rules: Vec<ParseToken>,
	},
	#[error("references to unknown identifiers: {}", join_names(.names))]
	InvalidReferences { names: BTreeSet<IdentifierName> },
}

fn rule_names(rules: &[ParseToken]) -> String {
	let names = rules
		.iter()
		.filter_map(ParseToken::as_rule)
		.map(|rule| rule.identifier.clone())
		.collect::<BTreeSet<_>>();
	join_names(&names)
}

fn join_names(names: &BTreeSet<IdentifierName>) -> String {
	names
		.iter()
		.map(IdentifierName::as_str)
		.collect::<Vec<_>>()
		.join(", ")
}

/// Errors from [`GrammarLoader`](crate::GrammarLoader). Cloneable so a cached failure can be handed out again.
#[derive(Clone, Debug, Error)]
pub enum LoadError {
	#[error("couldn't read grammar from {}", .path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: Arc<io::Error>,
	},
	#[error("couldn't parse grammar `{name}`")]
	Parse {
		name: String,
		#[source]
		source: ParseError,
	},
	#[error("grammar `{name}` has invalid identifiers")]
	Validation {
		name: String,
		#[source]
		source: ValidationError,
	},
}

#[derive(Clone, Debug)]
enum Cause {
	Terminal(TerminalError),
	Structure(StructureError),
	Nesting(NestingError),
}

/// The nom error type used by every grammar parser.
///
/// Keeps a [`VerboseError`] trace for diagnostics, plus the typed cause when a
/// lexer or token constructor gave up on purpose.
#[derive(Debug)]
pub struct GrammarFailure<'a> {
	trace: VerboseError<&'a str>,
	cause: Option<(&'a str, Cause)>,
}

impl<'a> GrammarFailure<'a> {
	/**
		Convert into an owned [`ParseError`] positioned within `source`, the
		complete text the parser was started on.

		Positions that do not lie within `source` are reported at its end.
	*/
	pub fn into_parse_error(self, source: &str) -> ParseError {
		let (at, kind): (&str, ParseErrorKind) = match self.cause {
			Some((at, Cause::Terminal(err))) => (at, err.into()),
			Some((at, Cause::Structure(err))) => (at, err.into()),
			Some((at, Cause::Nesting(err))) => (at, err.into()),
			None => return syntax_error(source, self.trace),
		};
		ParseError::at(source, offset_within(source, at), kind)
	}
}

fn syntax_error(source: &str, trace: VerboseError<&str>) -> ParseError {
	let offset = trace
		.errors
		.first()
		.map_or(source.len(), |(at, _)| offset_within(source, at));
	// convert_error slices `source` at every position in the trace
	let message = if trace.errors.iter().all(|(at, _)| contains(source, at)) {
		convert_error(source, trace)
	} else {
		trace
			.errors
			.iter()
			.map(|(_, kind)| describe(kind))
			.collect::<Vec<_>>()
			.join(", ")
	};
	ParseError::at(source, offset, ParseErrorKind::Syntax(message))
}

fn contains(source: &str, at: &str) -> bool {
	let start = source.as_ptr() as usize;
	let Some(offset) = (at.as_ptr() as usize).checked_sub(start) else {
		return false;
	};
	offset + at.len() <= source.len() && source.is_char_boundary(offset)
}

fn offset_within(source: &str, at: &str) -> usize {
	if contains(source, at) {
		source.offset(at)
	} else {
		source.len()
	}
}

fn describe(kind: &VerboseErrorKind) -> String {
	match kind {
		VerboseErrorKind::Context(context) => format!("in {context}"),
		VerboseErrorKind::Char(char) => format!("expected `{char}`"),
		VerboseErrorKind::Nom(kind) => kind.description().into(),
	}
}

impl<'a> NomParseError<&'a str> for GrammarFailure<'a> {
	fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
		Self {
			trace: VerboseError::from_error_kind(input, kind),
			cause: None,
		}
	}

	fn append(input: &'a str, kind: ErrorKind, mut other: Self) -> Self {
		other.trace = VerboseError::append(input, kind, other.trace);
		other
	}

	fn from_char(input: &'a str, char: char) -> Self {
		Self {
			trace: VerboseError::from_char(input, char),
			cause: None,
		}
	}
}

impl<'a> ContextError<&'a str> for GrammarFailure<'a> {
	fn add_context(input: &'a str, context: &'static str, mut other: Self) -> Self {
		other.trace = VerboseError::add_context(input, context, other.trace);
		other
	}
}

impl<'a> FromExternalError<&'a str, TerminalError> for GrammarFailure<'a> {
	fn from_external_error(input: &'a str, kind: ErrorKind, err: TerminalError) -> Self {
		Self {
			trace: VerboseError::from_error_kind(input, kind),
			cause: Some((input, Cause::Terminal(err))),
		}
	}
}

impl<'a> FromExternalError<&'a str, StructureError> for GrammarFailure<'a> {
	fn from_external_error(input: &'a str, kind: ErrorKind, err: StructureError) -> Self {
		Self {
			trace: VerboseError::from_error_kind(input, kind),
			cause: Some((input, Cause::Structure(err))),
		}
	}
}

impl<'a> FromExternalError<&'a str, NestingError> for GrammarFailure<'a> {
	fn from_external_error(input: &'a str, kind: ErrorKind, err: NestingError) -> Self {
		Self {
			trace: VerboseError::from_error_kind(input, kind),
			cause: Some((input, Cause::Nesting(err))),
		}
	}
}

#[test]
fn test_parse_error_position() {
	let source = "a = 'x';\nb = c\n";
	let err = ParseError::at(source, 13, ParseErrorKind::Syntax("boom".into()));
	assert_eq!((err.line, err.column), (2, 5));
	assert_eq!(err.to_string(), "2:5: boom");

	let err = ParseError::at(source, 0, TerminalError::Unterminated.into());
	assert_eq!((err.line, err.column), (1, 1));
}

#[test]
fn test_foreign_source_is_clamped() {
	use nom::Parser;

	let input = "A = 'x' 'y';";
	let Err(nom::Err::Failure(failure)) = crate::grammar_parser().parse(input) else {
		panic!("expected a failure")
	};
	let err = failure.into_parse_error("B");
	assert_eq!(err.offset, 1);
	assert!(matches!(err.kind, ParseErrorKind::Syntax(ref msg) if msg.contains("`;`")));

	let input = "A = '\\q';";
	let Err(nom::Err::Failure(failure)) = crate::grammar_parser().parse(input) else {
		panic!("expected a failure")
	};
	let err = failure.into_parse_error("other text");
	assert_eq!((err.offset, err.line, err.column), (10, 1, 11));
	assert_eq!(err.kind, ParseErrorKind::Terminal(TerminalError::InvalidEscape('q')));
}
