use std::borrow::Borrow;
use std::fmt::{self, Write};
use std::str::FromStr;

use crate::error::StructureError;
use crate::lexer::quote_terminal;

/// Discriminates the kinds of [`ParseToken`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKind {
	Alternative,
	Comment,
	Concatenation,
	Exception,
	Grammar,
	Group,
	Identifier,
	Optional,
	Range,
	Repeated,
	Rule,
	Symbol,
	Terminal,
	Whitespace,
}

impl TokenKind {
	pub fn name(self) -> &'static str {
		match self {
			Self::Alternative => "alternative",
			Self::Comment => "comment",
			Self::Concatenation => "concatenation",
			Self::Exception => "exception",
			Self::Grammar => "grammar",
			Self::Group => "group",
			Self::Identifier => "identifier",
			Self::Optional => "optional",
			Self::Range => "range",
			Self::Repeated => "repeated",
			Self::Rule => "rule",
			Self::Symbol => "symbol",
			Self::Terminal => "terminal",
			Self::Whitespace => "whitespace",
		}
	}

	/// Comments, whitespace and symbols: kept for the source text, ignored for structure.
	pub fn is_noise(self) -> bool {
		matches!(self, Self::Comment | Self::Whitespace | Self::Symbol)
	}

	pub fn is_leaf(self) -> bool {
		matches!(self, Self::Identifier | Self::Terminal) || self.is_noise()
	}
}

impl fmt::Display for TokenKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// A validated rule name: an ASCII letter followed by ASCII letters, digits or `_`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentifierName(String);

impl IdentifierName {
	pub fn new(name: impl Into<String>) -> Result<Self, StructureError> {
		let name = name.into();
		let mut chars = name.chars();
		let valid = chars.next().is_some_and(Self::is_initial) && chars.all(Self::is_subsequent);
		if !valid {
			return Err(StructureError::InvalidIdentifier { name });
		}
		Ok(Self(name))
	}

	pub fn is_initial(char: char) -> bool {
		char.is_ascii_alphabetic()
	}

	pub fn is_subsequent(char: char) -> bool {
		char.is_ascii_alphanumeric() || char == '_'
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl FromStr for IdentifierName {
	type Err = StructureError;

	fn from_str(name: &str) -> Result<Self, Self::Err> {
		Self::new(name)
	}
}

impl fmt::Display for IdentifierName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl AsRef<str> for IdentifierName {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl Borrow<str> for IdentifierName {
	fn borrow(&self) -> &str {
		&self.0
	}
}

/// The kind-specific payload of a [`ParseToken`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Node {
	/// A reference to (or the name of) a rule.
	Identifier(IdentifierName),
	/// A quoted literal; holds the decoded value.
	Terminal(String),
	/// A `(* ... *)` comment, delimiters included.
	Comment(String),
	Whitespace(String),
	/// One of `[ ] { } ( ) | , - .. = ;`.
	Symbol(String),
	Alternative(Vec<ParseToken>),
	Concatenation(Vec<ParseToken>),
	Group(Vec<ParseToken>),
	Optional(Vec<ParseToken>),
	Repeated(Vec<ParseToken>),
	Range(Vec<ParseToken>),
	Exception(Vec<ParseToken>),
	Rule(Vec<ParseToken>),
	Grammar(Vec<ParseToken>),
}

impl Node {
	pub fn kind(&self) -> TokenKind {
		match self {
			Self::Identifier(_) => TokenKind::Identifier,
			Self::Terminal(_) => TokenKind::Terminal,
			Self::Comment(_) => TokenKind::Comment,
			Self::Whitespace(_) => TokenKind::Whitespace,
			Self::Symbol(_) => TokenKind::Symbol,
			Self::Alternative(_) => TokenKind::Alternative,
			Self::Concatenation(_) => TokenKind::Concatenation,
			Self::Group(_) => TokenKind::Group,
			Self::Optional(_) => TokenKind::Optional,
			Self::Repeated(_) => TokenKind::Repeated,
			Self::Range(_) => TokenKind::Range,
			Self::Exception(_) => TokenKind::Exception,
			Self::Rule(_) => TokenKind::Rule,
			Self::Grammar(_) => TokenKind::Grammar,
		}
	}

	/// Every child, noise included. Empty for leaves.
	pub fn children(&self) -> &[ParseToken] {
		match self {
			Self::Identifier(_) |
			Self::Terminal(_) |
			Self::Comment(_) |
			Self::Whitespace(_) |
			Self::Symbol(_) => &[],
			Self::Alternative(children) |
			Self::Concatenation(children) |
			Self::Group(children) |
			Self::Optional(children) |
			Self::Repeated(children) |
			Self::Range(children) |
			Self::Exception(children) |
			Self::Rule(children) |
			Self::Grammar(children) => children,
		}
	}
}

/**
	A node of the immutable tree produced by parsing grammar text.

	Every token keeps the exact source text it was parsed from. Tokens can
	only be built through [`ParseToken::new`], which enforces the shape each
	kind requires, so a tree that exists is a valid tree.
*/
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParseToken {
	text: String,
	node: Node,
}

/// The two halves of a rule token.
#[derive(Clone, Copy, Debug)]
pub struct RuleParts<'a> {
	pub identifier: &'a IdentifierName,
	pub identifier_token: &'a ParseToken,
	pub rhs: &'a ParseToken,
}

/// The endpoints of a range token; each is a terminal or an identifier.
#[derive(Clone, Copy, Debug)]
pub struct RangeBounds<'a> {
	pub begin: &'a ParseToken,
	pub end: &'a ParseToken,
}

/// `token - exception`.
#[derive(Clone, Copy, Debug)]
pub struct ExceptionParts<'a> {
	pub token: &'a ParseToken,
	pub exception: &'a ParseToken,
}

const RANGE_ENDPOINT: &[TokenKind] = &[TokenKind::Terminal, TokenKind::Identifier];

impl ParseToken {
	pub fn new(text: impl Into<String>, node: Node) -> Result<Self, StructureError> {
		let text = text.into();
		let kind = node.kind();
		if text.is_empty() {
			return Err(StructureError::EmptyText { kind });
		}

		match &node {
			Node::Terminal(_) => {},
			Node::Identifier(IdentifierName(value)) |
			Node::Comment(value) |
			Node::Whitespace(value) |
			Node::Symbol(value) => {
				// only terminals are written differently from their value
				if text != *value {
					return Err(StructureError::TextMismatch {
						kind,
						text,
						value: value.clone(),
					});
				}
			},
			Node::Alternative(children) | Node::Concatenation(children) => {
				let found = significant(children).count();
				if found < 2 {
					return Err(child_count(kind, &text, "at least 2", found));
				}
			},
			Node::Group(children) | Node::Optional(children) | Node::Repeated(children) => {
				let found = significant(children).count();
				if found != 1 {
					return Err(child_count(kind, &text, "exactly 1", found));
				}
			},
			Node::Exception(children) => {
				let found = significant(children).count();
				if found != 2 {
					return Err(child_count(kind, &text, "exactly 2", found));
				}
			},
			Node::Range(children) => {
				let mut slots = Slots::new(kind, &text, children);
				slots.take("begin", Some(RANGE_ENDPOINT), "a terminal or identifier")?;
				slots.take("end", Some(RANGE_ENDPOINT), "a terminal or identifier")?;
				slots.finish()?;
			},
			Node::Rule(children) => {
				let mut slots = Slots::new(kind, &text, children);
				slots.take("identifier", Some(&[TokenKind::Identifier]), "an identifier")?;
				slots.take("right-hand side", None, "")?;
				slots.finish()?;
			},
			Node::Grammar(children) => {
				let mut found = 0;
				for child in significant(children) {
					if child.kind() != TokenKind::Rule {
						return Err(StructureError::ChildKind {
							kind,
							text,
							slot: "every child",
							expected: "a rule",
							found: child.kind(),
						});
					}
					found += 1;
				}
				if found == 0 {
					return Err(child_count(kind, &text, "at least 1", found));
				}
			},
		}

		Ok(Self { text, node })
	}

	/// An identifier leaf whose text is the name itself.
	pub fn identifier(name: IdentifierName) -> Self {
		Self {
			text: name.as_str().into(),
			node: Node::Identifier(name),
		}
	}

	/// A terminal leaf for `value`, with text produced by [`quote_terminal`].
	pub fn terminal_from_value(value: impl Into<String>) -> Self {
		let value = value.into();
		Self {
			text: quote_terminal(&value),
			node: Node::Terminal(value),
		}
	}

	pub fn text(&self) -> &str {
		&self.text
	}

	pub fn node(&self) -> &Node {
		&self.node
	}

	pub fn kind(&self) -> TokenKind {
		self.node.kind()
	}

	pub fn is_noise(&self) -> bool {
		self.kind().is_noise()
	}

	pub fn children(&self) -> &[ParseToken] {
		self.node.children()
	}

	pub fn significant_children(&self) -> impl Iterator<Item = &ParseToken> {
		significant(self.children())
	}

	/// The value of a leaf: the identifier name, the decoded terminal, or the raw noise text.
	pub fn value(&self) -> Option<&str> {
		match &self.node {
			Node::Identifier(name) => Some(name.as_str()),
			Node::Terminal(value) |
			Node::Comment(value) |
			Node::Whitespace(value) |
			Node::Symbol(value) => Some(value),
			_ => None,
		}
	}

	pub fn identifier_name(&self) -> Option<&IdentifierName> {
		match &self.node {
			Node::Identifier(name) => Some(name),
			_ => None,
		}
	}

	pub fn as_rule(&self) -> Option<RuleParts<'_>> {
		let Node::Rule(children) = &self.node else {
			return None;
		};
		let (identifier_token, rhs) = significant_pair(children);
		let Node::Identifier(identifier) = &identifier_token.node else {
			unreachable!()
		};
		Some(RuleParts {
			identifier,
			identifier_token,
			rhs,
		})
	}

	pub fn as_range(&self) -> Option<RangeBounds<'_>> {
		let Node::Range(children) = &self.node else {
			return None;
		};
		let (begin, end) = significant_pair(children);
		Some(RangeBounds { begin, end })
	}

	pub fn as_exception(&self) -> Option<ExceptionParts<'_>> {
		let Node::Exception(children) = &self.node else {
			return None;
		};
		let (token, exception) = significant_pair(children);
		Some(ExceptionParts { token, exception })
	}

	/// A copy of this token carrying different source text.
	pub fn with_text(&self, text: impl Into<String>) -> Result<Self, StructureError> {
		Self::new(text, self.node.clone())
	}

	/// Indented outline of the significant structure, one token per line.
	pub fn dump(&self) -> String {
		let mut out = String::new();
		self.dump_into(&mut out, 0);
		out
	}

	fn dump_into(&self, out: &mut String, depth: usize) {
		for _ in 0 .. depth {
			out.push_str("  ");
		}
		out.push_str(self.kind().name());
		match &self.node {
			Node::Identifier(name) => _ = write!(out, " {name}"),
			Node::Terminal(value) => _ = write!(out, " {value:?}"),
			_ => {},
		}
		out.push('\n');
		for child in self.significant_children() {
			child.dump_into(out, depth + 1);
		}
	}
}

impl fmt::Display for ParseToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.text)
	}
}

fn significant(children: &[ParseToken]) -> impl Iterator<Item = &ParseToken> {
	children.iter().filter(|child| !child.is_noise())
}

// Only called on kinds whose constructor guaranteed two significant children.
fn significant_pair(children: &[ParseToken]) -> (&ParseToken, &ParseToken) {
	let mut children = significant(children);
	let (Some(first), Some(second)) = (children.next(), children.next()) else {
		unreachable!()
	};
	(first, second)
}

fn child_count(kind: TokenKind, text: &str, expected: &'static str, found: usize) -> StructureError {
	StructureError::ChildCount {
		kind,
		text: text.into(),
		expected,
		found,
	}
}

/// Hands out significant children one slot at a time, checking kinds as it goes.
struct Slots<'a> {
	kind: TokenKind,
	text: &'a str,
	children: std::slice::Iter<'a, ParseToken>,
	taken: usize,
}

impl<'a> Slots<'a> {
	fn new(kind: TokenKind, text: &'a str, children: &'a [ParseToken]) -> Self {
		Self {
			kind,
			text,
			children: children.iter(),
			taken: 0,
		}
	}

	fn take(
		&mut self,
		slot: &'static str,
		allowed: Option<&[TokenKind]>,
		expected: &'static str,
	) -> Result<(), StructureError> {
		let Some(child) = self.children.find(|child| !child.is_noise()) else {
			return Err(StructureError::MissingChild {
				kind: self.kind,
				text: self.text.into(),
				slot,
			});
		};
		if let Some(allowed) = allowed {
			if !allowed.contains(&child.kind()) {
				return Err(StructureError::ChildKind {
					kind: self.kind,
					text: self.text.into(),
					slot,
					expected,
					found: child.kind(),
				});
			}
		}
		self.taken += 1;
		Ok(())
	}

	fn finish(self) -> Result<(), StructureError> {
		let extra = self.children.filter(|child| !child.is_noise()).count();
		if extra > 0 {
			return Err(child_count(
				self.kind,
				self.text,
				"exactly 2",
				self.taken + extra,
			));
		}
		Ok(())
	}
}

/**
	The root of a parsed grammar: a [`ParseToken`] of kind [`TokenKind::Grammar`].

	Its significant children are all rules; comments and whitespace between
	them are kept as well.
*/
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Grammar(ParseToken);

impl Grammar {
	pub fn new(token: ParseToken) -> Result<Self, StructureError> {
		match token.kind() {
			TokenKind::Grammar => Ok(Self(token)),
			found => Err(StructureError::NotAGrammar { found }),
		}
	}

	pub fn token(&self) -> &ParseToken {
		&self.0
	}

	pub fn into_token(self) -> ParseToken {
		self.0
	}

	/// Rules in source order, duplicates included.
	pub fn rules(&self) -> impl Iterator<Item = RuleParts<'_>> {
		self.0.significant_children().filter_map(ParseToken::as_rule)
	}

	/// The first rule named `name`.
	pub fn rule(&self, name: &str) -> Option<RuleParts<'_>> {
		self.rules().find(|rule| rule.identifier.as_str() == name)
	}
}

impl fmt::Display for Grammar {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

#[cfg(test)]
fn symbol(text: &str) -> ParseToken {
	ParseToken::new(text, Node::Symbol(text.into())).unwrap()
}

#[cfg(test)]
fn ident(name: &str) -> ParseToken {
	ParseToken::identifier(name.parse().unwrap())
}

#[cfg(test)]
fn rule(name: &str, value: &str) -> ParseToken {
	let children = vec![
		ident(name),
		symbol("="),
		ParseToken::terminal_from_value(value),
		symbol(";"),
	];
	let text = children.iter().map(ParseToken::text).collect::<String>();
	ParseToken::new(text, Node::Rule(children)).unwrap()
}

#[test]
fn test_identifier_name() {
	assert_eq!(IdentifierName::new("a").map(|n| n.to_string()), Ok("a".into()));
	assert!(IdentifierName::new("snake_Case9").is_ok());
	assert!(matches!(
		IdentifierName::new(""),
		Err(StructureError::InvalidIdentifier { .. })
	));
	assert!(IdentifierName::new("9lives").is_err());
	assert!(IdentifierName::new("_x").is_err());
	assert!(IdentifierName::new("a-b").is_err());
	assert!(IdentifierName::new("é").is_err());

	let mut names = std::collections::BTreeSet::new();
	names.insert(IdentifierName::new("b").unwrap());
	names.insert(IdentifierName::new("a").unwrap());
	assert!(names.contains("a"));
	assert_eq!(
		names.iter().map(IdentifierName::as_str).collect::<Vec<_>>(),
		["a", "b"]
	);
}

#[test]
fn test_leaf_text_must_not_be_empty() {
	assert_eq!(
		ParseToken::new("", Node::Whitespace(String::new())),
		Err(StructureError::EmptyText {
			kind: TokenKind::Whitespace
		}),
	);
}

#[test]
fn test_leaf_text_must_spell_value() {
	assert!(matches!(
		ParseToken::new("zzz", Node::Identifier("A".parse().unwrap())),
		Err(StructureError::TextMismatch {
			kind: TokenKind::Identifier,
			..
		})
	));
	assert!(matches!(
		ParseToken::new("|", Node::Symbol(",".into())),
		Err(StructureError::TextMismatch { .. })
	));
	assert!(ParseToken::new("\t", Node::Whitespace(" ".into())).is_err());
	assert!(ParseToken::new("(* a *)", Node::Comment("(* b *)".into())).is_err());
	assert_eq!(ident("A").text(), "A");
	assert!(ident("A").with_text("B").is_err());

	// terminals keep their quotes and escapes
	let token = ParseToken::new("'\\n'", Node::Terminal("\n".into())).unwrap();
	assert_eq!(token.value(), Some("\n"));
}

#[test]
fn test_alternative_child_count() {
	let children = vec![ParseToken::terminal_from_value("x"), symbol("|")];
	assert!(matches!(
		ParseToken::new("\"x\"|", Node::Alternative(children)),
		Err(StructureError::ChildCount { found: 1, .. })
	));

	let children = vec![
		ParseToken::terminal_from_value("x"),
		symbol("|"),
		ParseToken::terminal_from_value("y"),
	];
	let token = ParseToken::new("\"x\"|\"y\"", Node::Alternative(children)).unwrap();
	assert_eq!(token.children().len(), 3);
	assert_eq!(token.significant_children().count(), 2);
}

#[test]
fn test_group_child_count() {
	let children = vec![symbol("("), symbol(")")];
	assert!(matches!(
		ParseToken::new("()", Node::Group(children)),
		Err(StructureError::ChildCount { kind: TokenKind::Group, found: 0, .. })
	));
}

#[test]
fn test_range_endpoints() {
	let children = vec![
		ParseToken::terminal_from_value("a"),
		symbol(".."),
		ParseToken::terminal_from_value("z"),
	];
	let range = ParseToken::new("\"a\"..\"z\"", Node::Range(children)).unwrap();
	let bounds = range.as_range().unwrap();
	assert_eq!(bounds.begin.value(), Some("a"));
	assert_eq!(bounds.end.value(), Some("z"));

	let group = ParseToken::new(
		"(x)",
		Node::Group(vec![symbol("("), ident("x"), symbol(")")]),
	)
	.unwrap();
	let children = vec![group, symbol(".."), ParseToken::terminal_from_value("z")];
	assert!(matches!(
		ParseToken::new("(x)..\"z\"", Node::Range(children)),
		Err(StructureError::ChildKind {
			slot: "begin",
			found: TokenKind::Group,
			..
		})
	));

	let children = vec![ParseToken::terminal_from_value("a"), symbol("..")];
	assert!(matches!(
		ParseToken::new("\"a\"..", Node::Range(children)),
		Err(StructureError::MissingChild { slot: "end", .. })
	));
}

#[test]
fn test_rule_shape() {
	let token = rule("A", "x");
	let parts = token.as_rule().unwrap();
	assert_eq!(parts.identifier.as_str(), "A");
	assert_eq!(parts.rhs.value(), Some("x"));
	assert_eq!(token.text(), "A=\"x\";");

	let children = vec![
		ParseToken::terminal_from_value("A"),
		symbol("="),
		ParseToken::terminal_from_value("x"),
		symbol(";"),
	];
	assert!(matches!(
		ParseToken::new("\"A\"=\"x\";", Node::Rule(children)),
		Err(StructureError::ChildKind {
			slot: "identifier",
			..
		})
	));

	let children = vec![ident("A"), symbol("="), symbol(";")];
	assert!(matches!(
		ParseToken::new("A=;", Node::Rule(children)),
		Err(StructureError::MissingChild {
			slot: "right-hand side",
			..
		})
	));
}

#[test]
fn test_grammar_shape() {
	let whitespace = ParseToken::new(" ", Node::Whitespace(" ".into())).unwrap();
	assert!(matches!(
		ParseToken::new(" ", Node::Grammar(vec![whitespace.clone()])),
		Err(StructureError::ChildCount { found: 0, .. })
	));
	assert!(matches!(
		ParseToken::new("x", Node::Grammar(vec![ident("x")])),
		Err(StructureError::ChildKind { .. })
	));

	let children = vec![rule("A", "x"), whitespace, rule("B", "y")];
	let token = ParseToken::new("A=\"x\"; B=\"y\";", Node::Grammar(children)).unwrap();
	let grammar = Grammar::new(token).unwrap();
	assert_eq!(
		grammar
			.rules()
			.map(|rule| rule.identifier.as_str())
			.collect::<Vec<_>>(),
		["A", "B"]
	);
	assert_eq!(grammar.rule("B").and_then(|rule| rule.rhs.value()), Some("y"));
	assert!(matches!(
		Grammar::new(ident("x")),
		Err(StructureError::NotAGrammar {
			found: TokenKind::Identifier
		})
	));
}

#[test]
fn test_with_text_returns_new_token() {
	let original = ParseToken::terminal_from_value("x");
	let replaced = original.with_text("'x'").unwrap();
	assert_eq!(original.text(), "\"x\"");
	assert_eq!(replaced.text(), "'x'");
	assert_eq!(replaced.value(), Some("x"));
	assert_ne!(original, replaced);
	assert!(original.with_text("").is_err());
}

#[test]
fn test_dump() {
	let token = rule("A", "x");
	assert_eq!(token.dump(), "rule\n  identifier A\n  terminal \"x\"\n");
}
