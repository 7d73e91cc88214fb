use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::combinator::{cut, eof};
use nom::error::context;
use nom::multi::many0;
use nom::{Finish, Parser};
use tracing::debug;

use crate::error::{GrammarFailure, NestingError, ParseError};
use crate::lexer::{PResult, build, comment, identifier, nom_bail, symbol, terminal, whitespace};
use crate::token::{Grammar, Node, ParseToken};

/// Parse a complete grammar; anything after the last rule other than whitespace and comments is an error.
pub fn parse_grammar(input: &str) -> Result<Grammar, ParseError> {
	let res = (grammar, context("rule or end of input", cut(eof)))
		.parse(input)
		.finish();
	match res {
		Ok((_, (grammar, _))) => {
			debug!(rules = grammar.rules().count(), bytes = input.len(), "parsed grammar");
			Ok(grammar)
		},
		Err(err) => Err(err.into_parse_error(input)),
	}
}

/// The grammar parser: one or more rules, with the whitespace and comments around them.
pub fn grammar_parser<'a>() -> impl Parser<&'a str, Output = Grammar, Error = GrammarFailure<'a>> {
	grammar
}

fn grammar(input: &str) -> PResult<Grammar> {
	let start = input;
	let mut children = vec![];
	let (mut input, ()) = push(&mut children, input, required("rule", rule))?;
	loop {
		match push(&mut children, input, rule) {
			Ok((rest, ())) => input = rest,
			Err(nom::Err::Error(_)) => break,
			Err(err) => return Err(err),
		}
	}
	let (input, trailing) = noise(input)?;
	children.extend(trailing);

	let token = build(start, input, Node::Grammar(children))?;
	match Grammar::new(token) {
		Ok(grammar) => Ok((input, grammar)),
		Err(err) => nom_bail!(start, err),
	}
}

/// `identifier "=" rhs ";"`
pub fn rule(input: &str) -> PResult<ParseToken> {
	let start = input;
	let (input, name) = identifier(input)?;
	let mut children = vec![name];
	let (input, ()) = push(&mut children, input, required("`=`", symbol("=")))?;
	let (input, ()) = push(&mut children, input, required("right-hand side", rhs))?;
	let (input, ()) = push(&mut children, input, required("`;`", symbol(";")))?;
	let token = build(start, input, Node::Rule(children))?;
	Ok((input, token))
}

#[derive(Clone, Copy, Debug)]
enum BinaryForm {
	Alternative,
	Concatenation,
	Range,
	Exception,
}

impl BinaryForm {
	fn separator(self) -> &'static str {
		match self {
			Self::Alternative => "|",
			Self::Concatenation => ",",
			Self::Range => "..",
			Self::Exception => "-",
		}
	}

	/// Alternation and concatenation take any number of further operands.
	fn is_chain(self) -> bool {
		matches!(self, Self::Alternative | Self::Concatenation)
	}

	fn node(self, children: Vec<ParseToken>) -> Node {
		match self {
			Self::Alternative => Node::Alternative(children),
			Self::Concatenation => Node::Concatenation(children),
			Self::Range => Node::Range(children),
			Self::Exception => Node::Exception(children),
		}
	}
}

/// How many brackets may enclose one another before parsing gives up.
pub const MAX_NESTING: usize = 64;

/**
	A right-hand side.

	Forms are tried in order: alternative, concatenation, range, exception,
	then the bare forms of [`rhs2`] (optional, repetition, grouping,
	identifier, terminal). The binary forms all open with an `rhs2` operand,
	never an `rhs`, which is what keeps the grammar free of left recursion.
	That leading operand sits at the same position for every binary form, so
	it is parsed once and each form only checks for its separator.
*/
pub fn rhs(input: &str) -> PResult<ParseToken> {
	nested_rhs(input, 0)
}

/// The operands of binary forms: identifier, optional, repetition, grouping or terminal.
pub fn rhs2(input: &str) -> PResult<ParseToken> {
	nested_rhs2(input, 0)
}

fn nested_rhs(input: &str, depth: usize) -> PResult<ParseToken> {
	const FORMS: [BinaryForm; 4] = [
		BinaryForm::Alternative,
		BinaryForm::Concatenation,
		BinaryForm::Range,
		BinaryForm::Exception,
	];

	let start = input;
	let (input, first) = nested_rhs2(input, depth)?;
	for form in FORMS {
		if sees(input, form.separator())? {
			return binary(start, input, first, form, depth);
		}
	}
	Ok((input, first))
}

fn nested_rhs2(input: &str, depth: usize) -> PResult<ParseToken> {
	alt((
		identifier,
		|input| bracketed(input, depth, ("[", "`]`", "]"), Node::Optional),
		|input| bracketed(input, depth, ("{", "`}`", "}"), Node::Repeated),
		|input| bracketed(input, depth, ("(", "`)`", ")"), Node::Group),
		terminal,
	))
	.parse(input)
}

/// `first sep rhs2`, plus `{sep rhs2}` for chains, flattened into one token.
fn binary<'a>(
	start: &'a str,
	input: &'a str,
	first: ParseToken,
	form: BinaryForm,
	depth: usize,
) -> PResult<'a, ParseToken> {
	let operand = |input| nested_rhs2(input, depth);
	let separator = form.separator();
	let mut children = vec![first];
	let (input, ()) = push(&mut children, input, symbol(separator))?;
	let (mut input, ()) = push(&mut children, input, required("operand", operand))?;
	while form.is_chain() && sees(input, separator)? {
		let (rest, ()) = push(&mut children, input, symbol(separator))?;
		let (rest, ()) = push(&mut children, rest, required("operand", operand))?;
		input = rest;
	}
	let token = build(start, input, form.node(children))?;
	Ok((input, token))
}

/// `[ rhs ]`, `{ rhs }` or `( rhs )`, the inner right-hand side one level deeper.
fn bracketed<'a>(
	input: &'a str,
	depth: usize,
	(open, close_label, close): (&'static str, &'static str, &'static str),
	node: fn(Vec<ParseToken>) -> Node,
) -> PResult<'a, ParseToken> {
	let start = input;
	let (input, opening) = symbol(open).parse(input)?;
	if depth >= MAX_NESTING {
		nom_bail!(start, NestingError { limit: MAX_NESTING });
	}
	let mut children = vec![opening];
	let inner = |input| nested_rhs(input, depth + 1);
	let (input, ()) = push(&mut children, input, required("right-hand side", inner))?;
	let (input, ()) = push(&mut children, input, required(close_label, symbol(close)))?;
	let token = build(start, input, node(children))?;
	Ok((input, token))
}

/// Whitespace and comments.
fn noise(input: &str) -> PResult<Vec<ParseToken>> {
	many0(alt((whitespace, comment))).parse(input)
}

/// Run `parser` after any noise; on success both end up in `children`.
fn push<'a, P>(children: &mut Vec<ParseToken>, input: &'a str, mut parser: P) -> PResult<'a, ()>
where
	P: Parser<&'a str, Output = ParseToken, Error = GrammarFailure<'a>>,
{
	let (input, skipped) = noise.parse(input)?;
	let (input, token) = parser.parse(input)?;
	children.extend(skipped);
	children.push(token);
	Ok((input, ()))
}

/// Whether `separator` comes next, looking past noise without consuming anything.
fn sees<'a>(input: &'a str, separator: &'static str) -> Result<bool, nom::Err<GrammarFailure<'a>>> {
	match (noise, tag(separator)).parse(input) {
		Ok(_) => Ok(true),
		Err(nom::Err::Error(_)) => Ok(false),
		Err(err) => Err(err),
	}
}

/// A production the grammar demands at this point: failing to match is reported, not backtracked.
fn required<'a, P>(label: &'static str, parser: P) -> impl Parser<&'a str, Output = ParseToken, Error = GrammarFailure<'a>>
where
	P: Parser<&'a str, Output = ParseToken, Error = GrammarFailure<'a>>,
{
	context(label, cut(parser))
}

#[cfg(test)]
use crate::error::{ParseErrorKind, StructureError, TerminalError};
#[cfg(test)]
use crate::token::TokenKind;

#[cfg(test)]
fn only_rhs(grammar: &Grammar) -> &ParseToken {
	let mut rules = grammar.rules();
	let Some(rule) = rules.next() else {
		panic!("grammar has no rules")
	};
	assert!(rules.next().is_none());
	rule.rhs
}

#[cfg(test)]
fn kinds(token: &ParseToken) -> Vec<TokenKind> {
	token.significant_children().map(ParseToken::kind).collect()
}

#[test]
fn test_single_rule() {
	let grammar = parse_grammar("A = 'x';").unwrap();
	let rule = grammar.rule("A").unwrap();
	assert_eq!(rule.identifier.as_str(), "A");
	assert_eq!(rule.rhs.kind(), TokenKind::Terminal);
	assert_eq!(rule.rhs.value(), Some("x"));
	assert_eq!(grammar.token().significant_children().count(), 1);
}

#[test]
fn test_text_is_reconstructed() {
	let inputs = [
		"A = 'x';",
		"  (* leading *) A=\"x\" ;\n\n",
		"digit = '0' .. '9' ;\nnumber = digit , { digit } ; (* trailing *)",
		"a = ( b | [ c , { d } ] ) - 'e';",
	];
	for input in inputs {
		let grammar = parse_grammar(input).unwrap();
		assert_eq!(grammar.to_string(), input);
		let children = grammar.token().children();
		assert_eq!(children.iter().map(ParseToken::text).collect::<String>(), input);
	}
}

#[test]
fn test_alternation_is_flat() {
	let grammar = parse_grammar("A = 'x' | 'y' | 'z';").unwrap();
	let rhs = only_rhs(&grammar);
	assert_eq!(rhs.kind(), TokenKind::Alternative);
	assert_eq!(kinds(rhs), [TokenKind::Terminal; 3]);
	assert_eq!(
		rhs.significant_children()
			.filter_map(ParseToken::value)
			.collect::<Vec<_>>(),
		["x", "y", "z"]
	);
}

#[test]
fn test_flattening_ignores_noise_placement() {
	let inputs = [
		"A='x'|'y'|'z';",
		"A = 'x' | 'y' | 'z' ;",
		"A =\n\t'x'\n\t| 'y'\n\t| 'z'\n;",
		"A = 'x'(* one *)|(* two *)'y' |'z' ;",
	];
	for input in inputs {
		let grammar = parse_grammar(input).unwrap();
		let rhs = only_rhs(&grammar);
		assert_eq!(rhs.kind(), TokenKind::Alternative, "{input}");
		assert_eq!(rhs.significant_children().count(), 3, "{input}");
	}
}

#[test]
fn test_concatenation() {
	let grammar = parse_grammar(r#"greeting = "hello" , "world" ;"#).unwrap();
	let rule = grammar.rule("greeting").unwrap();
	assert_eq!(rule.rhs.kind(), TokenKind::Concatenation);
	assert_eq!(
		rule.rhs
			.significant_children()
			.filter_map(ParseToken::value)
			.collect::<Vec<_>>(),
		["hello", "world"]
	);
}

#[test]
fn test_bracketed_forms() {
	let grammar = parse_grammar("a = [ b ]; c = { 'd' }; e = ( f | g );").unwrap();
	let rhs = |name| grammar.rule(name).unwrap().rhs;
	assert_eq!(rhs("a").kind(), TokenKind::Optional);
	assert_eq!(kinds(rhs("a")), [TokenKind::Identifier]);
	assert_eq!(rhs("c").kind(), TokenKind::Repeated);
	assert_eq!(kinds(rhs("c")), [TokenKind::Terminal]);
	assert_eq!(rhs("e").kind(), TokenKind::Group);
	assert_eq!(kinds(rhs("e")), [TokenKind::Alternative]);
}

#[test]
fn test_range() {
	let grammar = parse_grammar("A = 'a' .. 'z';").unwrap();
	let bounds = only_rhs(&grammar).as_range().unwrap();
	assert_eq!(bounds.begin.value(), Some("a"));
	assert_eq!(bounds.end.value(), Some("z"));

	let grammar = parse_grammar("A = lower..upper;").unwrap();
	let bounds = only_rhs(&grammar).as_range().unwrap();
	assert_eq!(bounds.begin.kind(), TokenKind::Identifier);
	assert_eq!(bounds.end.kind(), TokenKind::Identifier);
}

#[test]
fn test_range_needs_terminal_or_identifier_bounds() {
	let err = parse_grammar("A = ('a','b') .. 'z';").unwrap_err();
	assert!(matches!(
		err.kind,
		ParseErrorKind::Structure(StructureError::ChildKind {
			kind: TokenKind::Range,
			slot: "begin",
			found: TokenKind::Group,
			..
		})
	));
	assert_eq!(err.offset, 4);
}

#[test]
fn test_exception() {
	let grammar = parse_grammar("A = letter - 'x';").unwrap();
	let parts = only_rhs(&grammar).as_exception().unwrap();
	assert_eq!(parts.token.value(), Some("letter"));
	assert_eq!(parts.exception.value(), Some("x"));

	let grammar = parse_grammar("A = [ a ] - ( b | c );").unwrap();
	let parts = only_rhs(&grammar).as_exception().unwrap();
	assert_eq!(parts.token.kind(), TokenKind::Optional);
	assert_eq!(parts.exception.kind(), TokenKind::Group);
}

#[test]
fn test_operands_are_restricted() {
	// mixing operators needs explicit grouping
	assert!(parse_grammar("A = a , b | c;").is_err());
	assert!(parse_grammar("A = a - b - c;").is_err());
	let grammar = parse_grammar("A = ( a , b ) | c;").unwrap();
	assert_eq!(kinds(only_rhs(&grammar)), [TokenKind::Group, TokenKind::Identifier]);
}

#[test]
fn test_comments_are_noise() {
	let grammar = parse_grammar("(* header *)\nA = (* why *) 'x' ; (* footer *)").unwrap();
	let children = grammar.token().children();
	assert_eq!(children.first().map(ParseToken::kind), Some(TokenKind::Comment));
	assert_eq!(children.last().map(ParseToken::kind), Some(TokenKind::Comment));
	assert_eq!(grammar.rules().count(), 1);
	assert_eq!(only_rhs(&grammar).value(), Some("x"));
}

#[test]
fn test_missing_semicolon() {
	let err = parse_grammar("A = 'x' 'y';").unwrap_err();
	assert_eq!((err.offset, err.line, err.column), (8, 1, 9));
	assert!(matches!(err.kind, ParseErrorKind::Syntax(ref msg) if msg.contains("`;`")));
}

#[test]
fn test_missing_operand() {
	let err = parse_grammar("A = 'x' | ;").unwrap_err();
	assert_eq!(err.offset, 10);
	assert!(matches!(err.kind, ParseErrorKind::Syntax(ref msg) if msg.contains("operand")));

	let err = parse_grammar("A = ;").unwrap_err();
	assert!(matches!(err.kind, ParseErrorKind::Syntax(ref msg) if msg.contains("right-hand side")));
}

#[test]
fn test_unclosed_bracket() {
	let err = parse_grammar("A = [ 'x' ;").unwrap_err();
	assert_eq!(err.offset, 10);
	assert!(matches!(err.kind, ParseErrorKind::Syntax(ref msg) if msg.contains("`]`")));
}

#[test]
fn test_terminal_errors_propagate() {
	let err = parse_grammar("A = 'x';\nB = '\\q';").unwrap_err();
	assert_eq!(err.kind, ParseErrorKind::Terminal(TerminalError::InvalidEscape('q')));
	assert_eq!((err.line, err.column), (2, 7));
}

#[cfg(test)]
fn nested(depth: usize) -> String {
	let mut rhs = "'x'".to_string();
	for level in 0 .. depth {
		let (open, close) = [("(", ")"), ("[", "]"), ("{", "}")][level % 3];
		rhs = format!("{open}{rhs}{close}");
	}
	format!("A = {rhs};")
}

#[test]
fn test_nesting_limit() {
	let grammar = parse_grammar(&nested(MAX_NESTING)).unwrap();
	let mut token = only_rhs(&grammar);
	let mut depth = 0;
	while let Some(inner) = token.significant_children().next() {
		token = inner;
		depth += 1;
	}
	assert_eq!(depth, MAX_NESTING);
	assert_eq!(token.value(), Some("x"));

	let text = format!("A = {}'x'{};", "(".repeat(MAX_NESTING + 1), ")".repeat(MAX_NESTING + 1));
	let err = parse_grammar(&text).unwrap_err();
	assert_eq!(err.kind, ParseErrorKind::Nesting(NestingError { limit: MAX_NESTING }));
	assert_eq!(err.offset, 4 + MAX_NESTING);

	// alternations between the brackets do not reset the count
	let text = format!("A = {}'x'{};", "('y' | ".repeat(MAX_NESTING + 1), ")".repeat(MAX_NESTING + 1));
	assert!(matches!(parse_grammar(&text).unwrap_err().kind, ParseErrorKind::Nesting(_)));
	assert!(parse_grammar(&format!("A = {}'x'{};", "('y' | ".repeat(8), ")".repeat(8))).is_ok());
}

#[test]
fn test_no_rules() {
	assert!(parse_grammar("").is_err());
	assert!(parse_grammar("  (* nothing *) ").is_err());
	assert!(parse_grammar("A = 'x'; 42").is_err());
	assert!(parse_grammar("A = 'x'; (* open").is_err());
}

#[test]
fn test_grammar_parser_stops_after_last_rule() {
	let (rest, grammar) = grammar_parser().parse("A = 'x';\n B = A; !").unwrap();
	assert_eq!(rest, "!");
	assert_eq!(grammar.rules().count(), 2);
}
