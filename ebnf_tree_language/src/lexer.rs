use std::fmt::Write;

use nom::branch::alt;
use nom::bytes::complete::{tag, take_until, take_while, take_while1};
use nom::character::complete::{anychar, char, one_of, satisfy};
use nom::combinator::{cut, recognize, value, verify};
use nom::multi::{fold_many0, fold_many_m_n};
use nom::{Offset, Parser};

use crate::error::{GrammarFailure, TerminalError};
use crate::token::{IdentifierName, Node, ParseToken};

/// Result of every grammar parser.
pub type PResult<'a, T> = nom::IResult<&'a str, T, GrammarFailure<'a>>;

macro_rules! nom_bail {
	($input:expr, $err:expr) => {
		return Err(nom::Err::Failure(nom::error::FromExternalError::from_external_error(
			$input,
			nom::error::ErrorKind::Fail,
			$err,
		)))
	};
}

pub(crate) use nom_bail;

/// Build a token from the text between `start` and `rest`, failing hard if the shape is invalid.
pub(crate) fn build<'a>(start: &'a str, rest: &'a str, node: Node) -> Result<ParseToken, nom::Err<GrammarFailure<'a>>> {
	let text = &start[.. start.offset(rest)];
	match ParseToken::new(text, node) {
		Ok(token) => Ok(token),
		Err(err) => nom_bail!(start, err),
	}
}

/// A quoted terminal: `'...'` or `"..."`, with backslash and `\uXXXX` escapes decoded.
pub fn terminal(input: &str) -> PResult<ParseToken> {
	let start = input;
	let (input, quote) = one_of("'\"").parse(input)?;
	let (input, value) = fold_many0(
		alt((
			escape_char,
			verify(anychar, move |&char| char != quote && char != '\\'),
		)),
		String::new,
		|mut str, char| {
			str.push(char);
			str
		},
	)
	.parse(input)?;
	let (input, _) = match char::<&str, GrammarFailure>(quote).parse(input) {
		Ok(v) => v,
		Err(_) => nom_bail!(start, TerminalError::Unterminated),
	};
	let token = build(start, input, Node::Terminal(value))?;
	Ok((input, token))
}

fn escape_char(input: &str) -> PResult<char> {
	fn named_escapes(input: &str) -> PResult<char> {
		alt((
			value('\0', char('0')),
			value('\u{C}', char('f')),
			value('\t', char('t')),
			value('\n', char('n')),
			value('\r', char('r')),
			value('\'', char('\'')),
			value('"', char('"')),
			value('\\', char('\\')),
		))
		.parse(input)
	}

	fn fail_on_unknown(input: &str) -> PResult<char> {
		let (_, char) = match anychar::<&str, GrammarFailure>.parse(input) {
			Ok(c) => c,
			Err(_) => nom_bail!(input, TerminalError::Unterminated),
		};
		nom_bail!(input, TerminalError::InvalidEscape(char));
	}

	let (input, _) = char('\\').parse(input)?;
	cut(alt((named_escapes, unicode_escape, fail_on_unknown))).parse(input)
}

fn hex_char(input: &str) -> PResult<char> {
	verify(anychar, char::is_ascii_hexdigit).parse(input)
}

fn hex_digits<'a>(min: usize, max: usize) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
	move |input: &'a str| -> PResult<'a, &'a str> {
		recognize(fold_many_m_n(min, max, hex_char, || (), |_, _| ())).parse(input)
	}
}

/// The `XXXX` of a `\uXXXX` escape, as a UTF-16 code unit.
fn code_unit(input: &str) -> PResult<u16> {
	let (rest, digits) = match hex_digits(4, 4).parse(input) {
		Ok(v) => v,
		Err(_) => {
			let found = input.chars().take(4).collect();
			nom_bail!(input, TerminalError::InvalidUnicodeEscape(found));
		},
	};
	let Ok(unit) = u16::from_str_radix(digits, 16) else {
		unreachable!()
	};
	Ok((rest, unit))
}

fn unicode_escape(input: &str) -> PResult<char> {
	let (input, _) = char('u').parse(input)?;
	let start = input;
	let (input, unit) = code_unit(input)?;
	let unit = match unit {
		0xD800 ..= 0xDBFF => unit,
		0xDC00 ..= 0xDFFF => nom_bail!(start, TerminalError::UnpairedSurrogate(unit)),
		_ => {
			let Some(char) = char::from_u32(unit.into()) else {
				unreachable!()
			};
			return Ok((input, char));
		},
	};

	// a high surrogate must be followed by an escaped low one
	let Ok((input, _)) = tag::<&str, &str, GrammarFailure>("\\u").parse(input) else {
		nom_bail!(start, TerminalError::UnpairedSurrogate(unit));
	};
	let (input, low) = code_unit(input)?;
	let Some(Ok(char)) = char::decode_utf16([unit, low]).next() else {
		nom_bail!(start, TerminalError::UnpairedSurrogate(unit));
	};
	Ok((input, char))
}

/**
	Encode `value` as a double-quoted terminal literal that [`terminal`] decodes
	back to `value`.

	Control characters without a named escape are written as `\uXXXX`.
*/
pub fn quote_terminal(value: &str) -> String {
	let mut out = String::with_capacity(value.len() + 2);
	out.push('"');
	for char in value.chars() {
		match char {
			'\0' => out.push_str("\\0"),
			'\u{C}' => out.push_str("\\f"),
			'\t' => out.push_str("\\t"),
			'\n' => out.push_str("\\n"),
			'\r' => out.push_str("\\r"),
			'"' => out.push_str("\\\""),
			'\\' => out.push_str("\\\\"),
			char if char.is_control() => _ = write!(out, "\\u{:04X}", u32::from(char)),
			char => out.push(char),
		}
	}
	out.push('"');
	out
}

/// A rule name: an ASCII letter, then letters, digits or underscores.
pub fn identifier(input: &str) -> PResult<ParseToken> {
	let (rest, name) = recognize((
		satisfy(IdentifierName::is_initial),
		take_while(IdentifierName::is_subsequent),
	))
	.parse(input)?;
	let name = match IdentifierName::new(name) {
		Ok(name) => name,
		Err(err) => nom_bail!(input, err),
	};
	let token = build(input, rest, Node::Identifier(name))?;
	Ok((rest, token))
}

pub(crate) fn whitespace(input: &str) -> PResult<ParseToken> {
	let (rest, text) = take_while1(char::is_whitespace).parse(input)?;
	let token = build(input, rest, Node::Whitespace(text.into()))?;
	Ok((rest, token))
}

/// `(* ... *)`. Comments do not nest.
pub(crate) fn comment(input: &str) -> PResult<ParseToken> {
	let (rest, text) = recognize((
		tag("(*"),
		cut(take_until("*)")),
		cut(tag("*)")),
	))
	.parse(input)?;
	let token = build(input, rest, Node::Comment(text.into()))?;
	Ok((rest, token))
}

/// A fixed symbol such as `=` or `..`.
pub(crate) fn symbol<'a>(expected: &'static str) -> impl FnMut(&'a str) -> PResult<'a, ParseToken> {
	move |input: &'a str| {
		let (rest, text) = tag(expected).parse(input)?;
		let token = build(input, rest, Node::Symbol(text.into()))?;
		Ok((rest, token))
	}
}

#[cfg(test)]
fn lex_terminal(input: &str) -> Result<(&str, String), nom::Err<GrammarFailure<'_>>> {
	terminal(input).map(|(rest, token)| (rest, token.value().unwrap_or_default().to_string()))
}

#[cfg(test)]
fn terminal_error(input: &str) -> Option<TerminalError> {
	match terminal(input) {
		Err(nom::Err::Failure(failure)) => match failure.into_parse_error(input).kind {
			crate::error::ParseErrorKind::Terminal(err) => Some(err),
			_ => None,
		},
		_ => None,
	}
}

#[test]
fn test_terminal() {
	assert_eq!(lex_terminal("'a'").ok(), Some(("", "a".into())));
	assert_eq!(lex_terminal(r#""ab" rest"#).ok(), Some((" rest", "ab".into())));
	assert_eq!(lex_terminal("''").ok(), Some(("", "".into())));
	assert_eq!(lex_terminal(r#"'"'"#).ok(), Some(("", "\"".into())));
	assert_eq!(lex_terminal(r#""'""#).ok(), Some(("", "'".into())));
	assert_eq!(
		lex_terminal(r#""\0\f\t\n\r\'\"\\""#).ok(),
		Some(("", "\0\u{C}\t\n\r'\"\\".into()))
	);
	assert_eq!(lex_terminal(r#"'Aé'"#).ok(), Some(("", "Aé".into())));
	assert_eq!(lex_terminal(r#"'😀'"#).ok(), Some(("", "\u{1F600}".into())));
	assert_eq!(lex_terminal(r"'\u0041\u00e9'").ok(), Some(("", "Aé".into())));
	assert_eq!(
		lex_terminal(r"'\uD83D\uDE00\u0041'").ok(),
		Some(("", "\u{1F600}A".into()))
	);

	let (_, token) = terminal(r#""a\nb""#).unwrap();
	assert_eq!(token.text(), r#""a\nb""#);
}

#[test]
fn test_terminal_no_match() {
	assert!(matches!(terminal(""), Err(nom::Err::Error(_))));
	assert!(matches!(terminal("abc"), Err(nom::Err::Error(_))));
	assert!(matches!(terminal(" 'a'"), Err(nom::Err::Error(_))));
}

#[test]
fn test_terminal_errors() {
	assert_eq!(terminal_error(r#"'\q'"#), Some(TerminalError::InvalidEscape('q')));
	assert_eq!(
		terminal_error(r#"'\u12g4'"#),
		Some(TerminalError::InvalidUnicodeEscape("12g4".into()))
	);
	assert_eq!(
		terminal_error(r#"'\u12'"#),
		Some(TerminalError::InvalidUnicodeEscape("12'".into()))
	);
	assert_eq!(terminal_error("'abc"), Some(TerminalError::Unterminated));
	assert_eq!(terminal_error(r"'abc\"), Some(TerminalError::Unterminated));
	assert_eq!(
		terminal_error(r#"'\uDE00'"#),
		Some(TerminalError::UnpairedSurrogate(0xDE00))
	);
	assert_eq!(
		terminal_error(r#"'\uD83Dx'"#),
		Some(TerminalError::UnpairedSurrogate(0xD83D))
	);
}

#[test]
fn test_quote_terminal() {
	assert_eq!(quote_terminal("abc"), r#""abc""#);
	assert_eq!(quote_terminal("it's \"q\""), r#""it's \"q\"""#);
	assert_eq!(quote_terminal("\u{1}\u{9F}"), r#""\u0001\u009F""#);
	for value in ["", "a\\b", "\0\u{C}\t\n\r", "\u{7F}", "héllo wörld"] {
		assert_eq!(
			lex_terminal(&quote_terminal(value)).ok(),
			Some(("", value.to_string()))
		);
	}
}

#[test]
fn test_identifier() {
	let (rest, token) = identifier("snake_case9 = x").unwrap();
	assert_eq!(rest, " = x");
	assert_eq!(token.value(), Some("snake_case9"));
	assert_eq!(token.text(), "snake_case9");

	assert!(matches!(identifier("9a"), Err(nom::Err::Error(_))));
	assert!(matches!(identifier("_a"), Err(nom::Err::Error(_))));
	assert!(matches!(identifier(""), Err(nom::Err::Error(_))));
	assert_eq!(identifier("a-b").map(|(rest, _)| rest).ok(), Some("-b"));
}

#[test]
fn test_comment() {
	let (rest, token) = comment("(* a (comment) *) x").unwrap();
	assert_eq!(rest, " x");
	assert_eq!(token.text(), "(* a (comment) *)");
	assert!(matches!(comment("(* open"), Err(nom::Err::Failure(_))));
	assert!(matches!(comment("(a)"), Err(nom::Err::Error(_))));
}

#[test]
fn test_symbol() {
	let (rest, token) = symbol("..").parse("..'z'").unwrap();
	assert_eq!(rest, "'z'");
	assert_eq!(token.value(), Some(".."));
	assert!(token.is_noise());
	assert!(symbol("..").parse(".'z'").is_err());
}
