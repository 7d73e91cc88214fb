use ebnf_tree_language::lexer::terminal;
use ebnf_tree_language::{ParseToken, parse_grammar, quote_terminal};
use proptest::prelude::*;

proptest! {
	#[test]
	fn terminal_value_round_trips(value in "\\PC*|[\\x00-\\x1F\"'\\\\]*") {
		let quoted = quote_terminal(&value);
		let (rest, token) = terminal(&quoted).unwrap();
		prop_assert_eq!(rest, "");
		prop_assert_eq!(token.value(), Some(value.as_str()));
		prop_assert_eq!(&token, &ParseToken::terminal_from_value(value.clone()));
	}

	#[test]
	fn parser_never_panics(input in "\\PC{0,200}") {
		_ = parse_grammar(&input);
	}

	#[test]
	fn parsed_text_is_preserved(names in prop::collection::vec("[a-z][a-z0-9_]{0,6}", 1..6), space in "[ \t\n]{0,3}") {
		let text = names
			.iter()
			.map(|name| format!("{name}{space}={space}'{name}'{space};"))
			.collect::<Vec<_>>()
			.join(space.as_str());
		let grammar = parse_grammar(&text).unwrap();
		prop_assert_eq!(grammar.to_string(), text);
		prop_assert_eq!(grammar.rules().count(), names.len());
	}
}
