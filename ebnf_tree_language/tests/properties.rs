use std::collections::BTreeSet;

use ebnf_tree_language::{
	GrammarLoader,
	IdentifierName,
	ParseErrorKind,
	ParseToken,
	StructureError,
	TokenKind,
	ValidationError,
	parse_grammar,
};

fn no_externals() -> BTreeSet<IdentifierName> {
	BTreeSet::new()
}

fn names(names: &[&str]) -> BTreeSet<IdentifierName> {
	names.iter().map(|name| name.parse().unwrap()).collect()
}

#[test]
fn single_rule() {
	let grammar = parse_grammar("A = 'x';").unwrap();
	let rules = grammar.rules().collect::<Vec<_>>();
	assert_eq!(rules.len(), 1);
	assert_eq!(rules[0].identifier.as_str(), "A");
	assert_eq!(rules[0].rhs.kind(), TokenKind::Terminal);
	assert_eq!(rules[0].rhs.value(), Some("x"));
	assert_eq!(grammar.check_identifiers(&no_externals()), Ok(()));
}

#[test]
fn undeclared_reference() {
	let grammar = parse_grammar("A = {B};").unwrap();
	let err = grammar.check_identifiers(&no_externals()).unwrap_err();
	assert_eq!(
		err,
		ValidationError::InvalidReferences {
			names: names(&["B"])
		}
	);
}

#[test]
fn duplicate_rule() {
	let grammar = parse_grammar("A = 'x'; A = 'y';").unwrap();
	let Err(ValidationError::DuplicateIdentifiers { rules }) = grammar.check_identifiers(&no_externals()) else {
		panic!("expected duplicate identifiers")
	};
	let values = rules
		.iter()
		.filter_map(ParseToken::as_rule)
		.filter_map(|rule| rule.rhs.value())
		.collect::<Vec<_>>();
	assert_eq!(values, ["x", "y"]);
}

#[test]
fn validation_is_repeatable() {
	let grammar = parse_grammar("A = B | 'x'; A = 'y';").unwrap();
	let first = grammar.check_identifiers(&no_externals());
	let second = grammar.check_identifiers(&no_externals());
	assert!(first.is_err());
	assert_eq!(first, second);

	let grammar = parse_grammar("A = 'x';").unwrap();
	let before = grammar.clone();
	assert!(grammar.check_identifiers(&no_externals()).is_ok());
	assert!(grammar.check_identifiers(&no_externals()).is_ok());
	assert_eq!(grammar, before);
}

#[test]
fn alternation_flattens() {
	let grammar = parse_grammar("A = 'x' | 'y' | 'z';").unwrap();
	let rhs = grammar.rule("A").unwrap().rhs;
	assert_eq!(rhs.kind(), TokenKind::Alternative);
	assert_eq!(rhs.significant_children().count(), 3);
	assert!(rhs.significant_children().all(|child| child.kind() == TokenKind::Terminal));
}

#[test]
fn range_bounds() {
	let grammar = parse_grammar("A = 'a' .. 'z';").unwrap();
	let bounds = grammar.rule("A").unwrap().rhs.as_range().unwrap();
	assert_eq!(bounds.begin.value(), Some("a"));
	assert_eq!(bounds.end.value(), Some("z"));

	let err = parse_grammar("A = ('a','b') .. 'z';").unwrap_err();
	assert!(matches!(
		err.kind,
		ParseErrorKind::Structure(StructureError::ChildKind {
			kind: TokenKind::Range,
			..
		})
	));
}

#[test]
fn greeting_end_to_end() {
	let text = r#"greeting = "hello" , "world" ;"#;
	let grammar = parse_grammar(text).unwrap();
	assert_eq!(grammar.to_string(), text);
	assert_eq!(grammar.check_identifiers(&no_externals()), Ok(()));
	assert_eq!(
		grammar.token().dump(),
		"grammar\n  rule\n    identifier greeting\n    concatenation\n      terminal \"hello\"\n      terminal \"world\"\n"
	);
}

#[test]
fn external_names() {
	let grammar = parse_grammar("x = y;").unwrap();
	assert_eq!(
		grammar.check_identifiers(&no_externals()),
		Err(ValidationError::InvalidReferences {
			names: names(&["y"])
		})
	);
	assert_eq!(grammar.check_identifiers(&names(&["y"])), Ok(()));
}

#[test]
fn loader_replays_failure() {
	let loader = GrammarLoader::from_text("undeclared", "x = y;").with_externals(Vec::new());
	let first = loader.load().unwrap_err().to_string();
	let second = loader.load().unwrap_err().to_string();
	assert_eq!(first, second);
	assert_eq!(first, "grammar `undeclared` has invalid identifiers");
}
