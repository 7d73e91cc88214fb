use ebnf_tree::{GrammarLoader, IdentifierName, TokenKind, ebnf, parse_grammar};

const EXPRESSION: &str = ebnf!(
	r#"
	(* arithmetic over integers *)
	expression = term , { ( '+' | '-' ) , term } ;
	term = factor , { ( '*' | '/' ) , factor } ;
	factor = number | ( '(' , expression , ')' ) ;
	number = digit , { digit } ;
	digit = '0' .. '9' ;
"#
);

#[test]
fn macro_expands_to_grammar_text() {
	let grammar = parse_grammar(EXPRESSION).unwrap();
	assert_eq!(grammar.to_string(), EXPRESSION);
	assert_eq!(grammar.rules().count(), 5);
	assert_eq!(grammar.rule("digit").unwrap().rhs.kind(), TokenKind::Range);
}

#[test]
fn macro_accepts_externals() {
	let text = ebnf!("identifier = letter , { letter | digit } ;", letter, digit);
	let loader = GrammarLoader::from_text("identifier", text)
		.with_externals(["letter", "digit"].map(|name| name.parse::<IdentifierName>().unwrap()));
	assert_eq!(loader.load().unwrap().rules().count(), 1);
}

#[test]
fn macro_accepts_keyword_externals() {
	let text = ebnf!("declaration = type , name , [ where ] ;", type, name, where);
	let loader = GrammarLoader::from_text("declaration", text)
		.with_externals(["type", "name", "where"].map(|name| name.parse::<IdentifierName>().unwrap()));
	assert_eq!(loader.load().unwrap().rules().count(), 1);
}

#[test]
fn facade_reexports_nom() {
	use ebnf_tree::nom::Parser;

	let (rest, grammar) = ebnf_tree::grammar_parser().parse("a = 'x'; !").unwrap();
	assert_eq!(rest, "!");
	assert_eq!(grammar.rules().count(), 1);
}
