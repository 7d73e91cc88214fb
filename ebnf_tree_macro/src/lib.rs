use std::collections::BTreeSet;
use std::fmt::Write;

use ebnf_tree_language::IdentifierName;
use quote::quote;
use syn::ext::IdentExt;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{Ident, LitStr, Token};

/**
	Checks a grammar at compile time and expands to the grammar text itself.

	The first argument is the grammar as a string literal. Any further
	identifiers name rules that are defined elsewhere, so references to them
	are not reported as unknown.

	Examples:
	```
	use ebnf_tree_macro::ebnf;

	const DIGITS: &str = ebnf!("digits = digit , { digit };", digit);
	assert!(DIGITS.starts_with("digits"));
	```
*/
#[proc_macro]
pub fn ebnf(tokens: proc_macro::TokenStream) -> proc_macro::TokenStream {
	let input: MacroInput = match syn::parse(tokens) {
		Ok(input) => input,
		Err(err) => {
			return compile_error(
				None,
				&format!("expected a grammar string followed by external rule names ({err})"),
			);
		},
	};

	let text = input.grammar.value();
	let grammar = match ebnf_tree_language::parse_grammar(&text) {
		Ok(g) => g,
		Err(err) => return compile_error(Some(err.into()), "couldn't parse given grammar"),
	};
	let externals = match input.external_names() {
		Ok(names) => names,
		Err(err) => return compile_error(Some(err.into()), "invalid external rule name"),
	};
	if let Err(err) = grammar.check_identifiers(&externals) {
		return compile_error(Some(err.into()), "given grammar has invalid identifiers");
	}

	let literal = input.grammar;
	quote! { #literal }.into()
}

struct MacroInput {
	grammar: LitStr,
	externals: Punctuated<Ident, Token![,]>,
}

impl MacroInput {
	fn external_names(&self) -> Result<BTreeSet<IdentifierName>, ebnf_tree_language::StructureError> {
		self.externals
			.iter()
			.map(|ident| IdentifierName::new(ident.unraw().to_string()))
			.collect()
	}
}

impl Parse for MacroInput {
	fn parse(input: ParseStream) -> syn::Result<Self> {
		let grammar = input.parse()?;
		let externals = if input.is_empty() {
			Punctuated::new()
		} else {
			input.parse::<Token![,]>()?;
			// grammar rule names may collide with Rust keywords
			Punctuated::parse_terminated_with(input, Ident::parse_any)?
		};
		Ok(Self { grammar, externals })
	}
}

fn compile_error(err: Option<anyhow::Error>, msg: &str) -> proc_macro::TokenStream {
	let msg = if let Some(err) = err {
		let mut causes = String::new();
		for cause in err.chain() {
			if !causes.is_empty() {
				_ = causes.write_str("\ncaused by: ");
			}
			_ = write!(causes, "{cause}");
		}
		&format!("{msg}: {causes}")
	} else {
		msg
	};
	quote! { compile_error! { #msg } }.into()
}
