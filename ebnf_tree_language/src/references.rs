use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use crate::error::ValidationError;
use crate::token::{Grammar, IdentifierName, ParseToken};
use crate::visitor::{TokenVisitor, VisitAction, walk};

/**
	Collects the rules a grammar declares and the identifiers its right-hand
	sides reference.

	Only top-level rules are recorded: a rule's right-hand side is walked for
	references, but a rule found inside another token is never descended into.
*/
#[derive(Clone, Debug, Default)]
pub struct ReferenceCollector {
	declared: BTreeMap<IdentifierName, Vec<ParseToken>>,
	references: BTreeSet<IdentifierName>,
	in_rule: bool,
}

impl ReferenceCollector {
	pub fn collect(grammar: &Grammar) -> Self {
		let mut collector = Self::default();
		walk(grammar.token(), &mut collector);
		collector
	}

	/// Rule tokens by the name they declare, in source order.
	pub fn declared(&self) -> &BTreeMap<IdentifierName, Vec<ParseToken>> {
		&self.declared
	}

	/// Every identifier used on a right-hand side.
	pub fn references(&self) -> &BTreeSet<IdentifierName> {
		&self.references
	}

	/// Rules sharing a name with another rule, grouped by name.
	pub fn duplicates(&self) -> Vec<ParseToken> {
		self.declared
			.values()
			.filter(|rules| rules.len() > 1)
			.flatten()
			.cloned()
			.collect()
	}

	/// References that are neither declared nor in `external`.
	pub fn unresolved(&self, external: &BTreeSet<IdentifierName>) -> BTreeSet<IdentifierName> {
		self.references
			.iter()
			.filter(|name| !self.declared.contains_key(*name) && !external.contains(*name))
			.cloned()
			.collect()
	}
}

impl TokenVisitor for ReferenceCollector {
	fn start_rule(&mut self, token: &ParseToken) -> VisitAction {
		if self.in_rule {
			return VisitAction::Skip;
		}
		let Some(rule) = token.as_rule() else {
			unreachable!()
		};
		trace!(rule = %rule.identifier, "collecting rule");
		self.declared
			.entry(rule.identifier.clone())
			.or_default()
			.push(token.clone());

		self.in_rule = true;
		walk(rule.rhs, self);
		self.in_rule = false;
		VisitAction::Skip
	}

	fn visit_identifier(&mut self, _token: &ParseToken, name: &IdentifierName) {
		if self.references.insert(name.clone()) {
			trace!(reference = %name, "collected reference");
		}
	}
}

impl Grammar {
	/**
		Check that rule names are unique and that every referenced identifier
		is declared by a rule or named in `external`.

		Duplicates are reported first, with every offending rule; otherwise
		all unknown references are reported together.
	*/
	pub fn check_identifiers(&self, external: &BTreeSet<IdentifierName>) -> Result<(), ValidationError> {
		let collector = ReferenceCollector::collect(self);
		debug!(
			rules = collector.declared.len(),
			references = collector.references.len(),
			external = external.len(),
			"checking identifiers"
		);

		let rules = collector.duplicates();
		if !rules.is_empty() {
			return Err(ValidationError::DuplicateIdentifiers { rules });
		}

		let names = collector.unresolved(external);
		if !names.is_empty() {
			return Err(ValidationError::InvalidReferences { names });
		}
		debug!("identifiers resolve");
		Ok(())
	}
}

#[cfg(test)]
use crate::parse_grammar;

#[cfg(test)]
fn names(names: &[&str]) -> BTreeSet<IdentifierName> {
	names.iter().map(|name| name.parse().unwrap()).collect()
}

#[test]
fn test_collect() {
	let grammar = parse_grammar("a = ( b , [ c ] ) | 'x'; b = { c - 'y' }; c = 'z' .. d;").unwrap();
	let collector = ReferenceCollector::collect(&grammar);
	assert_eq!(
		collector.declared().keys().map(IdentifierName::as_str).collect::<Vec<_>>(),
		["a", "b", "c"]
	);
	assert_eq!(collector.references(), &names(&["b", "c", "d"]));
	assert_eq!(collector.unresolved(&BTreeSet::new()), names(&["d"]));
	assert!(collector.duplicates().is_empty());
}

#[test]
fn test_rule_name_is_not_a_reference() {
	let grammar = parse_grammar("a = 'x';").unwrap();
	let collector = ReferenceCollector::collect(&grammar);
	assert!(collector.references().is_empty());
	assert_eq!(grammar.check_identifiers(&BTreeSet::new()), Ok(()));
}

#[test]
fn test_self_reference_resolves() {
	let grammar = parse_grammar("list = item , [ ',' , list ]; item = 'i';").unwrap();
	assert_eq!(grammar.check_identifiers(&BTreeSet::new()), Ok(()));
}

#[test]
fn test_unknown_references() {
	let grammar = parse_grammar("a = b | c | d; d = 'x';").unwrap();
	assert_eq!(
		grammar.check_identifiers(&BTreeSet::new()),
		Err(ValidationError::InvalidReferences {
			names: names(&["b", "c"])
		})
	);
	assert_eq!(grammar.check_identifiers(&names(&["b", "c"])), Ok(()));
	assert_eq!(
		grammar.check_identifiers(&names(&["c"])),
		Err(ValidationError::InvalidReferences { names: names(&["b"]) })
	);
}

#[test]
fn test_duplicates_reported_before_references() {
	let grammar = parse_grammar("A = 'x'; B = missing; A = 'y'; B = 'z'; C = 'w';").unwrap();
	let Err(ValidationError::DuplicateIdentifiers { rules }) = grammar.check_identifiers(&BTreeSet::new()) else {
		panic!("expected duplicate identifiers")
	};
	assert_eq!(
		rules.iter().map(ParseToken::text).collect::<Vec<_>>(),
		["A = 'x';", "A = 'y';", "B = missing;", "B = 'z';"]
	);
}

#[test]
fn test_identical_duplicates_are_kept() {
	let grammar = parse_grammar("A = 'x'; A = 'x';").unwrap();
	let Err(ValidationError::DuplicateIdentifiers { rules }) = grammar.check_identifiers(&BTreeSet::new()) else {
		panic!("expected duplicate identifiers")
	};
	assert_eq!(rules.len(), 2);
	assert_eq!(rules[0], rules[1]);
}

#[test]
fn test_error_messages() {
	let grammar = parse_grammar("x = z | y;").unwrap();
	let err = grammar.check_identifiers(&BTreeSet::new()).unwrap_err();
	assert_eq!(err.to_string(), "references to unknown identifiers: y, z");

	let grammar = parse_grammar("b = 'x'; a = 'y'; b = 'z'; a = 'w';").unwrap();
	let err = grammar.check_identifiers(&BTreeSet::new()).unwrap_err();
	assert_eq!(err.to_string(), "duplicate rule identifiers: a, b");
}
