use crate::token::{IdentifierName, Node, ParseToken};

/// What [`walk`] does after a `start_*` handler returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisitAction {
	/// Visit the children, then call the matching `end_*` handler.
	Continue,
	/// Go straight to the matching `end_*` handler.
	Skip,
}

/**
	Per-kind handlers called by [`walk`].

	Parent kinds get a `start_*`/`end_*` pair, leaf kinds a single `visit_*`.
	Every default falls back to the generic [`start_token`](Self::start_token)
	and [`end_token`](Self::end_token), so an implementation only overrides the
	kinds it cares about.
*/
#[allow(unused_variables)]
pub trait TokenVisitor {
	fn start_token(&mut self, token: &ParseToken) -> VisitAction {
		VisitAction::Continue
	}

	fn end_token(&mut self, token: &ParseToken) {}

	fn visit_identifier(&mut self, token: &ParseToken, name: &IdentifierName) {
		self.visit_leaf(token);
	}

	fn visit_terminal(&mut self, token: &ParseToken, value: &str) {
		self.visit_leaf(token);
	}

	fn visit_comment(&mut self, token: &ParseToken) {
		self.visit_leaf(token);
	}

	fn visit_whitespace(&mut self, token: &ParseToken) {
		self.visit_leaf(token);
	}

	fn visit_symbol(&mut self, token: &ParseToken) {
		self.visit_leaf(token);
	}

	/// Default for every leaf: a start immediately followed by an end.
	fn visit_leaf(&mut self, token: &ParseToken) {
		self.start_token(token);
		self.end_token(token);
	}

	fn start_alternative(&mut self, token: &ParseToken) -> VisitAction {
		self.start_token(token)
	}

	fn end_alternative(&mut self, token: &ParseToken) {
		self.end_token(token);
	}

	fn start_concatenation(&mut self, token: &ParseToken) -> VisitAction {
		self.start_token(token)
	}

	fn end_concatenation(&mut self, token: &ParseToken) {
		self.end_token(token);
	}

	fn start_group(&mut self, token: &ParseToken) -> VisitAction {
		self.start_token(token)
	}

	fn end_group(&mut self, token: &ParseToken) {
		self.end_token(token);
	}

	fn start_optional(&mut self, token: &ParseToken) -> VisitAction {
		self.start_token(token)
	}

	fn end_optional(&mut self, token: &ParseToken) {
		self.end_token(token);
	}

	fn start_repeated(&mut self, token: &ParseToken) -> VisitAction {
		self.start_token(token)
	}

	fn end_repeated(&mut self, token: &ParseToken) {
		self.end_token(token);
	}

	fn start_range(&mut self, token: &ParseToken) -> VisitAction {
		self.start_token(token)
	}

	fn end_range(&mut self, token: &ParseToken) {
		self.end_token(token);
	}

	fn start_exception(&mut self, token: &ParseToken) -> VisitAction {
		self.start_token(token)
	}

	fn end_exception(&mut self, token: &ParseToken) {
		self.end_token(token);
	}

	fn start_rule(&mut self, token: &ParseToken) -> VisitAction {
		self.start_token(token)
	}

	fn end_rule(&mut self, token: &ParseToken) {
		self.end_token(token);
	}

	fn start_grammar(&mut self, token: &ParseToken) -> VisitAction {
		self.start_token(token)
	}

	fn end_grammar(&mut self, token: &ParseToken) {
		self.end_token(token);
	}
}

/// Walk `token` depth-first, dispatching each node to the handler for its kind.
pub fn walk<V: TokenVisitor + ?Sized>(token: &ParseToken, visitor: &mut V) {
	let (start, end): (fn(&mut V, &ParseToken) -> VisitAction, fn(&mut V, &ParseToken)) =
		match token.node() {
			Node::Identifier(name) => return visitor.visit_identifier(token, name),
			Node::Terminal(value) => return visitor.visit_terminal(token, value),
			Node::Comment(_) => return visitor.visit_comment(token),
			Node::Whitespace(_) => return visitor.visit_whitespace(token),
			Node::Symbol(_) => return visitor.visit_symbol(token),
			Node::Alternative(_) => (V::start_alternative, V::end_alternative),
			Node::Concatenation(_) => (V::start_concatenation, V::end_concatenation),
			Node::Group(_) => (V::start_group, V::end_group),
			Node::Optional(_) => (V::start_optional, V::end_optional),
			Node::Repeated(_) => (V::start_repeated, V::end_repeated),
			Node::Range(_) => (V::start_range, V::end_range),
			Node::Exception(_) => (V::start_exception, V::end_exception),
			Node::Rule(_) => (V::start_rule, V::end_rule),
			Node::Grammar(_) => (V::start_grammar, V::end_grammar),
		};

	if start(visitor, token) == VisitAction::Continue {
		for child in token.children() {
			walk(child, visitor);
		}
	}
	end(visitor, token);
}

impl ParseToken {
	/// Shorthand for [`walk`].
	pub fn accept<V: TokenVisitor + ?Sized>(&self, visitor: &mut V) {
		walk(self, visitor);
	}
}

#[cfg(test)]
use crate::parse_grammar;
#[cfg(test)]
use crate::token::TokenKind;

/// Records the order handlers fire in.
#[cfg(test)]
#[derive(Default)]
struct Trace {
	events: Vec<String>,
	skip: Option<TokenKind>,
}

#[cfg(test)]
impl TokenVisitor for Trace {
	fn start_token(&mut self, token: &ParseToken) -> VisitAction {
		if token.kind().is_noise() {
			return VisitAction::Continue;
		}
		self.events.push(format!("start {}", token.kind()));
		if self.skip == Some(token.kind()) {
			VisitAction::Skip
		} else {
			VisitAction::Continue
		}
	}

	fn end_token(&mut self, token: &ParseToken) {
		if !token.kind().is_noise() {
			self.events.push(format!("end {}", token.kind()));
		}
	}

	fn visit_identifier(&mut self, _token: &ParseToken, name: &IdentifierName) {
		self.events.push(format!("identifier {name}"));
	}

	fn visit_terminal(&mut self, _token: &ParseToken, value: &str) {
		self.events.push(format!("terminal {value}"));
	}
}

#[test]
fn test_walk_order() {
	let grammar = parse_grammar("a = b | 'c';").unwrap();
	let mut trace = Trace::default();
	grammar.token().accept(&mut trace);
	assert_eq!(
		trace.events,
		[
			"start grammar",
			"start rule",
			"identifier a",
			"start alternative",
			"identifier b",
			"terminal c",
			"end alternative",
			"end rule",
			"end grammar",
		]
	);
}

#[test]
fn test_skip_still_ends() {
	let grammar = parse_grammar("a = [ b ] , c;").unwrap();
	let mut trace = Trace {
		skip: Some(TokenKind::Optional),
		..Trace::default()
	};
	walk(grammar.token(), &mut trace);
	assert_eq!(
		trace.events,
		[
			"start grammar",
			"start rule",
			"identifier a",
			"start concatenation",
			"start optional",
			"end optional",
			"identifier c",
			"end concatenation",
			"end rule",
			"end grammar",
		]
	);
}

#[test]
fn test_noise_is_visited() {
	#[derive(Default)]
	struct Noise(usize, usize);
	impl TokenVisitor for Noise {
		fn visit_whitespace(&mut self, _token: &ParseToken) {
			self.0 += 1;
		}

		fn visit_comment(&mut self, _token: &ParseToken) {
			self.1 += 1;
		}
	}

	let grammar = parse_grammar("a = (* c *) b ;\n").unwrap();
	let mut noise = Noise::default();
	walk(grammar.token(), &mut noise);
	assert_eq!((noise.0, noise.1), (5, 1));
}
