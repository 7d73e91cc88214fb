use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::error::LoadError;
use crate::parser::parse_grammar;
use crate::token::{Grammar, IdentifierName};

/// Where a [`GrammarLoader`] reads its grammar text from.
#[derive(Clone, Debug)]
pub enum GrammarSource {
	File(PathBuf),
	Text {
		name: String,
		text: Cow<'static, str>,
	},
}

impl GrammarSource {
	/// A display name for diagnostics: the path, or the name given with the text.
	pub fn name(&self) -> Cow<'_, str> {
		match self {
			Self::File(path) => path.to_string_lossy(),
			Self::Text { name, .. } => Cow::Borrowed(name.as_str()),
		}
	}

	fn read(&self) -> Result<Cow<'_, str>, LoadError> {
		match self {
			Self::File(path) => fs::read_to_string(path)
				.map(Cow::Owned)
				.map_err(|err| LoadError::Io {
					path: path.clone(),
					source: Arc::new(err),
				}),
			Self::Text { text, .. } => Ok(Cow::Borrowed(&**text)),
		}
	}
}

/**
	Loads a grammar once and hands out the same result on every later call.

	The first [`load`](Self::load) reads and parses the source and, if the
	loader was given externals, checks its identifiers against them. Whatever
	comes out, the parsed grammar or the error, is cached; a failed load is not
	retried.
*/
#[derive(Debug)]
pub struct GrammarLoader {
	source: GrammarSource,
	externals: Option<BTreeSet<IdentifierName>>,
	cached: OnceLock<Result<Grammar, LoadError>>,
}

impl GrammarLoader {
	pub fn new(source: GrammarSource) -> Self {
		Self {
			source,
			externals: None,
			cached: OnceLock::new(),
		}
	}

	pub fn from_path(path: impl AsRef<Path>) -> Self {
		Self::new(GrammarSource::File(path.as_ref().to_path_buf()))
	}

	pub fn from_text(name: impl Into<String>, text: impl Into<Cow<'static, str>>) -> Self {
		Self::new(GrammarSource::Text {
			name: name.into(),
			text: text.into(),
		})
	}

	/// Validate identifiers on load, accepting references to `externals` as well as declared rules.
	pub fn with_externals(mut self, externals: impl IntoIterator<Item = IdentifierName>) -> Self {
		self.externals = Some(externals.into_iter().collect());
		self
	}

	pub fn source(&self) -> &GrammarSource {
		&self.source
	}

	/// Whether [`load`](Self::load) has run, successfully or not.
	pub fn is_loaded(&self) -> bool {
		self.cached.get().is_some()
	}

	pub fn load(&self) -> Result<&Grammar, LoadError> {
		if self.is_loaded() {
			debug!(source = %self.source.name(), "replaying cached grammar");
		}
		self.cached
			.get_or_init(|| self.load_uncached())
			.as_ref()
			.map_err(Clone::clone)
	}

	fn load_uncached(&self) -> Result<Grammar, LoadError> {
		let name = self.source.name();
		debug!(source = %name, "loading grammar");

		let text = self.source.read()?;
		let grammar = parse_grammar(&text).map_err(|source| LoadError::Parse {
			name: name.to_string(),
			source,
		})?;

		if let Some(externals) = &self.externals {
			grammar
				.check_identifiers(externals)
				.map_err(|source| LoadError::Validation {
					name: name.to_string(),
					source,
				})?;
		}
		Ok(grammar)
	}
}

#[cfg(test)]
fn externals(names: &[&str]) -> Vec<IdentifierName> {
	names.iter().map(|name| name.parse().unwrap()).collect()
}

#[test]
fn test_load_from_text() {
	let loader = GrammarLoader::from_text("greeting", "greeting = 'hello' , 'world';");
	assert!(!loader.is_loaded());
	let grammar = loader.load().unwrap();
	assert_eq!(grammar.rules().count(), 1);
	assert!(loader.is_loaded());
	assert!(std::ptr::eq(grammar, loader.load().unwrap()));
}

#[test]
fn test_failed_load_is_replayed() {
	let loader = GrammarLoader::from_text("broken", "A = 'x'");
	let Err(LoadError::Parse { name, source }) = loader.load() else {
		panic!("expected a parse error")
	};
	assert_eq!(name, "broken");
	let Err(LoadError::Parse { source: again, .. }) = loader.load() else {
		panic!("expected the cached parse error")
	};
	assert_eq!(source, again);
}

#[test]
fn test_missing_file() {
	let path = std::env::temp_dir().join("ebnf_tree_missing_grammar.ebnf");
	let loader = GrammarLoader::from_path(&path);
	for _ in 0 .. 2 {
		let Err(LoadError::Io { path: reported, .. }) = loader.load() else {
			panic!("expected an io error")
		};
		assert_eq!(reported, path);
	}
}

#[test]
fn test_load_from_file() {
	let path = std::env::temp_dir().join(format!("ebnf_tree_loader_{}.ebnf", std::process::id()));
	fs::write(&path, "digit = '0' .. '9';\nnumber = digit , { digit };\n").unwrap();
	let loader = GrammarLoader::from_path(&path);
	let rules = loader.load().map(|grammar| grammar.rules().count());
	fs::remove_file(&path).unwrap();
	assert_eq!(rules.unwrap(), 2);
}

#[test]
fn test_externals_are_validated() {
	let text = "x = y;";
	assert!(GrammarLoader::from_text("plain", text).load().is_ok());

	let loader = GrammarLoader::from_text("strict", text).with_externals(externals(&[]));
	assert!(matches!(loader.load(), Err(LoadError::Validation { .. })));

	let loader = GrammarLoader::from_text("with y", text).with_externals(externals(&["y"]));
	assert!(loader.load().is_ok());
}
