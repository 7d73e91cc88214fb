use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser};
use ebnf_tree::{GrammarLoader, IdentifierName};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Parse an EBNF grammar file and check that every rule it references exists.
#[derive(Debug, Parser)]
#[command(name = "ebnf-tree", version)]
struct Cli {
	/// Grammar file to load.
	path: PathBuf,

	/// A rule name defined outside the grammar; may be repeated.
	#[arg(short, long = "external", value_name = "NAME")]
	externals: Vec<IdentifierName>,

	/// Print the significant token tree.
	#[arg(long)]
	tree: bool,

	/// Increase logging verbosity (-v: debug, -vv+: trace).
	#[arg(short, long, action = ArgAction::Count)]
	verbose: u8,
}

fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();

	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive_for_verbosity(cli.verbose))),
		)
		.with_writer(std::io::stderr)
		.init();

	let loader = GrammarLoader::from_path(&cli.path).with_externals(cli.externals);
	let grammar = loader
		.load()
		.with_context(|| format!("couldn't load {}", cli.path.display()))?;
	info!(path = %cli.path.display(), "grammar is valid");

	if cli.tree {
		print!("{}", grammar.token().dump());
	}
	println!("ok: {} rules", grammar.rules().count());
	Ok(())
}

fn directive_for_verbosity(verbose: u8) -> &'static str {
	match verbose {
		0 => "ebnf_tree=warn,ebnf_tree_language=warn",
		1 => "ebnf_tree=debug,ebnf_tree_language=debug",
		_ => "ebnf_tree=trace,ebnf_tree_language=trace",
	}
}

#[test]
fn test_cli_arguments() {
	let cli = Cli::try_parse_from(["ebnf-tree", "grammar.ebnf", "-e", "digit", "--external", "letter", "--tree", "-vv"]).unwrap();
	assert_eq!(cli.path, PathBuf::from("grammar.ebnf"));
	assert_eq!(
		cli.externals.iter().map(IdentifierName::as_str).collect::<Vec<_>>(),
		["digit", "letter"]
	);
	assert!(cli.tree);
	assert_eq!(directive_for_verbosity(cli.verbose), "ebnf_tree=trace,ebnf_tree_language=trace");

	assert!(Cli::try_parse_from(["ebnf-tree", "grammar.ebnf", "-e", "9bad"]).is_err());
	assert!(Cli::try_parse_from(["ebnf-tree"]).is_err());
}
