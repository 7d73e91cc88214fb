pub use ebnf_tree_language::*;
pub use ebnf_tree_macro::ebnf;
pub use nom;
