pub mod lexical;

pub use lexical::{first_overlap, LexicalMatcher, MatchResult};
