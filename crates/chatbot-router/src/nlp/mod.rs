pub mod tokenizer;

pub use tokenizer::{content_tokens, is_stop_word, token_set, tokenize};
