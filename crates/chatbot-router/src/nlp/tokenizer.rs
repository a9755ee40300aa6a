use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

/// Split text into normalized word tokens.
///
/// Words come from Unicode word boundaries, are lower-cased without any
/// locale tailoring and go through a light suffix stemmer, so "Courses",
/// "course" and "course's" all produce `course`. Input with no word
/// characters yields an empty vector.
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words()
        .map(|word| stem(&word.to_lowercase()))
        .filter(|token| !token.is_empty())
        .collect()
}

/// Tokens of `text` as a set, which is how the matcher compares them.
pub fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// English function words. They carry no topic, so a shared "is" or "the"
/// must not count as an overlap between a question and a pattern.
const STOP_WORDS: &[&str] = &[
    "a", "about", "all", "am", "an", "and", "any", "are", "as", "at", "be", "been", "being",
    "but", "by", "can", "could", "did", "do", "doe", "does", "for", "from", "had", "has", "have",
    "he", "her", "him", "his", "how", "i", "if", "in", "into", "is", "it", "its", "me", "my",
    "no", "not", "of", "on", "or", "our", "please", "she", "should", "so", "some", "than",
    "that", "the", "their", "them", "then", "there", "these", "they", "this", "those",
    "to", "us", "was", "we", "were", "what", "when", "where", "which", "who", "whom",
    "why", "will", "with", "would", "you", "your",
];

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// `tokens` without stop words
pub fn content_tokens(tokens: &HashSet<String>) -> HashSet<String> {
    tokens
        .iter()
        .filter(|token| !is_stop_word(token))
        .cloned()
        .collect()
}

fn stem(word: &str) -> String {
    let word = word
        .strip_suffix("'s")
        .or_else(|| word.strip_suffix("\u{2019}s"))
        .unwrap_or(word);

    // Short words are left alone: "is", "its", "bus".
    if word.chars().count() <= 3 {
        return word.to_string();
    }

    if let Some(base) = word.strip_suffix("sses") {
        return format!("{}ss", base);
    }
    if let Some(base) = word.strip_suffix("ies") {
        return format!("{}y", base);
    }
    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_string();
    }
    if let Some(base) = word.strip_suffix('s') {
        return base.to_string();
    }

    word.to_string()
}
