use rand::Rng;
use std::collections::HashSet;
use tracing::debug;

use crate::intents::Intent;
use crate::nlp::{content_tokens, token_set};
use crate::utils::similarity::jaccard_similarity;

/// Best score seen across all patterns, with the response captured when it was reached
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub score: f32,
    pub response: Option<String>,
}

/// Rule-based matcher over intent patterns
#[derive(Debug, Clone)]
pub struct LexicalMatcher {
    threshold: f32,
}

impl LexicalMatcher {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Score every non-default pattern against the message tokens.
    ///
    /// A response is drawn only when a strictly higher score appears, so the
    /// first intent to reach a given score keeps it.
    pub fn best_match<'a, I, R>(
        &self,
        tokens: &HashSet<String>,
        intents: I,
        rng: &mut R,
    ) -> MatchResult
    where
        I: IntoIterator<Item = &'a Intent>,
        R: Rng + ?Sized,
    {
        let mut best = MatchResult {
            score: 0.0,
            response: None,
        };

        for intent in intents.into_iter().filter(|i| !i.is_default()) {
            for pattern in &intent.patterns {
                let score = jaccard_similarity(tokens, &token_set(pattern));
                if score > best.score {
                    best.score = score;
                    if let Some(response) = intent.pick_response(rng) {
                        best.response = Some(response);
                    }
                }
            }
        }

        best
    }

    /// Response of the best match if it clears the threshold
    pub fn match_intent<'a, I, R>(
        &self,
        tokens: &HashSet<String>,
        intents: I,
        rng: &mut R,
    ) -> Option<String>
    where
        I: IntoIterator<Item = &'a Intent>,
        R: Rng + ?Sized,
    {
        let best = self.best_match(tokens, intents, rng);
        debug!(
            "Lexical best score {:.3} (threshold {:.3})",
            best.score, self.threshold
        );

        if best.score >= self.threshold {
            best.response
        } else {
            None
        }
    }
}

/// Permissive fallback: the first non-default intent/pattern pair that shares
/// at least one content word with the message. No ranking. Stop words on
/// either side are ignored.
pub fn first_overlap<'a, I, R>(tokens: &HashSet<String>, intents: I, rng: &mut R) -> Option<String>
where
    I: IntoIterator<Item = &'a Intent>,
    R: Rng + ?Sized,
{
    let tokens = content_tokens(tokens);
    if tokens.is_empty() {
        return None;
    }

    intents
        .into_iter()
        .filter(|intent| !intent.is_default() && !intent.responses.is_empty())
        .find(|intent| {
            intent
                .patterns
                .iter()
                .any(|pattern| !content_tokens(&token_set(pattern)).is_disjoint(&tokens))
        })
        .and_then(|intent| {
            debug!("Permissive overlap with intent '{}'", intent.tag);
            intent.pick_response(rng)
        })
}
