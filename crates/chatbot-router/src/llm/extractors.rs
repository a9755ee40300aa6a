use serde_json::Value;

/// A pure probe that pulls reply text out of a raw model response
pub trait TextExtractor: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, raw: &Value) -> Option<String>;
}

/// A plain string, or a top-level `text` field
pub struct DirectText;

/// A list of segments (top-level array or `parts`), each carrying `text` or `content`
pub struct SegmentList;

/// First candidate of a Gemini or OpenAI-style response
pub struct FirstCandidate;

/// Common single-key shapes
pub struct KeyLookup {
    keys: &'static [&'static str],
}

impl Default for KeyLookup {
    fn default() -> Self {
        Self {
            keys: &["output", "content", "response", "answer", "message"],
        }
    }
}

fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Join the text of every segment, skipping segments without any
fn join_segments(segments: &[Value]) -> Option<String> {
    let joined: String = segments
        .iter()
        .filter_map(|segment| match segment {
            Value::String(s) => Some(s.as_str()),
            Value::Object(_) => segment["text"]
                .as_str()
                .or_else(|| segment["content"].as_str())
                .or_else(|| segment["content"]["text"].as_str()),
            _ => None,
        })
        .collect();

    non_blank(&joined)
}

impl TextExtractor for DirectText {
    fn name(&self) -> &'static str {
        "direct_text"
    }

    fn extract(&self, raw: &Value) -> Option<String> {
        match raw {
            Value::String(s) => non_blank(s),
            _ => raw["text"].as_str().and_then(non_blank),
        }
    }
}

impl TextExtractor for SegmentList {
    fn name(&self) -> &'static str {
        "segment_list"
    }

    fn extract(&self, raw: &Value) -> Option<String> {
        raw.as_array()
            .or_else(|| raw["parts"].as_array())
            .or_else(|| raw["content"]["parts"].as_array())
            .and_then(|segments| join_segments(segments))
    }
}

impl TextExtractor for FirstCandidate {
    fn name(&self) -> &'static str {
        "first_candidate"
    }

    fn extract(&self, raw: &Value) -> Option<String> {
        let candidate = &raw["candidates"][0];
        if !candidate.is_null() {
            return candidate["content"]["parts"]
                .as_array()
                .and_then(|parts| join_segments(parts))
                .or_else(|| candidate["text"].as_str().and_then(non_blank))
                .or_else(|| candidate["output"].as_str().and_then(non_blank));
        }

        let choice = &raw["choices"][0];
        choice["message"]["content"]
            .as_str()
            .or_else(|| choice["text"].as_str())
            .and_then(non_blank)
    }
}

impl TextExtractor for KeyLookup {
    fn name(&self) -> &'static str {
        "key_lookup"
    }

    fn extract(&self, raw: &Value) -> Option<String> {
        let object = raw.as_object()?;
        self.keys
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_str).and_then(non_blank))
    }
}

/// Probes in priority order
pub fn default_extractors() -> Vec<Box<dyn TextExtractor>> {
    vec![
        Box::new(DirectText),
        Box::new(SegmentList),
        Box::new(FirstCandidate),
        Box::new(KeyLookup::default()),
    ]
}

/// Run the probes in order; when none matches, fall back to the raw
/// response rendered as a string
pub fn extract_text(extractors: &[Box<dyn TextExtractor>], raw: &Value) -> String {
    extractors
        .iter()
        .find_map(|extractor| {
            extractor.extract(raw).inspect(|_| {
                tracing::debug!("Reply text extracted via {}", extractor.name());
            })
        })
        .unwrap_or_else(|| match raw {
            Value::Null => String::new(),
            other => other.to_string(),
        })
}
