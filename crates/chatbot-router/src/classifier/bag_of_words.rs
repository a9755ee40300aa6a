use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

use super::{Classification, ClassifierError, IntentClassifier};
use crate::nlp::tokenize;

/// Serialized model artifact, exported by the offline training job
#[derive(Debug, Deserialize)]
struct ModelArtifact {
    vocabulary: Vec<String>,
    tags: Vec<String>,
    layers: Vec<DenseLayer>,
}

/// Fully connected layer, `weights` is `[out][in]`
#[derive(Debug, Clone, Deserialize)]
struct DenseLayer {
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

impl DenseLayer {
    fn input_dim(&self) -> usize {
        self.weights.first().map(Vec::len).unwrap_or(0)
    }

    fn output_dim(&self) -> usize {
        self.weights.len()
    }

    fn forward(&self, input: &[f32]) -> Vec<f32> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>() + b)
            .collect()
    }
}

/// Feed-forward bag-of-words classifier.
///
/// Input is a 0/1 vector over a fixed vocabulary, hidden layers use ReLU
/// and the output goes through softmax.
pub struct BagOfWordsClassifier {
    /// Normalized token to input positions. Several artifact words can
    /// normalize to one token ("course", "courses"), so a token may set more
    /// than one position.
    vocabulary: HashMap<String, Vec<usize>>,
    tags: Vec<String>,
    layers: Vec<DenseLayer>,
}

impl std::fmt::Debug for BagOfWordsClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BagOfWordsClassifier")
            .field("vocabulary", &self.vocabulary.len())
            .field("tags", &self.tags)
            .field("layers", &self.layers.len())
            .finish()
    }
}

impl BagOfWordsClassifier {
    /// Load and validate a model artifact from disk
    pub async fn load(path: &Path) -> Result<Self, ClassifierError> {
        let raw = tokio::fs::read_to_string(path).await?;
        let artifact: ModelArtifact = serde_json::from_str(&raw)?;
        let classifier = Self::from_artifact(artifact)?;

        info!(
            "Loaded intent classifier from {} ({} words, {} tags)",
            path.display(),
            classifier.vocabulary.len(),
            classifier.tags.len()
        );
        Ok(classifier)
    }

    fn from_artifact(artifact: ModelArtifact) -> Result<Self, ClassifierError> {
        let ModelArtifact {
            vocabulary,
            tags,
            layers,
        } = artifact;

        if layers.is_empty() {
            return Err(ClassifierError::Shape("model has no layers".into()));
        }

        let mut expected_in = vocabulary.len();
        for (idx, layer) in layers.iter().enumerate() {
            if layer.bias.len() != layer.output_dim() {
                return Err(ClassifierError::Shape(format!(
                    "layer {}: bias has {} entries for {} outputs",
                    idx,
                    layer.bias.len(),
                    layer.output_dim()
                )));
            }
            if layer.weights.iter().any(|row| row.len() != expected_in)
                || layer.input_dim() != expected_in
            {
                return Err(ClassifierError::Shape(format!(
                    "layer {}: expected input width {}",
                    idx, expected_in
                )));
            }
            expected_in = layer.output_dim();
        }

        if expected_in != tags.len() {
            return Err(ClassifierError::Shape(format!(
                "output width {} does not match {} tags",
                expected_in,
                tags.len()
            )));
        }

        // Normalize vocabulary words with the shared tokenizer
        let mut normalized: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, word) in vocabulary.iter().enumerate() {
            if let Some(token) = tokenize(word).into_iter().next() {
                normalized.entry(token).or_default().push(idx);
            }
        }
        for (token, positions) in normalized.iter().filter(|(_, p)| p.len() > 1) {
            warn!(
                "Classifier vocabulary has {} words normalizing to '{}'",
                positions.len(),
                token
            );
        }
        let vocabulary = normalized;

        Ok(Self {
            vocabulary,
            tags,
            layers,
        })
    }

    fn bag_of_words(&self, tokens: &HashSet<String>) -> Vec<f32> {
        let width = self.layers[0].input_dim();
        let mut bag = vec![0.0; width];
        for token in tokens {
            if let Some(positions) = self.vocabulary.get(token) {
                for &idx in positions {
                    bag[idx] = 1.0;
                }
            }
        }
        bag
    }

    fn probabilities(&self, tokens: &HashSet<String>) -> Vec<f32> {
        let last = self.layers.len() - 1;
        let mut activations = self.bag_of_words(tokens);

        for (idx, layer) in self.layers.iter().enumerate() {
            activations = layer.forward(&activations);
            if idx != last {
                activations.iter_mut().for_each(|v| *v = v.max(0.0));
            }
        }

        softmax(&activations)
    }
}

impl IntentClassifier for BagOfWordsClassifier {
    fn classify(&self, tokens: &HashSet<String>) -> Option<Classification> {
        let probs = self.probabilities(tokens);

        let (idx, confidence) = probs
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (i, p)| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((i, p)),
            })?;

        debug!("Classifier picked '{}' ({:.3})", self.tags[idx], confidence);
        Some(Classification {
            tag: self.tags[idx].clone(),
            confidence,
        })
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return vec![0.0; logits.len()];
    }
    exps.into_iter().map(|v| v / sum).collect()
}
