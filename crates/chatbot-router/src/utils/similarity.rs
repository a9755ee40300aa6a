use std::collections::HashSet;
use std::hash::Hash;

/// Calculate Jaccard similarity between two token sets
/// Returns |A ∩ B| / max(|A ∪ B|, 1), always within [0.0, 1.0]
pub fn jaccard_similarity<T: Eq + Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f32 {
    let intersection = a.intersection(b).count();

    // |A ∪ B| = |A| + |B| - |A ∩ B|
    let union = a.len() + b.len() - intersection;

    intersection as f32 / union.max(1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> HashSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_identical_sets() {
        let a = set(&["office", "hours"]);
        assert_eq!(jaccard_similarity(&a, &a.clone()), 1.0);
    }

    #[test]
    fn test_disjoint_sets() {
        let a = set(&["office", "hours"]);
        let b = set(&["library"]);
        assert_eq!(jaccard_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_partial_overlap() {
        let a = set(&["where", "is", "the", "office"]);
        let b = set(&["office", "location"]);
        let sim = jaccard_similarity(&a, &b);
        assert!((sim - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_empty_sets() {
        let empty: HashSet<String> = HashSet::new();
        assert_eq!(jaccard_similarity(&empty, &empty), 0.0);
        assert_eq!(jaccard_similarity(&set(&["hi"]), &empty), 0.0);
    }

    #[test]
    fn test_bounds_hold_for_many_pairs() {
        let vocab = ["a", "b", "c", "d", "e"];
        for mask_a in 0u32..32 {
            for mask_b in 0u32..32 {
                let a: HashSet<&str> = (0..5).filter(|i| mask_a & (1u32 << *i) != 0).map(|i| vocab[i]).collect();
                let b: HashSet<&str> = (0..5).filter(|i| mask_b & (1u32 << *i) != 0).map(|i| vocab[i]).collect();
                let sim = jaccard_similarity(&a, &b);
                assert!((0.0..=1.0).contains(&sim));
                if !a.is_empty() && a == b {
                    assert_eq!(sim, 1.0);
                }
                if a.is_disjoint(&b) {
                    assert_eq!(sim, 0.0);
                }
            }
        }
    }
}
