use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Window;

/// Sparse weighted set of artist keys for one user and one window
///
/// Keys are kept ordered so iteration, dot products and tie-breaks are
/// deterministic. Every stored weight is strictly positive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreferenceVector(BTreeMap<String, f64>);

impl PreferenceVector {
    /// Builds a vector, dropping non-positive and non-finite weights
    pub fn from_weights<I>(weights: I) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        Self(
            weights
                .into_iter()
                .filter(|(_, weight)| weight.is_finite() && *weight > 0.0)
                .collect(),
        )
    }

    /// Weight for a key, 0.0 when absent
    pub fn weight(&self, key: &str) -> f64 {
        self.0.get(key).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(key, weight)| (key.as_str(), *weight))
    }

    /// Sum of squared weights (the squared L2 norm), summed in key order
    pub fn sum_of_squares(&self) -> f64 {
        self.0.values().map(|w| w * w).sum()
    }
}

/// Similarity per window, each in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowScores {
    #[serde(rename = "3month")]
    pub three_month: f64,
    #[serde(rename = "12month")]
    pub twelve_month: f64,
    pub overall: f64,
}

impl WindowScores {
    pub fn get(&self, window: Window) -> f64 {
        match window {
            Window::ThreeMonth => self.three_month,
            Window::TwelveMonth => self.twelve_month,
            Window::Overall => self.overall,
        }
    }

    pub fn set(&mut self, window: Window, score: f64) {
        match window {
            Window::ThreeMonth => self.three_month = score,
            Window::TwelveMonth => self.twelve_month = score,
            Window::Overall => self.overall = score,
        }
    }

    /// Every window scored at the same value
    pub fn uniform(score: f64) -> Self {
        Self {
            three_month: score,
            twelve_month: score,
            overall: score,
        }
    }
}

/// Artist both users listen to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapEntry {
    pub artist: String,
    pub a_weight: f64,
    pub b_weight: f64,
    pub combined: f64,
}

/// Artist one user listens to and the other does not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationEntry {
    pub artist: String,
    pub weight: f64,
}

/// Outcome of comparing two listeners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub scores: WindowScores,
    /// Blended score in [0, 100]
    pub final_score: f64,
    /// Window the overlap and recommendation lists were derived from
    pub source_window: Window,
    pub overlap: Vec<OverlapEntry>,
    pub recs_for_a: Vec<RecommendationEntry>,
    pub recs_for_b: Vec<RecommendationEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_weights_drops_non_positive() {
        let vector = PreferenceVector::from_weights(vec![
            ("a".to_string(), 1.5),
            ("b".to_string(), 0.0),
            ("c".to_string(), -2.0),
            ("d".to_string(), f64::NAN),
        ]);

        assert_eq!(vector.len(), 1);
        assert!(vector.contains("a"));
        assert!(!vector.contains("b"));
    }

    #[test]
    fn test_weight_of_absent_key_is_zero() {
        let vector = PreferenceVector::from_weights(vec![("a".to_string(), 2.0)]);
        assert_eq!(vector.weight("a"), 2.0);
        assert_eq!(vector.weight("missing"), 0.0);
    }

    #[test]
    fn test_sum_of_squares() {
        let vector =
            PreferenceVector::from_weights(vec![("x".to_string(), 3.0), ("y".to_string(), 4.0)]);
        assert_eq!(vector.sum_of_squares(), 25.0);
        assert_eq!(PreferenceVector::default().sum_of_squares(), 0.0);
    }

    #[test]
    fn test_iteration_is_key_ordered() {
        let vector = PreferenceVector::from_weights(vec![
            ("zeta".to_string(), 1.0),
            ("alpha".to_string(), 1.0),
            ("mu".to_string(), 1.0),
        ]);
        let keys: Vec<&str> = vector.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["alpha", "mu", "zeta"]);
    }

    #[test]
    fn test_window_scores_serialize_with_period_ids() {
        let mut scores = WindowScores::default();
        scores.set(Window::ThreeMonth, 0.25);
        scores.set(Window::Overall, 1.0);

        let json = serde_json::to_value(scores).unwrap();
        assert_eq!(json["3month"], 0.25);
        assert_eq!(json["12month"], 0.0);
        assert_eq!(json["overall"], 1.0);
        assert_eq!(scores.get(Window::Overall), 1.0);
    }
}
