use crate::models::PreferenceVector;

/// Cosine similarity of two preference vectors
///
/// Returns 0.0 if either vector is empty or has zero magnitude. Weights are
/// non-negative, so the result lies in [0.0, 1.0].
pub fn cosine_similarity(a: &PreferenceVector, b: &PreferenceVector) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    // Only shared keys contribute; walk the smaller vector
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small
        .iter()
        .map(|(key, weight)| weight * large.weight(key))
        .sum();

    let sum_sq_a = a.sum_of_squares();
    let sum_sq_b = b.sum_of_squares();

    if sum_sq_a == 0.0 || sum_sq_b == 0.0 {
        return 0.0;
    }

    // One sqrt over the product: for a == b the denominator is exactly the dot product
    (dot / (sum_sq_a * sum_sq_b).sqrt()).clamp(0.0, 1.0)
}
