use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::{
    ArtistEntry, MatchResult, OverlapEntry, PreferenceVector, RecommendationEntry, Window,
    WindowPayloads, WindowScores,
};
use crate::services::{similarity::cosine_similarity, vector::build_vector};

/// Blend weights per window; recent taste counts most
const THREE_MONTH_WEIGHT: f64 = 0.55;
const TWELVE_MONTH_WEIGHT: f64 = 0.30;
const OVERALL_WEIGHT: f64 = 0.15;

/// Maximum entries in each overlap/recommendation list
const LIST_LIMIT: usize = 10;

/// Compares two listeners across all windows
///
/// Builds a preference vector per user and window, scores each window pair
/// with cosine similarity and blends the three scores into a 0-100 match
/// score. Shared artists and recommendations come from a single
/// representative window (see [`source_window`]).
///
/// Never fails: users without listening data simply produce zero scores and
/// empty lists. Entries with equal ranking weight are ordered by artist key.
pub fn compute_match(user_a: &WindowPayloads, user_b: &WindowPayloads) -> MatchResult {
    let mut vectors_a = HashMap::new();
    let mut vectors_b = HashMap::new();
    let mut scores = WindowScores::default();

    for window in Window::ALL {
        let vec_a = build_vector(payload(user_a, window));
        let vec_b = build_vector(payload(user_b, window));
        scores.set(window, round_to(cosine_similarity(&vec_a, &vec_b), 4));
        vectors_a.insert(window, vec_a);
        vectors_b.insert(window, vec_b);
    }

    let source = source_window(user_a);
    let vec_a = &vectors_a[&source];
    let vec_b = &vectors_b[&source];
    let names_a = display_names(payload(user_a, source));
    let names_b = display_names(payload(user_b, source));

    let overlap = shared_artists(vec_a, vec_b, &names_a, &names_b);
    let recs_for_a = missing_artists(vec_b, vec_a, &names_b);
    let recs_for_b = missing_artists(vec_a, vec_b, &names_a);

    tracing::debug!(
        three_month = scores.three_month,
        twelve_month = scores.twelve_month,
        overall = scores.overall,
        source_window = %source,
        overlap = overlap.len(),
        "Match computed"
    );

    MatchResult {
        final_score: blend(&scores),
        scores,
        source_window: source,
        overlap,
        recs_for_a,
        recs_for_b,
    }
}

/// Weighted blend of the window scores, scaled to 0-100 with one decimal
pub fn blend(scores: &WindowScores) -> f64 {
    let blended = THREE_MONTH_WEIGHT * scores.three_month
        + TWELVE_MONTH_WEIGHT * scores.twelve_month
        + OVERALL_WEIGHT * scores.overall;
    round_to(blended * 100.0, 1)
}

/// Window used for overlap and recommendations
///
/// Prefers the all-time list, falling back to shorter windows when user A
/// has no data there.
pub fn source_window(user_a: &WindowPayloads) -> Window {
    [Window::Overall, Window::TwelveMonth]
        .into_iter()
        .find(|window| !payload(user_a, *window).is_empty())
        .unwrap_or(Window::ThreeMonth)
}

fn payload(payloads: &WindowPayloads, window: Window) -> &[ArtistEntry] {
    payloads.get(&window).map(Vec::as_slice).unwrap_or(&[])
}

fn display_names(entries: &[ArtistEntry]) -> HashMap<String, String> {
    entries
        .iter()
        .filter(|entry| !entry.name.is_empty())
        .map(|entry| (entry.key(), entry.name.clone()))
        .collect()
}

fn shared_artists(
    vec_a: &PreferenceVector,
    vec_b: &PreferenceVector,
    names_a: &HashMap<String, String>,
    names_b: &HashMap<String, String>,
) -> Vec<OverlapEntry> {
    let mut overlap: Vec<OverlapEntry> = vec_a
        .iter()
        .filter(|(key, _)| vec_b.contains(key))
        .map(|(key, a_weight)| {
            let b_weight = vec_b.weight(key);
            OverlapEntry {
                artist: names_a
                    .get(key)
                    .or_else(|| names_b.get(key))
                    .cloned()
                    .unwrap_or_else(|| key.to_string()),
                a_weight,
                b_weight,
                combined: a_weight + b_weight,
            }
        })
        .collect();

    // Stable sort keeps key order among equal weights
    overlap.sort_by(|x, y| descending(x.combined, y.combined));
    overlap.truncate(LIST_LIMIT);
    overlap
}

/// Artists in `source` that `target` lacks, heaviest first
fn missing_artists(
    source: &PreferenceVector,
    target: &PreferenceVector,
    names: &HashMap<String, String>,
) -> Vec<RecommendationEntry> {
    let mut recs: Vec<RecommendationEntry> = source
        .iter()
        .filter(|(key, _)| !target.contains(key))
        .map(|(key, weight)| RecommendationEntry {
            artist: names.get(key).cloned().unwrap_or_else(|| key.to_string()),
            weight,
        })
        .collect();

    recs.sort_by(|x, y| descending(x.weight, y.weight));
    recs.truncate(LIST_LIMIT);
    recs
}

fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}
