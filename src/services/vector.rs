use crate::models::{ArtistEntry, PreferenceVector};

/// Builds a preference vector from a ranked artist list
///
/// Each artist is weighted by `ln(play_count + 1)`, which dampens the gap
/// between a heavy-rotation artist and the long tail. Artists with no plays
/// carry no weight and are left out. When two entries share a key the later
/// one wins.
pub fn build_vector(entries: &[ArtistEntry]) -> PreferenceVector {
    PreferenceVector::from_weights(
        entries
            .iter()
            .map(|entry| (entry.key(), play_weight(entry.play_count))),
    )
}

fn play_weight(play_count: u64) -> f64 {
    (play_count as f64).ln_1p()
}
