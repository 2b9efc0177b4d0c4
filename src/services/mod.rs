pub mod match_runner;
pub mod matching;
pub mod providers;
pub mod retry;
pub mod similarity;
pub mod vector;

pub use match_runner::MatchRunner;
pub use matching::compute_match;
pub use retry::RetryPolicy;
pub use similarity::cosine_similarity;
pub use vector::build_vector;
