pub mod match_store;
pub mod postgres;
pub mod redis;

pub use match_store::{InMemoryMatchStore, MatchStore};
pub use postgres::{create_pool, PgMatchStore};
pub use redis::create_redis_client;
pub use redis::{Cache, CacheKey, CacheWriterHandle};
