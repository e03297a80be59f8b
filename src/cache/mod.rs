use crate::redis_client::RedisClient;

pub mod seats;

/// Read-through cache in front of the hot public reads.
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    seats_ttl_seconds: u64,
}

impl CacheService {
    pub fn new(redis: RedisClient, seats_ttl_seconds: u64) -> Self {
        Self {
            redis,
            seats_ttl_seconds,
        }
    }
}
