use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::cache::CacheService;
use crate::models::SeatView;

pub(crate) fn seats_key(screening_id: i64) -> String {
    format!("seats:{screening_id}")
}

/// Bumped on every invalidation so a reader can tell its load went stale.
pub(crate) fn generation_key(screening_id: i64) -> String {
    format!("seats:{screening_id}:gen")
}

// Writes the map only while the generation still matches the one the reader
// saw before loading from the database.
const GUARDED_SET: &str = r"
if (redis.call('GET', KEYS[2]) or '0') == ARGV[2] then
    redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[3])
    return 1
end
return 0
";

/// Outcome of a seat-map lookup. A miss carries the generation to hand back
/// to [`CacheService::cache_seats`].
#[derive(Debug)]
pub enum SeatsLookup {
    Hit(Vec<SeatView>),
    Miss { generation: Option<u64> },
}

impl CacheService {
    /// Cached seat map of a screening. Any Redis or decode failure reads as a miss.
    pub async fn cached_seats(&self, screening_id: i64) -> SeatsLookup {
        match self.read_seats(screening_id).await {
            Ok((Some(seats), _)) => SeatsLookup::Hit(seats),
            Ok((None, generation)) => SeatsLookup::Miss {
                generation: Some(generation),
            },
            Err(e) => {
                warn!(screening_id, error = %e, "seat cache read failed");
                SeatsLookup::Miss { generation: None }
            }
        }
    }

    /// Stores a freshly loaded map unless the screening was invalidated after
    /// `generation` was read.
    pub async fn cache_seats(&self, screening_id: i64, generation: Option<u64>, seats: &[SeatView]) {
        let Some(generation) = generation else {
            return;
        };
        match self.write_seats(screening_id, generation, seats).await {
            Ok(true) => {}
            Ok(false) => debug!(screening_id, "seat map changed while loading, not cached"),
            Err(e) => warn!(screening_id, error = %e, "seat cache write failed"),
        }
    }

    /// Drops the cached seat map after a booking, cancellation or delete changed it.
    pub async fn invalidate_seats(&self, screening_id: i64) {
        let mut conn = self.redis.conn.clone();
        let result: Result<(), _> = redis::pipe()
            .atomic()
            .incr(generation_key(screening_id), 1)
            .ignore()
            .del(seats_key(screening_id))
            .ignore()
            .query_async(&mut conn)
            .await;
        match result {
            Ok(()) => debug!(screening_id, "seat cache invalidated"),
            Err(e) => warn!(screening_id, error = %e, "seat cache invalidation failed"),
        }
    }

    pub async fn invalidate_many(&self, screening_ids: &[i64]) {
        for &screening_id in screening_ids {
            self.invalidate_seats(screening_id).await;
        }
    }

    async fn read_seats(
        &self,
        screening_id: i64,
    ) -> Result<(Option<Vec<SeatView>>, u64), redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let (data, generation): (Option<String>, Option<u64>) = conn
            .mget(&[seats_key(screening_id), generation_key(screening_id)])
            .await?;
        let generation = generation.unwrap_or(0);
        let Some(data) = data else {
            return Ok((None, generation));
        };
        let seats = serde_json::from_str(&data).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Parse error"))
        })?;
        Ok((Some(seats), generation))
    }

    async fn write_seats(
        &self,
        screening_id: i64,
        generation: u64,
        seats: &[SeatView],
    ) -> Result<bool, redis::RedisError> {
        let data = serde_json::to_string(seats).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error"))
        })?;
        let mut conn = self.redis.conn.clone();
        let written: i32 = redis::Script::new(GUARDED_SET)
            .key(seats_key(screening_id))
            .key(generation_key(screening_id))
            .arg(data)
            .arg(generation)
            .arg(self.seats_ttl_seconds)
            .invoke_async(&mut conn)
            .await?;
        Ok(written == 1)
    }
}
