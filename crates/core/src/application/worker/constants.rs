// Worker constants (no magic values)
use std::time::Duration;

/// Sleep duration when no delivery is due (1s)
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Sleep duration after worker error before retry (5s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(5);

/// Deliveries sent per poll before the worker yields (backpressure)
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Initial attempt plus three retries
pub const DEFAULT_MAX_ATTEMPTS: i32 = 4;

/// Fixed delay between delivery attempts (30s)
pub const DEFAULT_RETRY_DELAY_MS: i64 = 30_000;

/// 1.0 keeps the retry delay fixed
pub const DEFAULT_BACKOFF_FACTOR: f64 = 1.0;

/// SENDING deliveries older than this are considered orphaned (5 minutes)
pub const DEFAULT_RECOVERY_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Days of remaining supply at which a refill alert fires
pub const DEFAULT_REFILL_THRESHOLD_DAYS: i64 = 3;

/// Page size when walking dose history for the streak
pub const STREAK_PAGE_SIZE: i64 = 200;
