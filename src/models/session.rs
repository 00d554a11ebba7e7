//! Session model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Sessions live for seven days.
pub const SESSION_LIFETIME_DAYS: i64 = 7;

/// Server-side login session. `id` is the unsigned token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session ID (UUID)
    pub id: String,
    /// Associated user ID
    pub user_id: i64,
    /// Expiration timestamp
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Start a fresh session for `user_id`.
    pub fn new(user_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + Duration::days(SESSION_LIFETIME_DAYS),
            created_at: now,
        }
    }

    /// Cookie Max-Age in seconds.
    pub fn max_age_secs() -> i64 {
        Duration::days(SESSION_LIFETIME_DAYS).num_seconds()
    }
}
