use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row of the `tokens` table. The id is assigned by the caller, never generated.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TokenRecord {
    pub id: String,
    /// Serialized payload, opaque to the store.
    pub value: String,
}

/// Refresh token issued by the token service and persisted through the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtRefreshToken {
    /// The refresh token string handed to the client.
    pub token: String,
    /// Subject (user) the token was issued for.
    pub subject: String,
    pub expires_at: DateTime<Utc>,
}

impl JwtRefreshToken {
    pub fn new(token: impl Into<String>, subject: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            subject: subject.into(),
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let token = JwtRefreshToken::new("rt-1", "u1", now + Duration::minutes(5));
        assert!(!token.is_expired_at(now));
        assert!(token.is_expired_at(now + Duration::minutes(5)));
        assert!(token.is_expired_at(now + Duration::hours(1)));
    }
}
