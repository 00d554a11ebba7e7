//! User model
//!
//! Registered accounts. The `admin` role is the staff role: it bypasses
//! moderation and the attraction visibility rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Viewer;

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique, case-insensitive)
    pub username: String,
    /// Email address (unique, case-insensitive)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// User role
    pub role: UserRole,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User with the given parameters.
    ///
    /// The password must already be hashed with
    /// `services::password::hash_password()`.
    pub fn new(username: String, email: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            username,
            email,
            password_hash,
            role,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the user is staff
    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// The user as seen by the visibility policy.
    pub fn viewer(&self) -> Viewer {
        if self.is_staff() {
            Viewer::Staff(self.id)
        } else {
            Viewer::Member(self.id)
        }
    }
}

/// User role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Staff: approves and rejects submissions, edits anything
    Admin,
    /// Regular registered user
    #[default]
    Member,
}

impl UserRole {
    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Member => write!(f, "member"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "member" => Ok(UserRole::Member),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> User {
        let mut user = User::new(
            "alice".to_string(),
            "alice@example.com".to_string(),
            "hash".to_string(),
            role,
        );
        user.id = 7;
        user
    }

    #[test]
    fn test_user_new() {
        let user = User::new(
            "testuser".to_string(),
            "test@example.com".to_string(),
            "hashed_password".to_string(),
            UserRole::Member,
        );

        assert_eq!(user.id, 0);
        assert_eq!(user.username, "testuser");
        assert_eq!(user.role, UserRole::Member);
        assert!(!user.is_staff());
    }

    #[test]
    fn test_viewer_from_role() {
        assert_eq!(user(UserRole::Admin).viewer(), Viewer::Staff(7));
        assert_eq!(user(UserRole::Member).viewer(), Viewer::Member(7));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_value(user(UserRole::Member)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "member");
    }

    #[test]
    fn test_user_role_from_str() {
        assert_eq!(UserRole::from_str("admin").unwrap(), UserRole::Admin);
        assert_eq!(UserRole::from_str("MEMBER").unwrap(), UserRole::Member);
        assert!(UserRole::from_str("editor").is_err());
        assert_eq!(UserRole::default(), UserRole::Member);
        assert_eq!(UserRole::Admin.to_string(), "admin");
    }
}
