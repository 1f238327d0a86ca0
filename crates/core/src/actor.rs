//! # Actor Module
//!
//! Actors are the people (and system identities) that own accounts.
//! Each actor holds exactly one role:
//! - Root: system-seeded owner of the bank, funds promotional credits
//! - Admin: operator, funds welcome credits
//! - User: regular customer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Role held by an actor's credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Exactly one at steady state
    Root,
    Admin,
    User,
}

impl Role {
    /// Code string stored in the DB
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Root => "root",
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "root" => Some(Role::Root),
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            _ => None,
        }
    }

    /// Whether this role can fund system-initiated transfers
    pub fn is_system(&self) -> bool {
        matches!(self, Role::Root | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity that owns exactly one account and one credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    /// Always stored lower-cased
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Actor {
    /// Create a new actor with a fresh id
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            email: normalize_email(email),
            created_at: Utc::now(),
        }
    }

    /// Case-insensitive e-mail comparison
    pub fn has_email(&self, email: &str) -> bool {
        self.email == normalize_email(email)
    }
}

/// Lower-case and trim an e-mail address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_str() {
        assert_eq!(Role::Root.as_str(), "root");
        assert_eq!(Role::from_str("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::from_str("auditor"), None);
    }

    #[test]
    fn test_role_is_system() {
        assert!(Role::Root.is_system());
        assert!(Role::Admin.is_system());
        assert!(!Role::User.is_system());
    }

    #[test]
    fn test_actor_email_normalized() {
        let alice = Actor::new(" Alice ", " Alice@Example.COM ");
        assert_eq!(alice.name, "Alice");
        assert_eq!(alice.email, "alice@example.com");
        assert!(alice.has_email("ALICE@example.com"));
    }

    #[test]
    fn test_actor_ids_unique() {
        let a = Actor::new("A", "a@x.io");
        let b = Actor::new("B", "b@x.io");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_actor_display() {
        let bob = Actor::new("Bob", "bob@bank.io");
        assert_eq!(format!("{}", bob), "Bob <bob@bank.io>");
    }
}
