use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

/// Request information for authentication
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
}

/// Authenticated identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub method: String,
    /// Whether this identity may drive the admin surface (worker control).
    #[serde(default)]
    pub admin: bool,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            method: "none".to_string(),
            admin: true,
        }
    }

    pub fn admin(user_id: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            method: method.into(),
            admin: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_identity() {
        let identity = Identity::anonymous();
        assert_eq!(identity.user_id, "anonymous");
        assert_eq!(identity.method, "none");
    }

    #[test]
    fn test_admin_identity() {
        let identity = Identity::admin("ops", "api_key");
        assert!(identity.admin);
        assert_eq!(identity.method, "api_key");
    }

    #[test]
    fn test_identity_serialization() {
        let identity = Identity::admin("ops", "api_key");
        let json = serde_json::to_string(&identity).unwrap();
        let deserialized: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.user_id, "ops");
        assert!(deserialized.admin);
    }
}
