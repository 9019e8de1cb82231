//! Application context shared by the sync, tracks and loop components
//!
//! Holds the current user and settings; passed around as `Arc<AppContext>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Settings;

/// Role of the current user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Administrator,
    Supervisor,
}

/// The user the session acts as
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub nickname: String,
    pub email: String,
    pub role: Role,
    pub auth_token: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nickname: nickname.into(),
            email: String::new(),
            role: Role::User,
            auth_token: None,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Administrator
    }
}

/// Session state injected into the components
#[derive(Debug, Clone, Default)]
pub struct AppContext {
    pub settings: Settings,
    pub user: Option<User>,
}

impl AppContext {
    pub fn new(settings: Settings, user: Option<User>) -> Self {
        Self { settings, user }
    }

    /// Build the context from settings, taking the user from the backend section
    pub fn from_settings(settings: Settings) -> Self {
        let backend = &settings.backend;
        let user = if backend.user_id.trim().is_empty() {
            None
        } else {
            let token = backend.auth_token.trim();
            Some(User {
                id: backend.user_id.trim().to_string(),
                nickname: backend.nickname.clone(),
                email: backend.email.clone(),
                role: backend.role,
                auth_token: (!token.is_empty()).then(|| token.to_string()),
            })
        };

        Self { settings, user }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(User::is_admin)
    }

    /// Clock used when filling timestamps locally
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
