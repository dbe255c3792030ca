use serde::{Deserialize, Serialize};

/// The signed-in user, as far as the sync engine cares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub uid: String,
    pub email: Option<String>,
}

/// Authentication state handed to the engine by its host.
///
/// `auth_ready` is false until the host has determined whether anyone is
/// signed in; only then does an absent `user` mean "signed out".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: Option<SessionUser>,
    pub auth_ready: bool,
}

impl Session {
    /// Auth state not yet known.
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn signed_out() -> Self {
        Self {
            user: None,
            auth_ready: true,
        }
    }

    pub fn signed_in(uid: impl Into<String>, email: Option<String>) -> Self {
        Self {
            user: Some(SessionUser {
                uid: uid.into(),
                email,
            }),
            auth_ready: true,
        }
    }

    /// Uid of the active user once auth is ready.
    pub fn active_uid(&self) -> Option<&str> {
        if !self.auth_ready {
            return None;
        }
        self.user.as_ref().map(|u| u.uid.as_str())
    }
}
