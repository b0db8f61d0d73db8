//! The session value stored between runs.

use std::fmt;

use serde::{Deserialize, Serialize};
use xyzzy_protocol::{AuthenticateResult, Credentials};

/// The identity of a logged-in user.
///
/// `token` is a secret: the `Debug` impl hides it so it never ends up in
/// logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// User id assigned by the server.
    pub id: String,
    /// Secret that proves ownership of `id`.
    pub token: String,
    /// Display name chosen at login.
    pub name: String,
}

impl Session {
    pub fn new(id: impl Into<String>, token: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            token: token.into(),
            name: name.into(),
        }
    }

    /// Credentials that resume this session on a fresh connection.
    pub fn credentials(&self) -> Credentials {
        Credentials::Resume {
            id: self.id.clone(),
            token: self.token.clone(),
        }
    }
}

impl From<AuthenticateResult> for Session {
    fn from(result: AuthenticateResult) -> Self {
        Self {
            id: result.id,
            token: result.token,
            name: result.name,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("token", &"<redacted>")
            .field("name", &self.name)
            .finish()
    }
}
