use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::AuthConfig;
use crate::Error;
use crate::Result;

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Agent,
    Client,
}

impl fmt::Display for Role {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            Role::Admin => "admin",
            Role::Agent => "agent",
            Role::Client => "client",
        };
        f.write_str(name)
    }
}

/// Outcome of authenticating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub role: Role,
}

impl Principal {
    pub fn require(
        &self,
        allowed: &[Role],
    ) -> Result<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }
}

/// Maps bearer tokens to roles.
///
/// Each process only knows the secrets relevant to its own endpoints: the
/// controller accepts admin and agent tokens, the worker accepts agent and
/// client tokens.
#[derive(Clone)]
pub struct Authenticator {
    secrets: Vec<(String, Role)>,
}

impl Authenticator {
    pub fn new(secrets: Vec<(String, Role)>) -> Self {
        let secrets = secrets.into_iter().filter(|(secret, _)| !secret.is_empty()).collect();
        Self { secrets }
    }

    /// Admin via `admin_secret`, agents via `controller_secret`.
    pub fn for_controller(auth: &AuthConfig) -> Self {
        Self::new(vec![
            (auth.admin_secret.clone(), Role::Admin),
            (auth.controller_secret.clone(), Role::Agent),
        ])
    }

    /// Agents via `worker_secret`, clients via `client_secret`.
    pub fn for_worker(auth: &AuthConfig) -> Self {
        Self::new(vec![
            (auth.worker_secret.clone(), Role::Agent),
            (auth.client_secret.clone(), Role::Client),
        ])
    }

    /// Resolves an `Authorization` header value.
    pub fn authenticate(
        &self,
        authorization: Option<&str>,
    ) -> Result<Principal> {
        let token = authorization
            .and_then(|value| value.strip_prefix(BEARER_PREFIX))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(Error::Unauthorized)?;

        self.secrets
            .iter()
            .find(|(secret, _)| secret == token)
            .map(|(_, role)| Principal { role: *role })
            .ok_or(Error::Unauthorized)
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let roles: Vec<Role> = self.secrets.iter().map(|(_, role)| *role).collect();
        f.debug_struct("Authenticator").field("roles", &roles).finish()
    }
}
