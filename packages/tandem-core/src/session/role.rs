//! Participant role within a session.

use serde::Serialize;

/// Host or guest. Each capability is decided by matching on this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Holds write authority; pushes with `credential`.
    Host { credential: String },
    /// Observes by pulling; local edits are best-effort.
    Guest,
}

/// Role without the secret, for views and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RoleKind {
    Host,
    Guest,
}

impl Role {
    pub fn kind(&self) -> RoleKind {
        match self {
            Role::Host { .. } => RoleKind::Host,
            Role::Guest => RoleKind::Guest,
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, Role::Host { .. })
    }

    pub fn credential(&self) -> Option<&str> {
        match self {
            Role::Host { credential } => Some(credential),
            Role::Guest => None,
        }
    }
}

/// Why an elevation attempt was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElevationRefusal {
    /// No snapshot has been pulled yet, so there is nothing to check against.
    NoRemoteState,
    WrongCode,
}

/// Grants write authority when `code` matches the host id of the most
/// recently pulled snapshot.
pub fn elevate(
    role: &Role,
    pulled_host_id: Option<&str>,
    code: &str,
) -> Result<Role, ElevationRefusal> {
    if let Role::Host { credential } = role {
        if credential == code {
            return Ok(role.clone());
        }
    }
    match pulled_host_id {
        None => Err(ElevationRefusal::NoRemoteState),
        Some(host_id) if !code.is_empty() && host_id == code => Ok(Role::Host {
            credential: code.to_string(),
        }),
        Some(_) => Err(ElevationRefusal::WrongCode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_code_elevates_guest() {
        let role = elevate(&Role::Guest, Some("secret"), "secret").unwrap();
        assert_eq!(role.credential(), Some("secret"));
        assert_eq!(role.kind(), RoleKind::Host);
    }

    #[test]
    fn wrong_or_empty_code_is_refused() {
        assert_eq!(
            elevate(&Role::Guest, Some("secret"), "guess"),
            Err(ElevationRefusal::WrongCode)
        );
        assert_eq!(
            elevate(&Role::Guest, Some(""), ""),
            Err(ElevationRefusal::WrongCode)
        );
    }

    #[test]
    fn elevation_needs_a_pulled_snapshot() {
        assert_eq!(
            elevate(&Role::Guest, None, "secret"),
            Err(ElevationRefusal::NoRemoteState)
        );
    }
}
