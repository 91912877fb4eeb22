use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::error::TenantError;
use super::namespace::NamespaceName;

/// Opaque, immutable tenant identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn new() -> Self {
        TenantId(Uuid::new_v4())
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TenantId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(TenantId)
    }
}

/// Tenant lifecycle status
///
/// ```text
/// provisioning --> active <--> suspended
///                    |             |
///                    +--> deleted <+
/// ```
///
/// `deleted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Provisioning,
    Active,
    Suspended,
    Deleted,
}

impl TenantStatus {
    pub const ALL: [TenantStatus; 4] = [
        TenantStatus::Provisioning,
        TenantStatus::Active,
        TenantStatus::Suspended,
        TenantStatus::Deleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Provisioning => "provisioning",
            TenantStatus::Active => "active",
            TenantStatus::Suspended => "suspended",
            TenantStatus::Deleted => "deleted",
        }
    }

    /// Whether the state machine has an edge `self -> to`.
    /// A failed provision is not a transition, so `provisioning -> provisioning` is absent.
    pub fn can_transition_to(&self, to: TenantStatus) -> bool {
        use TenantStatus::*;
        match (self, to) {
            (Provisioning, Active) => true,
            (Provisioning, Provisioning | Suspended | Deleted) => false,
            (Active, Suspended | Deleted) => true,
            (Active, Provisioning | Active) => false,
            (Suspended, Active | Deleted) => true,
            (Suspended, Provisioning | Suspended) => false,
            (Deleted, _) => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TenantStatus::Deleted)
    }
}

impl fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TenantStatus {
    type Err = TenantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provisioning" => Ok(TenantStatus::Provisioning),
            "active" => Ok(TenantStatus::Active),
            "suspended" => Ok(TenantStatus::Suspended),
            "deleted" => Ok(TenantStatus::Deleted),
            other => Err(TenantError::UnknownStatus(other.to_string())),
        }
    }
}

/// Tenant record from the shared registry
#[derive(Debug, Clone, Serialize)]
pub struct Tenant {
    pub id: TenantId,
    pub slug: String,
    pub namespace_name: NamespaceName,
    pub status: TenantStatus,
    pub settings: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }

    /// Fails with `NotActive` unless the tenant may serve requests
    pub fn ensure_active(&self) -> Result<(), TenantError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(TenantError::NotActive {
                slug: self.slug.clone(),
                status: self.status,
            })
        }
    }
}

pub const SLUG_MIN_LEN: usize = 2;
pub const SLUG_MAX_LEN: usize = 48;

/// Slugs are lowercase ASCII letters, digits and single hyphens,
/// starting with a letter and ending with a letter or digit.
pub fn validate_slug(slug: &str) -> Result<(), TenantError> {
    if slug.len() < SLUG_MIN_LEN || slug.len() > SLUG_MAX_LEN {
        return Err(TenantError::InvalidSlug(format!(
            "slug must be {}-{} characters",
            SLUG_MIN_LEN, SLUG_MAX_LEN
        )));
    }

    let bytes = slug.as_bytes();
    if !bytes[0].is_ascii_lowercase() {
        return Err(TenantError::InvalidSlug("slug must start with a lowercase letter".to_string()));
    }
    if bytes[bytes.len() - 1] == b'-' {
        return Err(TenantError::InvalidSlug("slug must not end with a hyphen".to_string()));
    }
    if slug.contains("--") {
        return Err(TenantError::InvalidSlug("slug must not contain consecutive hyphens".to_string()));
    }
    if !bytes
        .iter()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
    {
        return Err(TenantError::InvalidSlug(
            "slug may only contain lowercase letters, digits and hyphens".to_string(),
        ));
    }
    // tenant keys are tried as ids first, so such a slug could never be resolved
    if Uuid::parse_str(slug).is_ok() {
        return Err(TenantError::InvalidSlug("slug must not be a UUID".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_follow_state_machine() {
        use TenantStatus::*;
        let allowed = [
            (Provisioning, Active),
            (Active, Suspended),
            (Suspended, Active),
            (Active, Deleted),
            (Suspended, Deleted),
        ];

        for from in TenantStatus::ALL {
            for to in TenantStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn deleted_is_terminal() {
        assert!(TenantStatus::Deleted.is_terminal());
        assert!(TenantStatus::ALL
            .iter()
            .all(|to| !TenantStatus::Deleted.can_transition_to(*to)));
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in TenantStatus::ALL {
            assert_eq!(status.as_str().parse::<TenantStatus>().unwrap(), status);
        }
        assert!(matches!(
            "archived".parse::<TenantStatus>(),
            Err(TenantError::UnknownStatus(s)) if s == "archived"
        ));
        assert_eq!(serde_json::to_value(TenantStatus::Suspended).unwrap(), "suspended");
    }

    #[test]
    fn validates_slugs() {
        assert!(validate_slug("acme").is_ok());
        assert!(validate_slug("tech-corp-2").is_ok());
        assert!(validate_slug("a").is_err());
        assert!(validate_slug("Acme").is_err());
        assert!(validate_slug("2acme").is_err());
        assert!(validate_slug("acme-").is_err());
        assert!(validate_slug("ac--me").is_err());
        assert!(validate_slug("ac_me").is_err());
        assert!(validate_slug("acme; drop schema public").is_err());
        assert!(validate_slug(&"a".repeat(SLUG_MAX_LEN + 1)).is_err());
        assert!(validate_slug("deadbeefdeadbeefdeadbeefdeadbeef").is_err());
        assert!(validate_slug("abcdefab-cdef-abcd-efab-cdefabcdefab").is_err());
        assert!(validate_slug("deadbeef-cafe").is_ok());
    }
}
