// Namespace (Postgres schema) names for tenant isolation
//
// Schema identifiers cannot be bound as query parameters, so every name that
// ends up inside a DDL statement or a search_path directive passes through
// `is_valid_identifier` right before it is interpolated.

use std::fmt;

use serde::{Serialize, Serializer};

use super::error::TenantError;

/// Postgres truncates identifiers beyond NAMEDATALEN - 1 bytes
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Shared schema holding the tenant registry
pub const SHARED_NAMESPACE: &str = "public";

/// Allow-list: `^[a-z][a-z0-9_]{0,62}$`
pub fn is_valid_identifier(name: &str) -> bool {
    let bytes = name.as_bytes();
    match bytes.first() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }
    bytes.len() <= MAX_IDENTIFIER_LEN
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'_')
}

/// Double-quote an identifier that already passed `is_valid_identifier`
pub fn quote_identifier(name: &str) -> Result<String, TenantError> {
    if !is_valid_identifier(name) {
        return Err(TenantError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name))
}

/// Validated tenant namespace name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceName(String);

impl NamespaceName {
    /// Derive the namespace for a slug: `<prefix><slug with '-' as '_'>`.
    /// The slug must already be validated.
    pub fn derive(prefix: &str, slug: &str) -> Result<Self, TenantError> {
        let name = format!("{}{}", prefix, slug.replace('-', "_"));
        Self::parse(&name)
    }

    /// Accept a stored namespace name after checking it against the allow-list
    pub fn parse(name: &str) -> Result<Self, TenantError> {
        if !is_valid_identifier(name) || name == SHARED_NAMESPACE || name.starts_with("pg_") {
            return Err(TenantError::InvalidIdentifier(name.to_string()));
        }
        Ok(NamespaceName(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Quoted identifier for statement construction.
    ///
    /// Re-validates the name and requires the configured tenant prefix, so a
    /// registry row cannot smuggle a foreign schema (or SQL) into DDL.
    pub fn sql_ident(&self, prefix: &str) -> Result<String, TenantError> {
        if !self.0.starts_with(prefix) || self.0.len() == prefix.len() {
            return Err(TenantError::InvalidIdentifier(format!(
                "namespace '{}' does not carry tenant prefix '{}'",
                self.0, prefix
            )));
        }
        if self.0 == SHARED_NAMESPACE || self.0.starts_with("pg_") {
            return Err(TenantError::InvalidIdentifier(self.0.clone()));
        }
        quote_identifier(&self.0)
    }

    /// Value for `search_path`: the tenant namespace first, then the shared one
    pub fn search_path(&self, prefix: &str) -> Result<String, TenantError> {
        Ok(format!("{}, {}", self.sql_ident(prefix)?, SHARED_NAMESPACE))
    }
}

impl fmt::Display for NamespaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for NamespaceName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_identifiers() {
        assert!(is_valid_identifier("tenant_acme"));
        assert!(is_valid_identifier("tenant_tech_corp_2"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("_tenant"));
        assert!(!is_valid_identifier("Tenant_acme"));
        assert!(!is_valid_identifier("tenant-acme"));
        assert!(!is_valid_identifier("tenant_acme\"; DROP SCHEMA public CASCADE; --"));
        assert!(!is_valid_identifier("tenant acme"));
        assert!(!is_valid_identifier(&format!("t{}", "a".repeat(MAX_IDENTIFIER_LEN))));
        assert!(is_valid_identifier(&format!("t{}", "a".repeat(MAX_IDENTIFIER_LEN - 1))));
    }

    #[test]
    fn derives_namespace_from_slug() {
        let ns = NamespaceName::derive("tenant_", "acme").unwrap();
        assert_eq!(ns.as_str(), "tenant_acme");

        let ns = NamespaceName::derive("tenant_", "tech-corp").unwrap();
        assert_eq!(ns.as_str(), "tenant_tech_corp");
    }

    #[test]
    fn rejects_shared_and_system_namespaces() {
        assert!(NamespaceName::parse("public").is_err());
        assert!(NamespaceName::parse("pg_catalog").is_err());
        assert!(NamespaceName::parse("tenant_acme").is_ok());
    }

    #[test]
    fn sql_ident_requires_prefix() {
        let ns = NamespaceName::parse("tenant_acme").unwrap();
        assert_eq!(ns.sql_ident("tenant_").unwrap(), "\"tenant_acme\"");
        assert!(ns.sql_ident("portal_").is_err());

        let bare = NamespaceName::parse("tenant_").unwrap();
        assert!(bare.sql_ident("tenant_").is_err());
    }

    #[test]
    fn search_path_falls_back_to_shared_namespace() {
        let ns = NamespaceName::parse("tenant_acme").unwrap();
        assert_eq!(ns.search_path("tenant_").unwrap(), "\"tenant_acme\", public");
    }

    #[test]
    fn quote_identifier_rejects_injection() {
        assert_eq!(quote_identifier("users").unwrap(), "\"users\"");
        assert!(quote_identifier("users\"; --").is_err());
    }
}
