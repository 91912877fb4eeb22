// Table catalog: the externally supplied set of tables materialized in every
// tenant namespace. The provisioner only knows names and column types; what
// the columns mean belongs to the data-model layer that supplies the catalog.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::tenancy::namespace::{is_valid_identifier, quote_identifier};
use crate::tenancy::TenantError;

/// Built-in catalog for the training portal
const PORTAL_CATALOG: &str = include_str!("../../tables/portal.yaml");

/// Columns every tenant table receives regardless of its definition
pub const AUDIT_COLUMNS: [&str; 3] = ["id", "created_at", "updated_at"];

/// Trigger function created once per namespace
pub const TOUCH_FUNCTION: &str = "touch_updated_at";

#[derive(Debug, Clone, Deserialize)]
pub struct TableCatalog {
    pub tables: Vec<TableDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Text,
    Integer,
    Number,
    Boolean,
    Uuid,
    Timestamp,
    Json,
}

impl ColumnType {
    fn postgres_type(&self) -> &'static str {
        match self {
            ColumnType::String => "VARCHAR(255)",
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Number => "NUMERIC",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Uuid => "UUID",
            ColumnType::Timestamp => "TIMESTAMPTZ",
            ColumnType::Json => "JSONB",
        }
    }
}

impl TableCatalog {
    /// Catalog shipped with the portal
    pub fn builtin() -> Result<Self, TenantError> {
        Self::from_yaml(PORTAL_CATALOG)
    }

    pub fn from_yaml(source: &str) -> Result<Self, TenantError> {
        let catalog: TableCatalog =
            serde_yaml::from_str(source).map_err(|e| TenantError::Catalog(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, TenantError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| TenantError::Catalog(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&source)
    }

    /// Use the catalog at `path`, or the built-in one
    pub fn load_or_builtin(path: Option<&str>) -> Result<Self, TenantError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    fn validate(&self) -> Result<(), TenantError> {
        if self.tables.is_empty() {
            return Err(TenantError::Catalog("catalog defines no tables".to_string()));
        }

        let mut seen_tables = HashSet::new();
        for table in &self.tables {
            if !is_valid_identifier(&table.name) {
                return Err(TenantError::InvalidIdentifier(table.name.clone()));
            }
            if !seen_tables.insert(table.name.as_str()) {
                return Err(TenantError::Catalog(format!("duplicate table '{}'", table.name)));
            }

            let mut seen_columns = HashSet::new();
            for column in &table.columns {
                if !is_valid_identifier(&column.name) {
                    return Err(TenantError::InvalidIdentifier(format!("{}.{}", table.name, column.name)));
                }
                if AUDIT_COLUMNS.contains(&column.name.as_str()) {
                    return Err(TenantError::Catalog(format!(
                        "column '{}.{}' collides with an audit column",
                        table.name, column.name
                    )));
                }
                if !seen_columns.insert(column.name.as_str()) {
                    return Err(TenantError::Catalog(format!(
                        "duplicate column '{}.{}'",
                        table.name, column.name
                    )));
                }
                if let Some(default) = &column.default {
                    default_literal(column.column_type, default).ok_or_else(|| {
                        TenantError::Catalog(format!(
                            "unsupported default for '{}.{}'",
                            table.name, column.name
                        ))
                    })?;
                }
            }
        }

        Ok(())
    }
}

impl TableDefinition {
    /// `CREATE TABLE IF NOT EXISTS` for this table inside `schema_ident`,
    /// which must already be a validated, quoted identifier.
    pub fn create_table_ddl(&self, schema_ident: &str) -> Result<String, TenantError> {
        let table = quote_identifier(&self.name)?;

        let mut ddl = format!("CREATE TABLE IF NOT EXISTS {}.{} (\n", schema_ident, table);

        // Audit columns
        ddl += "    \"id\" UUID PRIMARY KEY DEFAULT gen_random_uuid(),\n";
        ddl += "    \"created_at\" TIMESTAMPTZ NOT NULL DEFAULT now(),\n";
        ddl += "    \"updated_at\" TIMESTAMPTZ NOT NULL DEFAULT now()";

        for column in &self.columns {
            let name = quote_identifier(&column.name)?;
            let nullable = if column.required { " NOT NULL" } else { "" };
            let unique = if column.unique { " UNIQUE" } else { "" };
            let default = match &column.default {
                Some(value) => {
                    let literal = default_literal(column.column_type, value).ok_or_else(|| {
                        TenantError::Catalog(format!("unsupported default for '{}.{}'", self.name, column.name))
                    })?;
                    format!(" DEFAULT {}", literal)
                }
                None => String::new(),
            };

            ddl += &format!(
                ",\n    {} {}{}{}{}",
                name,
                column.column_type.postgres_type(),
                nullable,
                unique,
                default
            );
        }

        ddl += "\n)";
        Ok(ddl)
    }

    /// Name of the `updated_at` trigger on this table
    pub fn trigger_name(&self) -> String {
        format!("{}_touch_updated_at", self.name)
    }
}

fn default_literal(column_type: ColumnType, value: &Value) -> Option<String> {
    match (column_type, value) {
        (ColumnType::String | ColumnType::Text, Value::String(s)) => Some(format!("'{}'", s.replace('\'', "''"))),
        (ColumnType::Integer, Value::Number(n)) if n.is_i64() => Some(n.to_string()),
        (ColumnType::Number, Value::Number(n)) => Some(n.to_string()),
        (ColumnType::Boolean, Value::Bool(b)) => Some(b.to_string()),
        (ColumnType::Json, value) => Some(format!("'{}'::jsonb", value.to_string().replace('\'', "''"))),
        _ => None,
    }
}
