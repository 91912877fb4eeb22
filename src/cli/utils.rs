use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(target), Some(Value::Object(extra))) = (response.as_object_mut(), data) {
                target.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an empty collection in the appropriate format
pub fn output_empty_collection(output_format: &OutputFormat, collection_name: &str, message: &str) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    collection_name: []
                }))?
            );
        }
        OutputFormat::Text => {
            println!("{}", message);
        }
    }
    Ok(())
}

fn field<'a>(tenant: &'a Value, name: &str) -> &'a str {
    tenant.get(name).and_then(Value::as_str).unwrap_or("-")
}

/// One table row: slug, status, namespace, created
pub fn format_tenant_row(tenant: &Value) -> String {
    let created = field(tenant, "created_at");
    let created = created.get(..16).unwrap_or(created).replace('T', " ");
    format!(
        "{:<24} {:<14} {:<32} {}",
        field(tenant, "slug"),
        field(tenant, "status"),
        field(tenant, "namespace_name"),
        created
    )
}

pub fn output_tenant_table(output_format: &OutputFormat, tenants: &[Value]) -> anyhow::Result<()> {
    if tenants.is_empty() {
        return output_empty_collection(output_format, "tenants", "No tenants registered");
    }

    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "tenants": tenants }))?);
        }
        OutputFormat::Text => {
            println!("{:<24} {:<14} {:<32} {}", "SLUG", "STATUS", "NAMESPACE", "CREATED");
            println!("{}", "-".repeat(90));
            for tenant in tenants {
                println!("{}", format_tenant_row(tenant));
            }
        }
    }
    Ok(())
}

/// Output one tenant with an optional headline
pub fn output_tenant(output_format: &OutputFormat, headline: Option<&str>, tenant: &Value) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(tenant)?);
        }
        OutputFormat::Text => {
            if let Some(headline) = headline {
                println!("✓ {}", headline);
            }
            println!("Slug:      {}", field(tenant, "slug"));
            println!("ID:        {}", field(tenant, "id"));
            println!("Status:    {}", field(tenant, "status"));
            println!("Namespace: {}", field(tenant, "namespace_name"));
            println!("Created:   {}", field(tenant, "created_at"));
            println!("Updated:   {}", field(tenant, "updated_at"));
            if let Some(settings) = tenant.get("settings").and_then(Value::as_object) {
                if !settings.is_empty() {
                    println!("Settings:  {}", Value::Object(settings.clone()));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_row_is_column_aligned() {
        let tenant = json!({
            "slug": "acme",
            "status": "active",
            "namespace_name": "tenant_acme",
            "created_at": "2026-03-01T09:30:12.345Z"
        });
        let row = format_tenant_row(&tenant);
        assert!(row.starts_with("acme "));
        assert!(row.contains("active"));
        assert!(row.contains("tenant_acme"));
        assert!(row.ends_with("2026-03-01 09:30"));
    }

    #[test]
    fn missing_fields_render_as_dash() {
        let row = format_tenant_row(&json!({}));
        assert!(row.starts_with("- "));
    }
}
