use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use clap::Subcommand;
use serde_json::{json, Map, Value};

use crate::cli::client::ApiClient;
use crate::cli::utils::*;
use crate::cli::OutputFormat;

const TENANT_ROOT: &str = "/api/root/tenant";

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "Register a tenant and start provisioning its namespace")]
    Create {
        #[arg(help = "Tenant slug (lowercase letters, digits and hyphens)")]
        slug: String,
        #[arg(long, help = "Tenant settings as a JSON object")]
        settings: Option<String>,
        #[arg(long, help = "Wait until provisioning has finished")]
        wait: bool,
        #[arg(long, default_value_t = 60, help = "Seconds to wait with --wait")]
        timeout: u64,
    },

    #[command(about = "List tenants")]
    List {
        #[arg(long, help = "Only tenants in this status")]
        status: Option<String>,
    },

    #[command(about = "Show tenant information")]
    Show {
        #[arg(help = "Tenant slug")]
        slug: String,
    },

    #[command(about = "Replace tenant settings")]
    Settings {
        #[arg(help = "Tenant slug")]
        slug: String,
        #[arg(help = "Settings as a JSON object")]
        settings: String,
    },

    #[command(about = "Suspend an active tenant")]
    Suspend {
        #[arg(help = "Tenant slug")]
        slug: String,
    },

    #[command(about = "Reactivate a suspended tenant")]
    Activate {
        #[arg(help = "Tenant slug")]
        slug: String,
    },

    #[command(about = "Retry provisioning for a tenant stuck in provisioning")]
    Provision {
        #[arg(help = "Tenant slug")]
        slug: String,
    },

    #[command(about = "Delete a tenant and drop its namespace")]
    Delete {
        #[arg(help = "Tenant slug")]
        slug: String,
        #[arg(long, help = "Confirm that all tenant data is dropped")]
        yes: bool,
    },

    #[command(about = "Compare a tenant's namespace with the table catalog")]
    Health {
        #[arg(help = "Tenant slug")]
        slug: String,
    },
}

pub async fn handle(cmd: TenantCommands, client: &ApiClient, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TenantCommands::Create {
            slug,
            settings,
            wait,
            timeout,
        } => {
            let settings = settings.as_deref().map(parse_settings).transpose()?.unwrap_or_default();
            let mut tenant = client
                .post(TENANT_ROOT, Some(json!({ "slug": slug, "settings": settings })))
                .await?;

            if wait {
                tenant = wait_until_active(client, &slug, Duration::from_secs(timeout)).await?;
                output_tenant(&output_format, Some(&format!("Tenant '{}' is active", slug)), &tenant)
            } else {
                output_tenant(
                    &output_format,
                    Some(&format!("Tenant '{}' registered, provisioning in the background", slug)),
                    &tenant,
                )
            }
        }
        TenantCommands::List { status } => {
            let path = match status {
                Some(status) => format!("{}?status={}", TENANT_ROOT, status),
                None => TENANT_ROOT.to_string(),
            };
            let tenants = client.get(&path).await?;
            let tenants = tenants.as_array().cloned().unwrap_or_default();
            output_tenant_table(&output_format, &tenants)
        }
        TenantCommands::Show { slug } => {
            let tenant = client.get(&tenant_path(&slug, "")).await?;
            output_tenant(&output_format, None, &tenant)
        }
        TenantCommands::Settings { slug, settings } => {
            let settings = parse_settings(&settings)?;
            let tenant = client.patch(&tenant_path(&slug, ""), Value::Object(settings)).await?;
            output_tenant(&output_format, Some(&format!("Settings of '{}' updated", slug)), &tenant)
        }
        TenantCommands::Suspend { slug } => {
            let tenant = client.post(&tenant_path(&slug, "/suspend"), None).await?;
            output_tenant(&output_format, Some(&format!("Tenant '{}' suspended", slug)), &tenant)
        }
        TenantCommands::Activate { slug } => {
            let tenant = client.post(&tenant_path(&slug, "/activate"), None).await?;
            output_tenant(&output_format, Some(&format!("Tenant '{}' reactivated", slug)), &tenant)
        }
        TenantCommands::Provision { slug } => {
            let result = client.post(&tenant_path(&slug, "/provision"), None).await?;
            let outcome = result.get("outcome").and_then(Value::as_str).unwrap_or("unknown");
            output_success(
                &output_format,
                &format!("Provisioning '{}': {}", slug, outcome.replace('_', " ")),
                Some(result),
            )
        }
        TenantCommands::Delete { slug, yes } => {
            if !yes {
                return Err(anyhow!(
                    "Deleting '{}' drops its namespace and all data in it; pass --yes to confirm",
                    slug
                ));
            }
            let tenant = client.delete(&tenant_path(&slug, "")).await?;
            output_success(
                &output_format,
                &format!("Tenant '{}' deleted, namespace dropped", slug),
                Some(json!({ "tenant": tenant })),
            )
        }
        TenantCommands::Health { slug } => {
            let health = client.get(&tenant_path(&slug, "/health")).await?;
            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&health)?),
                OutputFormat::Text => print_health(&slug, &health),
            }
            Ok(())
        }
    }
}

fn tenant_path(slug: &str, suffix: &str) -> String {
    format!("{}/{}{}", TENANT_ROOT, slug, suffix)
}

fn parse_settings(raw: &str) -> anyhow::Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw).context("settings must be valid JSON")? {
        Value::Object(map) => Ok(map),
        _ => Err(anyhow!("settings must be a JSON object")),
    }
}

fn print_health(slug: &str, health: &Value) {
    let healthy = health.get("healthy").and_then(Value::as_bool).unwrap_or(false);
    let marker = if healthy { "✓" } else { "✗" };
    println!("{} Tenant '{}'", marker, slug);
    println!(
        "Status:    {}",
        health.get("status").and_then(Value::as_str).unwrap_or("-")
    );
    println!(
        "Namespace: {} ({})",
        health.get("namespace").and_then(Value::as_str).unwrap_or("-"),
        if health.get("schema_exists").and_then(Value::as_bool).unwrap_or(false) {
            "present"
        } else {
            "absent"
        }
    );
    if let Some(missing) = health.get("missing_tables").and_then(Value::as_array) {
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().filter_map(Value::as_str).collect();
            println!("Missing:   {}", names.join(", "));
        }
    }
}

/// Poll the tenant until provisioning finishes or the deadline passes
async fn wait_until_active(client: &ApiClient, slug: &str, timeout: Duration) -> anyhow::Result<Value> {
    let deadline = Instant::now() + timeout;
    loop {
        let tenant = client.get(&tenant_path(slug, "")).await?;
        match tenant.get("status").and_then(Value::as_str) {
            Some("active") => return Ok(tenant),
            Some("provisioning") => {}
            Some(other) => return Err(anyhow!("tenant '{}' ended up {} instead of active", slug, other)),
            None => return Err(anyhow!("tenant '{}' has no status in the response", slug)),
        }
        if Instant::now() > deadline {
            return Err(anyhow!(
                "tenant '{}' still provisioning after {:?}; retry with `portalctl tenant provision {}`",
                slug,
                timeout,
                slug
            ));
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_must_be_an_object() {
        assert_eq!(parse_settings(r#"{"plan":"pro"}"#).unwrap()["plan"], "pro");
        assert!(parse_settings("[1,2]").is_err());
        assert!(parse_settings("{not json").is_err());
    }

    #[test]
    fn builds_tenant_paths() {
        assert_eq!(tenant_path("acme", ""), "/api/root/tenant/acme");
        assert_eq!(tenant_path("acme", "/health"), "/api/root/tenant/acme/health");
    }
}
