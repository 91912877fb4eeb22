use serde_json::Value;

use crate::cli::client::ApiClient;
use crate::cli::OutputFormat;

pub async fn handle(client: &ApiClient, output_format: OutputFormat) -> anyhow::Result<()> {
    let (status, body) = client.get_raw("/health").await?;

    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&body)?),
        OutputFormat::Text => {
            let data = body.get("data").cloned().unwrap_or(Value::Null);
            let state = data.get("status").and_then(Value::as_str).unwrap_or("unknown");
            if status.is_success() {
                println!("✓ {} is {}", client.base_url(), state);
            } else {
                println!("✗ {} is {} (HTTP {})", client.base_url(), state, status.as_u16());
                if let Some(error) = data.get("database_error").and_then(Value::as_str) {
                    println!("Database: {}", error);
                }
            }
        }
    }

    if !status.is_success() {
        anyhow::bail!("server reported HTTP {}", status.as_u16());
    }
    Ok(())
}
