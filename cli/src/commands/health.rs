use anyhow::Result;
use colored::*;
use serde_json::json;

/// Execute the health check command
pub async fn execute(format: String, url: String) -> Result<()> {
    let report = check_api_health(&url).await;

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "text" => {
            print_health_text(&report);
        }
        _ => {
            print_health_text(&report);
        }
    }

    Ok(())
}

/// Query the API health endpoint and build a report
async fn check_api_health(base_url: &str) -> serde_json::Value {
    let base = base_url.trim_end_matches('/');
    let endpoint = format!("{}/api/v1/health", base);

    match reqwest::get(&endpoint).await {
        Ok(response) => {
            if response.status().is_success() {
                match response.json::<serde_json::Value>().await {
                    Ok(mut report) => {
                        report["endpoint"] = json!(base);
                        report
                    }
                    Err(e) => json!({
                        "status": "unhealthy",
                        "message": format!("API server sent a malformed health payload: {}", e),
                        "endpoint": base
                    }),
                }
            } else {
                json!({
                    "status": "unhealthy",
                    "message": format!("API server returned status: {}", response.status()),
                    "endpoint": base
                })
            }
        }
        Err(_) => {
            json!({
                "status": "offline",
                "message": "API server is not running or not reachable",
                "endpoint": base
            })
        }
    }
}

/// Print the health report in a formatted text output
fn print_health_text(report: &serde_json::Value) {
    println!("{}", "=== Platter API Health Check ===".bold());
    println!();

    let status = report["status"].as_str().unwrap_or("unknown");
    let status_display = match status {
        "healthy" => "HEALTHY".green().bold(),
        "degraded" => "DEGRADED".yellow().bold(),
        "unhealthy" => "UNHEALTHY".red().bold(),
        "offline" => "OFFLINE".white().bold(),
        _ => "UNKNOWN".white().bold(),
    };

    println!("Status: {}", status_display);
    println!("Endpoint: {}", report["endpoint"].as_str().unwrap_or(""));

    if let Some(version) = report["version"].as_str() {
        println!("Version: {}", version);
    }
    if let Some(timestamp) = report["timestamp"].as_str() {
        println!("Timestamp: {}", timestamp);
    }
    if let Some(message) = report["message"].as_str() {
        println!("  {}", message);
    }
    println!();

    if let Some(database) = report["database"].as_object() {
        let connected = database
            .get("connected")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let status_icon = if connected { "✓".green() } else { "✗".red() };

        println!("{}", "Components:".bold());
        println!("{}", "─".repeat(50));
        println!("{} {}", status_icon, "DATABASE".bold());

        if let Some(message) = database.get("message").and_then(|v| v.as_str()) {
            println!("  {}", message);
        }
        println!();
    }
}
