use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use glowmarkt::{Client, ELECTRICITY_CONSUMPTION, GAS_CONSUMPTION, Period};

fn main() -> Result<()> {
    // Credentials come from explicit args, env vars or ~/.hildebrand.credentials.
    env_logger::init();
    let client = Client::from_env().context("could not log in to Glowmarkt")?;

    if let Some(session) = client.session() {
        println!("Account: {}", session.account_id().unwrap_or("(unknown)"));
        if let Some(exp) = session.expiry() {
            println!("Token expires: {}", exp);
        }
    }

    let resources = client.list_resources()?;
    for r in &resources {
        println!("{:<40} {:<32} {}", r.id, r.classifier, r.name);
    }

    let end = Utc::now();
    let start = end - Duration::days(1);
    for classifier in [ELECTRICITY_CONSUMPTION, GAS_CONSUMPTION] {
        let Some(resource) = resources.iter().find(|r| r.classifier == classifier) else {
            continue;
        };
        println!("\n{} (last 24h, hourly)", resource.name);
        let readings = client
            .get_readings(&resource.id, start, end, Period::Hour)
            .with_context(|| format!("failed to read {}", classifier))?;
        for reading in readings {
            println!("  {}  {:>10.3} {}", reading.timestamp, reading.value, reading.unit);
        }
    }

    Ok(())
}
