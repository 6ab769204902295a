//! Agent health command

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{color_status, print_rows, OutputFormat};

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    component: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

/// Show agent component health and the last successful collection
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;

    if let OutputFormat::Table = format {
        println!("{} {}", "Agent status:".bold(), color_status(&health.status));
        match &health.last_cycle {
            Some(cycle) => println!(
                "Last collection: {} ({} records)",
                cycle.completed_at.format("%Y-%m-%d %H:%M:%S"),
                cycle.records
            ),
            None => println!("Last collection: {}", "never".dimmed()),
        }
        println!();
    }

    let mut names: Vec<&String> = health.components.keys().collect();
    names.sort();
    let rows = names
        .into_iter()
        .map(|name| {
            let component = &health.components[name];
            ComponentRow {
                component: name.clone(),
                status: color_status(&component.status),
                message: component.message.clone().unwrap_or_default(),
            }
        })
        .collect();

    print_rows(rows, &health, format)
}
