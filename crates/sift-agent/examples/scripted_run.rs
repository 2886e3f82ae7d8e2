//! Scripted end-to-end run over an in-memory dataset
//!
//! Uses the mock chat client, so no provider credentials are needed.

use std::sync::Arc;

use serde_json::json;

use sift_agent::provider::{ChatCompletion, MockChatClient};
use sift_agent::{Agent, RunConfig};
use sift_core::{DatasetStore, ToolRegistry};
use sift_eda::install_statistics_tools;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== Sift Scripted Run Example ===\n");

    let store = Arc::new(DatasetStore::new());
    let rows = vec![
        json!({"date": "2024-01-01", "region": "west", "revenue": 120.0}),
        json!({"date": "2024-01-02", "region": "east", "revenue": 80.0}),
        json!({"date": "2024-01-03", "region": "west", "revenue": 150.0}),
        json!({"date": "2024-01-04", "region": "east", "revenue": 95.0}),
    ]
    .into_iter()
    .map(|v| v.as_object().expect("row").clone())
    .collect();
    let summary = store.add_dataset("revenue.csv", rows)?;
    println!(
        "Ingested '{}' ({} rows, {} columns)\n",
        summary.name,
        summary.row_count,
        summary.columns.len()
    );

    let mut registry = ToolRegistry::new();
    install_statistics_tools(&mut registry, &store);

    // The model's side of the conversation, scripted: describe, summarize,
    // then answer in prose.
    let client = Arc::new(MockChatClient::new(vec![
        ChatCompletion::default()
            .with_tool_call("DescribeDataset", json!({"datasetId": summary.id.clone()})),
        ChatCompletion::default()
            .with_tool_call("SummarizeColumns", json!({"datasetId": summary.id.clone()}))
            .with_tool_call("TopSegments", json!({
                "datasetId": summary.id.clone(),
                "groupByColumn": "region",
                "metricColumn": "revenue"
            })),
        ChatCompletion::text(
            "The dataset has 4 rows. The west region leads with an average revenue of 135.",
        ),
    ]));

    let agent = Agent::new(client, registry, store).with_config(RunConfig {
        dataset_id: Some(summary.id.clone()),
        ..RunConfig::default()
    });

    let outcome = agent.run("Which region performs best?").await?;

    println!("Stop reason: {:?}", outcome.stop_reason);
    println!("Final phase: {}", outcome.phase);
    println!("Steps taken: {}", outcome.steps_taken);
    if let Some(text) = &outcome.final_text {
        println!("Answer: {text}");
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
