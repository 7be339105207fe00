use anyhow::Result;
use sanction_core::approval::ApprovalId;
use std::path::Path;

use super::context::{open_runtime, print_json};

pub async fn list(home: Option<&Path>) -> Result<()> {
    let runtime = open_runtime(home)?;
    let mut records = runtime.registry().list().await?;
    records.sort_by_key(|r| r.timestamp);
    print_json(&records)
}

/// Deletes one mapping, or every live mapping when `approval_id` is `None`.
///
/// A deleted mapping makes later clicks for that approval stale.
pub async fn delete(home: Option<&Path>, approval_id: Option<&str>) -> Result<()> {
    let runtime = open_runtime(home)?;
    let registry = runtime.registry();

    let targets = match approval_id {
        Some(id) => vec![ApprovalId::parse(id)?],
        None => registry
            .list()
            .await?
            .into_iter()
            .map(|r| r.approval_id)
            .collect(),
    };

    for id in &targets {
        registry.consume(id).await?;
    }
    println!("🗑️  Deleted {} webhook record(s)", targets.len());
    Ok(())
}
