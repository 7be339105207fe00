use anyhow::Result;
use std::path::Path;

use super::context::{open_runtime, print_json};

pub async fn pending(home: Option<&Path>) -> Result<()> {
    let runtime = open_runtime(home)?;
    let records = runtime.tasks().pending().await?;
    if records.is_empty() {
        eprintln!("No pending approvals");
    }
    print_json(&records)
}

pub async fn sweep(home: Option<&Path>) -> Result<()> {
    let runtime = open_runtime(home)?;
    let report = runtime.maintenance().sweep_all().await?;
    let total = report.total();
    eprintln!(
        "🧹 Evicted {} record(s), removed {} empty session partition(s)",
        total.evicted, total.namespaces_removed
    );
    print_json(&report)
}
