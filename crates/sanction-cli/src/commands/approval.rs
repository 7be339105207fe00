use anyhow::{Context, Result, bail};
use sanction_application::{AWAIT_DECISION_TASK, ApprovalMode, AwaitDecisionArgs, IngressAck};
use sanction_core::approval::{ApprovalId, ApprovalRequest, ApprovalResult, Decision};
use sanction_core::session::SessionId;
use sanction_execution::ApprovalRuntime;
use std::path::Path;
use std::time::{Duration, Instant};

use super::context::{open_runtime, print_json};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
/// How long `decide` waits for the resumed task to store the result
const DECIDE_SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts the request and prints the outcome.
///
/// With `wait`, polls the result store instead of holding the decision in
/// this process, so a `decide` run elsewhere still completes the wait.
pub async fn request(
    home: Option<&Path>,
    session: &str,
    request: ApprovalRequest,
    wait: bool,
    timeout_secs: Option<u64>,
) -> Result<()> {
    let session = SessionId::parse(session)?;
    let runtime = open_runtime(home)?;

    let outcome = runtime
        .orchestrator()
        .request(&session, request, ApprovalMode::FireAndForget)
        .await
        .context("Failed to request approval")?;

    if !wait {
        print_json(&outcome)?;
        return Ok(());
    }

    eprintln!("⏳ Waiting for a decision on {}...", outcome.approval_id);
    let timeout = timeout_secs.map(Duration::from_secs);
    match poll_result(&runtime, &session, &outcome.approval_id, timeout).await? {
        Some(result) => print_json(&result),
        None => {
            eprintln!("⌛ No decision yet; check later with `sanction status`");
            print_json(&outcome)
        }
    }
}

/// Delivers a reviewer's decision from this process.
///
/// Resumes the journaled wait for the approval, strikes its callback address
/// and waits until the result is stored.
pub async fn decide(
    home: Option<&Path>,
    approval_id: &str,
    approved: bool,
    response: Option<String>,
) -> Result<()> {
    let approval_id = ApprovalId::parse(approval_id)?;
    let runtime = open_runtime(home)?;

    let args = find_pending(&runtime, &approval_id)
        .await?
        .with_context(|| format!("No pending approval {}", approval_id))?;
    runtime.start().await?;

    let decision = if approved {
        Decision::approve(response.unwrap_or_else(|| "Approved".to_string()))
    } else {
        Decision::deny(response.unwrap_or_else(|| "Denied".to_string()))
    };

    match runtime.ingress().accept(&approval_id, decision).await? {
        IngressAck::Stale { approval_id } => {
            bail!("Approval {} was already handled or has expired", approval_id)
        }
        IngressAck::Delivered { .. } => {}
    }

    match poll_result(
        &runtime,
        &args.session_id,
        &approval_id,
        Some(DECIDE_SETTLE_TIMEOUT),
    )
    .await?
    {
        Some(result) => print_json(&result),
        None => bail!("Decision delivered but no result was stored for {}", approval_id),
    }
}

pub async fn status(home: Option<&Path>, session: &str) -> Result<()> {
    let runtime = open_runtime(home)?;
    let status = runtime.status().check(session).await?;
    print_json(&status)
}

async fn find_pending(
    runtime: &ApprovalRuntime,
    approval_id: &ApprovalId,
) -> Result<Option<AwaitDecisionArgs>> {
    for record in runtime.tasks().pending().await? {
        if record.kind != AWAIT_DECISION_TASK {
            continue;
        }
        match serde_json::from_value::<AwaitDecisionArgs>(record.args) {
            Ok(args) if &args.approval_id == approval_id => return Ok(Some(args)),
            Ok(_) => {}
            Err(e) => tracing::warn!(task_id = %record.task_id, "unreadable task args: {}", e),
        }
    }
    Ok(None)
}

/// Polls until the result exists or `timeout` elapses (`None` waits forever).
async fn poll_result(
    runtime: &ApprovalRuntime,
    session: &SessionId,
    approval_id: &ApprovalId,
    timeout: Option<Duration>,
) -> Result<Option<ApprovalResult>> {
    let started = Instant::now();
    loop {
        if let Some(result) = runtime.results().for_approval(session, approval_id).await? {
            return Ok(Some(result));
        }
        if timeout.is_some_and(|t| started.elapsed() >= t) {
            return Ok(None);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
