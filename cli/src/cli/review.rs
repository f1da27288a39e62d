use anyhow::anyhow;
use task_api::types::task::ApprovalDecision;

use crate::cli::editor::Editor;
use crate::context::Context;
use crate::render;
use crate::util::confirm;

const FEEDBACK_TEMPLATE: &str =
    "\n\n# What should change in the plan? Lines starting with '#' are ignored.\n";

pub async fn approve(ctx: &Context, task_id: &str) -> anyhow::Result<()> {
    submit(ctx, task_id, ApprovalDecision::Approve).await?;
    report(ctx, task_id, "Plan approved. The agent starts implementing it.").await
}

pub async fn revise(ctx: &Context, task_id: &str, feedback: Option<String>) -> anyhow::Result<()> {
    let feedback = match feedback {
        Some(feedback) => feedback,
        None => Editor::from_env()
            .edit(FEEDBACK_TEMPLATE)?
            .ok_or(anyhow!("Empty feedback, nothing submitted"))?,
    };
    submit(ctx, task_id, ApprovalDecision::RequestChanges { feedback }).await?;
    report(ctx, task_id, "Feedback sent. The plan goes back to planning.").await
}

pub async fn reject(ctx: &Context, task_id: &str, yes: bool) -> anyhow::Result<()> {
    if !yes && !confirm(&format!("Reject the plan and cancel task {task_id}?"))? {
        println!("Aborted.");
        return Ok(());
    }
    submit(ctx, task_id, ApprovalDecision::Reject).await?;
    report(ctx, task_id, &format!("Task {task_id} rejected.")).await
}

async fn submit(ctx: &Context, task_id: &str, decision: ApprovalDecision) -> anyhow::Result<()> {
    log::debug!("Submitting {decision:?} for task {task_id}");
    ctx.client.approve(task_id, decision).await?;
    Ok(())
}

/// Confirms the decision and shows where the task went.
async fn report(ctx: &Context, task_id: &str, message: &str) -> anyhow::Result<()> {
    if ctx.json {
        let snapshot = ctx.client.fetch_status(task_id).await?;
        return ctx.print_json(&snapshot);
    }
    println!("{message}");
    match ctx.client.fetch_status(task_id).await {
        Ok(snapshot) => println!("{}", render::snapshot(&snapshot)),
        Err(err) => log::warn!("Could not refresh status of task {task_id}: {err}"),
    }
    Ok(())
}
