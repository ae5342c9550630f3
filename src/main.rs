//! Jad 交互式命令行
//!
//! 每行输入做一次决策并打印回复；`/state` 查看会话状态，`/run <workflow_id>` 推进工作流，
//! `/cancel <workflow_id>` 取消，`/quit` 退出。

use std::path::PathBuf;

use anyhow::Context;
use jad::core::{DecisionContext, DecisionEngine};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    jad::observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let engine = jad::create_engine_builder(config_path)
        .build()
        .context("Failed to build decision engine")?;
    let session_id = uuid::Uuid::new_v4().to_string();
    let customer_id = std::env::var("JAD_CUSTOMER_ID").ok();
    tracing::info!(session_id = %session_id, "Jad REPL started");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }

        let output = match handle_command(&engine, &session_id, line).await? {
            Some(output) => output,
            None => {
                let mut ctx = DecisionContext::new(&session_id, line);
                ctx.customer_id = customer_id.clone();
                let reply = engine.respond(&ctx).await;
                let mut output = format!(
                    "{}\n  [{} · confidence {:.2}]",
                    reply.message,
                    reply.decision.action.kind(),
                    reply.decision.confidence
                );
                if let Some(workflow_id) = reply.decision.workflow_id() {
                    output.push_str(&format!("\n  workflow: {workflow_id} (/run to continue)"));
                }
                output
            }
        };
        stdout.write_all(format!("{output}\n").as_bytes()).await?;
    }

    Ok(())
}

/// 处理斜杠命令；普通输入返回 None
async fn handle_command(
    engine: &DecisionEngine,
    session_id: &str,
    line: &str,
) -> anyhow::Result<Option<String>> {
    let mut parts = line.split_whitespace();
    let output = match (parts.next(), parts.next()) {
        (Some("/state"), _) => {
            let state = engine.get_agent_state(session_id).await;
            serde_json::to_string_pretty(&state).context("Failed to render state")?
        }
        (Some("/run"), Some(id)) => {
            let execution = engine.execute_workflow(id).await;
            serde_json::to_string_pretty(&execution).context("Failed to render workflow")?
        }
        (Some("/cancel"), Some(id)) => {
            if engine.cancel_workflow(id).await {
                format!("workflow {id} cancelled")
            } else {
                format!("workflow {id} not found")
            }
        }
        (Some(cmd), _) if cmd.starts_with('/') => {
            "commands: /state, /run <workflow_id>, /cancel <workflow_id>, /quit".to_string()
        }
        _ => return Ok(None),
    };
    Ok(Some(output))
}
