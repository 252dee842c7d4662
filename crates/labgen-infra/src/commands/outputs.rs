use crate::utils;
use colored::Colorize;
use labgen_infra_cloud::{NodeStatus, SnapshotSource};
use labgen_infra_config::StackConfig;

pub async fn handle(
    config: &StackConfig,
    source: &dyn SnapshotSource,
    json: bool,
) -> anyhow::Result<()> {
    let stack = labgen_infra_azure::declare(config)?;
    let state = source.load().await?;
    let evaluation = stack.evaluate(&state)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&evaluation)?);
    } else {
        utils::print_loaded_config(config);
        println!("状態スナップショット: {}", source.describe().cyan());
        println!();

        println!("出力:");
        for (name, value) in &evaluation.outputs {
            match value {
                Some(serde_json::Value::String(s)) => println!("  {}: {}", name.cyan(), s),
                Some(other) => println!("  {}: {}", name.cyan(), other),
                None => println!("  {}: {}", name.cyan(), "(未確定)".dimmed()),
            }
        }

        let unresolved: Vec<_> = evaluation
            .nodes
            .iter()
            .filter(|n| !n.status.is_resolved())
            .collect();
        if !unresolved.is_empty() {
            println!();
            println!("未解決のリソース:");
            for node in unresolved {
                let detail = match &node.status {
                    NodeStatus::Pending { waiting_on } => {
                        format!("{} を待機中", waiting_on).yellow()
                    }
                    NodeStatus::Failed { reason } => format!("失敗: {}", reason).red(),
                    NodeStatus::Blocked { dependency, .. } => {
                        format!("{} の失敗によりブロック", dependency).red()
                    }
                    NodeStatus::Resolved { .. } => continue,
                };
                println!("  - {}: {}", node.name.cyan(), detail);
            }
        }
    }

    if let Some(failure) = evaluation.failures().first() {
        let reason = match &failure.status {
            NodeStatus::Failed { reason } | NodeStatus::Blocked { reason, .. } => reason.as_str(),
            _ => "",
        };
        anyhow::bail!("{} を解決できません: {}", failure.name, reason);
    }

    Ok(())
}
