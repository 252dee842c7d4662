use crate::utils;
use colored::Colorize;
use labgen_infra_cloud::{Action, ActionType, SnapshotSource};
use labgen_infra_config::StackConfig;

pub async fn handle(config: &StackConfig, source: &dyn SnapshotSource) -> anyhow::Result<()> {
    utils::print_loaded_config(config);
    println!("状態スナップショット: {}", source.describe().cyan());

    let stack = labgen_infra_azure::declare(config)?;
    let state = source.load().await?;
    let plan = stack.preview(&state)?;

    println!();
    for action in &plan.actions {
        print_action(action);
    }

    println!();
    let summary = plan.summary();
    if plan.has_changes {
        println!("{}", format!("Plan: {}", summary).bold());
    } else {
        println!("{}", "✓ 変更はありません".green().bold());
        println!("  {}", summary.to_string().dimmed());
    }

    Ok(())
}

fn print_action(action: &Action) {
    let line = format!(
        "{} {} ({})",
        symbol(action.action_type),
        action.resource_id,
        action.resource_type
    );
    let line = match action.action_type {
        ActionType::Create => line.green(),
        ActionType::Update => line.yellow(),
        ActionType::Delete => line.red(),
        ActionType::Read => line.cyan(),
        ActionType::NoOp => line.dimmed(),
    };
    println!("  {}", line);

    if let Some(changed) = action.details.get("changed").and_then(|v| v.as_array()) {
        let keys: Vec<&str> = changed.iter().filter_map(|k| k.as_str()).collect();
        println!("      変更: {}", keys.join(", "));
    }
    if let Some(previous) = action.details.get("previous_type").and_then(|v| v.as_str()) {
        println!("      以前の型: {}", previous);
    }
}

fn symbol(action_type: ActionType) -> &'static str {
    match action_type {
        ActionType::Create => "+",
        ActionType::Update => "~",
        ActionType::Delete => "-",
        ActionType::Read => ">",
        ActionType::NoOp => "=",
    }
}
