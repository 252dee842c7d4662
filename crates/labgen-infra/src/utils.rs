use colored::Colorize;
use labgen_infra_cloud::{SnapshotSource, StateManager, StdinSnapshot};
use labgen_infra_config::{DEFAULT_STACK, StackConfig};
use std::path::Path;

/// スタック名を決定する（空文字列はデフォルト）
pub fn stack_name(stack: &str) -> &str {
    let stack = stack.trim();
    if stack.is_empty() { DEFAULT_STACK } else { stack }
}

/// スタック設定を読み込み、-c の上書きを適用
pub fn load_config(stack: &str, overrides: &[String]) -> anyhow::Result<StackConfig> {
    let mut config = StackConfig::load(stack)?;
    for spec in overrides {
        config.apply_override(spec)?;
    }
    Ok(config)
}

/// 状態スナップショットの読み込み元
///
/// 未指定の場合はスタックファイルと同じディレクトリの `.labgen/state.json`
pub fn snapshot_source(path: Option<&Path>, config: &StackConfig) -> Box<dyn SnapshotSource> {
    match path {
        Some(path) if path == Path::new("-") => Box::new(StdinSnapshot),
        Some(path) => Box::new(StateManager::with_path(path)),
        None => Box::new(StateManager::new(config.base_dir())),
    }
}

/// 読み込んだ設定ファイル情報を表示
pub fn print_loaded_config(config: &StackConfig) {
    println!("スタック: {}", config.stack().cyan());
    match config.source() {
        Some(path) => println!("📄 設定ファイル: {}", path.display().to_string().cyan()),
        None => println!("📄 設定ファイル: {}", "なし（デフォルト値を使用）".dimmed()),
    }
}
