use crate::utils;
use colored::Colorize;
use labgen_infra_cloud::ResourceMode;
use labgen_infra_config::StackConfig;

pub fn handle(config: &StackConfig) -> anyhow::Result<()> {
    println!("{}", "設定を検証中...".blue());
    utils::print_loaded_config(config);

    let stack = match labgen_infra_azure::declare(config) {
        Ok(stack) => stack,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ リソース定義エラー".red().bold());
            eprintln!("  {}", e.user_message());
            std::process::exit(1);
        }
    };

    let order = match stack.order() {
        Ok(order) => order,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ 依存関係エラー".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    let context = labgen_infra_azure::build_context(config);
    match context.check() {
        Ok(Some(dockerfile)) => {
            println!(
                "ビルドコンテキスト: {}",
                context.path().display().to_string().cyan()
            );
            println!("  Dockerfile: {}", dockerfile.display());
        }
        Ok(None) => {
            println!(
                "ビルドコンテキスト: {}",
                context.path().display().to_string().cyan()
            );
            println!(
                "  {}",
                "⚠ Dockerfile が見つかりません（イメージのビルドは失敗します）".yellow()
            );
        }
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ ビルドコンテキストエラー".red().bold());
            eprintln!("  {}", e.user_message());
            std::process::exit(1);
        }
    }

    println!("{}", "✓ リソース定義は正常です！".green().bold());
    println!();
    println!("サマリー:");
    println!("  リソース: {}個", order.len());
    for name in &order {
        if let Some(resource) = stack.resources().get(name) {
            let lookup = if resource.mode == ResourceMode::Lookup {
                " [lookup]".dimmed().to_string()
            } else {
                String::new()
            };
            println!(
                "    - {} ({}){}",
                name.cyan(),
                resource.resource_type,
                lookup
            );
        }
    }
    println!("  出力: {}個", stack.exports().len());
    for name in stack.exports().keys() {
        println!("    - {}", name.cyan());
    }

    Ok(())
}
