mod commands;
mod utils;

use clap::{Parser, Subcommand};
use commands::render::Format;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "labgen-infra")]
#[command(about = "lab-gen を Azure にデプロイするためのインフラ定義", long_about = None)]
struct Cli {
    /// スタック名 (dev, prod など)
    #[arg(
        short = 's',
        long,
        env = "LABGEN_STACK",
        default_value = labgen_infra_config::DEFAULT_STACK,
        global = true
    )]
    stack: String,

    /// 設定値の上書き (例: -c imageTag=v2)。複数指定可
    #[arg(short = 'c', long = "config", value_name = "KEY=VALUE", global = true)]
    overrides: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 設定とリソースグラフを検証
    Validate,
    /// エンジンに渡すリソース定義を出力
    Render {
        /// 出力形式
        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
    /// 状態スナップショットとの差分を表示
    Preview {
        /// 状態スナップショットのパス（- で標準入力）
        #[arg(long, value_name = "PATH")]
        state: Option<PathBuf>,
    },
    /// スタック出力と各リソースの解決状況を表示
    Outputs {
        /// 状態スナップショットのパス（- で標準入力）
        #[arg(long, value_name = "PATH")]
        state: Option<PathBuf>,
        /// JSON で出力
        #[arg(long)]
        json: bool,
    },
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 標準出力は render/outputs の結果に使うので、ログは stderr に出力
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    // Versionコマンドは設定ファイル不要
    if matches!(cli.command, Commands::Version) {
        println!("labgen-infra {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let stack = utils::stack_name(&cli.stack);
    let config = utils::load_config(stack, &cli.overrides)?;

    // コマンドディスパッチ
    match cli.command {
        Commands::Validate => {
            commands::validate::handle(&config)?;
        }
        Commands::Render { format } => {
            commands::render::handle(&config, format)?;
        }
        Commands::Preview { state } => {
            let source = utils::snapshot_source(state.as_deref(), &config);
            commands::preview::handle(&config, source.as_ref()).await?;
        }
        Commands::Outputs { state, json } => {
            let source = utils::snapshot_source(state.as_deref(), &config);
            commands::outputs::handle(&config, source.as_ref(), json).await?;
        }
        Commands::Version => {
            unreachable!("Version is handled before config loading");
        }
    }

    Ok(())
}
