use clap::ValueEnum;
use labgen_infra_config::StackConfig;

/// render の出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Yaml,
}

pub fn handle(config: &StackConfig, format: Format) -> anyhow::Result<()> {
    let stack = labgen_infra_azure::declare(config)?;
    let manifest = stack.manifest()?;

    let rendered = match format {
        Format::Json => serde_json::to_string_pretty(&manifest)?,
        Format::Yaml => serde_yaml::to_string(&manifest)?,
    };
    println!("{}", rendered.trim_end());

    Ok(())
}
