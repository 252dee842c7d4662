use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "スタック '{0}' の設定ファイルが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: Labgen.{0}.yaml\n\
        - ./.labgen/ ディレクトリ\n\
        - ~/.config/labgen/Labgen.{0}.yaml\n\
        または LABGEN_CONFIG_PATH 環境変数で直接指定できます"
    )]
    StackFileNotFound(String),

    #[error("設定ファイルの解析に失敗しました ({path}): {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("設定値 '{key}' はスカラー値である必要があります")]
    InvalidValue { key: String },

    #[error("不正な設定の指定です: '{0}' (KEY=VALUE の形式で指定してください)")]
    InvalidOverride(String),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
