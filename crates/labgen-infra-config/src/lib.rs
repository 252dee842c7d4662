pub mod error;

pub use error::*;

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// 設定キーの名前空間
pub const PROJECT: &str = "lab-gen";
/// スタック未指定時のスタック名
pub const DEFAULT_STACK: &str = "dev";

pub const APP_PATH: &str = "appPath";
pub const IMAGE_NAME: &str = "imageName";
pub const IMAGE_TAG: &str = "imageTag";

pub const DEFAULT_APP_PATH: &str = "./..";
pub const DEFAULT_IMAGE_NAME: &str = "lab-gen-app";
pub const DEFAULT_IMAGE_TAG: &str = "latest";

const CONFIG_PATH_ENV: &str = "LABGEN_CONFIG_PATH";
const LOCAL_DIR: &str = ".labgen";

/// スタックファイル名 (Labgen.{stack}.yaml)
pub fn stack_file_name(stack: &str) -> String {
    format!("Labgen.{}.yaml", stack)
}

/// スタックの設定ファイルを探す
///
/// 以下の優先順位で設定ファイルを検索:
/// 1. 環境変数 LABGEN_CONFIG_PATH (直接パス指定)
/// 2. カレントディレクトリ: Labgen.{stack}.yaml
/// 3. ./.labgen/ ディレクトリ内: Labgen.{stack}.yaml
/// 4. ~/.config/labgen/Labgen.{stack}.yaml (グローバル設定)
pub fn find_stack_file(stack: &str) -> Result<PathBuf> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!("{} が存在しないパスを指しています: {}", CONFIG_PATH_ENV, path.display());
    }

    let current_dir = std::env::current_dir()?;
    let filename = stack_file_name(stack);

    // 2. カレントディレクトリ
    let path = current_dir.join(&filename);
    if path.exists() {
        return Ok(path);
    }

    // 3. ./.labgen/ ディレクトリ
    let path = current_dir.join(LOCAL_DIR).join(&filename);
    if path.exists() {
        return Ok(path);
    }

    // 4. グローバル設定ファイル
    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("labgen").join(&filename);
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::StackFileNotFound(stack.to_string()))
}

/// スタックファイルの構造
#[derive(Debug, Default, Deserialize)]
struct StackFile {
    #[serde(default)]
    config: BTreeMap<String, serde_yaml::Value>,
}

/// スタックの設定値
///
/// キーは `lab-gen:appPath` のように名前空間付きで保持する。
/// 名前空間なしのキーは `lab-gen:` を補う。
#[derive(Debug, Clone)]
pub struct StackConfig {
    stack: String,
    values: BTreeMap<String, String>,
    base_dir: PathBuf,
    source: Option<PathBuf>,
}

impl StackConfig {
    /// 設定値なし（全てデフォルト）
    pub fn empty(stack: impl Into<String>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            stack: stack.into(),
            values: BTreeMap::new(),
            base_dir: base_dir.into(),
            source: None,
        }
    }

    /// スタックファイルを探して読み込む
    ///
    /// ファイルが見つからない場合は全てデフォルト値の設定を返す。
    pub fn load(stack: &str) -> Result<Self> {
        match find_stack_file(stack) {
            Ok(path) => Self::from_file(stack, &path),
            Err(ConfigError::StackFileNotFound(_)) => {
                tracing::debug!("スタック {} の設定ファイルなし、デフォルト値を使用", stack);
                Ok(Self::empty(stack, std::env::current_dir()?))
            }
            Err(e) => Err(e),
        }
    }

    /// 指定したスタックファイルを読み込む
    pub fn from_file(stack: &str, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut config = Self::from_yaml_str(stack, &content, base_dir).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        config.source = Some(path.to_path_buf());
        tracing::debug!("設定ファイルを読み込みました: {}", path.display());
        Ok(config)
    }

    /// YAML文字列から読み込む
    pub fn from_yaml_str(stack: &str, content: &str, base_dir: impl Into<PathBuf>) -> Result<Self> {
        let file: StackFile = if content.trim().is_empty() {
            StackFile::default()
        } else {
            serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            })?
        };

        let mut config = Self::empty(stack, base_dir);
        for (key, value) in file.config {
            let value = match value {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Bool(b) => b.to_string(),
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Null => String::new(),
                _ => return Err(ConfigError::InvalidValue { key }),
            };
            config.set(&key, value);
        }
        Ok(config)
    }

    /// `KEY=VALUE` 形式の上書き指定を適用
    pub fn apply_override(&mut self, spec: &str) -> Result<()> {
        let (key, value) = spec
            .split_once('=')
            .filter(|(k, _)| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::InvalidOverride(spec.to_string()))?;
        self.set(key.trim(), value);
        Ok(())
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(qualify(key), value.into());
    }

    /// 設定値を取得（未設定・空文字列は None）
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&qualify(key))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// 設定値を取得（未設定・空文字列はデフォルト値）
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// 読み込んだファイル（デフォルトのみの場合は None）
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// 相対パスの基準ディレクトリ
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// イメージのビルドコンテキスト
    pub fn app_path(&self) -> &str {
        self.get_or(APP_PATH, DEFAULT_APP_PATH)
    }

    /// イメージ名（リソース名のプレフィックスにも使用）
    pub fn image_name(&self) -> &str {
        self.get_or(IMAGE_NAME, DEFAULT_IMAGE_NAME)
    }

    /// イメージタグ
    pub fn image_tag(&self) -> &str {
        self.get_or(IMAGE_TAG, DEFAULT_IMAGE_TAG)
    }

    /// appPath を基準ディレクトリから解決したパス
    pub fn build_context(&self) -> PathBuf {
        self.base_dir.join(self.app_path())
    }
}

fn qualify(key: &str) -> String {
    if key.contains(':') {
        key.to_string()
    } else {
        format!("{}:{}", PROJECT, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_defaults_when_unset() {
        let config = StackConfig::empty("dev", "/tmp");
        assert_eq!(config.app_path(), "./..");
        assert_eq!(config.image_name(), "lab-gen-app");
        assert_eq!(config.image_tag(), "latest");
    }

    #[test]
    fn test_empty_string_falls_back_to_default() {
        let config = StackConfig::from_yaml_str(
            "dev",
            "config:\n  lab-gen:imageTag: \"\"\n  lab-gen:imageName:\n",
            "/tmp",
        )
        .unwrap();
        assert_eq!(config.image_tag(), "latest");
        assert_eq!(config.image_name(), "lab-gen-app");
    }

    #[test]
    fn test_namespaced_and_bare_keys() {
        let config = StackConfig::from_yaml_str(
            "prod",
            "config:\n  lab-gen:imageTag: v1.2.0\n  appPath: ../service\n  azure-native:location: japaneast\n",
            "/srv/infra",
        )
        .unwrap();
        assert_eq!(config.image_tag(), "v1.2.0");
        assert_eq!(config.app_path(), "../service");
        assert_eq!(config.get("azure-native:location"), Some("japaneast"));
        assert_eq!(config.build_context(), PathBuf::from("/srv/infra/../service"));
    }

    #[test]
    fn test_non_scalar_value_rejected() {
        let result = StackConfig::from_yaml_str("dev", "config:\n  imageTag: [a, b]\n", "/tmp");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_numeric_value_is_stringified() {
        let config = StackConfig::from_yaml_str("dev", "config:\n  imageTag: 2\n", "/tmp").unwrap();
        assert_eq!(config.image_tag(), "2");
    }

    #[test]
    fn test_apply_override() {
        let mut config = StackConfig::empty("dev", "/tmp");
        config.apply_override("imageTag=sha-abc123").unwrap();
        assert_eq!(config.image_tag(), "sha-abc123");

        assert!(matches!(
            config.apply_override("imageTag"),
            Err(ConfigError::InvalidOverride(_))
        ));
        assert!(matches!(
            config.apply_override("=value"),
            Err(ConfigError::InvalidOverride(_))
        ));
    }

    #[test]
    #[serial]
    fn test_find_stack_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("Labgen.dev.yaml"), "config: {}").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_stack_file("dev");
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with("Labgen.dev.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_stack_file_in_local_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        let local_dir = temp_dir.path().join(".labgen");
        fs::create_dir(&local_dir).unwrap();
        fs::write(local_dir.join("Labgen.prod.yaml"), "config: {}").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_stack_file("prod");
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with(".labgen/Labgen.prod.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_stack_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, "config:\n  imageTag: from-env\n").unwrap();

        temp_env::with_var(CONFIG_PATH_ENV, Some(config_path.as_os_str()), || {
            assert_eq!(find_stack_file("dev").unwrap(), config_path);

            let config = StackConfig::load("dev").unwrap();
            assert_eq!(config.image_tag(), "from-env");
            assert_eq!(config.source(), Some(config_path.as_path()));
            assert_eq!(config.base_dir(), temp_dir.path());
        });
    }

    #[test]
    #[serial]
    fn test_load_without_stack_file_uses_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = temp_env::with_var_unset(CONFIG_PATH_ENV, || {
            StackConfig::load("labgen-test-missing-stack")
        });
        std::env::set_current_dir(original_dir).unwrap();

        let config = result.unwrap();
        assert!(config.source().is_none());
        assert_eq!(config.image_name(), "lab-gen-app");
    }
}
