use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::pathsafe::ContainmentMode;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub root: Root,
    pub server: Server,
    pub auth: Auth,
    pub limits: Limits,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub engine: Engine,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Root {
    pub workspace_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    pub bind_addr: String,
    pub port: u16,
    #[serde(default = "default_base_path")]
    pub base_path: String,
}
fn default_base_path() -> String {
    "/mcp".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct Auth {
    pub bearer_token: String,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Limits {
    pub engine_timeout_s: u64,
    pub max_input_kb: usize,
    pub max_request_kb: usize,
    #[serde(default = "default_max_stderr_kb")]
    pub max_stderr_kb: usize,
}
fn default_max_stderr_kb() -> usize {
    8
}

/// Where the tool may read and write, and how containment is checked.
/// The permitted-roots set is built from these switches: the workspace is
/// always a root, home and temp only when enabled here.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Paths {
    pub output_dir: Option<String>,
    pub assets_dir: Option<String>,
    #[serde(default)]
    pub allow_home: bool,
    #[serde(default)]
    pub allow_temp: bool,
    #[serde(default)]
    pub containment: ContainmentMode,
    #[serde(default)]
    pub auto_base64: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Engine {
    pub python_path: Option<PathBuf>,
    pub script_dir: Option<PathBuf>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)?;
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            Ok(serde_json::from_str(&raw)?)
        } else {
            Ok(toml::from_str(&raw)?)
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.root.workspace_dir.is_dir() {
            anyhow::bail!(
                "workspace_dir does not exist or is not a directory: {}",
                self.root.workspace_dir.display()
            );
        }
        if self.auth.bearer_token.trim().is_empty() {
            anyhow::bail!("bearer_token must not be empty");
        }
        if self.auth.allowed_origins.is_empty() {
            anyhow::bail!("allowed_origins must not be empty");
        }
        if self.limits.engine_timeout_s == 0 {
            anyhow::bail!("engine_timeout_s must be > 0");
        }
        if self.limits.max_input_kb == 0 {
            anyhow::bail!("max_input_kb must be > 0");
        }
        if self.limits.max_request_kb == 0 {
            anyhow::bail!("max_request_kb must be > 0");
        }
        if let Some(dir) = &self.engine.script_dir {
            if !dir.is_dir() {
                anyhow::bail!("script_dir is not a directory: {}", dir.display());
            }
        }
        Ok(())
    }
}

pub fn canonical_workspace(root: &Path) -> anyhow::Result<PathBuf> {
    let c = dunce::canonicalize(root)?;
    Ok(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config(dir: &Path) -> Config {
        Config {
            root: Root {
                workspace_dir: dir.to_path_buf(),
            },
            server: Server {
                bind_addr: "127.0.0.1".into(),
                port: 0,
                base_path: "/mcp".into(),
            },
            auth: Auth {
                bearer_token: "t".into(),
                allowed_origins: vec!["https://good".into()],
            },
            limits: Limits {
                engine_timeout_s: 30,
                max_input_kb: 4,
                max_request_kb: 64,
                max_stderr_kb: 8,
            },
            paths: Paths::default(),
            engine: Engine::default(),
        }
    }

    #[test]
    fn validate_accepts_sane_config() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(valid_config(tmp.path()).validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_token_and_zero_limits() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = valid_config(tmp.path());
        cfg.auth.bearer_token = "  ".into();
        assert!(cfg.validate().is_err());

        let mut cfg = valid_config(tmp.path());
        cfg.limits.engine_timeout_s = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn containment_mode_parses_from_toml() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = format!(
            r#"
            [root]
            workspace_dir = "{ws}"
            [server]
            bind_addr = "127.0.0.1"
            port = 0
            [auth]
            bearer_token = "t"
            allowed_origins = ["https://good"]
            [limits]
            engine_timeout_s = 30
            max_input_kb = 4
            max_request_kb = 64
            [paths]
            containment = "strict"
            allow_temp = true
            "#,
            ws = tmp.path().display()
        );
        let cfg: Config = toml::from_str(&raw).unwrap();
        assert_eq!(cfg.paths.containment, ContainmentMode::Strict);
        assert!(cfg.paths.allow_temp);
        assert!(!cfg.paths.auto_base64);
    }
}
