//! Subprocess engine driving the Python QR scripts.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::{EngineOutput, Operation, QrEngine, QrJob};
use crate::config::Config;
use crate::errors::AppError;

const SCRIPTS: [&str; 3] = ["generate_qr.py", "decode_qr.py", "beautify_qr.py"];

pub struct ScriptEngine {
    python: PathBuf,
    script_dir: PathBuf,
    temp_root: PathBuf,
    timeout_s: u64,
    max_stderr_kb: usize,
}

impl ScriptEngine {
    /// Locate a Python 3 interpreter and the script set. Any missing piece
    /// returns the reason as an `Err` so the caller can log it and fall
    /// back; this runs once at startup.
    pub async fn probe(cfg: &Config) -> Result<Self, String> {
        let script_dir = cfg
            .engine
            .script_dir
            .clone()
            .ok_or_else(|| "script_dir not configured".to_string())?;
        for script in SCRIPTS {
            if !script_dir.join(script).is_file() {
                return Err(format!("missing script {script} in {}", script_dir.display()));
            }
        }

        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(configured) = &cfg.engine.python_path {
            candidates.push(configured.clone());
        }
        candidates.push(PathBuf::from("python3"));
        candidates.push(PathBuf::from("python"));

        for candidate in candidates {
            let Ok(binary) = which::which(&candidate) else {
                continue;
            };
            if python_responds(&binary).await {
                return Ok(Self {
                    python: binary,
                    script_dir,
                    temp_root: std::env::temp_dir(),
                    timeout_s: cfg.limits.engine_timeout_s,
                    max_stderr_kb: cfg.limits.max_stderr_kb,
                });
            }
        }
        Err("no usable python interpreter".to_string())
    }

    pub fn python(&self) -> &Path {
        &self.python
    }

    fn stage_input(&self, job: &QrJob) -> Result<tempfile::NamedTempFile, AppError> {
        let payload = json!({
            "input": job.input,
            "options": {
                "color": job.options.color,
                "backgroundColor": job.options.background_color,
                "logoPath": job.options.logo_path,
                "size": job.options.size,
                "format": job.options.format.ext(),
            },
        });
        let mut staged = tempfile::Builder::new()
            .prefix("qr-input-")
            .suffix(".json")
            .tempfile_in(&self.temp_root)
            .map_err(|e| AppError::Internal(format!("staging input: {e}")))?;
        staged
            .write_all(payload.to_string().as_bytes())
            .map_err(|e| AppError::Internal(format!("staging input: {e}")))?;
        Ok(staged)
    }
}

async fn python_responds(binary: &Path) -> bool {
    let mut command = Command::new(binary);
    command
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    match timeout(Duration::from_secs(5), command.output()).await {
        Ok(Ok(out)) => {
            // older interpreters print the version on stderr
            let text = format!(
                "{}{}",
                String::from_utf8_lossy(&out.stdout),
                String::from_utf8_lossy(&out.stderr)
            );
            text.contains("Python")
        }
        _ => false,
    }
}

#[derive(Debug, Deserialize)]
struct DecodeFile {
    success: bool,
    #[serde(default)]
    results: Vec<DecodeEntry>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DecodeEntry {
    data: String,
}

fn read_decode_file(path: &Path) -> Option<DecodeFile> {
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

#[async_trait]
impl QrEngine for ScriptEngine {
    fn name(&self) -> &'static str {
        "python-scripts"
    }

    fn supports(&self, _operation: Operation) -> bool {
        true
    }

    async fn run(&self, job: &QrJob) -> Result<EngineOutput, AppError> {
        // staged file is unlinked when this handle drops
        let staged = self.stage_input(job)?;
        let script = self.script_dir.join(job.operation.script_name());

        let mut command = Command::new(&self.python);
        command
            .arg(&script)
            .arg("--input")
            .arg(staged.path())
            .arg("--output")
            .arg(&job.output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(script = %script.display(), operation = job.operation.as_str(), "running qr script");

        let out = match timeout(Duration::from_secs(self.timeout_s), command.output()).await {
            Ok(Ok(out)) => out,
            Ok(Err(e)) => return Err(AppError::Internal(format!("failed to spawn python: {e}"))),
            Err(_) => return Err(AppError::EngineTimeout),
        };

        // Decode writes a structured result file even on failure; prefer
        // it over exit status so "no QR codes" surfaces as itself instead
        // of a generic script error.
        if job.operation == Operation::Decode {
            if let Some(parsed) = read_decode_file(&job.output_path) {
                if !parsed.success {
                    return match parsed.error.as_deref() {
                        Some(msg) if msg.contains("No QR codes") => Err(AppError::NoQrFound),
                        Some(msg) => Err(AppError::EngineFailed(msg.to_string())),
                        None => Err(AppError::EngineFailed("decode failed".into())),
                    };
                }
                let payloads: Vec<String> =
                    parsed.results.into_iter().map(|r| r.data).collect();
                return Ok(EngineOutput::Decoded { payloads });
            }
        }

        if !out.status.success() {
            let cap = out.stderr.len().min(self.max_stderr_kb * 1024);
            let stderr = String::from_utf8_lossy(&out.stderr[..cap]);
            let line = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("script exited with an error");
            return Err(AppError::EngineFailed(line.to_string()));
        }

        if job.operation == Operation::Decode {
            return Err(AppError::EngineFailed(
                "decode script produced no output file".into(),
            ));
        }

        if !job.output_path.is_file() {
            return Err(AppError::EngineFailed(
                "script executed but no output file was generated".into(),
            ));
        }
        Ok(EngineOutput::File {
            path: job.output_path.clone(),
        })
    }
}
