//! QR engines: the Python scripts when available, a built-in encoder
//! otherwise. Which one runs is decided once at startup by [`probe`] and
//! never re-checked per call.

pub mod library;
pub mod script;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Generate,
    Decode,
    Beautify,
}

impl Operation {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "generate" => Some(Operation::Generate),
            "decode" => Some(Operation::Decode),
            "beautify" => Some(Operation::Beautify),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Generate => "generate",
            Operation::Decode => "decode",
            Operation::Beautify => "beautify",
        }
    }

    pub fn script_name(&self) -> &'static str {
        match self {
            Operation::Generate => "generate_qr.py",
            Operation::Decode => "decode_qr.py",
            Operation::Beautify => "beautify_qr.py",
        }
    }

    /// Decode and beautify read an existing image instead of text input.
    pub fn reads_image(&self) -> bool {
        matches!(self, Operation::Decode | Operation::Beautify)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpg,
    Jpeg,
    Svg,
}

impl ImageFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "png" => Some(ImageFormat::Png),
            "jpg" => Some(ImageFormat::Jpg),
            "jpeg" => Some(ImageFormat::Jpeg),
            "svg" => Some(ImageFormat::Svg),
            _ => None,
        }
    }

    pub fn ext(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpg => "jpg",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Svg => "svg",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpg | ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Svg => "image/svg+xml",
        }
    }
}

#[derive(Debug, Clone)]
pub struct QrOptions {
    pub color: Option<String>,
    pub background_color: Option<String>,
    /// Already resolved and existence-checked by the tool layer.
    pub logo_path: Option<PathBuf>,
    pub size: u32,
    pub format: ImageFormat,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            color: None,
            background_color: None,
            logo_path: None,
            size: 10,
            format: ImageFormat::Png,
        }
    }
}

#[derive(Debug)]
pub struct QrJob {
    pub operation: Operation,
    /// Text or URL for generate; a resolved image path for decode and
    /// beautify.
    pub input: String,
    pub options: QrOptions,
    pub output_path: PathBuf,
}

#[derive(Debug)]
pub enum EngineOutput {
    /// A generated or beautified image on disk.
    File { path: PathBuf },
    /// Payloads extracted by a decode run.
    Decoded { payloads: Vec<String> },
}

#[async_trait]
pub trait QrEngine: Send + Sync {
    fn name(&self) -> &'static str;
    fn supports(&self, operation: Operation) -> bool;
    async fn run(&self, job: &QrJob) -> Result<EngineOutput, AppError>;
}

pub type DynEngine = Arc<dyn QrEngine>;

/// One-time capability probe: prefer the Python scripts, fall back to the
/// built-in encoder when no usable interpreter or script set is found.
pub async fn probe(cfg: &Config) -> DynEngine {
    match script::ScriptEngine::probe(cfg).await {
        Ok(engine) => {
            info!(python = %engine.python().display(), "qr engine: python scripts");
            Arc::new(engine)
        }
        Err(reason) => {
            warn!(%reason, "python qr scripts unavailable, using built-in encoder");
            Arc::new(library::LibraryEngine::new())
        }
    }
}
