//! The `qr` tool: parameter validation, confined path resolution, engine
//! dispatch, and channel-shaped responses.

use async_trait::async_trait;
use base64::Engine as _;
use serde_json::{json, Value};
use std::io::Write as _;
use std::path::PathBuf;

use crate::config::Config;
use crate::engine::{DynEngine, EngineOutput, ImageFormat, Operation, QrJob, QrOptions};
use crate::errors::AppError;
use crate::mcp::registry::{CallContext, Tool};
use crate::pathsafe::{ensure_directory, PermittedRoots, SafePathResolver};
use crate::response::{self, Channel, GeneratedReport, ToolResponse};

pub struct QrTool {
    resolver: SafePathResolver,
    engine: DynEngine,
    output_request: Option<String>,
    assets_request: Option<String>,
    auto_base64: bool,
    max_input_bytes: usize,
    home: Option<PathBuf>,
    temp_root: PathBuf,
}

impl QrTool {
    pub fn new(cfg: &Config, engine: DynEngine) -> anyhow::Result<Self> {
        let workspace = crate::config::canonical_workspace(&cfg.root.workspace_dir)?;
        let home = home::home_dir();
        let temp_root = std::env::temp_dir();

        let mut roots = PermittedRoots::new(workspace);
        if cfg.paths.allow_home {
            if let Some(home) = &home {
                roots = roots.with_home(home.clone());
            }
        }
        if cfg.paths.allow_temp {
            roots = roots.with_extra(temp_root.clone());
        }
        let resolver = SafePathResolver::new(roots).with_mode(cfg.paths.containment);

        Ok(Self {
            resolver,
            engine,
            output_request: cfg.paths.output_dir.clone(),
            assets_request: cfg.paths.assets_dir.clone(),
            auto_base64: cfg.paths.auto_base64,
            max_input_bytes: cfg.limits.max_input_kb * 1024,
            home,
            temp_root,
        })
    }

    /// Base64 data-URI inputs are written to the temp root before the
    /// engine sees them; the staged file is unlinked when the handle
    /// drops.
    fn stage_data_uri(&self, input: &str) -> Result<tempfile::NamedTempFile, AppError> {
        let rest = input
            .strip_prefix("data:image/")
            .ok_or_else(|| AppError::InvalidRequest("malformed data URI".into()))?;
        let (subtype, payload) = rest
            .split_once(";base64,")
            .ok_or_else(|| AppError::InvalidRequest("malformed data URI".into()))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|_| AppError::InvalidRequest("invalid base64 image data".into()))?;
        let ext = if subtype.chars().all(|c| c.is_ascii_alphanumeric()) && !subtype.is_empty() {
            subtype
        } else {
            "png"
        };
        let mut staged = tempfile::Builder::new()
            .prefix("qr-stage-")
            .suffix(&format!(".{ext}"))
            .tempfile_in(&self.temp_root)
            .map_err(|e| AppError::Internal(format!("staging image: {e}")))?;
        staged
            .write_all(&bytes)
            .map_err(|e| AppError::Internal(format!("staging image: {e}")))?;
        Ok(staged)
    }
}

fn parse_options(value: &Value) -> Result<(QrOptions, Option<String>), AppError> {
    let mut options = QrOptions::default();
    let mut logo_request = None;

    if value.is_null() {
        return Ok((options, logo_request));
    }
    let obj = value
        .as_object()
        .ok_or_else(|| AppError::InvalidRequest("options must be an object".into()))?;

    if let Some(color) = obj.get("color") {
        let color = color
            .as_str()
            .ok_or_else(|| AppError::InvalidRequest("color must be a string".into()))?;
        validate_color(color)?;
        options.color = Some(color.to_string());
    }
    if let Some(background) = obj.get("background_color") {
        let background = background
            .as_str()
            .ok_or_else(|| AppError::InvalidRequest("background_color must be a string".into()))?;
        validate_color(background)?;
        options.background_color = Some(background.to_string());
    }
    if let Some(size) = obj.get("size") {
        let size = size
            .as_u64()
            .filter(|s| (1..=50).contains(s))
            .ok_or_else(|| AppError::InvalidRequest("size must be between 1 and 50".into()))?;
        options.size = size as u32;
    }
    if let Some(format) = obj.get("format") {
        let format = format
            .as_str()
            .and_then(ImageFormat::parse)
            .ok_or_else(|| {
                AppError::InvalidRequest("format must be one of png, jpg, jpeg, svg".into())
            })?;
        options.format = format;
    }
    if let Some(logo) = obj.get("logo_path") {
        let logo = logo
            .as_str()
            .ok_or_else(|| AppError::InvalidRequest("logo_path must be a string".into()))?;
        logo_request = Some(logo.to_string());
    }

    Ok((options, logo_request))
}

// CSS color names or hex codes; anything else could smuggle markup into
// SVG output or arguments into the script command line.
fn validate_color(raw: &str) -> Result<(), AppError> {
    let ok = if let Some(hex) = raw.strip_prefix('#') {
        (3..=8).contains(&hex.len()) && hex.chars().all(|c| c.is_ascii_hexdigit())
    } else {
        !raw.is_empty() && raw.len() <= 24 && raw.chars().all(|c| c.is_ascii_alphabetic())
    };
    if ok {
        Ok(())
    } else {
        Err(AppError::InvalidRequest(format!(
            "unsupported color value: {raw}"
        )))
    }
}

fn output_file_name(input: &str, operation: Operation, format: ImageFormat) -> String {
    let ext = if operation == Operation::Decode {
        "json"
    } else {
        format.ext()
    };
    let tag = uuid::Uuid::new_v4().simple().to_string();
    let tag = &tag[..8];
    if operation == Operation::Generate {
        let slug = content_slug(input);
        if !slug.is_empty() {
            return format!("qr-{slug}-{tag}.{ext}");
        }
    }
    format!("qr-{tag}.{ext}")
}

fn content_slug(input: &str) -> String {
    let mut slug = String::new();
    for c in input.chars().take(80) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
        if slug.len() >= 40 {
            break;
        }
    }
    slug.trim_matches('_').to_string()
}

#[async_trait]
impl Tool for QrTool {
    fn name(&self) -> &'static str {
        "qr"
    }

    fn capabilities(&self) -> Value {
        json!({"input": {"type":"object","required":["operation","input"],"properties": {"operation": {"type":"string","enum":["generate","decode","beautify"]},"input":{"type":"string","description":"text/URL for generate; file path or data URI for decode/beautify"},"options":{"type":"object","properties":{"color":{"type":"string"},"background_color":{"type":"string"},"logo_path":{"type":"string"},"size":{"type":"integer","minimum":1,"maximum":50},"format":{"type":"string","enum":["png","jpg","jpeg","svg"]}}}}}, "output": {"type":"object","properties": {"content":{"type":"array"}}}})
    }

    async fn call(&self, ctx: &CallContext, params: Value) -> Result<Value, AppError> {
        let operation = params
            .get("operation")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::InvalidRequest("missing operation".into()))?;
        let operation = Operation::parse(operation)
            .ok_or_else(|| AppError::InvalidRequest(format!("unknown operation: {operation}")))?;
        let input = params
            .get("input")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::InvalidRequest("missing input".into()))?;
        if input.is_empty() {
            return Err(AppError::InvalidRequest("input must not be empty".into()));
        }
        if input.len() > self.max_input_bytes {
            return Err(AppError::InvalidRequest("input too large".into()));
        }
        tracing::debug!(
            request_id = %ctx.request_id,
            operation = operation.as_str(),
            channel = ?ctx.channel,
            engine = self.engine.name(),
            "qr call"
        );

        let (mut options, logo_request) = parse_options(params.get("options").unwrap_or(&Value::Null))?;

        // WhatsApp clients cannot render SVG attachments
        if ctx.channel == Channel::WhatsApp && options.format == ImageFormat::Svg {
            options.format = ImageFormat::Png;
        }

        let output_dir = self.resolver.resolve(self.output_request.as_deref(), "qr-codes")?;
        let assets_dir = self.resolver.resolve(self.assets_request.as_deref(), "qr-assets")?;
        ensure_directory(&output_dir)?;
        ensure_directory(&assets_dir)?;

        if let Some(raw_logo) = &logo_request {
            let resolved = self.resolver.resolve_child(&assets_dir, raw_logo)?;
            if !resolved.as_path().is_file() {
                return Err(AppError::InvalidRequest(format!(
                    "logo file not found: {raw_logo}"
                )));
            }
            options.logo_path = Some(resolved.into_path_buf());
        }

        if !self.engine.supports(operation) {
            return Err(AppError::EngineUnavailable(operation.as_str().to_string()));
        }

        // staged data-URI input lives until the engine has run
        let mut staged = None;
        let engine_input = if operation.reads_image() {
            if input.starts_with("data:image/") {
                let file = self.stage_data_uri(input)?;
                let path = file.path().to_string_lossy().into_owned();
                staged = Some(file);
                path
            } else {
                let resolved = self.resolver.resolve(Some(input), "qr-codes")?;
                if !resolved.as_path().is_file() {
                    return Err(AppError::NotFound);
                }
                resolved.as_path().to_string_lossy().into_owned()
            }
        } else {
            input.to_string()
        };

        let file_name = output_file_name(input, operation, options.format);
        let output_path = output_dir.as_path().join(&file_name);
        let format = options.format;
        let job = QrJob {
            operation,
            input: engine_input,
            options,
            output_path,
        };
        let outcome = self.engine.run(&job).await?;
        drop(staged);

        let friendly_dir = response::friendly_path(output_dir.as_path(), self.home.as_deref());
        match outcome {
            EngineOutput::Decoded { payloads } => {
                if payloads.is_empty() {
                    return Err(AppError::NoQrFound);
                }
                let location = (ctx.channel == Channel::Web)
                    .then(|| (friendly_dir.as_str(), file_name.as_str()));
                Ok(ToolResponse::Text {
                    text: response::decoded_markdown(&payloads, location),
                }
                .into_value())
            }
            EngineOutput::File { path } => match ctx.channel {
                Channel::Web => {
                    let inline_embed = if self.auto_base64 {
                        let bytes = std::fs::read(&path)
                            .map_err(|e| AppError::Internal(e.to_string()))?;
                        Some(response::inline_embed(format, &bytes))
                    } else {
                        None
                    };
                    let friendly_assets =
                        response::friendly_path(assets_dir.as_path(), self.home.as_deref());
                    let friendly_logo = job
                        .options
                        .logo_path
                        .as_deref()
                        .map(|p| response::friendly_path(p, self.home.as_deref()));
                    let report = GeneratedReport {
                        input,
                        output_dir: output_dir.as_path(),
                        friendly_dir: &friendly_dir,
                        file_name: &file_name,
                        logo: friendly_logo.as_deref(),
                        friendly_assets_dir: &friendly_assets,
                        inline_embed,
                    };
                    Ok(ToolResponse::Text {
                        text: response::generated_markdown(&report),
                    }
                    .into_value())
                }
                Channel::WhatsApp | Channel::Other => Ok(ToolResponse::Image {
                    media: path,
                    caption: format!("QR code {} completed successfully", operation.as_str()),
                }
                .into_value()),
            },
        }
    }
}
