//! Channel detection and response shaping.
//!
//! The host renders one of two shapes: plain text (markdown) or an inline
//! image. Which one a call gets is a pure function of the channel id, so
//! the branching lives here as data instead of cascading conditionals in
//! the tool body.

use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::engine::ImageFormat;

/// Closed set of response-relevant channels. Anything unrecognized
/// renders like a messaging channel (inline image).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Web,
    WhatsApp,
    Other,
}

impl Channel {
    pub fn from_id(id: &str) -> Self {
        if id == "webchat" || id.contains("web") {
            Channel::Web
        } else if id == "whatsapp" {
            Channel::WhatsApp
        } else {
            Channel::Other
        }
    }
}

/// Tagged response variant, serialized into the host's `content` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolResponse {
    Text { text: String },
    Image { media: PathBuf, caption: String },
}

impl ToolResponse {
    pub fn into_value(self) -> Value {
        match self {
            ToolResponse::Text { text } => json!({
                "content": [{"type": "text", "text": text}]
            }),
            ToolResponse::Image { media, caption } => json!({
                "content": [{"type": "image", "media": media.to_string_lossy(), "caption": caption}]
            }),
        }
    }
}

/// Abbreviate the home prefix to `~` for display. Segment-wise, like the
/// containment check: `/home/alice-backup` keeps its full spelling when
/// home is `/home/alice`.
pub fn friendly_path(path: &Path, home: Option<&Path>) -> String {
    if let Some(home) = home {
        if let Ok(rest) = path.strip_prefix(home) {
            return if rest.as_os_str().is_empty() {
                "~".to_string()
            } else {
                format!("~/{}", rest.display())
            };
        }
    }
    path.display().to_string()
}

pub struct GeneratedReport<'a> {
    pub input: &'a str,
    pub output_dir: &'a Path,
    pub friendly_dir: &'a str,
    pub file_name: &'a str,
    pub logo: Option<&'a str>,
    pub friendly_assets_dir: &'a str,
    /// Inline data-URI embed, present when the host asked for base64
    /// up-front instead of the offer line.
    pub inline_embed: Option<String>,
}

pub fn generated_markdown(report: &GeneratedReport<'_>) -> String {
    let mut text = format!(
        "## 📱 QR Code Generated Successfully!\n\n\
         ### 🔗 Content\n- **Content**: `{}`\n\n\
         ### 📁 File Location\n- **Saved to**: `{}`\n\n\
         ### 🎨 Quick Actions\n\
         - **Open Directory**: `open \"{}\"`\n\
         - **Copy Path**: `{}/{}`",
        report.input,
        report.friendly_dir,
        report.output_dir.display(),
        report.friendly_dir,
        report.file_name,
    );
    if let Some(logo) = report.logo {
        text.push_str(&format!(
            "\n\n### 🖼️ Logo Assets\n- **Your logo**: `{}`\n- **Assets directory**: `{}`",
            logo, report.friendly_assets_dir,
        ));
    }
    match &report.inline_embed {
        Some(embed) => {
            text.push_str("\n\n### 🖼️ Inline Preview\n");
            text.push_str(embed);
        }
        None => {
            text.push_str(
                "\n\n### ❓ Need Base64?\nReply with \"base64\" or \"yes\" to get the \
                 Base64 encoded version for web embedding.",
            );
        }
    }
    text
}

pub fn decoded_markdown(payloads: &[String], file_location: Option<(&str, &str)>) -> String {
    let mut text = String::from("## 🔍 QR Code Decoded Successfully!\n\n");
    for (index, payload) in payloads.iter().enumerate() {
        text.push_str(&format!("**Result {}:** {}\n", index + 1, payload));
    }
    if let Some((dir, file)) = file_location {
        text.push_str(&format!(
            "\n### 📁 File Location\n- **Saved to**: `{dir}`\n- **Copy Path**: `{dir}/{file}`"
        ));
    }
    text
}

/// Markdown image with the file embedded as a base64 data URI, for hosts
/// that render the result directly in a web view.
pub fn inline_embed(format: ImageFormat, bytes: &[u8]) -> String {
    use base64::Engine as _;
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("![QR Code](data:{};base64,{})", format.mime(), encoded)
}
