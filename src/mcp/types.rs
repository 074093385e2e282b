use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct Capabilities {
    pub mcp_version: &'static str,
    pub tools: Vec<ToolInfo>,
    /// Name of the QR engine selected by the startup probe.
    pub engine: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub input_schema: serde_json::Value,
    pub output_schema: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorObj {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}
