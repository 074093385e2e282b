use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::engine::DynEngine;
use crate::errors::AppError;
use crate::response::Channel;

pub type DynTool = Arc<dyn Tool + Send + Sync + 'static>;

/// Per-call context the host supplies alongside the parameters: which
/// chat channel the result will render in, and the request id for audit
/// correlation.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub channel: Channel,
    pub request_id: String,
}

#[derive(Clone)]
pub struct ToolRegistry {
    tools: Vec<(String, DynTool)>,
    engine_name: &'static str,
}

impl ToolRegistry {
    pub fn new(cfg: &Config, engine: DynEngine) -> anyhow::Result<Self> {
        use crate::tools::qr::QrTool;
        let engine_name = engine.name();
        let tools: Vec<(String, DynTool)> =
            vec![("qr".to_string(), Arc::new(QrTool::new(cfg, engine)?))];
        Ok(Self { tools, engine_name })
    }

    pub fn get(&self, name: &str) -> Option<DynTool> {
        self.tools
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t.clone())
    }

    pub fn list_names(&self) -> Vec<String> {
        self.tools.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine_name
    }
}

#[derive(Debug, Deserialize)]
pub struct CallRequest {
    pub id: String,
    pub tool: String,
    #[serde(default)]
    pub params: serde_json::Value,
    /// Chat channel identifier, e.g. "webchat" or "whatsapp". Absent means
    /// an unknown messaging channel.
    #[serde(default)]
    pub channel: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CallResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<super::types::ErrorObj>,
}

#[async_trait]
pub trait Tool {
    fn name(&self) -> &'static str;
    fn capabilities(&self) -> serde_json::Value;
    async fn call(
        &self,
        ctx: &CallContext,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, AppError>;
}
