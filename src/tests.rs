#[cfg(test)]
mod integration {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::path::Path;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::{
        config::{Auth, Config, Engine, Limits, Paths, Root, Server},
        engine::library::LibraryEngine,
        mcp::registry::ToolRegistry,
        security::RateLimiters,
        server::{build_router, AppState},
    };

    fn test_config(workspace: &Path) -> Config {
        Config {
            root: Root {
                workspace_dir: workspace.to_path_buf(),
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
                engine_timeout_s: 5,
                max_input_kb: 4,
                max_request_kb: 64,
                max_stderr_kb: 8,
            },
            paths: Paths::default(),
            engine: Engine::default(),
        }
    }

    fn test_app(cfg: Config) -> axum::Router {
        let registry = ToolRegistry::new(&cfg, Arc::new(LibraryEngine::new())).unwrap();
        build_router(AppState {
            cfg: Arc::new(cfg),
            registry: Arc::new(registry),
            rls: Arc::new(RateLimiters::new(100, 100, 100, 100)),
        })
    }

    fn call_request(params: Value, channel: &str) -> Request<Body> {
        let body = json!({"id": "req-1", "tool": "qr", "params": params, "channel": channel});
        Request::builder()
            .uri("/mcp/call")
            .method("POST")
            .header("Authorization", "Bearer t")
            .header("Origin", "https://good")
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn capabilities_lists_the_qr_tool() {
        let ws = tempfile::tempdir().unwrap();
        let app = test_app(test_config(ws.path()));
        let req = Request::builder()
            .uri("/mcp/capabilities")
            .method("GET")
            .header("Authorization", "Bearer t")
            .header("Origin", "https://good")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let caps = body_json(resp).await;
        assert_eq!(caps["tools"][0]["name"], "qr");
        assert_eq!(caps["engine"], "builtin-encoder");
    }

    #[tokio::test]
    async fn requests_without_bearer_are_rejected() {
        let ws = tempfile::tempdir().unwrap();
        let app = test_app(test_config(ws.path()));
        let req = Request::builder()
            .uri("/healthz")
            .method("GET")
            .header("Origin", "https://good")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn generate_on_web_channel_returns_markdown_and_writes_the_file() {
        let ws = tempfile::tempdir().unwrap();
        let app = test_app(test_config(ws.path()));
        let params = json!({"operation": "generate", "input": "https://example.com"});
        let resp = app.oneshot(call_request(params, "webchat")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        let entry = &body["result"]["content"][0];
        assert_eq!(entry["type"], "text");
        let text = entry["text"].as_str().unwrap();
        assert!(text.contains("Saved to"));
        assert!(text.contains("Need Base64?"));

        let out_dir = dunce::canonicalize(ws.path()).unwrap().join("qr-codes");
        let generated: Vec<_> = std::fs::read_dir(&out_dir).unwrap().collect();
        assert_eq!(generated.len(), 1);
    }

    #[tokio::test]
    async fn generate_on_messaging_channel_returns_inline_image() {
        let ws = tempfile::tempdir().unwrap();
        let app = test_app(test_config(ws.path()));
        let params = json!({"operation": "generate", "input": "hello"});
        let resp = app.oneshot(call_request(params, "telegram")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        let entry = &body["result"]["content"][0];
        assert_eq!(entry["type"], "image");
        let media = entry["media"].as_str().unwrap();
        assert!(Path::new(media).is_file());
        assert!(media.ends_with(".png"));
    }

    #[tokio::test]
    async fn whatsapp_coerces_svg_to_png() {
        let ws = tempfile::tempdir().unwrap();
        let app = test_app(test_config(ws.path()));
        let params = json!({
            "operation": "generate",
            "input": "hello",
            "options": {"format": "svg"},
        });
        let resp = app.oneshot(call_request(params, "whatsapp")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        let media = body["result"]["content"][0]["media"].as_str().unwrap();
        assert!(media.ends_with(".png"));
    }

    #[tokio::test]
    async fn auto_base64_embeds_the_image_inline() {
        let ws = tempfile::tempdir().unwrap();
        let mut cfg = test_config(ws.path());
        cfg.paths.auto_base64 = true;
        let app = test_app(cfg);
        let params = json!({"operation": "generate", "input": "hello"});
        let resp = app.oneshot(call_request(params, "webchat")).await.unwrap();
        let body = body_json(resp).await;
        let text = body["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("data:image/png;base64,"));
        assert!(!text.contains("Need Base64?"));
    }

    #[tokio::test]
    async fn escaping_logo_path_is_refused() {
        let ws = tempfile::tempdir().unwrap();
        let app = test_app(test_config(ws.path()));
        let params = json!({
            "operation": "generate",
            "input": "hello",
            "options": {"logo_path": "../../../../etc/passwd"},
        });
        let resp = app.oneshot(call_request(params, "webchat")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["code"], "PathEscape");
        assert!(body["error"]["hint"]
            .as_str()
            .unwrap()
            .contains("workspace"));
    }

    #[tokio::test]
    async fn decode_without_python_reports_engine_unavailable() {
        let ws = tempfile::tempdir().unwrap();
        let app = test_app(test_config(ws.path()));
        let params = json!({"operation": "decode", "input": "qr-codes/missing.png"});
        let resp = app.oneshot(call_request(params, "webchat")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["code"], "EngineUnavailable");
        assert!(body["error"]["hint"].as_str().unwrap().contains("pip install"));
    }

    #[tokio::test]
    async fn invalid_parameters_never_reach_the_filesystem() {
        let ws = tempfile::tempdir().unwrap();
        let app = test_app(test_config(ws.path()));
        let params = json!({
            "operation": "generate",
            "input": "hello",
            "options": {"size": 99},
        });
        let resp = app.oneshot(call_request(params, "webchat")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let out_dir = ws.path().join("qr-codes");
        assert!(!out_dir.exists());
    }
}
