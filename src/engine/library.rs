//! Built-in fallback encoder on the `qrcode` crate.
//!
//! Generation only: decode and beautify need the Python toolchain, and
//! the caller is told so instead of getting a degraded result.

use async_trait::async_trait;
use image::Luma;
use qrcode::render::svg;
use qrcode::QrCode;
use tracing::debug;

use super::{EngineOutput, ImageFormat, Operation, QrEngine, QrJob};
use crate::errors::AppError;

pub struct LibraryEngine;

impl LibraryEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LibraryEngine {
    fn default() -> Self {
        Self::new()
    }
}

// size multiplier maps to target pixels, capped at 1000 like the hosted tool
fn side_px(size: u32) -> u32 {
    size.clamp(1, 50) * 20
}

#[async_trait]
impl QrEngine for LibraryEngine {
    fn name(&self) -> &'static str {
        "builtin-encoder"
    }

    fn supports(&self, operation: Operation) -> bool {
        operation == Operation::Generate
    }

    async fn run(&self, job: &QrJob) -> Result<EngineOutput, AppError> {
        if job.operation != Operation::Generate {
            return Err(AppError::EngineUnavailable(
                job.operation.as_str().to_string(),
            ));
        }

        let code = QrCode::new(job.input.as_bytes())
            .map_err(|e| AppError::EngineFailed(format!("qr encoding failed: {e}")))?;
        let side = side_px(job.options.size);

        match job.options.format {
            ImageFormat::Svg => {
                let dark = job.options.color.as_deref().unwrap_or("#000000");
                let light = job.options.background_color.as_deref().unwrap_or("#ffffff");
                let rendered: String = code
                    .render()
                    .min_dimensions(side, side)
                    .dark_color(svg::Color(dark))
                    .light_color(svg::Color(light))
                    .build();
                std::fs::write(&job.output_path, rendered)
                    .map_err(|e| AppError::Internal(format!("writing svg: {e}")))?;
            }
            ImageFormat::Png | ImageFormat::Jpg | ImageFormat::Jpeg => {
                if job.options.color.is_some() || job.options.background_color.is_some() {
                    debug!("built-in encoder renders raster output monochrome");
                }
                let rendered = code
                    .render::<Luma<u8>>()
                    .min_dimensions(side, side)
                    .build();
                rendered
                    .save(&job.output_path)
                    .map_err(|e| AppError::Internal(format!("writing image: {e}")))?;
            }
        }

        Ok(EngineOutput::File {
            path: job.output_path.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::QrOptions;
    use std::path::PathBuf;

    fn job(format: ImageFormat, out: PathBuf) -> QrJob {
        QrJob {
            operation: Operation::Generate,
            input: "https://example.com".into(),
            options: QrOptions {
                format,
                ..QrOptions::default()
            },
            output_path: out,
        }
    }

    #[tokio::test]
    async fn generates_a_png_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("qr.png");
        let engine = LibraryEngine::new();
        let result = engine.run(&job(ImageFormat::Png, out.clone())).await.unwrap();
        match result {
            EngineOutput::File { path } => {
                assert_eq!(path, out);
                let bytes = std::fs::read(&out).unwrap();
                assert!(bytes.starts_with(b"\x89PNG"));
            }
            other => panic!("expected file output, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn generates_svg_with_requested_colors() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("qr.svg");
        let engine = LibraryEngine::new();
        let mut job = job(ImageFormat::Svg, out.clone());
        job.options.color = Some("#112233".into());
        engine.run(&job).await.unwrap();
        let svg = std::fs::read_to_string(&out).unwrap();
        assert!(svg.contains("#112233"));
    }

    #[tokio::test]
    async fn decode_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = LibraryEngine::new();
        let mut job = job(ImageFormat::Png, tmp.path().join("qr.png"));
        job.operation = Operation::Decode;
        let err = engine.run(&job).await.unwrap_err();
        assert!(matches!(err, AppError::EngineUnavailable(_)));
    }

    #[test]
    fn size_multiplier_is_clamped() {
        assert_eq!(side_px(0), 20);
        assert_eq!(side_px(10), 200);
        assert_eq!(side_px(50), 1000);
        assert_eq!(side_px(500), 1000);
    }
}
