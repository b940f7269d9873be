//! Render engine boundary.
//!
//! The engine is consumed as an opaque capability: hand it a complete HTML
//! document and print options, get PDF bytes back. The production
//! implementation drives a headless Chromium binary spawned per request.

use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

use crate::domain::document::{Margins, PageFormat};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("render engine failed to start: {0}")]
    Spawn(#[source] io::Error),
    #[error("render engine timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
    #[error("render engine exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
    #[error("render engine produced no output")]
    EmptyOutput,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Geometry and fidelity options forwarded to the print engine.
#[derive(Debug, Clone)]
pub struct PdfPrintOptions {
    pub page_format: PageFormat,
    pub margins: Margins,
    pub print_background: bool,
    pub prefer_css_page_size: bool,
}

impl Default for PdfPrintOptions {
    fn default() -> Self {
        Self {
            page_format: PageFormat::default(),
            margins: Margins::default(),
            print_background: true,
            prefer_css_page_size: true,
        }
    }
}

#[async_trait]
pub trait RenderEngine: Send + Sync {
    async fn print_pdf(&self, html: &str, options: &PdfPrintOptions)
    -> Result<Bytes, EngineError>;
}

/// Prints through a headless Chromium child process.
///
/// One child per request: spawned, waited, and reaped before returning on
/// every path, including timeout. Scratch files live in a per-request temp
/// directory that is removed when the request finishes. Page geometry is
/// injected as an `@page` rule since Chromium honors CSS page size when
/// printing.
pub struct ChromiumEngine {
    binary: PathBuf,
    load_timeout: Duration,
}

impl ChromiumEngine {
    pub fn new(binary: PathBuf, load_timeout: Duration) -> Self {
        Self {
            binary,
            load_timeout,
        }
    }
}

#[async_trait]
impl RenderEngine for ChromiumEngine {
    async fn print_pdf(
        &self,
        html: &str,
        options: &PdfPrintOptions,
    ) -> Result<Bytes, EngineError> {
        let scratch = tempfile::tempdir()?;
        let input = scratch.path().join("input.html");
        let output = scratch.path().join("output.pdf");

        let page = if options.prefer_css_page_size {
            inject_page_geometry(html, options)
        } else {
            html.to_string()
        };
        tokio::fs::write(&input, page).await?;

        let mut command = Command::new(&self.binary);
        command
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-first-run")
            .arg("--no-pdf-header-footer")
            .arg(format!("--print-to-pdf={}", output.display()))
            .arg(format!("file://{}", input.display()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(EngineError::Spawn)?;
        let mut stderr_pipe = child.stderr.take();

        let waited = tokio::time::timeout(self.load_timeout, async {
            let mut stderr = Vec::new();
            if let Some(pipe) = stderr_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut stderr).await;
            }
            let status = child.wait().await;
            (status, stderr)
        })
        .await;

        let (status, stderr) = match waited {
            Ok((status, stderr)) => (status?, stderr),
            Err(_) => {
                let _ = child.kill().await;
                let _ = child.wait().await;
                return Err(EngineError::Timeout {
                    timeout_secs: self.load_timeout.as_secs(),
                });
            }
        };

        if !status.success() {
            return Err(EngineError::Failed {
                status,
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        let bytes = tokio::fs::read(&output).await?;
        if bytes.is_empty() {
            return Err(EngineError::EmptyOutput);
        }
        debug!(
            target = "notepress::engine",
            size_bytes = bytes.len(),
            "chromium print completed"
        );
        Ok(Bytes::from(bytes))
    }
}

fn inject_page_geometry(html: &str, options: &PdfPrintOptions) -> String {
    let mut rules = format!(
        "@page {{ size: {}; margin: {} {} {} {}; }}",
        options.page_format.css_size(),
        options.margins.top,
        options.margins.right,
        options.margins.bottom,
        options.margins.left,
    );
    if options.print_background {
        rules.push_str(
            " body { -webkit-print-color-adjust: exact; print-color-adjust: exact; }",
        );
    }
    let style = format!("<style>{rules}</style>");

    match html.find("</head>") {
        Some(at) => {
            let mut page = html.to_string();
            page.insert_str(at, &style);
            page
        }
        None => format!("{style}{html}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_lands_inside_the_head() {
        let options = PdfPrintOptions::default();
        let page = inject_page_geometry("<html><head><title>t</title></head><body></body></html>", &options);
        let style_at = page.find("<style>").expect("style tag");
        let head_close = page.find("</head>").expect("head close");
        assert!(style_at < head_close);
        assert!(page.contains("@page { size: A4; margin: 1cm 1cm 1cm 1cm; }"));
    }

    #[test]
    fn geometry_prepends_when_there_is_no_head() {
        let options = PdfPrintOptions {
            page_format: PageFormat::Letter,
            ..PdfPrintOptions::default()
        };
        let page = inject_page_geometry("<p>bare</p>", &options);
        assert!(page.starts_with("<style>@page { size: letter;"));
        assert!(page.ends_with("<p>bare</p>"));
    }

    #[test]
    fn background_printing_is_opt_out() {
        let options = PdfPrintOptions {
            print_background: false,
            ..PdfPrintOptions::default()
        };
        let page = inject_page_geometry("<p>x</p>", &options);
        assert!(!page.contains("print-color-adjust"));
    }
}
