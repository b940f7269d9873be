//! Render orchestration: validate, convert, consult the cache, print, store.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use metrics::histogram;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::cache::{Fingerprint, PdfStore};
use crate::domain::document::{Document, RenderOptions};
use crate::domain::error::DomainError;
use crate::infra::engine::{EngineError, PdfPrintOptions, RenderEngine};
use crate::markdown;

/// Title used for documents submitted without one.
const DEFAULT_DOCUMENT_TITLE: &str = "Research Document";

const BASE_STYLESHEET: &str = "\
body { font-family: Arial, Helvetica, sans-serif; line-height: 1.6; color: #1f2933; margin: 0; }
h1, h2, h3, h4, h5 { line-height: 1.25; margin: 1.2em 0 0.5em; }
h1 { font-size: 1.8em; }
h2 { font-size: 1.5em; }
h3 { font-size: 1.25em; }
p { margin: 0.6em 0; }
a { color: #1d4ed8; text-decoration: underline; }
ul, ol { margin: 0.6em 0; padding-left: 1.6em; }
li { margin: 0.25em 0; }
table { border-collapse: collapse; width: 100%; margin: 1em 0; }
th, td { border: 1px solid #d2d6dc; padding: 6px 10px; text-align: left; vertical-align: top; }
th { background: #f3f4f6; }
img { max-width: 100%; height: auto; }
hr { border: none; border-top: 1px solid #d2d6dc; margin: 1.5em 0; }";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("failed to fingerprint request: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// Everything that influences the rendered bytes goes under the hash. The
/// tag keeps the two entry points' key spaces disjoint.
#[derive(Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
enum FingerprintPayload<'a> {
    Markdown {
        content: &'a str,
        options: &'a RenderOptions,
    },
    Document {
        content: &'a str,
        title: &'a str,
        options: &'a RenderOptions,
    },
    Html {
        content: &'a str,
        title: &'a str,
    },
}

pub struct RenderedPdf {
    pub bytes: Bytes,
    pub from_cache: bool,
}

pub struct RenderService {
    engine: Arc<dyn RenderEngine>,
    store: Arc<PdfStore>,
}

impl RenderService {
    pub fn new(engine: Arc<dyn RenderEngine>, store: Arc<PdfStore>) -> Self {
        Self { engine, store }
    }

    /// Render a Markdown note, serving from the cache when the same content
    /// and options were rendered before.
    pub async fn render_markdown(
        &self,
        content: &str,
        options: &RenderOptions,
    ) -> Result<RenderedPdf, RenderError> {
        if content.trim().is_empty() {
            return Err(DomainError::validation("Content is required").into());
        }

        let key = Fingerprint::compute(&FingerprintPayload::Markdown { content, options })?;
        if let Some(bytes) = self.store.lookup(&key).await {
            return Ok(RenderedPdf {
                bytes,
                from_cache: true,
            });
        }

        let body = markdown::convert(content);
        let document = print_document(DEFAULT_DOCUMENT_TITLE, &body, options);
        let bytes = self
            .print_and_store(&key, &document, &print_options(options))
            .await?;
        Ok(RenderedPdf {
            bytes,
            from_cache: false,
        })
    }

    /// Render a titled Markdown document. Used by the one-shot export path.
    pub async fn render_document(
        &self,
        document: &Document,
        options: &RenderOptions,
    ) -> Result<RenderedPdf, RenderError> {
        if document.markdown_body.trim().is_empty() {
            return Err(DomainError::validation("Content is required").into());
        }
        if document.title.trim().is_empty() {
            return Err(DomainError::validation("Title is required").into());
        }

        let key = Fingerprint::compute(&FingerprintPayload::Document {
            content: &document.markdown_body,
            title: &document.title,
            options,
        })?;
        if let Some(bytes) = self.store.lookup(&key).await {
            return Ok(RenderedPdf {
                bytes,
                from_cache: true,
            });
        }

        let body = markdown::convert(&document.markdown_body);
        let printed = print_document(&document.title, &body, options);
        let bytes = self
            .print_and_store(&key, &printed, &print_options(options))
            .await?;
        Ok(RenderedPdf {
            bytes,
            from_cache: false,
        })
    }

    /// Render a pre-converted HTML body, for clients that ship their own
    /// preview markup.
    pub async fn render_html(&self, html: &str, title: &str) -> Result<RenderedPdf, RenderError> {
        if html.trim().is_empty() {
            return Err(DomainError::validation("HTML content is required").into());
        }
        if title.trim().is_empty() {
            return Err(DomainError::validation("Title is required").into());
        }

        let key = Fingerprint::compute(&FingerprintPayload::Html {
            content: html,
            title,
        })?;
        if let Some(bytes) = self.store.lookup(&key).await {
            return Ok(RenderedPdf {
                bytes,
                from_cache: true,
            });
        }

        let options = RenderOptions::default();
        let document = print_document(title, html, &options);
        let bytes = self
            .print_and_store(&key, &document, &print_options(&options))
            .await?;
        Ok(RenderedPdf {
            bytes,
            from_cache: false,
        })
    }

    async fn print_and_store(
        &self,
        key: &Fingerprint,
        document: &str,
        options: &PdfPrintOptions,
    ) -> Result<Bytes, RenderError> {
        let start = Instant::now();
        let bytes = self.engine.print_pdf(document, options).await?;
        let elapsed_ms = start.elapsed().as_millis();
        histogram!("notepress_render_duration_ms").record(elapsed_ms as f64);
        info!(
            target = "notepress::render",
            key = key.as_str(),
            size_bytes = bytes.len(),
            elapsed_ms = elapsed_ms as u64,
            "rendered PDF"
        );
        self.store.store(key, &bytes).await;
        Ok(bytes)
    }
}

fn print_options(options: &RenderOptions) -> PdfPrintOptions {
    PdfPrintOptions {
        page_format: options.page_format,
        margins: options.margins.clone(),
        print_background: true,
        prefer_css_page_size: true,
    }
}

fn print_document(title: &str, body: &str, options: &RenderOptions) -> String {
    let custom_css = options.custom_css.as_deref().unwrap_or("");
    let title = markdown::escape_attribute(title);
    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head>\n\
         <meta charset=\"utf-8\" />\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />\n\
         <title>{title}</title>\n\
         <style>\n{BASE_STYLESHEET}\n{custom_css}\n</style>\n\
         </head>\n\
         <body>\n{body}\n</body>\n\
         </html>"
    )
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::cache::CacheConfig;

    struct CountingEngine {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RenderEngine for CountingEngine {
        async fn print_pdf(
            &self,
            html: &str,
            _options: &PdfPrintOptions,
        ) -> Result<Bytes, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from(format!("%PDF-1.4 body-len={}", html.len())))
        }
    }

    fn service(dir: &std::path::Path) -> (RenderService, Arc<CountingEngine>) {
        let engine = Arc::new(CountingEngine {
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(
            PdfStore::new(&CacheConfig {
                directory: dir.to_path_buf(),
                ttl_seconds: 3600,
                max_entries: 100,
            })
            .expect("store"),
        );
        (RenderService::new(engine.clone(), store), engine)
    }

    #[tokio::test]
    async fn blank_content_is_rejected_before_rendering() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (service, engine) = service(dir.path());

        let result = service
            .render_markdown("   \n  ", &RenderOptions::default())
            .await;
        assert!(matches!(result, Err(RenderError::Domain(_))));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn identical_requests_hit_the_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (service, engine) = service(dir.path());
        let options = RenderOptions::default();

        let first = service
            .render_markdown("# note", &options)
            .await
            .expect("first render");
        let second = service
            .render_markdown("# note", &options)
            .await
            .expect("second render");

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(first.bytes, second.bytes);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn changed_options_render_fresh() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (service, engine) = service(dir.path());

        let a4: RenderOptions = serde_json::from_str("{}").expect("options");
        let a3: RenderOptions = serde_json::from_str(r#"{"format":"A3"}"#).expect("options");

        service.render_markdown("# note", &a4).await.expect("a4");
        service.render_markdown("# note", &a3).await.expect("a3");
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn markdown_and_html_modes_never_share_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (service, engine) = service(dir.path());

        service
            .render_markdown("same body", &RenderOptions::default())
            .await
            .expect("markdown render");
        service
            .render_html("same body", "Research Document")
            .await
            .expect("html render");
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn titled_documents_render_through_the_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (service, engine) = service(dir.path());
        let document = Document::new("Weekly Notes", "# agenda");

        let first = service
            .render_document(&document, &RenderOptions::default())
            .await
            .expect("first render");
        let second = service
            .render_document(&document, &RenderOptions::default())
            .await
            .expect("second render");

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn html_mode_requires_a_title() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (service, _engine) = service(dir.path());

        let result = service.render_html("<p>x</p>", " ").await;
        assert!(matches!(result, Err(RenderError::Domain(_))));
    }

    #[test]
    fn custom_css_lands_in_the_document_stylesheet() {
        let options = RenderOptions {
            custom_css: Some("p { color: red; }".to_string()),
            ..RenderOptions::default()
        };
        let document = print_document("t", "<p>x</p>", &options);
        assert!(document.contains("p { color: red; }"));
        assert!(document.contains(BASE_STYLESHEET));
    }
}
