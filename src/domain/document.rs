//! Value types for notes and their print options.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A note as submitted for rendering. Notes are ephemeral: the service never
/// persists them, only the PDFs derived from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub title: String,
    pub markdown_body: String,
}

impl Document {
    pub fn new(title: impl Into<String>, markdown_body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            markdown_body: markdown_body.into(),
        }
    }
}

/// Paper size passed through to the print engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageFormat {
    #[default]
    #[serde(alias = "a4")]
    A4,
    #[serde(alias = "a3")]
    A3,
    #[serde(alias = "letter")]
    Letter,
    #[serde(alias = "legal")]
    Legal,
}

impl PageFormat {
    /// Keyword accepted by the CSS `@page size` descriptor.
    pub fn css_size(self) -> &'static str {
        match self {
            PageFormat::A4 => "A4",
            PageFormat::A3 => "A3",
            PageFormat::Letter => "letter",
            PageFormat::Legal => "legal",
        }
    }
}

/// Page margins as CSS lengths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Margins {
    pub top: String,
    pub right: String,
    pub bottom: String,
    pub left: String,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: "1cm".to_string(),
            right: "1cm".to_string(),
            bottom: "1cm".to_string(),
            left: "1cm".to_string(),
        }
    }
}

/// Print options accepted alongside note content.
///
/// Unknown fields are collected into `extra` and participate in the cache
/// fingerprint, so two requests differing only in a passthrough option never
/// share a cached PDF. The map is ordered to keep serialization, and therefore
/// fingerprints, deterministic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    #[serde(rename = "format")]
    pub page_format: PageFormat,
    #[serde(rename = "margin")]
    pub margins: Margins,
    #[serde(rename = "customCss", skip_serializing_if = "Option::is_none")]
    pub custom_css: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}
