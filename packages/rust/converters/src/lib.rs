//! Built-in document converters.
//!
//! Each converter implements [`DocumentConverter`] and is independent of the
//! others; ordering and fallback are the registry's job.

mod audio;
mod delimited;
mod docx;
mod html;
mod image;
mod ooxml;
mod pdf;
mod plain_text;
mod pptx;
mod spreadsheet;
mod text;

use std::sync::Arc;

use markitup_shared::{ConverterConfig, DocumentConverter};

pub use audio::AudioConverter;
pub use delimited::CsvConverter;
pub use docx::DocxConverter;
pub use html::{HtmlConverter, html_to_markdown};
pub use image::ImageConverter;
pub use pdf::PdfConverter;
pub use plain_text::{CatchAllTextConverter, PlainTextConverter};
pub use pptx::PptxConverter;
pub use spreadsheet::{XlsConverter, XlsxConverter};

/// The default converter set, in registration order.
///
/// The catch-all converter is left out when `config.catch_all` is off.
pub fn builtin_converters(config: &ConverterConfig) -> Vec<Arc<dyn DocumentConverter>> {
    let mut converters: Vec<Arc<dyn DocumentConverter>> = vec![
        Arc::new(DocxConverter),
        Arc::new(PptxConverter),
        Arc::new(XlsxConverter),
        Arc::new(XlsConverter),
        Arc::new(PdfConverter),
        Arc::new(HtmlConverter::new(config)),
        Arc::new(CsvConverter),
        Arc::new(ImageConverter::new(config)),
        Arc::new(AudioConverter::new(config)),
        Arc::new(PlainTextConverter),
    ];
    if config.catch_all {
        converters.push(Arc::new(CatchAllTextConverter));
    }
    converters
}

#[cfg(test)]
mod tests {
    use super::*;
    use markitup_shared::Priority;

    #[test]
    fn default_set_is_complete() {
        let names: Vec<String> = builtin_converters(&ConverterConfig::default())
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(
            names,
            [
                "docx", "pptx", "xlsx", "xls", "pdf", "html", "csv", "image", "audio",
                "plain-text", "catch-all"
            ]
        );
    }

    #[test]
    fn catch_all_can_be_disabled() {
        let config = ConverterConfig {
            catch_all: false,
            ..ConverterConfig::default()
        };
        let converters = builtin_converters(&config);
        assert!(converters.iter().all(|c| c.priority() < Priority::CATCH_ALL));
    }
}
