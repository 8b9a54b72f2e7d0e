//! Images become a single inline data-URI image so they can be forwarded to
//! multimodal models.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use markitup_probe::sniff;
use markitup_shared::{
    ConversionError, ConversionResult, ConverterConfig, DocumentConverter, MediaReference,
    ReadSeek, StreamInfo, read_all,
};

const IMAGE_MIMES: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];
const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".webp"];

pub struct ImageConverter {
    enabled: bool,
    keep_data_uris: bool,
}

impl ImageConverter {
    pub fn new(config: &ConverterConfig) -> Self {
        Self {
            enabled: config.image,
            keep_data_uris: config.keep_data_uris,
        }
    }
}

impl DocumentConverter for ImageConverter {
    fn name(&self) -> &str {
        "image"
    }

    fn accepts(&self, _input: &mut dyn ReadSeek, info: &StreamInfo) -> bool {
        self.enabled
            && (info.mime_starts_with(IMAGE_MIMES) || info.extension_in(IMAGE_EXTENSIONS))
    }

    fn convert(
        &self,
        input: &mut dyn ReadSeek,
        info: &StreamInfo,
    ) -> Result<ConversionResult, ConversionError> {
        if !self.enabled {
            return Err(ConversionError::missing_capability(self.name(), "image modality"));
        }
        let bytes = read_all(input).map_err(|e| ConversionError::io(self.name(), e))?;

        // Content wins over the label; a non-image payload is not ours.
        let mime = sniff(&bytes)
            .and_then(|s| s.essence())
            .filter(|m| IMAGE_MIMES.contains(&m.as_str()))
            .ok_or_else(|| {
                ConversionError::malformed(self.name(), "content is not a supported image")
            })?;

        let alt = alt_text(info);
        let source = format!("data:{mime};base64,{}", STANDARD.encode(&bytes));
        let markdown = if self.keep_data_uris {
            format!("![{alt}]({source})")
        } else {
            format!("![{alt}](data:{mime};base64...)")
        };

        Ok(ConversionResult::new(markdown).with_media(MediaReference {
            mime_type: mime,
            alt_text: alt,
            source,
        }))
    }
}

/// File stem of the declared name or path, else a generic label.
fn alt_text(info: &StreamInfo) -> String {
    info.filename
        .as_deref()
        .map(Path::new)
        .or(info.local_path.as_deref())
        .and_then(|p| p.file_stem())
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| "image".to_string())
}
