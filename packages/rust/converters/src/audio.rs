//! Audio is not transcribed; the raw bytes ride along as an attachment for
//! models that accept audio input.

use markitup_probe::mime_for_extension;
use markitup_shared::{
    ConversionError, ConversionResult, ConverterConfig, DocumentConverter, MediaAttachment,
    ReadSeek, StreamInfo, read_all,
};

const AUDIO_EXTENSIONS: &[&str] = &[".mp3", ".wav", ".m4a", ".flac", ".ogg", ".opus", ".aac"];

pub struct AudioConverter {
    enabled: bool,
}

impl AudioConverter {
    pub fn new(config: &ConverterConfig) -> Self {
        Self {
            enabled: config.audio,
        }
    }
}

impl DocumentConverter for AudioConverter {
    fn name(&self) -> &str {
        "audio"
    }

    fn accepts(&self, _input: &mut dyn ReadSeek, info: &StreamInfo) -> bool {
        self.enabled && (info.mime_starts_with(&["audio/"]) || info.extension_in(AUDIO_EXTENSIONS))
    }

    fn convert(
        &self,
        input: &mut dyn ReadSeek,
        info: &StreamInfo,
    ) -> Result<ConversionResult, ConversionError> {
        if !self.enabled {
            return Err(ConversionError::missing_capability(self.name(), "audio modality"));
        }
        let data = read_all(input).map_err(|e| ConversionError::io(self.name(), e))?;
        if data.is_empty() {
            return Err(ConversionError::malformed(self.name(), "empty audio stream"));
        }

        let mime_type = info
            .essence()
            .filter(|m| m.starts_with("audio/"))
            .or_else(|| {
                info.extension
                    .as_deref()
                    .and_then(mime_for_extension)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());

        Ok(ConversionResult::new(String::new()).with_attachment(MediaAttachment { mime_type, data }))
    }
}
