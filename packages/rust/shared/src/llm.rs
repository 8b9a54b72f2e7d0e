//! Splitting a conversion result into LLM chat content parts.

use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use serde::Serialize;

use crate::types::ConversionResult;

/// One element of a multi-modal chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LlmContentPart {
    Text { text: String },
    Image { image_url: ImageUrl, alt_text: String },
    Media { mime_type: String, data: String },
}

/// `{"url": "data:..."}` wrapper expected by chat completion APIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

impl ConversionResult {
    /// Split the markdown into ordered text and inline-image parts.
    ///
    /// Only base64 data-URI images are lifted out; linked images stay in the
    /// text. Whitespace-only text between images is dropped. An attachment,
    /// if present, becomes a trailing `media` part.
    pub fn to_llm_parts(&self) -> Vec<LlmContentPart> {
        static DATA_URI_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"!\[([^\]]*)\]\(data:([^;)]+);base64,([^)]*)\)").expect("valid regex")
        });

        let md = &self.markdown;
        let mut parts = Vec::new();
        let mut last_end = 0;

        for caps in DATA_URI_IMAGE_RE.captures_iter(md) {
            let Some(whole) = caps.get(0) else { continue };
            push_text(&mut parts, &md[last_end..whole.start()]);
            parts.push(LlmContentPart::Image {
                image_url: ImageUrl {
                    url: format!("data:{};base64,{}", &caps[2], &caps[3]),
                },
                alt_text: caps[1].to_string(),
            });
            last_end = whole.end();
        }
        push_text(&mut parts, &md[last_end..]);

        if let Some(attachment) = &self.attachment {
            parts.push(LlmContentPart::Media {
                mime_type: attachment.mime_type.clone(),
                data: STANDARD.encode(&attachment.data),
            });
        }

        parts
    }
}

fn push_text(parts: &mut Vec<LlmContentPart>, chunk: &str) {
    let chunk = chunk.trim();
    if !chunk.is_empty() {
        parts.push(LlmContentPart::Text {
            text: chunk.to_string(),
        });
    }
}
