use serde::{Deserialize, Serialize};

use crate::protocol::segmenter::ResponseTimings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: MessageContent::Text(text.into()),
        }
    }

    /// User turn with an optional PNG screenshot ahead of the text.
    pub fn user(text: impl Into<String>, image_base64: Option<&str>) -> Self {
        let mut parts = Vec::with_capacity(2);
        if let Some(data) = image_base64.filter(|d| !d.is_empty()) {
            parts.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:image/png;base64,{data}"),
                },
            });
        }
        parts.push(ContentPart::Text { text: text.into() });
        Self {
            role: "user".into(),
            content: MessageContent::Parts(parts),
        }
    }

    pub fn has_image(&self) -> bool {
        matches!(&self.content, MessageContent::Parts(parts)
            if parts.iter().any(|p| matches!(p, ContentPart::ImageUrl { .. })))
    }

    /// Drops image parts, keeping the text.
    pub fn strip_images(&mut self) {
        if let MessageContent::Parts(parts) = &mut self.content {
            parts.retain(|p| matches!(p, ContentPart::Text { .. }));
        }
    }

    /// Concatenated text of the message, images ignored.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A model reply split into its thinking prefix and action suffix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub thinking: String,
    pub action: String,
    pub raw_content: String,
    /// Separate reasoning channel, for providers that expose one.
    pub reasoning: String,
    pub timings: ResponseTimings,
}

/// Per-call sampling settings resolved for a role.
#[derive(Debug, Clone, PartialEq)]
pub struct CallConfig {
    pub model: String,
    pub stream: bool,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    pub frequency_penalty: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    pub kind: StreamChunkKind,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamChunkKind {
    Reasoning,
    Content,
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_wire_shape() {
        let msg = ChatMessage::user("look", Some("QUJD"));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"][0]["type"], "image_url");
        assert_eq!(json["content"][0]["image_url"]["url"], "data:image/png;base64,QUJD");
        assert_eq!(json["content"][1]["type"], "text");
        assert_eq!(json["content"][1]["text"], "look");
    }

    #[test]
    fn stripping_images_keeps_text() {
        let mut msg = ChatMessage::user("screen info", Some("QUJD"));
        assert!(msg.has_image());
        msg.strip_images();
        assert!(!msg.has_image());
        assert_eq!(msg.text(), "screen info");
    }

    #[test]
    fn system_message_is_plain_string() {
        let json = serde_json::to_value(ChatMessage::system("rules")).unwrap();
        assert_eq!(json["content"], "rules");
    }
}
