pub mod stream;

use crate::bundle::{flatten_notes, Bundle};
use crate::errors::{JotError, JotResult};
use crate::models::{NewNote, Note, TagSet};
use crate::mutation::append;
use crate::settings::JotSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use self::stream::StreamDecoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionReply {
    Complete {
        content: String,
        usage: Option<TokenUsage>,
    },
    Streamed {
        fragments: Vec<String>,
    },
}

impl CompletionReply {
    pub fn text(&self) -> String {
        match self {
            Self::Complete { content, .. } => content.trim().to_string(),
            Self::Streamed { fragments } => fragments.concat().trim().to_string(),
        }
    }

    pub fn usage(&self) -> Option<&TokenUsage> {
        match self {
            Self::Complete { usage, .. } => usage.as_ref(),
            Self::Streamed { .. } => None,
        }
    }
}

#[derive(Deserialize)]
struct ResponseBody {
    choices: Vec<ResponseChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub trait CompletionTransport {
    fn send(&self, request: &CompletionRequest) -> JotResult<String>;
}

pub fn parse_reply(body: &str) -> JotResult<CompletionReply> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(JotError::EmptyInput("Completion response was empty".to_string()));
    }

    if let Ok(parsed) = serde_json::from_str::<ResponseBody>(trimmed) {
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| JotError::Internal("Completion response carried no message content".to_string()))?;
        return Ok(CompletionReply::Complete {
            content,
            usage: parsed.usage,
        });
    }

    let mut decoder = StreamDecoder::new();
    decoder.push(body);
    decoder.finish();
    let fragments = decoder.into_fragments();
    if !fragments.is_empty() {
        return Ok(CompletionReply::Streamed { fragments });
    }

    if trimmed.starts_with('{') || trimmed.starts_with("data:") {
        return Err(JotError::Internal("Unrecognized completion response".to_string()));
    }
    Ok(CompletionReply::Streamed {
        fragments: vec![trimmed.to_string()],
    })
}

pub fn complete(transport: &dyn CompletionTransport, request: &CompletionRequest) -> JotResult<CompletionReply> {
    tracing::debug!(model = %request.model, messages = request.messages.len(), "sending completion request");
    let body = transport.send(request)?;
    let reply = parse_reply(&body)?;
    if let Some(usage) = reply.usage() {
        tracing::info!(
            model = %request.model,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "completion received"
        );
    }
    Ok(reply)
}

pub fn build_request(settings: &JotSettings, context: &str, prompt: &str) -> JotResult<CompletionRequest> {
    if prompt.trim().is_empty() {
        return Err(JotError::EmptyInput("Prompt cannot be empty".to_string()));
    }

    let system = [settings.system_prompt.as_deref().unwrap_or_default().trim(), context.trim()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut messages = Vec::new();
    if !system.is_empty() {
        messages.push(ChatMessage::new(ChatRole::System, system));
    }
    messages.push(ChatMessage::new(ChatRole::User, prompt.trim()));

    Ok(CompletionRequest {
        model: settings.completion_model.clone(),
        messages,
        stream: false,
    })
}

pub fn request_from_bundle(settings: &JotSettings, bundle: &Bundle, prompt: &str) -> JotResult<CompletionRequest> {
    build_request(settings, &bundle.flatten(), prompt)
}

pub fn request_from_notes(settings: &JotSettings, notes: &[Note], prompt: &str) -> JotResult<CompletionRequest> {
    build_request(settings, &flatten_notes(notes), prompt)
}

pub fn persist_reply(
    log: &Path,
    settings: &JotSettings,
    reply: &CompletionReply,
    prompt: &str,
    directory: Option<&str>,
) -> JotResult<Note> {
    let tags: TagSet = [settings.completion_tag.as_str(), settings.completion_model.as_str()]
        .into_iter()
        .flat_map(str::split_whitespace)
        .collect();
    let context = prompt.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or_default();

    let mut draft = NewNote::new(reply.text()).tagged(tags).with_context(context);
    if let Some(directory) = directory {
        draft = draft.in_directory(directory);
    }
    append(log, draft)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Criterion, Query};
    use std::cell::RefCell;

    struct FakeTransport {
        body: String,
        seen: RefCell<Vec<CompletionRequest>>,
    }

    impl CompletionTransport for FakeTransport {
        fn send(&self, request: &CompletionRequest) -> JotResult<String> {
            self.seen.borrow_mut().push(request.clone());
            Ok(self.body.clone())
        }
    }

    #[test]
    fn request_serializes_to_chat_shape() {
        let settings = JotSettings {
            system_prompt: Some("Narrate.".to_string()),
            ..JotSettings::default()
        };
        let request = build_request(&settings, "Luna\n\nLuna grew up by the sea.", "Continue the story").expect("request");
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "model": settings.completion_model,
                "messages": [
                    {"role": "system", "content": "Narrate.\n\nLuna\n\nLuna grew up by the sea."},
                    {"role": "user", "content": "Continue the story"}
                ]
            })
        );
        assert!(build_request(&settings, "", "  ").is_err());
    }

    #[test]
    fn parses_single_object_reply_with_usage() {
        let reply = parse_reply(
            r#"{"choices":[{"message":{"role":"assistant","content":" Once upon a time. "}}],
                "usage":{"prompt_tokens":12,"completion_tokens":5,"total_tokens":17}}"#,
        )
        .expect("reply");
        assert_eq!(reply.text(), "Once upon a time.");
        assert_eq!(reply.usage().map(|usage| usage.total_tokens), Some(17));
    }

    #[test]
    fn parses_streamed_and_plain_replies() {
        let streamed = parse_reply(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Once \"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"more\"}}]}\n\ndata: [DONE]\n",
        )
        .expect("stream");
        assert!(matches!(streamed, CompletionReply::Streamed { ref fragments } if fragments.len() == 2));
        assert_eq!(streamed.text(), "Once more");

        assert_eq!(parse_reply("just text").expect("plain").text(), "just text");
        assert!(matches!(parse_reply(r#"{"choices":[]}"#), Err(JotError::Internal(_))));
        assert!(matches!(parse_reply("   "), Err(JotError::EmptyInput(_))));
    }

    #[test]
    fn completes_through_transport_and_persists_reply() {
        let root = tempfile::tempdir().expect("temp root");
        let log = root.path().join("notes.jot");
        append(&log, NewNote::new("Luna grew up by the sea.").in_directory("/story").at(1).tagged(TagSet::parse("luna")))
            .expect("seed");

        let settings = JotSettings::default();
        let bundle = Bundle::new(&log, ["luna"]).expect("bundle");
        let request = request_from_bundle(&settings, &bundle, "What next?\nBe brief.").expect("request");
        let transport = FakeTransport {
            body: r#"{"choices":[{"message":{"content":"She sails."}}]}"#.to_string(),
            seen: RefCell::new(Vec::new()),
        };

        let reply = complete(&transport, &request).expect("reply");
        assert_eq!(transport.seen.borrow().len(), 1);
        let saved = persist_reply(&log, &settings, &reply, "What next?\nBe brief.", Some("/story")).expect("persist");
        assert_eq!(saved.context, "What next?");
        assert!(saved.tags.contains("completion"));
        assert!(saved.tags.contains(&settings.completion_model));

        let traced = Query::single(Criterion::Tag("completion".to_string()))
            .run(&log)
            .expect("query")
            .collect::<JotResult<Vec<_>>>()
            .expect("read");
        assert_eq!(traced.len(), 1);
        assert_eq!(traced[0].message, "She sails.\n");
    }

    #[test]
    fn request_from_notes_uses_query_output() {
        let notes = vec![Note {
            directory: "/a".to_string(),
            timestamp: 1,
            tags: TagSet::new(),
            context: "ctx".to_string(),
            message: "body\n".to_string(),
        }];
        let request = request_from_notes(&JotSettings::default(), &notes, "summarize").expect("request");
        assert_eq!(request.messages[0], ChatMessage::new(ChatRole::System, "ctx\n\nbody"));
        assert_eq!(request.messages[1].role, ChatRole::User);
    }
}
