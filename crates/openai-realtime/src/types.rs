//! Event shapes for the realtime protocol.
//!
//! Outbound events are the `async-openai` realtime types. Inbound events are
//! kept as raw JSON with typed accessors for the handful of fields a client
//! acts on; the server emits many more event kinds than a text conversation
//! needs.

pub use async_openai::types::realtime::{
    ClientEvent, ConversationItemCreateEvent, Item, ItemContent, ItemContentType, ItemRole,
    ItemType, MaxResponseOutputTokens, ResponseCreateEvent, SessionResource, SessionUpdateEvent,
    Usage,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only output modality a text conversation asks for.
pub const TEXT_MODALITY: &str = "text";

/// The wire `type` of an outbound event.
pub fn event_type(event: &ClientEvent) -> &'static str {
    match event {
        ClientEvent::SessionUpdate(_) => "session.update",
        ClientEvent::InputAudioBufferAppend(_) => "input_audio_buffer.append",
        ClientEvent::InputAudioBufferCommit(_) => "input_audio_buffer.commit",
        ClientEvent::InputAudioBufferClear(_) => "input_audio_buffer.clear",
        ClientEvent::ConversationItemCreate(_) => "conversation.item.create",
        ClientEvent::ConversationItemTruncate(_) => "conversation.item.truncate",
        ClientEvent::ConversationItemDelete(_) => "conversation.item.delete",
        ClientEvent::ResponseCreate(_) => "response.create",
        ClientEvent::ResponseCancel(_) => "response.cancel",
    }
}

/// A user message carrying a single text part.
pub fn user_text_item(text: impl Into<String>) -> Item {
    Item {
        id: None,
        r#type: Some(ItemType::Message),
        status: None,
        role: Some(ItemRole::User),
        content: Some(vec![ItemContent {
            r#type: ItemContentType::InputText,
            text: Some(text.into()),
            audio: None,
            transcript: None,
        }]),
        call_id: None,
        name: None,
        arguments: None,
        output: None,
    }
}

/// The parts of a `response.done` event a client acts on.
#[derive(Debug, Clone)]
pub struct ResponseDone {
    pub response_id: Option<String>,
    pub status: Option<String>,
    /// Text of the first output item's content parts, concatenated.
    pub text: String,
    pub usage: Option<Usage>,
}

impl ResponseDone {
    pub fn is_failed(&self) -> bool {
        self.status.as_deref() == Some("failed")
    }
}

#[derive(Deserialize)]
struct ResponseResource {
    id: Option<String>,
    status: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
    usage: Option<Value>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Deserialize)]
struct OutputContent {
    text: Option<String>,
    transcript: Option<String>,
}

/// An event received from the server, kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerEvent(pub Value);

impl ServerEvent {
    pub fn event_type(&self) -> Option<&str> {
        self.0.get("type")?.as_str()
    }

    /// `response.status`, present on response lifecycle events.
    pub fn response_status(&self) -> Option<&str> {
        self.0.get("response")?.get("status")?.as_str()
    }

    pub fn is_response_failed(&self) -> bool {
        self.response_status() == Some("failed")
    }

    /// Details attached to a failed response, if any.
    pub fn status_details(&self) -> Option<&Value> {
        self.0.get("response")?.get("status_details")
    }

    /// Message of an `error` event.
    pub fn error_message(&self) -> Option<&str> {
        if self.event_type() != Some("error") {
            return None;
        }
        self.0.get("error")?.get("message")?.as_str()
    }

    /// Extracts the completed response from a `response.done` event.
    ///
    /// Returns `None` for any other event type. A malformed response body
    /// yields an empty text rather than an error.
    pub fn response_done(&self) -> Option<ResponseDone> {
        if self.event_type() != Some("response.done") {
            return None;
        }
        let resource = self
            .0
            .get("response")
            .cloned()
            .and_then(|r| serde_json::from_value::<ResponseResource>(r).ok());
        let Some(resource) = resource else {
            return Some(ResponseDone {
                response_id: None,
                status: None,
                text: String::new(),
                usage: None,
            });
        };

        let text = resource
            .output
            .first()
            .map(|item| {
                item.content
                    .iter()
                    .filter_map(|part| part.text.as_deref().or(part.transcript.as_deref()))
                    .collect::<String>()
            })
            .unwrap_or_default();

        Some(ResponseDone {
            response_id: resource.id,
            status: resource.status,
            text,
            usage: resource
                .usage
                .and_then(|usage| serde_json::from_value::<Usage>(usage).ok()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_text_item_wire_format() {
        let event = ClientEvent::ConversationItemCreate(ConversationItemCreateEvent {
            event_id: None,
            previous_item_id: None,
            item: user_text_item("Hello"),
        });
        assert_eq!(event_type(&event), "conversation.item.create");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "conversation.item.create",
                "item": {
                    "type": "message",
                    "role": "user",
                    "content": [{ "type": "input_text", "text": "Hello" }]
                }
            })
        );
    }

    #[test]
    fn test_event_type_matches_serialized_tag() {
        let events = [
            ClientEvent::SessionUpdate(SessionUpdateEvent::default()),
            ClientEvent::ResponseCreate(ResponseCreateEvent::default()),
        ];
        for event in &events {
            let value = serde_json::to_value(event).unwrap();
            assert_eq!(value["type"], event_type(event));
        }
    }

    #[test]
    fn test_response_done_extracts_text_and_usage() {
        let event = ServerEvent(json!({
            "type": "response.done",
            "event_id": "event_1",
            "response": {
                "id": "resp_1",
                "status": "completed",
                "output": [{
                    "type": "message",
                    "role": "assistant",
                    "content": [
                        { "type": "text", "text": "[{\"facialExpression\":\"Happy\"," },
                        { "type": "text", "text": "\"animation\":\"M_Dances_001\",\"text\":\"Hi\"}]" }
                    ]
                }],
                "usage": { "total_tokens": 30, "input_tokens": 20, "output_tokens": 10 }
            }
        }));

        let done = event.response_done().unwrap();
        assert_eq!(done.response_id.as_deref(), Some("resp_1"));
        assert!(!done.is_failed());
        assert_eq!(
            done.text,
            "[{\"facialExpression\":\"Happy\",\"animation\":\"M_Dances_001\",\"text\":\"Hi\"}]"
        );
        let usage = done.usage.unwrap();
        assert_eq!(usage.total_tokens, 30);
        assert_eq!(usage.output_tokens, 10);
    }

    #[test]
    fn test_failed_response_done() {
        let event = ServerEvent(json!({
            "type": "response.done",
            "response": {
                "status": "failed",
                "status_details": { "type": "failed", "error": { "code": "server_error" } },
                "output": []
            }
        }));
        assert!(event.is_response_failed());
        assert!(event.status_details().is_some());
        let done = event.response_done().unwrap();
        assert!(done.is_failed());
        assert_eq!(done.text, "");
    }

    #[test]
    fn test_other_events_are_not_completions() {
        let delta = ServerEvent(json!({ "type": "response.text.delta", "delta": "Hi" }));
        assert_eq!(delta.event_type(), Some("response.text.delta"));
        assert!(delta.response_done().is_none());
        assert!(!delta.is_response_failed());

        let error = ServerEvent(json!({
            "type": "error",
            "error": { "type": "invalid_request_error", "message": "Unknown parameter" }
        }));
        assert_eq!(error.error_message(), Some("Unknown parameter"));
    }

    #[test]
    fn test_partial_usage_does_not_lose_the_text() {
        let event = ServerEvent(json!({
            "type": "response.done",
            "response": {
                "status": "completed",
                "output": [{ "content": [{ "type": "text", "text": "[]" }] }],
                "usage": { "total_tokens": 3 }
            }
        }));
        let done = event.response_done().unwrap();
        assert_eq!(done.text, "[]");
        assert!(done.usage.is_none());
    }

    #[test]
    fn test_malformed_response_body_yields_empty_text() {
        let event = ServerEvent(json!({
            "type": "response.done",
            "response": { "output": "oops" }
        }));
        let done = event.response_done().unwrap();
        assert_eq!(done.text, "");
        assert_eq!(done.status, None);
    }
}
