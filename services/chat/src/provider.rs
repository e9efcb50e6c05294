//! Maps generic session and turn descriptions onto the OpenAI realtime wire
//! format, and sorts inbound server events into what the orchestrator
//! reacts to.

use avatar_core::generic_types::{GenericSessionConfig, GenericTurn};
use openai_realtime::{
    ClientEvent, ServerEvent,
    types::{
        ConversationItemCreateEvent, MaxResponseOutputTokens, ResponseCreateEvent, ResponseDone,
        SessionResource, SessionUpdateEvent, TEXT_MODALITY, user_text_item,
    },
};
use serde_json::Value;

fn text_only() -> Option<Vec<String>> {
    Some(vec![TEXT_MODALITY.to_string()])
}

/// The one-time `session.update` event.
pub fn session_update(config: &GenericSessionConfig) -> ClientEvent {
    ClientEvent::SessionUpdate(SessionUpdateEvent {
        event_id: None,
        session: SessionResource {
            instructions: Some(config.instructions.clone()),
            temperature: Some(config.temperature as f32),
            modalities: text_only(),
            max_response_output_tokens: Some(MaxResponseOutputTokens::Inf),
            ..Default::default()
        },
    })
}

/// The content message and response trigger for one turn, in send order.
pub fn turn_events(turn: &GenericTurn) -> [ClientEvent; 2] {
    [
        ClientEvent::ConversationItemCreate(ConversationItemCreateEvent {
            event_id: None,
            previous_item_id: None,
            item: user_text_item(turn.content.clone()),
        }),
        ClientEvent::ResponseCreate(ResponseCreateEvent {
            event_id: None,
            response: Some(SessionResource {
                modalities: text_only(),
                instructions: turn.instructions.clone(),
                ..Default::default()
            }),
        }),
    ]
}

/// What an inbound event means to the conversation loop.
#[derive(Debug, Clone)]
pub enum Inbound {
    /// The response for the outstanding turn is complete.
    Completed(ResponseDone),
    /// The server reported a failed response status. Not terminal on its own.
    ResponseFailed(Option<Value>),
    /// An `error` event.
    Error(String),
    /// Anything else (deltas, acknowledgements, rate limits).
    Other(String),
}

pub fn classify(event: &ServerEvent) -> Inbound {
    if let Some(done) = event.response_done() {
        return Inbound::Completed(done);
    }
    if event.is_response_failed() {
        return Inbound::ResponseFailed(event.status_details().cloned());
    }
    if let Some(message) = event.error_message() {
        return Inbound::Error(message.to_string());
    }
    Inbound::Other(event.event_type().unwrap_or("<untyped>").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use openai_realtime::types::event_type;
    use serde_json::json;

    #[test]
    fn test_session_update_is_text_only_and_unbounded() {
        let config = GenericSessionConfig {
            instructions: "Be kind.".to_string(),
            temperature: 0.8,
        };
        let value = serde_json::to_value(session_update(&config)).unwrap();
        assert_eq!(value["type"], "session.update");
        assert_eq!(value["session"]["modalities"], json!(["text"]));
        assert_eq!(value["session"]["max_response_output_tokens"], "inf");
        assert_eq!(value["session"]["instructions"], "Be kind.");
        let temperature = value["session"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.8).abs() < 1e-6);
        assert!(value["session"].get("voice").is_none());
    }

    #[test]
    fn test_turn_events_are_content_then_trigger() {
        let turn = GenericTurn {
            content: "Hello".to_string(),
            instructions: Some("override".to_string()),
        };
        let [content, trigger] = turn_events(&turn);
        assert_eq!(event_type(&content), "conversation.item.create");
        assert_eq!(event_type(&trigger), "response.create");

        let content = serde_json::to_value(content).unwrap();
        assert_eq!(content["item"]["role"], "user");
        assert_eq!(content["item"]["content"][0]["type"], "input_text");
        assert_eq!(content["item"]["content"][0]["text"], "Hello");

        let trigger = serde_json::to_value(trigger).unwrap();
        assert_eq!(trigger["response"]["instructions"], "override");
        assert_eq!(trigger["response"]["modalities"], json!(["text"]));
    }

    #[test]
    fn test_classify() {
        let done = ServerEvent(json!({
            "type": "response.done",
            "response": { "status": "completed", "output": [] }
        }));
        assert!(matches!(classify(&done), Inbound::Completed(_)));

        let failed_done = ServerEvent(json!({
            "type": "response.done",
            "response": { "status": "failed", "output": [] }
        }));
        match classify(&failed_done) {
            Inbound::Completed(d) => assert!(d.is_failed()),
            other => panic!("expected completion, got {other:?}"),
        }

        let failed = ServerEvent(json!({
            "type": "response.created",
            "response": { "status": "failed", "status_details": { "reason": "x" } }
        }));
        match classify(&failed) {
            Inbound::ResponseFailed(details) => assert_eq!(details, Some(json!({ "reason": "x" }))),
            other => panic!("expected failed status, got {other:?}"),
        }

        let error = ServerEvent(json!({ "type": "error", "error": { "message": "bad" } }));
        assert!(matches!(classify(&error), Inbound::Error(m) if m == "bad"));

        let delta = ServerEvent(json!({ "type": "response.text.delta" }));
        assert!(matches!(classify(&delta), Inbound::Other(t) if t == "response.text.delta"));
    }
}
