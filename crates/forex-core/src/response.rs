//! Structured agent responses and the caller-facing stream events they map to

use serde::{Deserialize, Serialize};

/// Sent in place of a structured response the loop failed to produce
pub const FALLBACK_MESSAGE: &str =
    "We are unable to process your request at the moment. Please try again.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    #[default]
    InputRequired,
    Completed,
    Error,
}

/// Final status + message the model reports once per turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFormat {
    #[serde(default)]
    pub status: ResponseStatus,
    pub message: String,
}

impl ResponseFormat {
    pub fn new(status: ResponseStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// One step of a streamed agent turn.
///
/// `Working` is intermediate; `InputRequired` and `Completed` are terminal and
/// exactly one of them ends every successful turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Working(String),
    InputRequired(String),
    Completed(String),
}

impl StreamEvent {
    pub fn is_task_complete(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn require_user_input(&self) -> bool {
        matches!(self, Self::InputRequired(_))
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Working(_))
    }

    pub fn content(&self) -> &str {
        match self {
            Self::Working(c) | Self::InputRequired(c) | Self::Completed(c) => c,
        }
    }
}

impl Serialize for StreamEvent {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut s = serializer.serialize_struct("StreamEvent", 3)?;
        s.serialize_field("is_task_complete", &self.is_task_complete())?;
        s.serialize_field("require_user_input", &self.require_user_input())?;
        s.serialize_field("content", self.content())?;
        s.end()
    }
}

/// Map the turn's structured response onto the terminal stream event
pub fn agent_response(structured: Option<&ResponseFormat>) -> StreamEvent {
    let Some(response) = structured else {
        return StreamEvent::InputRequired(FALLBACK_MESSAGE.to_string());
    };

    match response.status {
        ResponseStatus::InputRequired | ResponseStatus::Error => {
            StreamEvent::InputRequired(response.message.clone())
        }
        ResponseStatus::Completed => StreamEvent::Completed(response.message.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_maps_to_task_complete() {
        let resp = ResponseFormat::new(ResponseStatus::Completed, "1 USD is 0.9 EUR");
        let event = agent_response(Some(&resp));
        assert!(event.is_task_complete());
        assert!(!event.require_user_input());
        assert_eq!(event.content(), "1 USD is 0.9 EUR");
    }

    #[test]
    fn test_input_required_and_error_require_input() {
        for status in [ResponseStatus::InputRequired, ResponseStatus::Error] {
            let resp = ResponseFormat::new(status, "which currency?");
            let event = agent_response(Some(&resp));
            assert!(event.require_user_input());
            assert!(!event.is_task_complete());
            assert_eq!(event.content(), "which currency?");
        }
    }

    #[test]
    fn test_absent_response_uses_fallback() {
        let event = agent_response(None);
        assert!(event.require_user_input());
        assert_eq!(event.content(), FALLBACK_MESSAGE);
    }

    #[test]
    fn test_terminal_flags_never_both() {
        let events = [
            StreamEvent::Working("a".into()),
            StreamEvent::InputRequired("b".into()),
            StreamEvent::Completed("c".into()),
        ];
        for event in &events {
            assert!(!(event.is_task_complete() && event.require_user_input()));
            assert_eq!(
                event.is_terminal(),
                event.is_task_complete() || event.require_user_input()
            );
        }
    }

    #[test]
    fn test_status_defaults_to_input_required() {
        let parsed: ResponseFormat = serde_json::from_str(r#"{"message":"more info"}"#).unwrap();
        assert_eq!(parsed.status, ResponseStatus::InputRequired);
    }

    #[test]
    fn test_unknown_status_rejected() {
        let parsed = serde_json::from_str::<ResponseFormat>(r#"{"status":"done","message":"x"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_stream_event_serialization() {
        let json = serde_json::to_value(StreamEvent::Completed("ok".into())).unwrap();
        assert_eq!(json["is_task_complete"], true);
        assert_eq!(json["require_user_input"], false);
        assert_eq!(json["content"], "ok");
    }
}
