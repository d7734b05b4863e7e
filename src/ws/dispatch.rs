use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::{
    error::DispatchError,
    view::{Handled, Page},
};

use super::{MessageKind, ServerMessage};

/// Parses one text frame. The tag is checked before the payload is decoded so
/// that message types added on the server later are told apart from broken
/// payloads.
pub fn decode(raw: &str) -> Result<ServerMessage, DispatchError> {
    let value: Value = serde_json::from_str(raw).map_err(DispatchError::Json)?;
    let tag = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DispatchError::MissingType)?;
    let kind =
        MessageKind::from_tag(tag).ok_or_else(|| DispatchError::UnknownType(tag.to_owned()))?;
    serde_json::from_value(value).map_err(|source| DispatchError::Payload { kind, source })
}

/// Decodes `raw` and hands it to `page`. Nothing here is fatal: bad or
/// unexpected messages are logged and dropped. Returns the kind of message the
/// page applied, if any.
pub fn dispatch<P: Page + ?Sized>(raw: &str, page: &mut P, now: Instant) -> Option<MessageKind> {
    let message = match decode(raw) {
        Ok(message) => message,
        Err(e @ (DispatchError::UnknownType(_) | DispatchError::MissingType)) => {
            warn!(page = page.name(), "Ignoring message: {e}");
            return None;
        }
        Err(e) => {
            error!(page = page.name(), "Failed to parse message: {e}");
            return None;
        }
    };

    let kind = message.kind();
    debug!(page = page.name(), %kind, "Handling message");
    match page.handle(message, now) {
        Handled::Applied => Some(kind),
        Handled::NotForThisPage => {
            warn!(page = page.name(), "Unknown message type: {kind}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::view::ConnectionStatus;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<ServerMessage>,
    }

    impl Page for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn handle(&mut self, message: ServerMessage, _now: Instant) -> Handled {
            if message.kind() == MessageKind::Clear {
                return Handled::NotForThisPage;
            }
            self.seen.push(message);
            Handled::Applied
        }

        fn set_status(&mut self, _status: ConnectionStatus) {}

        fn next_deadline(&self) -> Option<Instant> {
            None
        }

        fn fire_timers(&mut self, _now: Instant) {}

        fn render(&self) -> String {
            String::new()
        }

        fn take_dirty(&mut self) -> bool {
            false
        }

        fn dispose(&mut self) {}
    }

    #[test]
    fn malformed_json_is_reported_as_json_error() {
        assert!(matches!(decode("{not json"), Err(DispatchError::Json(_))));
    }

    #[test]
    fn missing_or_unknown_tags_are_distinguished() {
        assert!(matches!(
            decode(r#"{"donation":{}}"#),
            Err(DispatchError::MissingType)
        ));
        assert!(matches!(
            decode(r#"{"type":"goal_progress","percent":40}"#),
            Err(DispatchError::UnknownType(tag)) if tag == "goal_progress"
        ));
    }

    #[test]
    fn bad_payload_names_the_kind() {
        let err = decode(r#"{"type":"new_donation","donation":{"amount":"x"}}"#).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Payload {
                kind: MessageKind::NewDonation,
                ..
            }
        ));
    }

    #[test]
    fn routes_messages_in_delivery_order() {
        let mut page = Recorder::default();
        let now = Instant::now();
        let frames = [
            r#"{"type":"show_image","image":"/media/1.png"}"#,
            "garbage",
            r#"{"type":"mystery"}"#,
            r#"{"type":"clear"}"#,
            r#"{"type":"show_image","image":"/media/2.png","duration":100}"#,
        ];
        let applied: Vec<_> = frames
            .iter()
            .map(|raw| dispatch(raw, &mut page, now))
            .collect();
        assert_eq!(
            applied,
            vec![
                Some(MessageKind::ShowImage),
                None,
                None,
                None,
                Some(MessageKind::ShowImage)
            ]
        );
        let images: Vec<_> = page
            .seen
            .iter()
            .map(|message| match message {
                ServerMessage::ShowImage(image) => image.image.as_str(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(images, ["/media/1.png", "/media/2.png"]);
    }
}
