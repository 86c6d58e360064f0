#![forbid(unsafe_code)]

//! JSON encoding of [`Envelope`]s with validation on decode.
//!
//! Decoding is strict: a datagram that is not valid JSON, carries another
//! protocol version, reports a coordination state that never travels
//! (`possible`), or holds non-finite numbers is rejected. Callers drop
//! rejected datagrams; nothing here is fatal.

use mural_core::GestureState;
use thiserror::Error;

use crate::message::{Envelope, PROTOCOL_VERSION, WireMessage};

/// Largest datagram accepted or produced.
pub const MAX_DATAGRAM: usize = 8 * 1024;

/// Errors from encoding or decoding a datagram.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported protocol version {0}")]
    Version(u16),
    #[error("gesture state {0:?} is not valid in a coordination message")]
    Gesture(GestureState),
    #[error("payload contains non-finite numbers")]
    NonFinite,
    #[error("datagram of {0} bytes exceeds the {MAX_DATAGRAM} byte limit")]
    TooLarge(usize),
}

/// Serialize an envelope to a datagram.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, WireError> {
    validate(envelope)?;
    let bytes = serde_json::to_vec(envelope)?;
    if bytes.len() > MAX_DATAGRAM {
        return Err(WireError::TooLarge(bytes.len()));
    }
    Ok(bytes)
}

/// Parse and validate a datagram.
pub fn decode(bytes: &[u8]) -> Result<Envelope, WireError> {
    if bytes.len() > MAX_DATAGRAM {
        return Err(WireError::TooLarge(bytes.len()));
    }
    let envelope: Envelope = serde_json::from_slice(bytes)?;
    validate(&envelope)?;
    Ok(envelope)
}

fn validate(envelope: &Envelope) -> Result<(), WireError> {
    if envelope.v != PROTOCOL_VERSION {
        return Err(WireError::Version(envelope.v));
    }
    match &envelope.message {
        WireMessage::Touch(touch) => {
            if !(touch.position.x.is_finite() && touch.position.y.is_finite()) {
                return Err(WireError::NonFinite);
            }
        }
        WireMessage::Coordination(coordination) => {
            if coordination.gesture == GestureState::Possible {
                return Err(WireError::Gesture(coordination.gesture));
            }
            if !coordination.payload.is_finite() {
                return Err(WireError::NonFinite);
            }
        }
        WireMessage::Sync(sync) => {
            if !sync.payload.is_finite() {
                return Err(WireError::NonFinite);
            }
        }
        WireMessage::Control(_) => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ControlMessage, CoordinationMessage, Payload, SyncMessage};
    use mural_core::{Rect, Vector, WindowId};
    use pretty_assertions::assert_eq;

    fn coordination(gesture: GestureState) -> Envelope {
        Envelope::new(
            7,
            WireMessage::Coordination(CoordinationMessage {
                source: WindowId(2),
                group: Some(WindowId(0)),
                gesture,
                payload: Payload::Delta {
                    delta: Vector::new(3.0, -4.0),
                },
                animated: false,
            }),
        )
    }

    #[test]
    fn coordination_json_shape() {
        let bytes = encode(&coordination(GestureState::Recognized)).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["v"], 1);
        assert_eq!(value["sender"], 7);
        assert_eq!(value["message"]["kind"], "coordination");
        assert_eq!(value["message"]["source"], 2);
        assert_eq!(value["message"]["group"], 0);
        assert_eq!(value["message"]["gesture"], "recognized");
        assert_eq!(value["message"]["payload"]["type"], "delta");
        assert_eq!(value["message"]["payload"]["delta"]["dx"], 3.0);
    }

    #[test]
    fn control_messages_decode_from_hand_written_json() {
        let unpair = br#"{"v":1,"sender":1,"message":{"kind":"control","op":"unpair","window":0}}"#;
        assert_eq!(
            decode(unpair).unwrap().message,
            WireMessage::Control(ControlMessage::Unpair {
                window: WindowId(0)
            })
        );
        let reset = br#"{"v":1,"sender":1,"message":{"kind":"control","op":"reset"}}"#;
        assert_eq!(
            decode(reset).unwrap().message,
            WireMessage::Control(ControlMessage::Reset)
        );
        let split = br#"{"v":1,"sender":1,"message":{"kind":"control","op":"split","window":3}}"#;
        assert_eq!(
            decode(split).unwrap().message,
            WireMessage::Control(ControlMessage::Split {
                window: WindowId(3),
                group: None
            })
        );
    }

    #[test]
    fn missing_group_means_ungrouped_source() {
        let json = concat!(
            r#"{"v":1,"sender":9,"message":{"kind":"coordination","source":4,"#,
            r#""gesture":"began","payload":{"type":"point","position":{"x":1.0,"y":2.0}}}}"#
        )
        .as_bytes();
        let envelope = decode(json).unwrap();
        let WireMessage::Coordination(c) = envelope.message else {
            panic!("coordination expected");
        };
        assert_eq!(c.group, None);
        assert_eq!(c.current_group(), WindowId(4));
        assert!(!c.animated);
    }

    #[test]
    fn rejects_possible_gesture() {
        let err = encode(&coordination(GestureState::Possible)).unwrap_err();
        assert!(matches!(err, WireError::Gesture(GestureState::Possible)));
    }

    #[test]
    fn rejects_other_versions_and_garbage() {
        let json = br#"{"v":2,"sender":1,"message":{"kind":"control","op":"reset"}}"#;
        assert!(matches!(decode(json), Err(WireError::Version(2))));
        assert!(matches!(decode(b"not json"), Err(WireError::Json(_))));
        let unknown = br#"{"v":1,"sender":1,"message":{"kind":"teleport"}}"#;
        assert!(matches!(decode(unknown), Err(WireError::Json(_))));
        assert!(matches!(
            decode(&vec![b' '; MAX_DATAGRAM + 1]),
            Err(WireError::TooLarge(_))
        ));
    }

    #[test]
    fn rejects_non_finite_payloads() {
        let envelope = Envelope::new(
            1,
            WireMessage::Sync(SyncMessage {
                source: WindowId(0),
                payload: Payload::Viewport {
                    rect: Rect::new(f64::INFINITY, 0.0, 1.0, 1.0),
                },
            }),
        );
        assert!(matches!(encode(&envelope), Err(WireError::NonFinite)));
    }
}
