use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// ========  PEER TRANSPORT ALPHABET  =========
///
/// Текстовый протокол поверх data channel: фиксированный префикс типа,
/// затем полезная нагрузка через запятую.

pub const NICKNAME_PREFIX: &str = "/nick:";
pub const MOUSE_MOVE_PREFIX: &str = "/move:";
pub const PANNING_PREFIX: &str = "/pan:";
pub const DRAWING_PREFIX: &str = "/draw:";

/// Одна точка штриха + пан-система координат отправителя в момент отправки
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeEvent {
    pub x: f64,
    pub y: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

/// Инкрементальный сдвиг камеры; получатель аккумулирует
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanEvent {
    pub dx: f64,
    pub dy: f64,
}

/// Единица обмена по peer-транспорту
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Nickname(String),
    MouseMove { x: f64, y: f64 },
    Panning(PanEvent),
    Drawing(StrokeEvent),
}

/// Кодирует envelope в строку протокола
pub fn encode(envelope: &Envelope) -> String {
    match envelope {
        Envelope::Nickname(nick) => format!("{NICKNAME_PREFIX}{nick}"),
        Envelope::MouseMove { x, y } => format!("{MOUSE_MOVE_PREFIX}{x},{y}"),
        Envelope::Panning(pan) => format!("{PANNING_PREFIX}{},{}", pan.dx, pan.dy),
        Envelope::Drawing(stroke) => format!(
            "{DRAWING_PREFIX}{},{},{},{}",
            stroke.x, stroke.y, stroke.pan_x, stroke.pan_y
        ),
    }
}

/// Разбирает строку протокола; неизвестный префикс и битая нагрузка —
/// разные ошибки
pub fn decode(raw: &str) -> Result<Envelope, SyncError> {
    if let Some(rest) = raw.strip_prefix(NICKNAME_PREFIX) {
        return Ok(Envelope::Nickname(rest.to_string()));
    }
    if let Some(rest) = raw.strip_prefix(MOUSE_MOVE_PREFIX) {
        let (x, y) = parse_pair(rest)?;
        return Ok(Envelope::MouseMove { x, y });
    }
    if let Some(rest) = raw.strip_prefix(PANNING_PREFIX) {
        let (dx, dy) = parse_pair(rest)?;
        return Ok(Envelope::Panning(PanEvent { dx, dy }));
    }
    if let Some(rest) = raw.strip_prefix(DRAWING_PREFIX) {
        let (x, y, pan_x, pan_y) = parse_quad(rest)?;
        return Ok(Envelope::Drawing(StrokeEvent { x, y, pan_x, pan_y }));
    }

    let head: String = raw.chars().take(16).collect();
    Err(SyncError::UnknownEventType(head))
}

fn parse_number(part: &str) -> Result<f64, SyncError> {
    part.trim()
        .parse()
        .map_err(|_| SyncError::MalformedEnvelope(format!("bad number: {part}")))
}

fn parse_pair(payload: &str) -> Result<(f64, f64), SyncError> {
    match payload.split(',').collect::<Vec<_>>().as_slice() {
        [a, b] => Ok((parse_number(a)?, parse_number(b)?)),
        parts => Err(SyncError::MalformedEnvelope(format!(
            "expected 2 fields, got {}",
            parts.len()
        ))),
    }
}

fn parse_quad(payload: &str) -> Result<(f64, f64, f64, f64), SyncError> {
    match payload.split(',').collect::<Vec<_>>().as_slice() {
        [a, b, c, d] => Ok((
            parse_number(a)?,
            parse_number(b)?,
            parse_number(c)?,
            parse_number(d)?,
        )),
        parts => Err(SyncError::MalformedEnvelope(format!(
            "expected 4 fields, got {}",
            parts.len()
        ))),
    }
}

/// ========  CONTROL CHANNEL ALPHABET  =========
///
/// JSON по WebSocket к rendezvous-сервису. Никогда не смешивается
/// с peer-транспортом.

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SignalEvent {
    Offer,
    Answer,
    Candidate,
}

/// Сообщение rendezvous-канала; `data` — сериализованный SDP или кандидат
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SignalMessage {
    pub event: SignalEvent,
    pub data: String,
}

/// ICE кандидат в том виде, в котором он ходит по control-каналу.
/// Имена полей — как у браузерного RTCIceCandidateInit.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IceCandidatePayload {
    pub candidate: String,
    #[serde(rename = "sdpMid")]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nickname_round_trip() {
        let env = Envelope::Nickname("alice".into());
        let wire = encode(&env);
        assert_eq!(wire, "/nick:alice");
        assert_eq!(decode(&wire).unwrap(), env);
    }

    #[test]
    fn mouse_move_round_trip() {
        let env = Envelope::MouseMove { x: 12.5, y: -3.0 };
        let wire = encode(&env);
        assert_eq!(wire, "/move:12.5,-3");
        assert_eq!(decode(&wire).unwrap(), env);
    }

    #[test]
    fn panning_round_trip() {
        let env = Envelope::Panning(PanEvent { dx: 20.0, dy: -10.0 });
        assert_eq!(decode(&encode(&env)).unwrap(), env);
    }

    #[test]
    fn drawing_round_trip() {
        let env = Envelope::Drawing(StrokeEvent {
            x: 0.25,
            y: 0.75,
            pan_x: 1.0,
            pan_y: -2.0,
        });
        let wire = encode(&env);
        assert_eq!(wire, "/draw:0.25,0.75,1,-2");
        assert_eq!(decode(&wire).unwrap(), env);
    }

    #[test]
    fn unknown_prefix_is_rejected() {
        match decode("/erase:1,2") {
            Err(SyncError::UnknownEventType(head)) => assert!(head.starts_with("/erase:")),
            other => panic!("expected UnknownEventType, got {other:?}"),
        }
    }

    #[test]
    fn json_shape_is_rejected() {
        let raw = r#"{"type":"/draw:","data":{"x":1,"y":2}}"#;
        assert!(matches!(decode(raw), Err(SyncError::UnknownEventType(_))));
    }

    #[test]
    fn wrong_arity_is_malformed() {
        assert!(matches!(
            decode("/draw:1,2,3"),
            Err(SyncError::MalformedEnvelope(_))
        ));
        assert!(matches!(
            decode("/pan:1"),
            Err(SyncError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn non_numeric_payload_is_malformed() {
        assert!(matches!(
            decode("/move:abc,def"),
            Err(SyncError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn empty_nickname_still_decodes() {
        assert_eq!(decode("/nick:").unwrap(), Envelope::Nickname(String::new()));
    }

    #[test]
    fn signal_message_json_shape() {
        let msg = SignalMessage {
            event: SignalEvent::Offer,
            data: "sdp-blob".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"event":"offer","data":"sdp-blob"}"#);

        let parsed: SignalMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.event, SignalEvent::Offer);
        assert_eq!(parsed.data, "sdp-blob");
    }

    #[test]
    fn candidate_payload_uses_browser_field_names() {
        let payload = IceCandidatePayload {
            candidate: "candidate:1 1 udp 2130706431 192.0.2.1 54400 typ host".into(),
            sdp_mid: Some("0".into()),
            sdp_mline_index: Some(0),
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"sdpMid\":\"0\""));
        assert!(json.contains("\"sdpMLineIndex\":0"));
    }
}
