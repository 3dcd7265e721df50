//! Aeusserer Wire-Frame `{type, payload}`
//!
//! `payload` ist ein separat serialisierter `Envelope` (als JSON-String)
//! bzw. bei Server-Antworten ein kurzer Text.

use pogchat_core::Fingerprint;
use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::error::{ProtocolError, ProtocolResult};

/// Art eines Frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrameKind {
    /// Client -> Server: selbstsignierter Login-Umschlag
    LoginMsg,
    /// Client -> Server -> Client: Umschlag an einen anderen Teilnehmer
    PeerMsg,
    /// Server -> Client: Login akzeptiert, Payload ist der Fingerprint
    LoginOk,
    /// Server -> Client: Login abgelehnt, Payload ist der Grund
    LoginFailed,
}

impl FrameKind {
    /// Nur der Server darf diese Arten senden
    pub fn ist_server_antwort(&self) -> bool {
        matches!(self, FrameKind::LoginOk | FrameKind::LoginFailed)
    }
}

/// Wire-Frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub kind: FrameKind,
    #[serde(default)]
    pub payload: String,
}

impl Frame {
    pub fn neu(kind: FrameKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// `LOGIN_MSG` mit dem serialisierten Umschlag
    pub fn login(envelope: &Envelope) -> ProtocolResult<Self> {
        Ok(Self::neu(FrameKind::LoginMsg, envelope.to_json()?))
    }

    /// `PEER_MSG` mit dem serialisierten Umschlag
    pub fn peer(envelope: &Envelope) -> ProtocolResult<Self> {
        Ok(Self::neu(FrameKind::PeerMsg, envelope.to_json()?))
    }

    pub fn login_ok(fingerprint: &Fingerprint) -> Self {
        Self::neu(FrameKind::LoginOk, fingerprint.as_str())
    }

    pub fn login_failed(grund: impl Into<String>) -> Self {
        Self::neu(FrameKind::LoginFailed, grund)
    }

    /// Parst einen Frame aus den Payload-Bytes eines Wire-Frames
    pub fn parse(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json_vec(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parst den enthaltenen Umschlag
    pub fn envelope(&self) -> ProtocolResult<Envelope> {
        Envelope::parse(self.payload.as_bytes())
    }

    /// Wie `envelope`, prueft aber vorher die Frame-Art
    pub fn envelope_als(&self, erwartet: FrameKind) -> ProtocolResult<Envelope> {
        if self.kind != erwartet {
            return Err(ProtocolError::FalscherTyp {
                erwartet,
                erhalten: self.kind,
            });
        }
        self.envelope()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
