//! Signierter (und meist verschluesselter) Nachrichten-Umschlag
//!
//! Ein `Envelope` traegt Absender- und Empfaenger-Schluessel (PKCS#1-DER),
//! den Chiffretext und eine Signatur ueber genau diesen Chiffretext.
//! Die Signatur beweist Herkunft und Integritaet des Chiffretexts, nie
//! etwas ueber den Klartext.
//!
//! ## JSON-Form
//!
//! ```text
//! {"signature": "<b64>", "from_public_key": "<b64>",
//!  "to_public_key": "<b64>", "message": "<b64>"}
//! ```
//!
//! Base64 ist Standard mit Padding; `null` oder ein fehlendes Feld wird als
//! leere Byte-Folge gelesen.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pogchat_core::{AuthError, Fingerprint};
use pogchat_crypto::{CryptoResult, Cryptor, KeyPair, KryptoDienste, Signer};
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

/// Fester Klartext des Login-Envelopes
///
/// Der Inhalt wird vom Server nie ausgewertet; der Login ist reiner
/// Besitznachweis des privaten Schluessels.
pub const LOGIN_KLARTEXT: &[u8] = b"GAMER";

/// Nachrichten-Umschlag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EnvelopeJson", into = "EnvelopeJson")]
pub struct Envelope {
    signature: Vec<u8>,
    from_public_key: Vec<u8>,
    to_public_key: Vec<u8>,
    message: Vec<u8>,
}

impl Envelope {
    /// Erstellt einen leeren Umschlag fuer Absender und Empfaenger
    pub fn neu(from_public_key: impl Into<Vec<u8>>, to_public_key: impl Into<Vec<u8>>) -> Self {
        Self {
            from_public_key: from_public_key.into(),
            to_public_key: to_public_key.into(),
            ..Default::default()
        }
    }

    /// Setzt alle vier Felder direkt (z.B. fuer Tests oder Weiterleitung)
    pub fn from_parts(
        signature: Vec<u8>,
        from_public_key: Vec<u8>,
        to_public_key: Vec<u8>,
        message: Vec<u8>,
    ) -> Self {
        Self {
            signature,
            from_public_key,
            to_public_key,
            message,
        }
    }

    /// Verschluesselt `plaintext` fuer den Empfaenger und speichert das Ergebnis
    ///
    /// Eine vorhandene Signatur wird verworfen, da sie nicht mehr zum
    /// neuen Chiffretext passt.
    pub fn encrypt_message(&mut self, cryptor: &dyn Cryptor, plaintext: &[u8]) -> CryptoResult<&[u8]> {
        self.message = cryptor.encrypt(&self.to_public_key, plaintext)?;
        self.signature.clear();
        Ok(&self.message)
    }

    /// Signiert die aktuelle `message` mit dem privaten Schluessel des Absenders
    pub fn sign_message(&mut self, signer: &dyn Signer, private_key: &[u8]) -> CryptoResult<&[u8]> {
        self.signature = signer.sign(private_key, &self.message)?;
        Ok(&self.signature)
    }

    /// Baut einen fertigen Umschlag: verschluesseln, dann signieren
    pub fn versiegeln(
        dienste: &KryptoDienste,
        absender: &KeyPair,
        empfaenger_public_key: &[u8],
        plaintext: &[u8],
    ) -> ProtocolResult<Self> {
        let private_key = absender.require_private()?;
        let mut envelope = Self::neu(absender.require_public()?, empfaenger_public_key);
        envelope.encrypt_message(dienste.cryptor.as_ref(), plaintext)?;
        envelope.sign_message(dienste.signer.as_ref(), private_key)?;
        Ok(envelope)
    }

    /// Login-Umschlag: an sich selbst adressiert, fester Klartext
    pub fn login(dienste: &KryptoDienste, schluessel: &KeyPair) -> ProtocolResult<Self> {
        let eigener = schluessel.require_public()?;
        Self::versiegeln(dienste, schluessel, eigener, LOGIN_KLARTEXT)
    }

    /// Prueft die Signatur gegen `from_public_key`
    pub fn verify(&self, signer: &dyn Signer) -> Result<(), AuthError> {
        signer.verify(&self.from_public_key, &self.message, &self.signature)
    }

    /// Entschluesselt `message` mit dem privaten Schluessel des Empfaengers
    pub fn decrypt_message(&self, cryptor: &dyn Cryptor, private_key: &[u8]) -> CryptoResult<Vec<u8>> {
        cryptor.decrypt(private_key, &self.message)
    }

    pub fn sender_fingerprint(&self) -> Fingerprint {
        Fingerprint::aus_public_key(&self.from_public_key)
    }

    pub fn recipient_fingerprint(&self) -> Fingerprint {
        Fingerprint::aus_public_key(&self.to_public_key)
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn from_public_key(&self) -> &[u8] {
        &self.from_public_key
    }

    pub fn to_public_key(&self) -> &[u8] {
        &self.to_public_key
    }

    pub fn message(&self) -> &[u8] {
        &self.message
    }

    /// Serialisiert den Umschlag als JSON
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parst einen Umschlag aus JSON
    ///
    /// Ungueltiges Base64 wird mit dem Feldnamen gemeldet.
    pub fn parse(json: &[u8]) -> ProtocolResult<Self> {
        let roh: EnvelopeJson = serde_json::from_slice(json)?;
        Self::try_from(roh)
    }
}

// ---------------------------------------------------------------------------
// JSON-Darstellung
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct EnvelopeJson {
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    from_public_key: Option<String>,
    #[serde(default)]
    to_public_key: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn feld_dekodieren(feld: &'static str, wert: Option<String>) -> ProtocolResult<Vec<u8>> {
    match wert {
        None => Ok(Vec::new()),
        Some(text) => STANDARD
            .decode(text.as_bytes())
            .map_err(|e| ProtocolError::UngueltigesBase64 {
                feld,
                grund: e.to_string(),
            }),
    }
}

impl TryFrom<EnvelopeJson> for Envelope {
    type Error = ProtocolError;

    fn try_from(roh: EnvelopeJson) -> Result<Self, Self::Error> {
        Ok(Self {
            signature: feld_dekodieren("signature", roh.signature)?,
            from_public_key: feld_dekodieren("from_public_key", roh.from_public_key)?,
            to_public_key: feld_dekodieren("to_public_key", roh.to_public_key)?,
            message: feld_dekodieren("message", roh.message)?,
        })
    }
}

impl From<Envelope> for EnvelopeJson {
    fn from(e: Envelope) -> Self {
        Self {
            signature: Some(STANDARD.encode(&e.signature)),
            from_public_key: Some(STANDARD.encode(&e.from_public_key)),
            to_public_key: Some(STANDARD.encode(&e.to_public_key)),
            message: Some(STANDARD.encode(&e.message)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
