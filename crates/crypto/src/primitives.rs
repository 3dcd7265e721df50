//! Asymmetrische Primitiven (RSA)
//!
//! - `Cryptor`: Ver-/Entschluesselung mit RSA-OAEP
//! - `Signer`: Signatur mit PKCS#1 v1.5 ueber einen Digest der Nachricht
//!
//! Schluessel werden immer als rohe PKCS#1-DER-Bytes uebergeben. Hash und
//! Zufallsquelle werden beim Erzeugen der Dienste festgelegt; es gibt keine
//! globalen Instanzen, die `KryptoDienste` werden einmal beim Start gebaut
//! und per Referenz weitergereicht.

use parking_lot::Mutex;
use pogchat_core::AuthError;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::sync::Arc;

use crate::error::{CryptoError, CryptoResult};
use crate::types::{HashAlgorithm, KeyAlgorithm};

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Asymmetrische Verschluesselung
pub trait Cryptor: Send + Sync {
    /// Verschluesselt `plaintext` fuer den Inhaber von `public_key`
    fn encrypt(&self, public_key: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Entschluesselt `ciphertext` mit dem eigenen privaten Schluessel
    fn decrypt(&self, private_key: &[u8], ciphertext: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Groesster Klartext in Bytes, den `public_key` aufnehmen kann
    fn max_klartext(&self, public_key: &[u8]) -> CryptoResult<usize>;
}

/// Digitale Signaturen
pub trait Signer: Send + Sync {
    /// Signiert den Digest von `message`
    fn sign(&self, private_key: &[u8], message: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Prueft `signature` ueber `message` gegen `public_key`
    ///
    /// Liefert einen unterscheidbaren Fehler statt eines nackten `bool`,
    /// damit Aufrufer den Ablehnungsgrund loggen koennen.
    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8])
        -> Result<(), AuthError>;
}

// ---------------------------------------------------------------------------
// Hilfsfunktionen
// ---------------------------------------------------------------------------

fn public_key_parsen(der: &[u8]) -> CryptoResult<RsaPublicKey> {
    RsaPublicKey::from_pkcs1_der(der).map_err(|e| CryptoError::UngueltigerSchluessel(e.to_string()))
}

fn private_key_parsen(der: &[u8]) -> CryptoResult<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs1_der(der)
        .map_err(|e| CryptoError::UngueltigerSchluessel(e.to_string()))
}

fn oaep(hash: HashAlgorithm) -> Oaep {
    match hash {
        HashAlgorithm::Sha256 => Oaep::new::<Sha256>(),
        HashAlgorithm::Sha384 => Oaep::new::<Sha384>(),
        HashAlgorithm::Sha512 => Oaep::new::<Sha512>(),
    }
}

fn pkcs1v15(hash: HashAlgorithm) -> Pkcs1v15Sign {
    match hash {
        HashAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        HashAlgorithm::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
        HashAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
    }
}

fn digest(hash: HashAlgorithm, message: &[u8]) -> Vec<u8> {
    match hash {
        HashAlgorithm::Sha256 => Sha256::digest(message).to_vec(),
        HashAlgorithm::Sha384 => Sha384::digest(message).to_vec(),
        HashAlgorithm::Sha512 => Sha512::digest(message).to_vec(),
    }
}

/// OAEP-Grenze: `modulusBytes - 2*hashLen - 2`
///
/// `None`, wenn der Modulus fuer den Hash zu klein ist.
fn oaep_maximum(key: &RsaPublicKey, hash: HashAlgorithm) -> Option<usize> {
    key.size().checked_sub(2 * hash.laenge() + 2)
}

// ---------------------------------------------------------------------------
// RsaCryptor
// ---------------------------------------------------------------------------

/// RSA-OAEP mit konfigurierbarem Hash und Zufallsquelle
pub struct RsaCryptor<R = OsRng> {
    hash: HashAlgorithm,
    rng: Mutex<R>,
}

impl RsaCryptor<OsRng> {
    /// Erstellt einen Cryptor mit dem Betriebssystem-Zufall
    pub fn neu(hash: HashAlgorithm) -> Self {
        Self::mit_rng(hash, OsRng)
    }
}

impl<R> RsaCryptor<R>
where
    R: RngCore + CryptoRng + Send,
{
    /// Erstellt einen Cryptor mit eigener Zufallsquelle
    pub fn mit_rng(hash: HashAlgorithm, rng: R) -> Self {
        Self {
            hash,
            rng: Mutex::new(rng),
        }
    }

    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }
}

impl<R> Cryptor for RsaCryptor<R>
where
    R: RngCore + CryptoRng + Send,
{
    fn encrypt(&self, public_key: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let key = public_key_parsen(public_key)?;
        match oaep_maximum(&key, self.hash) {
            Some(maximum) if plaintext.len() <= maximum => {}
            maximum => {
                return Err(CryptoError::NachrichtZuGross {
                    laenge: plaintext.len(),
                    maximum: maximum.unwrap_or(0),
                })
            }
        }

        let mut rng = self.rng.lock();
        key.encrypt(&mut *rng, oaep(self.hash), plaintext)
            .map_err(|e| CryptoError::Verschluesselung(e.to_string()))
    }

    fn decrypt(&self, private_key: &[u8], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        let key = private_key_parsen(private_key)?;
        let mut rng = self.rng.lock();
        key.decrypt_blinded(&mut *rng, oaep(self.hash), ciphertext)
            .map_err(|e| CryptoError::Entschluesselung(e.to_string()))
    }

    fn max_klartext(&self, public_key: &[u8]) -> CryptoResult<usize> {
        let key = public_key_parsen(public_key)?;
        Ok(oaep_maximum(&key, self.hash).unwrap_or(0))
    }
}

// ---------------------------------------------------------------------------
// RsaSigner
// ---------------------------------------------------------------------------

/// PKCS#1 v1.5-Signaturen ueber einen Digest der Nachricht
pub struct RsaSigner<R = OsRng> {
    hash: HashAlgorithm,
    rng: Mutex<R>,
}

impl RsaSigner<OsRng> {
    /// Erstellt einen Signer mit dem Betriebssystem-Zufall (Blinding)
    pub fn neu(hash: HashAlgorithm) -> Self {
        Self::mit_rng(hash, OsRng)
    }
}

impl<R> RsaSigner<R>
where
    R: RngCore + CryptoRng + Send,
{
    /// Erstellt einen Signer mit eigener Zufallsquelle
    pub fn mit_rng(hash: HashAlgorithm, rng: R) -> Self {
        Self {
            hash,
            rng: Mutex::new(rng),
        }
    }

    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }
}

impl<R> Signer for RsaSigner<R>
where
    R: RngCore + CryptoRng + Send,
{
    fn sign(&self, private_key: &[u8], message: &[u8]) -> CryptoResult<Vec<u8>> {
        let key = private_key_parsen(private_key)?;
        let hashed = digest(self.hash, message);
        let mut rng = self.rng.lock();
        key.sign_with_rng(&mut *rng, pkcs1v15(self.hash), &hashed)
            .map_err(|e| CryptoError::Signierung(e.to_string()))
    }

    fn verify(
        &self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), AuthError> {
        let key = RsaPublicKey::from_pkcs1_der(public_key)
            .map_err(|e| AuthError::UngueltigerSchluessel(e.to_string()))?;
        let hashed = digest(self.hash, message);
        key.verify(pkcs1v15(self.hash), &hashed, signature)
            .map_err(|_| AuthError::UngueltigeSignatur)
    }
}

// ---------------------------------------------------------------------------
// KryptoDienste
// ---------------------------------------------------------------------------

/// Konfiguration der Krypto-Dienste
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KryptoConfig {
    /// Algorithmus des Schluesselmaterials
    pub algorithmus: KeyAlgorithm,
    /// Hash fuer OAEP und Signatur-Digest
    pub hash: HashAlgorithm,
}

/// Einmal beim Start erzeugte Cryptor-/Signer-Instanzen
///
/// Clone teilt die inneren Instanzen.
#[derive(Clone)]
pub struct KryptoDienste {
    pub cryptor: Arc<dyn Cryptor>,
    pub signer: Arc<dyn Signer>,
}

impl KryptoDienste {
    /// Erstellt die Dienste passend zur Konfiguration
    pub fn neu(config: &KryptoConfig) -> Self {
        match config.algorithmus {
            KeyAlgorithm::Rsa => Self {
                cryptor: Arc::new(RsaCryptor::neu(config.hash)),
                signer: Arc::new(RsaSigner::neu(config.hash)),
            },
        }
    }
}

impl Default for KryptoDienste {
    fn default() -> Self {
        Self::neu(&KryptoConfig::default())
    }
}

impl std::fmt::Debug for KryptoDienste {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KryptoDienste {{ .. }}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::KeyPair;
    use std::sync::OnceLock;

    fn schluessel() -> &'static KeyPair {
        static PAAR: OnceLock<KeyPair> = OnceLock::new();
        PAAR.get_or_init(|| KeyPair::generate(1024).expect("Schluessel-Generierung"))
    }

    fn anderer_schluessel() -> &'static KeyPair {
        static PAAR: OnceLock<KeyPair> = OnceLock::new();
        PAAR.get_or_init(|| KeyPair::generate(1024).expect("Schluessel-Generierung"))
    }

    fn public(paar: &KeyPair) -> &[u8] {
        paar.public_key().expect("public key")
    }

    fn private(paar: &KeyPair) -> &[u8] {
        paar.private_key().expect("private key")
    }

    #[test]
    fn verschluesseln_und_entschluesseln() {
        let cryptor = RsaCryptor::neu(HashAlgorithm::Sha256);
        let paar = schluessel();

        for klartext in [&b""[..], b"GAMER", b"\x00\x00nullbytes\x00", &[0xffu8; 62][..]] {
            let geheim = cryptor.encrypt(public(paar), klartext).unwrap();
            assert_eq!(geheim.len(), 128);
            let zurueck = cryptor.decrypt(private(paar), &geheim).unwrap();
            assert_eq!(zurueck, klartext);
        }
    }

    #[test]
    fn oaep_ist_randomisiert() {
        let cryptor = RsaCryptor::neu(HashAlgorithm::Sha256);
        let a = cryptor.encrypt(public(schluessel()), b"hallo").unwrap();
        let b = cryptor.encrypt(public(schluessel()), b"hallo").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn zu_grosser_klartext_wird_abgelehnt() {
        let cryptor = RsaCryptor::neu(HashAlgorithm::Sha256);
        // 1024 Bit: 128 - 2*32 - 2 = 62
        assert_eq!(cryptor.max_klartext(public(schluessel())).unwrap(), 62);

        let fehler = cryptor.encrypt(public(schluessel()), &[7u8; 63]).unwrap_err();
        match fehler {
            CryptoError::NachrichtZuGross { laenge, maximum } => {
                assert_eq!(laenge, 63);
                assert_eq!(maximum, 62);
            }
            andere => panic!("Erwartet NachrichtZuGross, erhalten {:?}", andere),
        }
    }

    #[test]
    fn oaep_grenze_haengt_vom_hash_ab() {
        let cryptor = RsaCryptor::neu(HashAlgorithm::Sha384);
        // 128 - 2*48 - 2 = 30
        assert_eq!(cryptor.max_klartext(public(schluessel())).unwrap(), 30);
        let geheim = cryptor.encrypt(public(schluessel()), &[1u8; 30]).unwrap();
        assert_eq!(cryptor.decrypt(private(schluessel()), &geheim).unwrap(), vec![1u8; 30]);

        // SHA-512 passt nicht in einen 1024-Bit-Modulus
        let cryptor = RsaCryptor::neu(HashAlgorithm::Sha512);
        assert!(matches!(
            cryptor.encrypt(public(schluessel()), b""),
            Err(CryptoError::NachrichtZuGross { maximum: 0, .. })
        ));
    }

    #[test]
    fn ungueltiger_schluessel() {
        let cryptor = RsaCryptor::neu(HashAlgorithm::Sha256);
        assert!(matches!(
            cryptor.encrypt(b"kein der", b"x"),
            Err(CryptoError::UngueltigerSchluessel(_))
        ));
        assert!(matches!(
            cryptor.decrypt(b"kein der", b"x"),
            Err(CryptoError::UngueltigerSchluessel(_))
        ));

        let signer = RsaSigner::neu(HashAlgorithm::Sha256);
        assert!(matches!(
            signer.sign(b"kein der", b"x"),
            Err(CryptoError::UngueltigerSchluessel(_))
        ));
        assert!(matches!(
            signer.verify(b"kein der", b"x", b"y"),
            Err(AuthError::UngueltigerSchluessel(_))
        ));
    }

    #[test]
    fn entschluesselung_mit_falschem_schluessel_schlaegt_fehl() {
        let cryptor = RsaCryptor::neu(HashAlgorithm::Sha256);
        let geheim = cryptor.encrypt(public(schluessel()), b"geheim").unwrap();
        assert!(matches!(
            cryptor.decrypt(private(anderer_schluessel()), &geheim),
            Err(CryptoError::Entschluesselung(_))
        ));
    }

    #[test]
    fn entschluesselung_manipulierter_daten_schlaegt_fehl() {
        let cryptor = RsaCryptor::neu(HashAlgorithm::Sha256);
        let mut geheim = cryptor.encrypt(public(schluessel()), b"geheim").unwrap();
        geheim[10] ^= 0x01;
        assert!(matches!(
            cryptor.decrypt(private(schluessel()), &geheim),
            Err(CryptoError::Entschluesselung(_))
        ));
    }

    #[test]
    fn signieren_und_verifizieren() {
        let signer = RsaSigner::neu(HashAlgorithm::Sha256);
        let paar = schluessel();

        for nachricht in [&b""[..], b"GAMER", &[0u8; 1000][..]] {
            let signatur = signer.sign(private(paar), nachricht).unwrap();
            assert_eq!(signatur.len(), 128);
            signer.verify(public(paar), nachricht, &signatur).unwrap();
        }
    }

    #[test]
    fn verifikation_erkennt_jede_einzelne_aenderung() {
        let signer = RsaSigner::neu(HashAlgorithm::Sha256);
        let paar = schluessel();
        let nachricht = b"Originaltext".to_vec();
        let signatur = signer.sign(private(paar), &nachricht).unwrap();

        // Anderer Schluessel
        assert_eq!(
            signer.verify(public(anderer_schluessel()), &nachricht, &signatur),
            Err(AuthError::UngueltigeSignatur)
        );

        // Andere Nachricht
        let mut geaendert = nachricht.clone();
        geaendert[0] ^= 0x20;
        assert_eq!(
            signer.verify(public(paar), &geaendert, &signatur),
            Err(AuthError::UngueltigeSignatur)
        );

        // Andere Signatur
        let mut falsche_signatur = signatur.clone();
        falsche_signatur[5] ^= 0xff;
        assert_eq!(
            signer.verify(public(paar), &nachricht, &falsche_signatur),
            Err(AuthError::UngueltigeSignatur)
        );

        // Gekuerzte Signatur
        assert_eq!(
            signer.verify(public(paar), &nachricht, &signatur[..64]),
            Err(AuthError::UngueltigeSignatur)
        );
    }

    #[test]
    fn signatur_haengt_vom_hash_ab() {
        let sha256 = RsaSigner::neu(HashAlgorithm::Sha256);
        let sha512 = RsaSigner::neu(HashAlgorithm::Sha512);
        let paar = schluessel();

        let signatur = sha512.sign(private(paar), b"daten").unwrap();
        sha512.verify(public(paar), b"daten", &signatur).unwrap();
        assert_eq!(
            sha256.verify(public(paar), b"daten", &signatur),
            Err(AuthError::UngueltigeSignatur)
        );
    }

    #[test]
    fn eigene_zufallsquelle() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let cryptor = RsaCryptor::mit_rng(HashAlgorithm::Sha256, StdRng::seed_from_u64(7));
        let geheim = cryptor.encrypt(public(schluessel()), b"seed").unwrap();
        assert_eq!(cryptor.decrypt(private(schluessel()), &geheim).unwrap(), b"seed");
    }

    #[test]
    fn dienste_aus_konfiguration() {
        let dienste = KryptoDienste::neu(&KryptoConfig::default());
        let paar = schluessel();
        let geheim = dienste.cryptor.encrypt(public(paar), b"x").unwrap();
        let signatur = dienste.signer.sign(private(paar), &geheim).unwrap();
        dienste.signer.verify(public(paar), &geheim, &signatur).unwrap();
    }
}
