//! EOSIO text encodings for secp256k1 keys and recoverable signatures.
//!
//! Public keys are `EOS<base58>` (legacy) or `PUB_<curve>_<base58>`, private keys legacy WIF or
//! `PVT_<curve>_<base58>` and signatures `SIG_K1_<base58>`. Every base58 payload carries a four
//! byte RIPEMD-160 checksum, except WIF which uses a double SHA-256 checksum.

use std::{fmt, str::FromStr};

use k256::{
    ecdsa::{
        signature::hazmat::RandomizedPrehashSigner, RecoveryId, Signature, SigningKey,
        VerifyingKey,
    },
    elliptic_curve::sec1::ToEncodedPoint,
};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::{error::KeyError, util::sha256d};

/// Length of a compressed public key
pub const PUBLIC_KEY_LEN: usize = 33;
/// Length of a private key scalar
pub const PRIVATE_KEY_LEN: usize = 32;
/// Length of a recoverable signature, `header ‖ r ‖ s`
pub const SIGNATURE_LEN: usize = 65;

const CHECKSUM_LEN: usize = 4;
const LEGACY_PUBLIC_PREFIX: &str = "EOS";
const WIF_VERSION: u8 = 0x80;
const MAX_SIGNING_ATTEMPTS: usize = 64;

/// Elliptic curve of an EOSIO key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCurve {
    K1,
    R1,
}

impl KeyCurve {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyCurve::K1 => "K1",
            KeyCurve::R1 => "R1",
        }
    }
}

impl fmt::Display for KeyCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn ripemd160_checksum(data: &[u8], suffix: &[u8]) -> [u8; CHECKSUM_LEN] {
    use ripemd160::{Digest as _, Ripemd160};

    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.update(suffix);
    let digest = hasher.finalize();
    let mut checksum = [0u8; CHECKSUM_LEN];
    checksum.copy_from_slice(&digest[..CHECKSUM_LEN]);
    checksum
}

fn double_sha256_checksum(data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = sha256d(data);
    let mut checksum = [0u8; CHECKSUM_LEN];
    checksum.copy_from_slice(&digest[..CHECKSUM_LEN]);
    checksum
}

fn encode_checked(data: &[u8], suffix: &[u8]) -> String {
    let mut buf = data.to_vec();
    buf.extend_from_slice(&ripemd160_checksum(data, suffix));
    bs58::encode(buf).into_string()
}

/// base58 decode `text`, verify the trailing RIPEMD-160 checksum and return the payload
fn decode_checked<const N: usize>(text: &str, suffix: &[u8]) -> Result<[u8; N], KeyError> {
    let raw = bs58::decode(text).into_vec()?;
    if raw.len() != N + CHECKSUM_LEN {
        return Err(KeyError::Length {
            expected: N + CHECKSUM_LEN,
            actual: raw.len(),
        });
    }
    let (data, checksum) = raw.split_at(N);
    if ripemd160_checksum(data, suffix) != checksum {
        return Err(KeyError::Checksum);
    }
    let mut out = [0u8; N];
    out.copy_from_slice(data);
    Ok(out)
}

/// A compressed EOSIO public key
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey {
    curve: KeyCurve,
    data: [u8; PUBLIC_KEY_LEN],
}

impl PublicKey {
    pub fn from_bytes(curve: KeyCurve, bytes: &[u8]) -> Result<Self, KeyError> {
        let data: [u8; PUBLIC_KEY_LEN] = bytes.try_into().map_err(|_| KeyError::Length {
            expected: PUBLIC_KEY_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self { curve, data })
    }

    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = k256::PublicKey::from(key).to_encoded_point(true);
        let mut data = [0u8; PUBLIC_KEY_LEN];
        data.copy_from_slice(point.as_bytes());
        Self {
            curve: KeyCurve::K1,
            data,
        }
    }

    pub fn curve(&self) -> KeyCurve {
        self.curve
    }

    /// The compressed SEC1 point, parity prefix included
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.data
    }

    /// The key without its one byte parity prefix, used to index the registry tables
    pub fn index_bytes(&self) -> &[u8] {
        &self.data[1..]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.data)
    }

    /// Legacy `EOS` text form, only defined for K1 keys
    pub fn to_legacy_string(&self) -> Result<String, KeyError> {
        match self.curve {
            KeyCurve::K1 => Ok(format!(
                "{LEGACY_PUBLIC_PREFIX}{}",
                encode_checked(&self.data, b"")
            )),
            KeyCurve::R1 => Err(KeyError::UnsupportedCurve(KeyCurve::R1)),
        }
    }

    pub fn verifying_key(&self) -> Result<VerifyingKey, KeyError> {
        match self.curve {
            KeyCurve::K1 => Ok(VerifyingKey::from_sec1_bytes(&self.data)?),
            KeyCurve::R1 => Err(KeyError::UnsupportedCurve(KeyCurve::R1)),
        }
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (curve, body, suffix) = if let Some(body) = s.strip_prefix("PUB_K1_") {
            (KeyCurve::K1, body, KeyCurve::K1.as_str())
        } else if let Some(body) = s.strip_prefix("PUB_R1_") {
            (KeyCurve::R1, body, KeyCurve::R1.as_str())
        } else if let Some(body) = s.strip_prefix(LEGACY_PUBLIC_PREFIX) {
            (KeyCurve::K1, body, "")
        } else {
            return Err(KeyError::UnknownFormat(s.to_string()));
        };
        let data = decode_checked::<PUBLIC_KEY_LEN>(body, suffix.as_bytes())?;
        Ok(Self { curve, data })
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PUB_{}_{}",
            self.curve,
            encode_checked(&self.data, self.curve.as_str().as_bytes())
        )
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self)
    }
}

/// A secp256k1 private key, parsed from WIF or `PVT_K1_` text
#[derive(Clone)]
pub struct PrivateKey {
    inner: SigningKey,
}

impl PrivateKey {
    /// Generate a new random key
    pub fn random() -> Self {
        Self {
            inner: SigningKey::random(&mut OsRng),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        Ok(Self {
            inner: SigningKey::from_slice(bytes)?,
        })
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.inner
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_verifying_key(self.inner.verifying_key())
    }

    /// Legacy wallet import format
    pub fn to_wif(&self) -> String {
        let mut buf = vec![WIF_VERSION];
        buf.extend_from_slice(&self.inner.to_bytes());
        let checksum = double_sha256_checksum(&buf);
        buf.extend_from_slice(&checksum);
        bs58::encode(buf).into_string()
    }

    /// Sign a SHA-256 digest with a canonical, recoverable signature the ledger accepts
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<EosioSignature, KeyError> {
        let (signature, recovery_id) = self.inner.sign_prehash_recoverable(digest)?;
        let candidate = EosioSignature::from_parts(&signature, recovery_id);
        if candidate.is_canonical() {
            return Ok(candidate);
        }

        for _ in 1..MAX_SIGNING_ATTEMPTS {
            let signature: Signature = self.inner.sign_prehash_with_rng(&mut OsRng, digest)?;
            let signature = signature.normalize_s().unwrap_or(signature);
            let recovery_id = RecoveryId::trial_recovery_from_prehash(
                self.inner.verifying_key(),
                digest,
                &signature,
            )?;
            let candidate = EosioSignature::from_parts(&signature, recovery_id);
            if candidate.is_canonical() {
                return Ok(candidate);
            }
        }
        Err(KeyError::NonCanonical(MAX_SIGNING_ATTEMPTS))
    }

    /// Hash `message` with SHA-256 and sign it
    pub fn sign(&self, message: &[u8]) -> Result<EosioSignature, KeyError> {
        let digest: [u8; 32] = Sha256::digest(message).into();
        self.sign_digest(&digest)
    }
}

impl FromStr for PrivateKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(body) = s.strip_prefix("PVT_K1_") {
            let data = decode_checked::<PRIVATE_KEY_LEN>(body, KeyCurve::K1.as_str().as_bytes())?;
            return Self::from_bytes(&data);
        }
        if s.starts_with("PVT_") {
            return Err(KeyError::UnknownFormat(s.to_string()));
        }

        let raw = bs58::decode(s).into_vec()?;
        let expected = 1 + PRIVATE_KEY_LEN + CHECKSUM_LEN;
        if raw.len() != expected {
            return Err(KeyError::Length {
                expected,
                actual: raw.len(),
            });
        }
        let (data, checksum) = raw.split_at(1 + PRIVATE_KEY_LEN);
        if data[0] != WIF_VERSION {
            return Err(KeyError::UnknownFormat(s.to_string()));
        }
        if double_sha256_checksum(data) != checksum {
            return Err(KeyError::Checksum);
        }
        Self::from_bytes(&data[1..])
    }
}

impl fmt::Display for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PVT_K1_{}",
            encode_checked(&self.inner.to_bytes(), KeyCurve::K1.as_str().as_bytes())
        )
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({})", self.public_key())
    }
}

/// A recoverable K1 signature in the ledger's `header ‖ r ‖ s` layout
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EosioSignature {
    data: [u8; SIGNATURE_LEN],
}

impl EosioSignature {
    fn from_parts(signature: &Signature, recovery_id: RecoveryId) -> Self {
        let mut data = [0u8; SIGNATURE_LEN];
        data[0] = 27 + 4 + recovery_id.to_byte();
        data[1..].copy_from_slice(&signature.to_bytes());
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.data
    }

    /// r and s are both below 2^255 and neither carries a redundant leading zero byte
    pub fn is_canonical(&self) -> bool {
        let d = &self.data;
        d[1] & 0x80 == 0
            && !(d[1] == 0 && d[2] & 0x80 == 0)
            && d[33] & 0x80 == 0
            && !(d[33] == 0 && d[34] & 0x80 == 0)
    }

    pub fn signature(&self) -> Result<Signature, KeyError> {
        Ok(Signature::from_slice(&self.data[1..])?)
    }

    pub fn recovery_id(&self) -> Result<RecoveryId, KeyError> {
        let byte = self.data[0]
            .checked_sub(27 + 4)
            .ok_or_else(|| KeyError::UnknownFormat(self.to_string()))?;
        RecoveryId::from_byte(byte).ok_or_else(|| KeyError::UnknownFormat(self.to_string()))
    }

    /// Recover the signer of a SHA-256 digest
    pub fn recover(&self, digest: &[u8; 32]) -> Result<PublicKey, KeyError> {
        let key =
            VerifyingKey::recover_from_prehash(digest, &self.signature()?, self.recovery_id()?)?;
        Ok(PublicKey::from_verifying_key(&key))
    }
}

impl FromStr for EosioSignature {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix("SIG_K1_")
            .ok_or_else(|| KeyError::UnknownFormat(s.to_string()))?;
        let data = decode_checked::<SIGNATURE_LEN>(body, KeyCurve::K1.as_str().as_bytes())?;
        Ok(Self { data })
    }
}

impl fmt::Display for EosioSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SIG_K1_{}",
            encode_checked(&self.data, KeyCurve::K1.as_str().as_bytes())
        )
    }
}

impl fmt::Debug for EosioSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EosioSignature({})", self)
    }
}
