use async_trait::async_trait;
use k256::ecdsa::{
    signature::{Signer, Verifier},
    RecoveryId, Signature, VerifyingKey,
};

use super::Algorithm;
use crate::{
    error::JwtError,
    types::{PrivateKey, PublicKey},
};

/// Produces JWS signatures over a token's signing input.
///
/// Signing may be backed by remote or hardware keys and is the only suspension point of issuing.
#[async_trait]
pub trait JwtSigner: Send + Sync {
    /// The `alg` written into headers that do not set one
    fn algorithm(&self) -> Algorithm;

    async fn sign(&self, data: &[u8]) -> Result<Vec<u8>, JwtError>;
}

/// Local secp256k1 signer over SHA-256
#[derive(Clone, Debug)]
pub struct Es256kSigner {
    key: PrivateKey,
    algorithm: Algorithm,
}

impl Es256kSigner {
    /// `ES256K`, 64 byte `r ‖ s` signatures
    pub fn new(key: PrivateKey) -> Self {
        Self {
            key,
            algorithm: Algorithm::ES256K,
        }
    }

    /// `ES256K-R`, 65 byte `r ‖ s ‖ recovery id` signatures
    pub fn recoverable(key: PrivateKey) -> Self {
        Self {
            key,
            algorithm: Algorithm::ES256KR,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.key.public_key()
    }
}

#[async_trait]
impl JwtSigner for Es256kSigner {
    fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    async fn sign(&self, data: &[u8]) -> Result<Vec<u8>, JwtError> {
        let key = self.key.signing_key();
        match self.algorithm {
            Algorithm::ES256K => {
                let signature: Signature = key
                    .try_sign(data)
                    .map_err(|e| JwtError::Signing(e.to_string()))?;
                Ok(signature.to_bytes().to_vec())
            }
            Algorithm::ES256KR => {
                let (signature, recovery_id) = key
                    .sign_recoverable(data)
                    .map_err(|e| JwtError::Signing(e.to_string()))?;
                let mut bytes = signature.to_bytes().to_vec();
                bytes.push(recovery_id.to_byte());
                Ok(bytes)
            }
        }
    }
}

/// Check a JWS signature over `data` against `key`.
///
/// Signatures of the wrong length or that fail to parse verify as `false`.
pub fn verify_signature(
    algorithm: Algorithm,
    data: &[u8],
    signature: &[u8],
    key: &PublicKey,
) -> bool {
    let Ok(verifying_key) = key.verifying_key() else {
        return false;
    };
    match algorithm {
        Algorithm::ES256K => Signature::from_slice(signature)
            .map(|sig| verifying_key.verify(data, &sig).is_ok())
            .unwrap_or(false),
        Algorithm::ES256KR => {
            let [rs @ .., v] = signature else {
                return false;
            };
            let (Ok(sig), Some(recovery_id)) =
                (Signature::from_slice(rs), RecoveryId::from_byte(*v))
            else {
                return false;
            };
            VerifyingKey::recover_from_msg(data, &sig, recovery_id)
                .map(|recovered| recovered == verifying_key)
                .unwrap_or(false)
        }
    }
}
