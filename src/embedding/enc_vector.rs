//! Homomorphic-encryption wrapper over real-valued embedding vectors.
//!
//! The distilled design calls for a CKKS-like scheme (additive and
//! multiplicative, operating directly on reals). No CKKS crate exists in
//! this workspace's dependency corpus; `tfhe` (the one homomorphic-
//! encryption crate available to it) only encrypts integers, so each
//! `f32` coordinate is fixed-point encoded (`round(x * SCALE)`) before
//! encryption, and results are descaled on decrypt. This mirrors the
//! "context factory with CKKS-like parameters" of §4.2 in spirit — the
//! polynomial-modulus/coefficient-modulus/global-scale knobs it names are
//! CKKS-specific and have no `tfhe` equivalent, so [`HeContext::new`]
//! documents them as the scheme's nominal parameters without threading
//! them through `tfhe::ConfigBuilder`, which does not expose them.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tfhe::prelude::*;
use tfhe::{generate_keys, set_server_key, ClientKey, ConfigBuilder, FheInt64, PublicKey, ServerKey};

/// Fixed-point scale factor a coordinate is multiplied by before
/// encryption. Chosen to keep rounding error well under the `sigma`/
/// `delta` thresholds used for comparisons.
pub const FIXED_POINT_SCALE: f64 = 1_048_576.0; // 2^20

#[derive(Debug, Error)]
pub enum HeError {
    #[error("vector dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("ciphertext (de)serialization failed: {0}")]
    Codec(#[from] bincode::Error),
    #[error("context has neither a secret key nor a public key to encrypt with")]
    NoEncryptionKey,
}

pub type HeResult<T> = Result<T, HeError>;

/// Holds the scheme's keys. Only C (the client) ever holds `client_key`;
/// S reconstructs a context from C's shared `server_key` + `public_key`
/// (§2, step 1) and encrypts its own embeddings under the public key —
/// `tfhe`'s `PublicKey` is what makes this genuinely asymmetric (no secret
/// key needed to encrypt), unlike a scheme where only the key-holder could
/// produce ciphertexts.
pub struct HeContext {
    dimension: usize,
    client_key: Option<ClientKey>,
    public_key: Option<PublicKey>,
    server_key: ServerKey,
}

impl HeContext {
    /// Generates a fresh keypair and installs the server (evaluation) key
    /// as the thread's active key, matching `generate_keys` +
    /// `set_server_key` in the reference `tfhe` usage this is grounded on.
    /// Called by C at key setup (§2 step 1).
    pub fn generate(dimension: usize) -> Self {
        let config = ConfigBuilder::default().build();
        let (client_key, server_key) = generate_keys(config);
        set_server_key(server_key.clone());
        let public_key = PublicKey::new(&client_key);
        Self {
            dimension,
            client_key: Some(client_key),
            public_key: Some(public_key),
            server_key,
        }
    }

    /// Reconstructs a public-only context (no secret key, but still able
    /// to encrypt) from a peer's shared server + public key, as S does
    /// after receiving C's serialized context.
    pub fn from_peer(dimension: usize, server_key: ServerKey, public_key: PublicKey) -> Self {
        set_server_key(server_key.clone());
        Self {
            dimension,
            client_key: None,
            public_key: Some(public_key),
            server_key,
        }
    }

    /// Reconstructs a public-only context from the wire form of C's
    /// shared keys (§2 step 1's "public context" over the key-setup
    /// socket, before any of the numbered oracle messages flow).
    pub fn from_peer_bytes(dimension: usize, server_key: &[u8], public_key: &[u8]) -> HeResult<Self> {
        let server_key: ServerKey = bincode::deserialize(server_key)?;
        let public_key: PublicKey = bincode::deserialize(public_key)?;
        Ok(Self::from_peer(dimension, server_key, public_key))
    }

    /// Serializes the server (evaluation) and public keys for the
    /// key-setup handshake. Never includes `client_key` — only C ever
    /// calls this, and only on the keys it shares (§4.2: "serialized
    /// with public+Galois+relin keys but WITHOUT the secret key").
    pub fn shared_keys_bytes(&self) -> HeResult<(Vec<u8>, Vec<u8>)> {
        let public_key = self.public_key.as_ref().ok_or(HeError::NoEncryptionKey)?;
        Ok((bincode::serialize(&self.server_key)?, bincode::serialize(public_key)?))
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn server_key(&self) -> &ServerKey {
        &self.server_key
    }

    pub fn public_key(&self) -> Option<&PublicKey> {
        self.public_key.as_ref()
    }

    pub fn has_secret_key(&self) -> bool {
        self.client_key.is_some()
    }

    fn encrypt_coord(&self, scaled: i64) -> HeResult<FheInt64> {
        if let Some(ck) = &self.client_key {
            return Ok(FheInt64::encrypt(scaled, ck));
        }
        if let Some(pk) = &self.public_key {
            return Ok(FheInt64::encrypt(scaled, pk));
        }
        Err(HeError::NoEncryptionKey)
    }

    /// Encrypts an L2-normalized vector. Per §4.2, `normalize` defaults to
    /// true; callers that already normalized pass a pre-normalized vector
    /// and `normalize=false`. Works from either a secret-key or a
    /// public-key-only context, which is what lets S encrypt its own
    /// embeddings under C's shared context without ever holding C's
    /// secret key.
    pub fn encrypt(&self, vec: &[f32], normalize: bool) -> HeResult<EncVector> {
        if vec.len() != self.dimension {
            return Err(HeError::DimensionMismatch {
                expected: self.dimension,
                got: vec.len(),
            });
        }
        let source = if normalize {
            super::normalize(vec)
        } else {
            vec.to_vec()
        };
        let coords = source
            .iter()
            .map(|x| {
                let scaled = (*x as f64 * FIXED_POINT_SCALE).round() as i64;
                self.encrypt_coord(scaled)
            })
            .collect::<HeResult<Vec<_>>>()?;
        Ok(EncVector { coords })
    }

    /// Encrypts a single already-scaled scalar (used for the `1/|path|`
    /// length ciphertext of §4.4/§4.5).
    pub fn encrypt_scalar(&self, value: f64) -> HeResult<EncVector> {
        let scaled = (value * FIXED_POINT_SCALE).round() as i64;
        Ok(EncVector {
            coords: vec![self.encrypt_coord(scaled)?],
        })
    }

    /// Decrypts a scalar ciphertext produced by [`EncVector::dot`] or
    /// [`EncVector::masked`], descaling by the appropriate power of
    /// [`FIXED_POINT_SCALE`].
    pub fn decrypt_scalar(&self, enc: &EncVector, scale_powers: i32) -> f64 {
        let client_key = self
            .client_key
            .as_ref()
            .expect("decryption requires the secret key; only the oracle decrypts");
        let raw: i64 = enc.coords[0].decrypt(client_key);
        raw as f64 / FIXED_POINT_SCALE.powi(scale_powers)
    }
}

/// An encrypted vector (or, when `coords.len() == 1`, an encrypted
/// scalar). Carries no plaintext and no secret key — only what a party
/// without `ClientKey` is meant to hold.
#[derive(Clone)]
pub struct EncVector {
    coords: Vec<FheInt64>,
}

impl EncVector {
    pub fn dimension(&self) -> usize {
        self.coords.len()
    }

    /// Homomorphic dot product: elementwise multiply, then sum to a
    /// single ciphertext. Descaling to a real happens only at decryption,
    /// by the oracle.
    pub fn dot(&self, other: &EncVector) -> EncVector {
        let mut acc = &self.coords[0] * &other.coords[0];
        for i in 1..self.coords.len().min(other.coords.len()) {
            acc = acc + (&self.coords[i] * &other.coords[i]);
        }
        EncVector { coords: vec![acc] }
    }

    /// Elementwise homomorphic addition.
    pub fn add(&self, other: &EncVector) -> EncVector {
        let coords = self
            .coords
            .iter()
            .zip(other.coords.iter())
            .map(|(a, b)| a + b)
            .collect();
        EncVector { coords }
    }

    /// Plaintext-scalar homomorphic multiply (used for the `mask` and for
    /// the `0.25*(len1+len2)` factor of `h_p`).
    pub fn scale(&self, factor: f64) -> EncVector {
        let scaled_factor = (factor * FIXED_POINT_SCALE).round() as i64;
        let coords = self.coords.iter().map(|c| c * scaled_factor).collect();
        EncVector { coords }
    }

    /// Subtracts a plaintext scalar (already scaled to the fixed-point
    /// domain by the caller) — used for `(ct1·ct2 - sigma)`.
    pub fn sub_scalar(&self, value_scaled: i64) -> EncVector {
        let coords = self.coords.iter().map(|c| c - value_scaled).collect();
        EncVector { coords }
    }
}

/// Wire-format shadow of [`EncVector`], used only for serialization —
/// `FheInt64` itself round-trips through `bincode` but we keep an
/// explicit newtype boundary so the wire codec never has to reach into
/// `tfhe` internals directly.
#[derive(Serialize, Deserialize)]
struct SerializedEncVector {
    coords: Vec<Vec<u8>>,
}

pub fn serialize(vec: &EncVector) -> HeResult<Vec<u8>> {
    let coords = vec
        .coords
        .iter()
        .map(bincode::serialize)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(bincode::serialize(&SerializedEncVector { coords })?)
}

pub fn deserialize(bytes: &[u8]) -> HeResult<EncVector> {
    let shadow: SerializedEncVector = bincode::deserialize(bytes)?;
    let coords = shadow
        .coords
        .iter()
        .map(|c| bincode::deserialize(c))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(EncVector { coords })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_round_trips_within_fixed_point_tolerance() {
        let ctx = HeContext::generate(4);
        let original = vec![0.5_f32, -0.25, 0.1, 0.0];
        let enc = ctx.encrypt(&original, false).unwrap();
        let self_dot = enc.dot(&enc);
        let decrypted = ctx.decrypt_scalar(&self_dot, 2);
        let expected: f64 = original.iter().map(|x| (*x as f64) * (*x as f64)).sum();
        assert!((decrypted - expected).abs() < 1e-3);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let ctx = HeContext::generate(4);
        let err = ctx.encrypt(&[0.1, 0.2], false).unwrap_err();
        assert!(matches!(err, HeError::DimensionMismatch { .. }));
    }
}
