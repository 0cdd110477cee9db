use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::constants::{ADDRESS_SIZE, KDF_CONTEXT_MOCK_WALLET, KDF_CONTEXT_WALLET_ADDRESS};
use crate::error::WalletError;

/// A donor's sign-in wallet: an Ed25519 keypair whose public key is hashed
/// down to a 20-byte, `0x`-prefixed address.
#[derive(Clone)]
pub struct Wallet {
    signing_key: SigningKey,
}

impl Wallet {
    /// Generate a new random wallet
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Restore a wallet from secret key bytes
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    /// Deterministic wallet for a seed string. Only meant for test doubles
    /// and demo mode: anyone who knows the seed holds the key.
    pub fn from_seed(seed: &str) -> Self {
        let secret = blake3::derive_key(KDF_CONTEXT_MOCK_WALLET, seed.as_bytes());
        Self::from_secret_bytes(&secret)
    }

    /// Restore from a hex-encoded secret key
    pub fn from_secret_hex(hex_key: &str) -> Result<Self, WalletError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|_| WalletError::InvalidKeyBytes)?;
        let secret: [u8; 32] = bytes
            .try_into()
            .map_err(|_| WalletError::InvalidKeyBytes)?;
        Ok(Self::from_secret_bytes(&secret))
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.signing_key.as_bytes())
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// The wallet address, e.g. `0x3f9a...` (40 hex chars).
    pub fn address(&self) -> String {
        address_for(&self.public_key_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}

/// Derive the address of a public key.
pub fn address_for(pubkey: &[u8; 32]) -> String {
    let digest = blake3::derive_key(KDF_CONTEXT_WALLET_ADDRESS, pubkey);
    format!("0x{}", hex::encode(&digest[..ADDRESS_SIZE]))
}

/// Whether a string has the shape of a wallet address.
pub fn is_valid_address(address: &str) -> bool {
    address
        .strip_prefix("0x")
        .is_some_and(|rest| rest.len() == ADDRESS_SIZE * 2 && rest.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Verify a signature against a public key
pub fn verify_signature(
    pubkey_bytes: &[u8; 32],
    message: &[u8],
    signature: &Signature,
) -> Result<(), WalletError> {
    let verifying_key =
        VerifyingKey::from_bytes(pubkey_bytes).map_err(|_| WalletError::InvalidKeyBytes)?;
    verifying_key
        .verify(message, signature)
        .map_err(|_| WalletError::InvalidSignature)
}
