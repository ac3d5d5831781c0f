/**
 * @notice wallet.rs generates secp256k1 keypairs and derives Base58Check addresses from them.
 * @dev Grounded on the teacher's account_creation.rs::generate_keypair, adapted from the zk-proof
 * obfuscation scheme there to the direct ECDSA keypair this spec's wallet collaborator needs, and
 * on original_source/src/tools/GenerateKeys.py for the uncompressed-point public key encoding.
 * Key generation is an external collaborator per spec §1, included here because it is the only
 * practical way to drive the HTTP facade end to end.
 */

use rand::rngs::OsRng;
use secp256k1::{PublicKey, Secp256k1, SecretKey};

use crate::error::{LedgerError, LedgerResult};
use crate::hashing::derive_address;

pub struct Keypair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl Keypair {
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let mut rng = OsRng;
        let (secret_key, public_key) = secp.generate_keypair(&mut rng);
        Keypair { secret_key, public_key }
    }

    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize_uncompressed())
    }

    pub fn address(&self) -> String {
        derive_address(&self.public_key.serialize_uncompressed())
    }
}

pub fn secret_key_from_hex(hex_str: &str) -> LedgerResult<SecretKey> {
    let bytes = hex::decode(hex_str).map_err(|e| LedgerError::Crypto(format!("invalid private key hex: {e}")))?;
    SecretKey::from_slice(&bytes).map_err(|e| LedgerError::Crypto(format!("invalid private key: {e}")))
}
