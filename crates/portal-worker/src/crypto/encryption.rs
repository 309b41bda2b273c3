//! AES-256-CBC encryption for stored portal credentials.
//!
//! The key is derived once from the master secret with scrypt. Every value
//! gets a fresh random IV and is stored as `hex(iv):hex(ciphertext)`.

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::Rng;

use crate::error::{WorkerError, WorkerResult};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// IV size for AES-CBC (one block).
const IV_SIZE: usize = 16;

/// Key size for AES-256 (256 bits / 32 bytes).
const KEY_SIZE: usize = 32;

/// Fixed scrypt salt shared with existing ciphertexts.
const KDF_SALT: &[u8] = b"salt";

/// scrypt cost: N = 2^14, r = 8, p = 1.
const KDF_LOG_N: u8 = 14;
const KDF_R: u32 = 8;
const KDF_P: u32 = 1;

/// Encryptor for credential fields.
#[derive(Clone)]
pub struct Encryptor {
    key: [u8; KEY_SIZE],
}

impl Encryptor {
    /// Derive the vault key from the master secret.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is empty.
    pub fn new(master_secret: &str) -> WorkerResult<Self> {
        if master_secret.is_empty() {
            return Err(WorkerError::Encryption("Master secret is empty".to_string()));
        }

        let params = scrypt::Params::new(KDF_LOG_N, KDF_R, KDF_P, KEY_SIZE)
            .map_err(|e| WorkerError::Encryption(format!("Invalid scrypt parameters: {}", e)))?;

        let mut key = [0u8; KEY_SIZE];
        scrypt::scrypt(master_secret.as_bytes(), KDF_SALT, &params, &mut key)
            .map_err(|e| WorkerError::Encryption(format!("Key derivation failed: {}", e)))?;

        Ok(Self { key })
    }

    /// Encrypt a string into `hex(iv):hex(ciphertext)`.
    pub fn encrypt(&self, plaintext: &str) -> WorkerResult<String> {
        let mut iv = [0u8; IV_SIZE];
        rand::thread_rng().fill(&mut iv);

        let cipher = Aes256CbcEnc::new_from_slices(&self.key, &iv)
            .map_err(|e| WorkerError::Encryption(format!("Failed to create cipher: {}", e)))?;
        let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        Ok(format!("{}:{}", hex::encode(iv), hex::encode(ciphertext)))
    }

    /// Decrypt a value produced by [`Encryptor::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns an error if the value is malformed, was encrypted under a
    /// different key, or is not UTF-8.
    pub fn decrypt(&self, encoded: &str) -> WorkerResult<String> {
        let (iv_hex, ciphertext_hex) = encoded
            .split_once(':')
            .ok_or_else(|| WorkerError::Encryption("Ciphertext missing IV separator".to_string()))?;

        let iv = hex::decode(iv_hex)
            .map_err(|e| WorkerError::Encryption(format!("Invalid IV encoding: {}", e)))?;
        if iv.len() != IV_SIZE {
            return Err(WorkerError::Encryption(format!(
                "Invalid IV length: expected {} bytes, got {}",
                IV_SIZE,
                iv.len()
            )));
        }
        let ciphertext = hex::decode(ciphertext_hex)
            .map_err(|e| WorkerError::Encryption(format!("Invalid ciphertext encoding: {}", e)))?;

        let cipher = Aes256CbcDec::new_from_slices(&self.key, &iv)
            .map_err(|e| WorkerError::Encryption(format!("Failed to create cipher: {}", e)))?;
        let plaintext = cipher
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|e| WorkerError::Encryption(format!("Decryption failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|_| WorkerError::Encryption("Decrypted value is not UTF-8".to_string()))
    }

    /// Encrypt a JSON value.
    pub fn encrypt_json(&self, data: &serde_json::Value) -> WorkerResult<String> {
        let json = serde_json::to_string(data)?;
        self.encrypt(&json)
    }

    /// Decrypt to a JSON value.
    pub fn decrypt_json(&self, encoded: &str) -> WorkerResult<serde_json::Value> {
        let json = self.decrypt(encoded)?;
        let value = serde_json::from_str(&json)?;
        Ok(value)
    }
}

impl std::fmt::Debug for Encryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encryptor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encryptor() -> Encryptor {
        Encryptor::new("test-master-secret").unwrap()
    }

    #[test]
    fn test_encrypt_decrypt() {
        let encryptor = encryptor();

        let ciphertext = encryptor.encrypt("Hello, World!").unwrap();
        let decrypted = encryptor.decrypt(&ciphertext).unwrap();

        assert_eq!(decrypted, "Hello, World!");
    }

    #[test]
    fn test_output_format() {
        let ciphertext = encryptor().encrypt("payroll@acme.test").unwrap();
        let (iv, body) = ciphertext.split_once(':').unwrap();

        assert_eq!(iv.len(), IV_SIZE * 2);
        // 17 bytes of plaintext pad to two blocks
        assert_eq!(body.len(), 32 * 2);
        assert!(ciphertext.chars().all(|c| c == ':' || c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_same_plaintext_differs() {
        let encryptor = encryptor();

        let a = encryptor.encrypt("s3cret").unwrap();
        let b = encryptor.encrypt("s3cret").unwrap();

        assert_ne!(a, b);
        assert_eq!(encryptor.decrypt(&a).unwrap(), "s3cret");
        assert_eq!(encryptor.decrypt(&b).unwrap(), "s3cret");
    }

    #[test]
    fn test_empty_and_unicode() {
        let encryptor = encryptor();
        for plaintext in ["", "pässwörd ✓"] {
            let ciphertext = encryptor.encrypt(plaintext).unwrap();
            assert_eq!(encryptor.decrypt(&ciphertext).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_key_derivation_is_deterministic() {
        let ciphertext = Encryptor::new("shared").unwrap().encrypt("value").unwrap();
        let decrypted = Encryptor::new("shared").unwrap().decrypt(&ciphertext).unwrap();
        assert_eq!(decrypted, "value");
    }

    #[test]
    fn test_malformed_ciphertext() {
        let encryptor = encryptor();

        assert!(encryptor.decrypt("no-separator").is_err());
        assert!(encryptor.decrypt("zz:00").is_err());
        assert!(encryptor.decrypt("00ff:00112233445566778899aabbccddeeff").is_err());

        let valid = encryptor.encrypt("value").unwrap();
        let (iv, body) = valid.split_once(':').unwrap();
        let truncated = format!("{}:{}", iv, &body[..body.len() - 2]);
        assert!(matches!(
            encryptor.decrypt(&truncated),
            Err(WorkerError::Encryption(_))
        ));
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(Encryptor::new("").is_err());
    }

    #[test]
    fn test_encrypt_decrypt_json() {
        let encryptor = encryptor();
        let data = serde_json::json!({ "tenant_code": "ACME", "mfa": false });

        let ciphertext = encryptor.encrypt_json(&data).unwrap();
        assert_eq!(encryptor.decrypt_json(&ciphertext).unwrap(), data);
    }
}
