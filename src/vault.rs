//! Encrypted file vault.
//!
//! Files are sealed with AES-256-GCM under a key derived from the owner's
//! secret, then handed to an object store. The sealed blob is nonce-prefixed
//! so decryption needs nothing beyond the blob and the secret.

use std::fs;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, KeyInit, Nonce};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::policy::FilePolicy;

const NONCE_LEN: usize = 12;

/// Metadata for one sealed file, as stored alongside the blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedFile {
    pub file_id: String,
    pub original_name: String,
    /// SHA-256 of the plaintext, hex encoded. Verified on unseal.
    pub fingerprint: String,
    pub policy: FilePolicy,
    pub sealed_at: String,
}

/// Symmetric sealing of file contents.
pub trait FileCipher: Send + Sync {
    fn seal(&self, plaintext: &[u8], secret: &str) -> Result<Vec<u8>>;
    fn unseal(&self, blob: &[u8], secret: &str) -> Result<Vec<u8>>;
}

/// Blob storage for sealed files.
pub trait ObjectStore: Send + Sync {
    fn put(&self, file_id: &str, blob: &[u8]) -> Result<()>;
    fn get(&self, file_id: &str) -> Result<Vec<u8>>;
    fn delete(&self, file_id: &str) -> Result<()>;
}

// ============================================================================
// AES-256-GCM CIPHER
// ============================================================================

#[derive(Debug, Default)]
pub struct AesFileCipher;

impl AesFileCipher {
    fn key_from_secret(secret: &str) -> Key<Aes256Gcm> {
        // SHA-256 maps arbitrary-length secrets onto the 32-byte key space.
        let digest = Sha256::digest(secret.as_bytes());
        Key::<Aes256Gcm>::from_slice(&digest).to_owned()
    }
}

impl FileCipher for AesFileCipher {
    fn seal(&self, plaintext: &[u8], secret: &str) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new(&Self::key_from_secret(secret));
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| Error::EncryptionFailure("aead encrypt failed".to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    fn unseal(&self, blob: &[u8], secret: &str) -> Result<Vec<u8>> {
        if blob.len() <= NONCE_LEN {
            return Err(Error::DecryptionFailure("blob too short".to_string()));
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new(&Self::key_from_secret(secret));
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| Error::DecryptionFailure("wrong secret or corrupted blob".to_string()))
    }
}

// ============================================================================
// LOCAL OBJECT STORE
// ============================================================================

pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn blob_path(&self, file_id: &str) -> PathBuf {
        self.root.join(format!("{file_id}.bin"))
    }
}

impl ObjectStore for LocalObjectStore {
    fn put(&self, file_id: &str, blob: &[u8]) -> Result<()> {
        fs::write(self.blob_path(file_id), blob)?;
        Ok(())
    }

    fn get(&self, file_id: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.blob_path(file_id))?)
    }

    fn delete(&self, file_id: &str) -> Result<()> {
        fs::remove_file(self.blob_path(file_id))?;
        Ok(())
    }
}

// ============================================================================
// VAULT
// ============================================================================

pub struct Vault<C: FileCipher, S: ObjectStore> {
    cipher: C,
    store: S,
}

impl<C: FileCipher, S: ObjectStore> Vault<C, S> {
    pub fn new(cipher: C, store: S) -> Self {
        Self { cipher, store }
    }

    /// Seal a file under `secret` and persist the blob. Returns the
    /// metadata the caller stores in its repository.
    pub fn seal_file(&self, path: &Path, secret: &str, policy: FilePolicy) -> Result<SealedFile> {
        let plaintext = fs::read(path)?;
        let fingerprint = hex::encode(Sha256::digest(&plaintext));
        let blob = self.cipher.seal(&plaintext, secret)?;

        let file_id = Uuid::new_v4().to_string();
        self.store.put(&file_id, &blob)?;
        log::info!("sealed {} as {}", path.display(), file_id);

        let original_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_id.clone());

        Ok(SealedFile {
            file_id,
            original_name,
            fingerprint,
            policy,
            sealed_at: Utc::now().to_rfc3339(),
        })
    }

    /// Fetch, decrypt and fingerprint-check a sealed file.
    pub fn unseal_file(&self, meta: &SealedFile, secret: &str) -> Result<Vec<u8>> {
        let blob = self.store.get(&meta.file_id)?;
        let plaintext = self.cipher.unseal(&blob, secret)?;

        let fingerprint = hex::encode(Sha256::digest(&plaintext));
        if fingerprint != meta.fingerprint {
            return Err(Error::ChecksumMismatch {
                path: meta.file_id.clone(),
            });
        }
        Ok(plaintext)
    }

    pub fn remove(&self, meta: &SealedFile) -> Result<()> {
        self.store.delete(&meta.file_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault(dir: &Path) -> Vault<AesFileCipher, LocalObjectStore> {
        Vault::new(AesFileCipher, LocalObjectStore::open(dir).unwrap())
    }

    #[test]
    fn test_seal_unseal_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("report.txt");
        fs::write(&src, b"quarterly numbers").unwrap();

        let v = vault(&dir.path().join("store"));
        let meta = v.seal_file(&src, "hunter2", FilePolicy::default()).unwrap();
        assert_eq!(meta.original_name, "report.txt");

        let plaintext = v.unseal_file(&meta, "hunter2").unwrap();
        assert_eq!(plaintext, b"quarterly numbers");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("secret.txt");
        fs::write(&src, b"payload").unwrap();

        let v = vault(&dir.path().join("store"));
        let meta = v.seal_file(&src, "correct", FilePolicy::default()).unwrap();

        assert!(matches!(
            v.unseal_file(&meta, "wrong"),
            Err(Error::DecryptionFailure(_))
        ));
    }

    #[test]
    fn test_blob_is_not_plaintext() {
        let cipher = AesFileCipher;
        let blob = cipher.seal(b"visible text", "s").unwrap();
        assert!(!blob.windows(12).any(|w| w == b"visible text"));
        // Nonce is random, so sealing twice yields different blobs.
        let blob2 = cipher.seal(b"visible text", "s").unwrap();
        assert_ne!(blob, blob2);
    }

    #[test]
    fn test_truncated_blob_rejected() {
        let cipher = AesFileCipher;
        assert!(matches!(
            cipher.unseal(&[0u8; 8], "s"),
            Err(Error::DecryptionFailure(_))
        ));
    }

    #[test]
    fn test_tampered_blob_rejected() {
        let cipher = AesFileCipher;
        let mut blob = cipher.seal(b"data", "s").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xff;
        assert!(matches!(
            cipher.unseal(&blob, "s"),
            Err(Error::DecryptionFailure(_))
        ));
    }

    #[test]
    fn test_remove_deletes_blob() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("f.txt");
        fs::write(&src, b"x").unwrap();

        let v = vault(&dir.path().join("store"));
        let meta = v.seal_file(&src, "s", FilePolicy::default()).unwrap();
        v.remove(&meta).unwrap();
        assert!(v.unseal_file(&meta, "s").is_err());
    }
}
