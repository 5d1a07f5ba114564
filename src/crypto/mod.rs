//! Field-level encryption for data at rest.
//!
//! A single ChaCha20-Poly1305 key, persisted next to the database, protects
//! the sensitive columns and the audit log. Ciphertext is carried as a
//! self-describing token (`fd1:` prefix + base64 of nonce and ciphertext) so
//! stored values declare whether they are encrypted; pre-encryption rows are
//! recognised by the absent prefix instead of by a failed decrypt.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chacha20poly1305::{
    ChaCha20Poly1305, Key, KeyInit, Nonce,
    aead::{Aead, OsRng, rand_core::RngCore},
};
use tracing::warn;
use zeroize::Zeroizing;

/// Prefix marking a value as an encrypted field token.
pub const TOKEN_PREFIX: &str = "fd1:";

const NONCE_LEN: usize = 12;
const SALT_LEN: usize = 16;
const KEY_FILE: &str = "field.key";
const SALT_FILE: &str = "field.salt";
/// Magic bytes at the start of an encrypted file.
const FILE_MAGIC: &[u8; 4] = b"FD1F";

/// A stored value classified by its on-disk representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedField {
    /// Was an `fd1:` token; carries the recovered plaintext.
    Encrypted(String),
    /// Predates field encryption; carried through verbatim.
    Legacy(String),
}

impl DecodedField {
    /// Collapses both variants to the plaintext value.
    #[must_use]
    pub fn into_plaintext(self) -> String {
        match self {
            Self::Encrypted(s) | Self::Legacy(s) => s,
        }
    }
}

/// Process-wide symmetric cipher for sensitive fields and files.
pub struct FieldCipher {
    cipher: ChaCha20Poly1305,
    key_path: PathBuf,
    salt_path: PathBuf,
}

impl FieldCipher {
    /// Loads the key from `data_dir`, generating and persisting key and salt
    /// files (owner-only permissions) on first use.
    pub fn load_or_create(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data dir: {}", data_dir.display()))?;

        let key_path = data_dir.join(KEY_FILE);
        let salt_path = data_dir.join(SALT_FILE);

        let key = Self::read_or_create_key(&key_path)?;
        Self::ensure_salt(&salt_path)?;

        Ok(Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key.as_slice())),
            key_path,
            salt_path,
        })
    }

    /// Generates a fresh key, snapshotting the old one to `field.key.bak`.
    ///
    /// Destructive: every value encrypted under the previous key becomes
    /// permanently undecryptable. Callers must warn the operator first.
    pub fn rotate(data_dir: &Path) -> Result<Self> {
        let key_path = data_dir.join(KEY_FILE);
        if key_path.exists() {
            let backup = key_path.with_extension("key.bak");
            fs::copy(&key_path, &backup).with_context(|| {
                format!("Failed to snapshot old key to {}", backup.display())
            })?;
            fs::remove_file(&key_path).context("Failed to remove old key file")?;
        }
        Self::load_or_create(data_dir)
    }

    fn read_or_create_key(path: &Path) -> Result<Zeroizing<Vec<u8>>> {
        if path.exists() {
            let key = Zeroizing::new(
                fs::read(path)
                    .with_context(|| format!("Failed to read key file: {}", path.display()))?,
            );
            if key.len() != 32 {
                bail!("Key file {} is corrupt (expected 32 bytes)", path.display());
            }
            return Ok(key);
        }

        let mut key = Zeroizing::new(vec![0_u8; 32]);
        OsRng.fill_bytes(&mut key);
        write_restricted(path, &key)?;
        Ok(key)
    }

    fn ensure_salt(path: &Path) -> Result<()> {
        if path.exists() {
            return Ok(());
        }
        let mut salt = [0_u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        write_restricted(path, &salt)
    }

    /// Encrypts a field value into a self-contained token.
    ///
    /// The empty string short-circuits to itself so optional columns stay
    /// recognisably empty.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let mut nonce = [0_u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| anyhow!("Field encryption failed"))?;

        let mut raw = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        raw.extend_from_slice(&nonce);
        raw.extend_from_slice(&ciphertext);

        Ok(format!("{TOKEN_PREFIX}{}", BASE64.encode(raw)))
    }

    /// Classifies and decodes a stored value.
    ///
    /// Values without the token prefix are legacy plaintext. A prefixed value
    /// that fails authentication is genuine corruption and is reported as an
    /// error rather than passed through.
    pub fn decode(&self, stored: &str) -> Result<DecodedField> {
        let Some(encoded) = stored.strip_prefix(TOKEN_PREFIX) else {
            return Ok(DecodedField::Legacy(stored.to_string()));
        };

        let raw = BASE64
            .decode(encoded)
            .context("Field token is not valid base64")?;
        if raw.len() <= NONCE_LEN {
            bail!("Field token too short");
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| anyhow!("Field token failed authentication"))?;

        Ok(DecodedField::Encrypted(
            String::from_utf8(plaintext).context("Decrypted field is not UTF-8")?,
        ))
    }

    /// Best-effort decrypt for read paths that must never fail: corrupt
    /// tokens are logged and returned verbatim.
    #[must_use]
    pub fn decrypt_lossy(&self, stored: &str) -> String {
        match self.decode(stored) {
            Ok(field) => field.into_plaintext(),
            Err(e) => {
                warn!(error = %e, "Undecryptable field returned as stored");
                stored.to_string()
            }
        }
    }

    /// Encrypts a whole file to `dest`.
    pub fn encrypt_file(&self, src: &Path, dest: &Path) -> Result<()> {
        let data = fs::read(src)
            .with_context(|| format!("Failed to read file for encryption: {}", src.display()))?;

        let mut nonce = [0_u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), data.as_slice())
            .map_err(|_| anyhow!("File encryption failed"))?;

        let mut out = Vec::with_capacity(FILE_MAGIC.len() + NONCE_LEN + ciphertext.len());
        out.extend_from_slice(FILE_MAGIC);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);

        fs::write(dest, out)
            .with_context(|| format!("Failed to write encrypted file: {}", dest.display()))
    }

    /// Decrypts a file produced by [`Self::encrypt_file`].
    pub fn decrypt_file(&self, src: &Path, dest: &Path) -> Result<()> {
        let data = fs::read(src)
            .with_context(|| format!("Failed to read encrypted file: {}", src.display()))?;

        let rest = data
            .strip_prefix(FILE_MAGIC.as_slice())
            .ok_or_else(|| anyhow!("{} is not an encrypted file", src.display()))?;
        if rest.len() <= NONCE_LEN {
            bail!("Encrypted file {} is truncated", src.display());
        }

        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| anyhow!("File failed authentication: {}", src.display()))?;

        fs::write(dest, plaintext)
            .with_context(|| format!("Failed to write decrypted file: {}", dest.display()))
    }

    /// Path of the persisted key file, bundled into backups.
    #[must_use]
    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    /// Path of the persisted salt file, bundled into backups when present.
    #[must_use]
    pub fn salt_path(&self) -> &Path {
        &self.salt_path
    }
}

fn write_restricted(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to restrict permissions on {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_cipher() -> (FieldCipher, PathBuf) {
        let dir = std::env::temp_dir().join(format!("fleetdesk-crypto-{}", uuid::Uuid::new_v4()));
        let cipher = FieldCipher::load_or_create(&dir).unwrap();
        (cipher, dir)
    }

    #[test]
    fn round_trips_plaintext_including_multibyte() {
        let (cipher, _dir) = temp_cipher();
        for input in ["hello", "straat 12-b", "unicode: áé 中文 🛴"] {
            let token = cipher.encrypt(input).unwrap();
            assert!(token.starts_with(TOKEN_PREFIX));
            assert_eq!(cipher.decode(&token).unwrap(), DecodedField::Encrypted(input.to_string()));
        }
    }

    #[test]
    fn empty_string_short_circuits() {
        let (cipher, _dir) = temp_cipher();
        assert_eq!(cipher.encrypt("").unwrap(), "");
        assert_eq!(cipher.decrypt_lossy(""), "");
    }

    #[test]
    fn legacy_plaintext_passes_through_unchanged() {
        let (cipher, _dir) = temp_cipher();
        assert_eq!(
            cipher.decode("plain old value").unwrap(),
            DecodedField::Legacy("plain old value".to_string())
        );
        assert_eq!(cipher.decrypt_lossy("plain old value"), "plain old value");
    }

    #[test]
    fn corrupt_token_is_an_error_not_legacy() {
        let (cipher, _dir) = temp_cipher();
        let mut token = cipher.encrypt("sensitive").unwrap();
        token.truncate(token.len() - 4);
        token.push_str("AAAA");
        assert!(cipher.decode(&token).is_err());
        // Lossy reads degrade to the stored value instead of failing.
        assert_eq!(cipher.decrypt_lossy(&token), token);
    }

    #[test]
    fn key_is_stable_across_reloads() {
        let (cipher, dir) = temp_cipher();
        let token = cipher.encrypt("persisted").unwrap();

        let reloaded = FieldCipher::load_or_create(&dir).unwrap();
        assert_eq!(reloaded.decrypt_lossy(&token), "persisted");
    }

    #[test]
    fn rotation_orphans_previous_ciphertext() {
        let (cipher, dir) = temp_cipher();
        let token = cipher.encrypt("old world").unwrap();

        let rotated = FieldCipher::rotate(&dir).unwrap();
        assert!(rotated.decode(&token).is_err());
        assert!(dir.join("field.key.bak").exists());
    }

    #[test]
    fn file_round_trip() {
        let (cipher, dir) = temp_cipher();
        let src = dir.join("note.txt");
        let enc = dir.join("note.txt.enc");
        let out = dir.join("note.out.txt");
        fs::write(&src, b"file body").unwrap();

        cipher.encrypt_file(&src, &enc).unwrap();
        assert_ne!(fs::read(&enc).unwrap(), b"file body");
        cipher.decrypt_file(&enc, &out).unwrap();
        assert_eq!(fs::read(&out).unwrap(), b"file body");
    }
}
