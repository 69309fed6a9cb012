//! The shared token: generation, persistence, and the live in-memory copy.
//!
//! The token proves to the listener that envelopes come from this relay.
//! It is generated once, persisted base64-encoded, and reused across
//! restarts until an operator resets it.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use parking_lot::{Mutex, RwLock};
use rand::Rng;

use crate::TokenError;

/// Number of characters in a generated token.
pub const TOKEN_LEN: usize = 16;

const TOKEN_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// An opaque, non-empty shared secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// Wraps an existing value.
    ///
    /// # Errors
    /// Returns [`TokenError::Corrupt`] for an empty value.
    pub fn new(value: impl Into<String>) -> Result<Self, TokenError> {
        let value = value.into();
        if value.is_empty() {
            return Err(TokenError::Corrupt("token is empty".into()));
        }
        Ok(Self(value))
    }

    /// Draws [`TOKEN_LEN`] characters uniformly from `[a-z0-9]`.
    ///
    /// Uses the thread-local RNG; the token guards a trusted local
    /// integration, not an adversarial boundary.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let value = (0..TOKEN_LEN)
            .map(|_| {
                TOKEN_ALPHABET[rng.random_range(0..TOKEN_ALPHABET.len())]
                    as char
            })
            .collect();
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// TokenCell
// ---------------------------------------------------------------------------

/// The live token, shared between the command surface and the session
/// worker.
///
/// Readers always see a whole token: a reset swaps the value under a
/// write lock.
#[derive(Debug, Clone)]
pub struct TokenCell(Arc<RwLock<Token>>);

impl TokenCell {
    pub fn new(token: Token) -> Self {
        Self(Arc::new(RwLock::new(token)))
    }

    /// Returns a copy of the current token.
    pub fn get(&self) -> Token {
        self.0.read().clone()
    }

    /// Replaces the current token.
    pub fn set(&self, token: Token) {
        *self.0.write() = token;
    }
}

// ---------------------------------------------------------------------------
// Blob storage
// ---------------------------------------------------------------------------

/// A get/set byte-blob service holding exactly one value.
pub trait BlobStore: Send + Sync {
    /// Returns the stored blob, or `None` if nothing was ever stored.
    fn get(&self) -> io::Result<Option<Vec<u8>>>;

    /// Replaces the stored blob.
    fn set(&self, data: &[u8]) -> io::Result<()>;
}

/// A [`BlobStore`] backed by a single file.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    path: PathBuf,
}

impl FileBlobStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlobStore for FileBlobStore {
    fn get(&self) -> io::Result<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&self, data: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, data)
    }
}

/// An in-process [`BlobStore`], for tests and embedders without a disk.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    data: Mutex<Option<Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `data`.
    pub fn with_contents(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Mutex::new(Some(data.into())),
        }
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.data.lock().clone())
    }

    fn set(&self, data: &[u8]) -> io::Result<()> {
        *self.data.lock() = Some(data.to_vec());
        Ok(())
    }
}

impl<S: BlobStore + ?Sized> BlobStore for Arc<S> {
    fn get(&self) -> io::Result<Option<Vec<u8>>> {
        (**self).get()
    }

    fn set(&self, data: &[u8]) -> io::Result<()> {
        (**self).set(data)
    }
}

// ---------------------------------------------------------------------------
// TokenStore
// ---------------------------------------------------------------------------

/// Loads, generates, and persists the token through a [`BlobStore`].
///
/// The blob holds the token base64-encoded.
pub struct TokenStore {
    store: Box<dyn BlobStore>,
}

impl TokenStore {
    pub fn new(store: impl BlobStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// Reads and decodes the persisted token.
    ///
    /// # Errors
    /// - [`TokenError::NotFound`] — nothing stored yet
    /// - [`TokenError::Corrupt`] — undecodable or empty content
    /// - [`TokenError::Io`] — the store could not be read
    pub fn load(&self) -> Result<Token, TokenError> {
        let blob = self.store.get()?.ok_or(TokenError::NotFound)?;
        let decoded = STANDARD
            .decode(blob.trim_ascii())
            .map_err(|e| TokenError::Corrupt(e.to_string()))?;
        let value = String::from_utf8(decoded)
            .map_err(|e| TokenError::Corrupt(e.to_string()))?;
        Token::new(value)
    }

    /// Produces a fresh token. Does not persist it.
    pub fn generate(&self) -> Token {
        Token::generate()
    }

    /// Persists `token` in encoded form.
    ///
    /// # Errors
    /// Returns [`TokenError::Io`] if the store rejects the write. The
    /// in-memory token stays valid for the running process.
    pub fn save(&self, token: &Token) -> Result<(), TokenError> {
        let encoded = STANDARD.encode(token.as_str());
        self.store.set(encoded.as_bytes())?;
        Ok(())
    }

    /// Returns the persisted token, or generates and persists a new one
    /// when none is usable. Never fails: storage errors are logged.
    pub fn load_or_generate(&self) -> Token {
        match self.load() {
            Ok(token) => {
                tracing::info!(%token, "loaded token");
                token
            }
            Err(e) => {
                if !matches!(e, TokenError::NotFound) {
                    tracing::warn!(error = %e, "stored token unusable, regenerating");
                }
                let token = self.generate();
                if let Err(e) = self.save(&token) {
                    tracing::warn!(error = %e, "failed to persist token");
                }
                tracing::info!(%token, "generated new token");
                token
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
