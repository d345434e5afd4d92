//! Content hashing
//!
//! Files are hashed by streaming their content through the configured
//! algorithm. When last-modified tracking is on and the file's timestamp still
//! matches the known one, hashing is skipped entirely.

use crate::error::{DbafsError, FilesystemError, FsOperation};
use crate::filesystem::FilesystemAdapter;
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::io::Read;
use std::str::FromStr;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Supported hash algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Blake3,
    Sha256,
    Sha512,
}

impl FromStr for HashAlgorithm {
    type Err = DbafsError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "blake3" => Ok(HashAlgorithm::Blake3),
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "sha512" | "sha-512" => Ok(HashAlgorithm::Sha512),
            _ => Err(DbafsError::UnsupportedHashAlgorithm(name.to_string())),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Blake3 => f.write_str("blake3"),
            HashAlgorithm::Sha256 => f.write_str("sha256"),
            HashAlgorithm::Sha512 => f.write_str("sha512"),
        }
    }
}

enum StreamHasher {
    Blake3(Box<blake3::Hasher>),
    Sha256(Sha256),
    Sha512(Sha512),
}

impl StreamHasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Blake3 => StreamHasher::Blake3(Box::new(blake3::Hasher::new())),
            HashAlgorithm::Sha256 => StreamHasher::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => StreamHasher::Sha512(Sha512::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            StreamHasher::Blake3(h) => {
                h.update(data);
            }
            StreamHasher::Sha256(h) => h.update(data),
            StreamHasher::Sha512(h) => h.update(data),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            StreamHasher::Blake3(h) => h.finalize().to_hex().to_string(),
            StreamHasher::Sha256(h) => hex::encode(h.finalize()),
            StreamHasher::Sha512(h) => hex::encode(h.finalize()),
        }
    }
}

/// What is already known about a file before hashing it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashContext {
    /// Previously recorded hash
    pub fallback_hash: Option<String>,
    /// Previously recorded modification time
    pub last_modified: Option<i64>,
}

impl HashContext {
    pub fn new(fallback_hash: Option<String>, last_modified: Option<i64>) -> Self {
        Self {
            fallback_hash,
            last_modified,
        }
    }
}

/// Result of hashing a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileHash {
    /// Content was read and hashed
    Computed {
        hash: String,
        last_modified: Option<i64>,
    },
    /// The modification time matches the known one; the fallback hash still applies
    Unchanged,
}

/// Hash generator for file contents and strings
#[derive(Debug, Clone)]
pub struct HashGenerator {
    algorithm: HashAlgorithm,
    use_last_modified: bool,
}

impl HashGenerator {
    /// Create a generator for the named algorithm; fails if the algorithm is unknown
    pub fn new(algorithm: &str, use_last_modified: bool) -> Result<Self, DbafsError> {
        Ok(Self {
            algorithm: algorithm.parse()?,
            use_last_modified,
        })
    }

    pub fn with_algorithm(algorithm: HashAlgorithm, use_last_modified: bool) -> Self {
        Self {
            algorithm,
            use_last_modified,
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn uses_last_modified(&self) -> bool {
        self.use_last_modified
    }

    pub fn hash_string(&self, value: &str) -> String {
        let mut hasher = StreamHasher::new(self.algorithm);
        hasher.update(value.as_bytes());
        hasher.finalize_hex()
    }

    /// Hash the content of `path`, or report it unchanged based on `context`
    pub fn hash_file_content(
        &self,
        filesystem: &dyn FilesystemAdapter,
        path: &str,
        context: &HashContext,
    ) -> Result<FileHash, FilesystemError> {
        let last_modified = if self.use_last_modified {
            filesystem.last_modified(path)?
        } else {
            None
        };

        if let (Some(known), Some(current), Some(_)) =
            (context.last_modified, last_modified, &context.fallback_hash)
        {
            if known == current {
                return Ok(FileHash::Unchanged);
            }
        }

        let mut reader = filesystem.read(path)?;
        let mut hasher = StreamHasher::new(self.algorithm);
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let read = reader
                .read(&mut buffer)
                .map_err(|e| FilesystemError::new(FsOperation::Read, path, e))?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(FileHash::Computed {
            hash: hasher.finalize_hex(),
            last_modified,
        })
    }
}
