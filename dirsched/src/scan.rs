//! The per-file indexing operation.
//!
//! [`scan_path`] is the "execute job" step shared by the simulation loop and
//! both execution backends: it never fails, folding any I/O problem into the
//! returned record's `error` field.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::fmt::Display;
use std::fs::{File, Metadata};
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::ConfigError;
use crate::record::{FileFacts, IndexRecord};

const READ_BUFFER_BYTES: usize = 64 * 1024;

/// Content digest used for the `hash` field.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum HashAlgorithm {
    Sha224,
    #[default]
    Sha256,
    Sha384,
    Sha512,
    Blake3,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha224 => "sha224",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
            HashAlgorithm::Blake3 => "blake3",
        }
    }

    /// Hash everything `reader` yields, returning lowercase hex.
    pub fn hash_reader(&self, reader: impl Read) -> io::Result<String> {
        match self {
            HashAlgorithm::Sha224 => digest_hex::<Sha224>(reader),
            HashAlgorithm::Sha256 => digest_hex::<Sha256>(reader),
            HashAlgorithm::Sha384 => digest_hex::<Sha384>(reader),
            HashAlgorithm::Sha512 => digest_hex::<Sha512>(reader),
            HashAlgorithm::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                pump(reader, |chunk| {
                    hasher.update(chunk);
                })?;
                Ok(hasher.finalize().to_hex().to_string())
            }
        }
    }

    pub fn hash_file(&self, path: &Path) -> io::Result<String> {
        self.hash_reader(File::open(path)?)
    }
}

impl Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "sha224" => Ok(HashAlgorithm::Sha224),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha384" => Ok(HashAlgorithm::Sha384),
            "sha512" => Ok(HashAlgorithm::Sha512),
            "blake3" => Ok(HashAlgorithm::Blake3),
            _ => Err(ConfigError::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl TryFrom<String> for HashAlgorithm {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

fn digest_hex<D: Digest>(reader: impl Read) -> io::Result<String> {
    let mut hasher = D::new();
    pump(reader, |chunk| hasher.update(chunk))?;
    Ok(hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect())
}

fn pump(mut reader: impl Read, mut sink: impl FnMut(&[u8])) -> io::Result<()> {
    let mut buf = vec![0u8; READ_BUFFER_BYTES];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => sink(&buf[..n]),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}

/// Index one path: metadata without following links, then a content digest.
///
/// Symlinks are described but not hashed through; their `hash` is the digest
/// of the link target path string.
pub fn scan_path(path: &Path, algorithm: HashAlgorithm) -> IndexRecord {
    match collect_facts(path, algorithm) {
        Ok(facts) => IndexRecord::indexed(path, facts),
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "scan failed");
            IndexRecord::failed(path, describe_io_error(&err))
        }
    }
}

/// Render an I/O error the way records carry it: `"<Kind>: <message>"`.
pub fn describe_io_error(err: &io::Error) -> String {
    format!("{:?}: {}", err.kind(), err)
}

fn collect_facts(path: &Path, algorithm: HashAlgorithm) -> io::Result<FileFacts> {
    let meta = std::fs::symlink_metadata(path)?;
    let is_symlink = meta.file_type().is_symlink();
    let hash = if is_symlink {
        let target = std::fs::read_link(path)?;
        algorithm.hash_reader(target.as_os_str().as_encoded_bytes())?
    } else {
        algorithm.hash_file(path)?
    };

    let mime_guess = if is_symlink {
        None
    } else {
        sniff_mime(path)
    };

    let (owner, gid, mode) = ownership(&meta);
    Ok(FileFacts {
        size: meta.len(),
        mtime: epoch_secs(meta.modified()),
        atime: epoch_secs(meta.accessed()),
        ctime: change_secs(&meta),
        owner,
        gid,
        mode,
        extension: path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
            .unwrap_or_default(),
        mime_guess,
        is_symlink,
        hash,
        hash_algorithm: algorithm,
    })
}

fn epoch_secs(time: io::Result<SystemTime>) -> f64 {
    time.ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default()
}

#[cfg(unix)]
fn change_secs(meta: &Metadata) -> f64 {
    use std::os::unix::fs::MetadataExt;
    meta.ctime() as f64 + meta.ctime_nsec() as f64 / 1e9
}

#[cfg(not(unix))]
fn change_secs(meta: &Metadata) -> f64 {
    epoch_secs(meta.created())
}

/// MIME type recognised from the file's magic bytes, if any.
fn sniff_mime(path: &Path) -> Option<String> {
    match infer::get_from_path(path) {
        Ok(kind) => kind.map(|kind| kind.mime_type().to_string()),
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "mime sniff failed");
            None
        }
    }
}

#[cfg(unix)]
fn ownership(meta: &Metadata) -> (Option<u32>, Option<u32>, Option<String>) {
    use std::os::unix::fs::MetadataExt;
    (
        Some(meta.uid()),
        Some(meta.gid()),
        Some(format!("0o{:o}", meta.mode() & 0o7777)),
    )
}

#[cfg(not(unix))]
fn ownership(_meta: &Metadata) -> (Option<u32>, Option<u32>, Option<String>) {
    (None, None, None)
}
