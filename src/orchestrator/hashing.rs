//! SHA-256 of the full image, computed in 1 MiB chunks (spec.md §6), plus
//! the path-traversal containment check the `/hash` and `/upload` endpoints
//! rely on.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::ScanError;

const CHUNK_SIZE: usize = 1024 * 1024;

pub fn hash_file(path: impl AsRef<Path>) -> Result<String, ScanError> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ScanError::Input(format!("file not found: {}", path.display()))
        } else {
            ScanError::Io(e)
        }
    })?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Resolve `candidate` against `base_dir`, rejecting any path that escapes
/// it (spec.md §6: the `/hash` endpoint "reject[s] traversal with `403`").
/// Both sides are canonicalized so `..`, symlinks, and relative segments
/// can't sneak the result outside `base_dir`.
pub fn resolve_within(base_dir: impl AsRef<Path>, candidate: impl AsRef<Path>) -> Result<PathBuf, ScanError> {
    let base_dir = base_dir.as_ref();
    let candidate = candidate.as_ref();

    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    };

    let canonical_base = base_dir
        .canonicalize()
        .map_err(|e| ScanError::Input(format!("upload directory unavailable: {e}")))?;
    let canonical_candidate = joined
        .canonicalize()
        .map_err(|_| ScanError::Protocol { status: 403, message: "path does not exist".into() })?;

    if canonical_candidate.starts_with(&canonical_base) {
        Ok(canonical_candidate)
    } else {
        Err(ScanError::Protocol {
            status: 403,
            message: format!("{} escapes upload directory", candidate.display()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn hash_matches_known_vector_for_empty_file() {
        let f = NamedTempFile::new().unwrap();
        let digest = hash_file(f.path()).unwrap();
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn hash_is_deterministic_across_chunk_boundary() {
        let mut f = NamedTempFile::new().unwrap();
        let data = vec![0x42u8; 1024 * 1024 * 3 + 17];
        f.write_all(&data).unwrap();
        let a = hash_file(f.path()).unwrap();
        let b = hash_file(f.path()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn resolve_within_accepts_nested_path() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("session_1.dd");
        std::fs::write(&nested, b"data").unwrap();

        let resolved = resolve_within(dir.path(), "session_1.dd").unwrap();
        assert_eq!(resolved, nested.canonicalize().unwrap());
    }

    #[test]
    fn resolve_within_rejects_traversal() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let secret = outside.path().join("secret.dd");
        std::fs::write(&secret, b"data").unwrap();

        let traversal = format!("../{}/secret.dd", outside.path().file_name().unwrap().to_string_lossy());
        let err = resolve_within(dir.path(), traversal).unwrap_err();
        assert!(matches!(err, ScanError::Protocol { status: 403, .. }));
    }
}
