//! Deterministic content hashing for installed skill folders.
//!
//! The hash recorded at install time is what uninstall compares against, so
//! the traversal order and encoding must never depend on creation order.

use std::fs;
use std::path::Path;

use crate::error::{IoContext, Result, SkillError};

/// Compute a stable blake3 hash over a directory tree (or a single file).
///
/// Entries are visited in lexicographic order. Each file contributes
/// `relative_path || 0x00 || content`, each directory `relative_path || 0xFF`.
/// Symlinks are rejected so a link swapped in after install cannot pass
/// verification.
pub fn hash_tree(path: &Path) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    let meta = fs::symlink_metadata(path).with_path("stat", path)?;
    if meta.is_file() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        hash_file(&mut hasher, path, &name)?;
    } else if meta.is_dir() {
        hash_dir(&mut hasher, path, "")?;
    } else {
        return Err(SkillError::InvalidInput(format!(
            "Cannot hash symlink or special file: {}",
            path.display()
        )));
    }
    Ok(hasher.finalize().to_hex().to_string())
}

fn hash_dir(hasher: &mut blake3::Hasher, dir: &Path, base: &str) -> Result<()> {
    let mut entries = fs::read_dir(dir)
        .with_path("read directory", dir)?
        .collect::<std::io::Result<Vec<_>>>()
        .with_path("read directory entries", dir)?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name().to_string_lossy().to_string();
        let rel_path = if base.is_empty() {
            name
        } else {
            format!("{}/{}", base, name)
        };
        let path = entry.path();
        let ty = entry.file_type().with_path("stat", &path)?;

        if ty.is_dir() {
            hasher.update(rel_path.as_bytes());
            hasher.update(&[0xFF]);
            hash_dir(hasher, &path, &rel_path)?;
        } else if ty.is_file() {
            hash_file(hasher, &path, &rel_path)?;
        } else {
            return Err(SkillError::InvalidInput(format!(
                "Unsupported filesystem entry (symlink or special file): {}",
                path.display()
            )));
        }
    }
    Ok(())
}

fn hash_file(hasher: &mut blake3::Hasher, path: &Path, rel_path: &str) -> Result<()> {
    hasher.update(rel_path.as_bytes());
    hasher.update(&[0x00]);
    let content = fs::read(path).with_path("read file", path)?;
    hasher.update(&content);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create_dir_all should succeed in test temp dirs");
        }
        fs::write(path, content).expect("write should succeed in test temp dirs");
    }

    #[test]
    fn test_hash_is_independent_of_creation_order() {
        let tmp1 = TempDir::new().expect("tempdir should succeed");
        write_file(&tmp1.path().join("a.md"), "content a");
        write_file(&tmp1.path().join("refs/b.md"), "content b");

        let tmp2 = TempDir::new().expect("tempdir should succeed");
        write_file(&tmp2.path().join("refs/b.md"), "content b");
        write_file(&tmp2.path().join("a.md"), "content a");

        let hash1 = hash_tree(tmp1.path()).expect("hash_tree should succeed");
        let hash2 = hash_tree(tmp2.path()).expect("hash_tree should succeed");
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_hash_changes_with_content_and_name() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        write_file(&tmp.path().join("SKILL.md"), "v1");
        let original = hash_tree(tmp.path()).expect("hash_tree should succeed");

        write_file(&tmp.path().join("SKILL.md"), "v2");
        let edited = hash_tree(tmp.path()).expect("hash_tree should succeed");
        assert_ne!(original, edited);

        fs::remove_file(tmp.path().join("SKILL.md")).expect("remove should succeed");
        write_file(&tmp.path().join("skill.md"), "v2");
        let renamed = hash_tree(tmp.path()).expect("hash_tree should succeed");
        assert_ne!(edited, renamed);
    }

    #[test]
    fn test_single_file_hash() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let file = tmp.path().join("CLAUDE.md");
        write_file(&file, "hello");
        let hash = hash_tree(&file).expect("hash_tree should succeed");
        assert_eq!(hash.len(), 64);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_is_rejected() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        write_file(&tmp.path().join("real.md"), "x");
        std::os::unix::fs::symlink(tmp.path().join("real.md"), tmp.path().join("link.md"))
            .expect("symlink should succeed");
        assert!(hash_tree(tmp.path()).is_err());
    }

    #[test]
    fn test_nonexistent_path_fails() {
        let result = hash_tree(Path::new("/nonexistent/path/that/does/not/exist"));
        assert!(matches!(result, Err(SkillError::Io { .. })));
    }
}
