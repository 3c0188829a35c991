//! Temp-then-rename primitives for multi-file mutations.
//!
//! Writers build the new state in a hidden sibling of the destination and
//! rename it into place. When a destination already exists it is first moved
//! aside, so a failed swap (or a failure later in the same operation) can put
//! the previous content back.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{IoContext, Result, SkillError};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Allocate an unused hidden sibling path of `dst`, e.g. `.demo.tmp.4242.0`.
pub fn unique_temp_path(dst: &Path, tag: &str) -> Result<PathBuf> {
    let parent = dst.parent().ok_or_else(|| {
        SkillError::InvalidInput(format!("Path has no parent: {}", dst.display()))
    })?;
    let base = dst.file_name().ok_or_else(|| {
        SkillError::InvalidInput(format!("Path has no file name: {}", dst.display()))
    })?;

    for _ in 0..1000 {
        let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let candidate = parent.join(format!(
            ".{}.{}.{}.{}",
            base.to_string_lossy(),
            tag,
            std::process::id(),
            seq
        ));
        if fs::symlink_metadata(&candidate).is_err() {
            return Ok(candidate);
        }
    }

    Err(SkillError::io(
        format!("Failed to allocate a temp path for {}", dst.display()),
        std::io::Error::from(std::io::ErrorKind::AlreadyExists),
    ))
}

/// Write a single file via a temp sibling and rename.
pub fn write_file_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let tmp = unique_temp_path(path, "tmp")?;
    if let Err(err) = fs::write(&tmp, content) {
        let _ = fs::remove_file(&tmp);
        return Err(SkillError::io(
            format!("Failed to write temp file: {}", tmp.display()),
            err,
        ));
    }
    fs::rename(&tmp, path).map_err(|err| {
        let _ = fs::remove_file(&tmp);
        SkillError::io(format!("Failed to move file into place: {}", path.display()), err)
    })
}

/// Build a directory next to `dst` with `fill`, then swap it into place.
///
/// On any failure inside `fill` the temp directory is removed and `dst` is
/// left as it was.
pub fn stage_dir<F>(dst: &Path, fill: F) -> Result<Swap>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let parent = dst.parent().ok_or_else(|| {
        SkillError::InvalidInput(format!("Path has no parent: {}", dst.display()))
    })?;
    fs::create_dir_all(parent).with_path("create directory", parent)?;

    let tmp = unique_temp_path(dst, "tmp")?;
    fs::create_dir(&tmp).with_path("create temp directory", &tmp)?;

    if let Err(err) = fill(&tmp) {
        let _ = fs::remove_dir_all(&tmp);
        return Err(err);
    }

    Swap::replace(dst, &tmp).inspect_err(|_| {
        let _ = fs::remove_dir_all(&tmp);
    })
}

/// Build `dst` under a temp name with `fill`, then rename it into place
/// without ever replacing an existing entry.
///
/// `fill` receives the temp path and must create it (file or directory).
pub fn publish_new<F>(dst: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    if fs::symlink_metadata(dst).is_ok() {
        return Err(SkillError::AlreadyExists(dst.to_path_buf()));
    }
    let tmp = unique_temp_path(dst, "new")?;
    let cleanup = |tmp: &Path| {
        if fs::symlink_metadata(tmp).is_ok() {
            let _ = remove_path(tmp);
        }
    };

    if let Err(err) = fill(&tmp) {
        cleanup(&tmp);
        return Err(err);
    }
    if fs::symlink_metadata(dst).is_ok() {
        cleanup(&tmp);
        return Err(SkillError::AlreadyExists(dst.to_path_buf()));
    }
    fs::rename(&tmp, dst).map_err(|err| {
        cleanup(&tmp);
        SkillError::io(format!("Failed to move {} into place", dst.display()), err)
    })
}

/// A completed rename that still holds the previous content aside.
///
/// Call [`Swap::commit`] once the surrounding operation succeeded, or
/// [`Swap::revert`] to restore the previous state.
#[derive(Debug)]
#[must_use = "a swap must be committed or reverted"]
pub struct Swap {
    dst: PathBuf,
    backup: Option<PathBuf>,
}

impl Swap {
    /// Move `src` to `dst`, parking any existing `dst` under a temp name.
    pub fn replace(dst: &Path, src: &Path) -> Result<Self> {
        let backup = if fs::symlink_metadata(dst).is_ok() {
            let backup = unique_temp_path(dst, "old")?;
            fs::rename(dst, &backup).with_path("move aside", dst)?;
            Some(backup)
        } else {
            None
        };

        if let Err(err) = fs::rename(src, dst) {
            if let Some(backup) = &backup {
                let _ = fs::rename(backup, dst);
            }
            return Err(SkillError::io(
                format!(
                    "Failed to move {} into {}",
                    src.display(),
                    dst.display()
                ),
                err,
            ));
        }

        Ok(Self {
            dst: dst.to_path_buf(),
            backup,
        })
    }

    pub fn had_previous(&self) -> bool {
        self.backup.is_some()
    }

    /// Drop the parked previous content.
    pub fn commit(self) {
        if let Some(backup) = &self.backup
            && let Err(err) = remove_path(backup)
        {
            tracing::warn!(path = %backup.display(), error = %err, "Failed to remove swap backup");
        }
    }

    /// Put the previous content back (or remove `dst` if there was none).
    pub fn revert(self) -> Result<()> {
        if fs::symlink_metadata(&self.dst).is_ok() {
            remove_path(&self.dst).with_path("remove", &self.dst)?;
        }
        if let Some(backup) = &self.backup {
            fs::rename(backup, &self.dst).with_path("restore", &self.dst)?;
        }
        Ok(())
    }
}

/// Remove a file, symlink or directory tree.
pub fn remove_path(path: &Path) -> std::io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Recursively copy `src` into the existing directory `dst`.
///
/// Symlinks are followed; the copy holds plain files only.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in fs::read_dir(src).with_path("read directory", src)? {
        let entry = entry.with_path("read directory entry", src)?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let meta = fs::metadata(&from).with_path("stat", &from)?;

        if meta.is_dir() {
            fs::create_dir_all(&to).with_path("create directory", &to)?;
            copy_tree(&from, &to)?;
        } else if meta.is_file() {
            fs::copy(&from, &to).with_path("copy file", &from)?;
        } else {
            return Err(SkillError::InvalidInput(format!(
                "Unsupported filesystem entry type at {}",
                from.display()
            )));
        }
    }
    Ok(())
}

/// Copy a file or directory to `dst` (which must not exist yet).
pub fn copy_path(src: &Path, dst: &Path) -> Result<()> {
    let meta = fs::metadata(src).with_path("stat", src)?;
    if meta.is_dir() {
        fs::create_dir_all(dst).with_path("create directory", dst)?;
        copy_tree(src, dst)
    } else {
        fs::copy(src, dst).with_path("copy file", src)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stage_dir_creates_destination() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let dst = tmp.path().join("skills/demo");

        let swap = stage_dir(&dst, |dir| {
            fs::write(dir.join("SKILL.md"), "hello").with_path("write", dir)
        })
        .expect("stage_dir should succeed");
        assert!(!swap.had_previous());
        swap.commit();

        assert_eq!(
            fs::read_to_string(dst.join("SKILL.md")).expect("read should succeed"),
            "hello"
        );
    }

    #[test]
    fn test_failed_fill_leaves_destination_untouched() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let dst = tmp.path().join("demo");
        fs::create_dir_all(&dst).expect("create_dir_all should succeed");
        fs::write(dst.join("SKILL.md"), "original").expect("write should succeed");

        let result = stage_dir(&dst, |dir| {
            fs::write(dir.join("partial.md"), "half").with_path("write", dir)?;
            Err(SkillError::InvalidInput("boom".to_string()))
        });
        assert!(result.is_err());

        assert_eq!(
            fs::read_to_string(dst.join("SKILL.md")).expect("read should succeed"),
            "original"
        );
        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .expect("read_dir should succeed")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(leftovers, vec!["demo".to_string()]);
    }

    #[test]
    fn test_revert_restores_previous_content() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let dst = tmp.path().join("demo");
        fs::create_dir_all(&dst).expect("create_dir_all should succeed");
        fs::write(dst.join("SKILL.md"), "v1").expect("write should succeed");

        let swap = stage_dir(&dst, |dir| {
            fs::write(dir.join("SKILL.md"), "v2").with_path("write", dir)
        })
        .expect("stage_dir should succeed");
        assert!(swap.had_previous());
        assert_eq!(
            fs::read_to_string(dst.join("SKILL.md")).expect("read should succeed"),
            "v2"
        );

        swap.revert().expect("revert should succeed");
        assert_eq!(
            fs::read_to_string(dst.join("SKILL.md")).expect("read should succeed"),
            "v1"
        );
    }

    #[test]
    fn test_publish_new_never_replaces() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let dst = tmp.path().join("demo");
        publish_new(&dst, |t| fs::write(t, "first").with_path("write", t))
            .expect("publish_new should succeed");

        let err = publish_new(&dst, |t| fs::write(t, "second").with_path("write", t))
            .expect_err("existing destination should be rejected");
        assert_eq!(err.kind(), "AlreadyExistsError");
        assert_eq!(fs::read_to_string(&dst).expect("read should succeed"), "first");
        assert_eq!(fs::read_dir(tmp.path()).expect("read_dir should succeed").count(), 1);
    }

    #[test]
    fn test_write_file_atomic_overwrites() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let file = tmp.path().join("notes.md");
        fs::write(&file, "old").expect("write should succeed");
        write_file_atomic(&file, b"new").expect("write_file_atomic should succeed");
        assert_eq!(fs::read_to_string(&file).expect("read should succeed"), "new");
    }

    #[test]
    fn test_copy_path_copies_nested_tree() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("refs")).expect("create_dir_all should succeed");
        fs::write(src.join("SKILL.md"), "entry").expect("write should succeed");
        fs::write(src.join("refs/a.md"), "ref").expect("write should succeed");

        let dst = tmp.path().join("dst");
        copy_path(&src, &dst).expect("copy_path should succeed");
        assert_eq!(
            fs::read_to_string(dst.join("refs/a.md")).expect("read should succeed"),
            "ref"
        );
    }
}
