//! Config path resolution helpers.

use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "config.toml";

pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Expand a leading `~` or `~/` against `home`; other paths pass through.
pub fn expand_home(path: &Path, home: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) if rest.as_os_str().is_empty() => home.to_path_buf(),
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_home() {
        let home = Path::new("/home/me");
        assert_eq!(
            expand_home(Path::new("~/.claude/skills"), home),
            PathBuf::from("/home/me/.claude/skills")
        );
        assert_eq!(expand_home(Path::new("~"), home), PathBuf::from("/home/me"));
        assert_eq!(
            expand_home(Path::new("/opt/skills"), home),
            PathBuf::from("/opt/skills")
        );
        assert_eq!(
            expand_home(Path::new("~other/x"), home),
            PathBuf::from("~other/x")
        );
    }
}
