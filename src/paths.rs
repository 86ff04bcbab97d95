use anyhow::{Context, Result};
use std::path::PathBuf;

pub fn is_safe_path_component(s: &str) -> bool {
    !s.is_empty()
        && !s.contains('/')
        && !s.contains('\\')
        && !s.contains('\0')
        && s != ".."
        && s != "."
}

pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .context("Could not determine config directory")
        .map(|p| p.join("tempo-tray"))
}

pub fn animations_dir() -> Result<PathBuf> {
    config_dir().map(|p| p.join("animations"))
}

pub fn settings_path() -> Result<PathBuf> {
    config_dir().map(|p| p.join("settings.toml"))
}

pub fn open_in_file_manager(path: &std::path::Path) -> Result<()> {
    open::that(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_have_correct_suffixes() {
        let cases: Vec<(Result<PathBuf>, &str)> = vec![
            (config_dir(), "tempo-tray"),
            (animations_dir(), "tempo-tray/animations"),
            (settings_path(), "settings.toml"),
        ];

        for (result, expected_suffix) in cases {
            let path = result.unwrap();
            assert!(path.ends_with(expected_suffix), "path {:?} should end with {}", path, expected_suffix);
        }
    }

    #[test]
    fn is_safe_path_component_cases() {
        let valid = [
            "flame",
            "my_frames",
            "cat123",
            "UPPERCASE",
            "a",
            ".hidden",
            "__logo__",
            "frames..old",
        ];

        for s in valid {
            assert!(is_safe_path_component(s), "should be valid: {:?}", s);
        }

        let invalid = [
            "../etc",
            "foo/bar",
            "foo\\bar",
            "..",
            ".",
            "",
            "anim\0evil",
            "/anim",
            "anim/",
            "a/b/c",
        ];

        for s in invalid {
            assert!(!is_safe_path_component(s), "should be invalid: {:?}", s);
        }
    }
}
