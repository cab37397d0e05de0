//! Path checks for names that become directories on disk.

use anyhow::{Result, anyhow};
use std::path::{Component, Path};

/// Validates that `name` is a single plain path component.
///
/// Task names become directories under the working directory, so a name must
/// not climb out of it (`..`), be absolute, or contain separators.
///
/// # Errors
/// Returns an error describing the first problem found.
pub fn validate_file_name(name: &str) -> Result<()> {
    if name.contains('/') || name.contains('\\') {
        return Err(anyhow!("contains a path separator"));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == name => Ok(()),
        (Some(Component::ParentDir), _) => {
            Err(anyhow!("contains parent directory reference (..)"))
        }
        (Some(Component::CurDir), _) => Err(anyhow!("refers to the current directory")),
        (Some(Component::RootDir | Component::Prefix(_)), _) => Err(anyhow!("is an absolute path")),
        _ => Err(anyhow!("is not a single path component")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_file_name() {
        // Valid names
        assert!(validate_file_name("web-lb").is_ok());
        assert!(validate_file_name("task_1.v2").is_ok());

        // Invalid names
        assert!(validate_file_name("../escaped").is_err());
        assert!(validate_file_name("..").is_err());
        assert!(validate_file_name(".").is_err());
        assert!(validate_file_name("/abs").is_err());
        assert!(validate_file_name("a/b").is_err());
        assert!(validate_file_name("a\\b").is_err());
        assert!(validate_file_name("").is_err());
    }

    #[test]
    fn test_validate_file_name_reasons() {
        let err = validate_file_name("..").unwrap_err();
        assert!(err.to_string().contains(".."), "{err}");
        let err = validate_file_name("/abs").unwrap_err();
        assert!(err.to_string().contains("separator"), "{err}");
    }
}
