//! Branch and snapshot name validation.
//!
//! Valid branch names:
//! - Must be non-empty and at most 100 characters
//! - Must not contain whitespace, control characters, `~`, `^`, `:`, `?`, `*`, `[`, `\`
//! - Must not contain `..`
//! - Must not start or end with `.` or `/`
//! - Components between slashes must be non-empty

use crate::error::{BranchStoreError, Result};

/// Longest accepted branch name, in characters.
pub const MAX_BRANCH_NAME_LEN: usize = 100;

/// Longest accepted snapshot name, in characters.
pub const MAX_SNAPSHOT_NAME_LEN: usize = 200;

/// Characters that are forbidden anywhere in a branch name.
const FORBIDDEN_CHARS: &[char] = &['~', '^', ':', '?', '*', '[', '\\'];

fn invalid(name: &str, reason: impl Into<String>) -> BranchStoreError {
    BranchStoreError::InvalidBranchName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate a branch name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use scene_branches::names::validate_branch_name;
///
/// assert!(validate_branch_name("main").is_ok());
/// assert!(validate_branch_name("variant/open-kitchen").is_ok());
/// assert!(validate_branch_name("").is_err());
/// assert!(validate_branch_name("bad..name").is_err());
/// ```
pub fn validate_branch_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(name, "branch name must not be empty"));
    }

    if name.chars().count() > MAX_BRANCH_NAME_LEN {
        return Err(invalid(
            name,
            format!("must not exceed {MAX_BRANCH_NAME_LEN} characters"),
        ));
    }

    if let Some(ch) = name.chars().find(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid(
            name,
            format!("contains whitespace or control character: {ch:?}"),
        ));
    }

    for ch in FORBIDDEN_CHARS {
        if name.contains(*ch) {
            return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
        }
    }

    if name.contains("..") {
        return Err(invalid(name, "must not contain '..'"));
    }

    if name.starts_with('.') || name.ends_with('.') {
        return Err(invalid(name, "must not start or end with '.'"));
    }

    if name.starts_with('/') || name.ends_with('/') {
        return Err(invalid(name, "must not start or end with '/'"));
    }

    if name.split('/').any(str::is_empty) {
        return Err(invalid(name, "path components must not be empty"));
    }

    Ok(())
}

/// Validate a snapshot name. Snapshot names are free text: non-empty after
/// trimming, at most 200 characters, no control characters.
pub fn validate_snapshot_name(name: &str) -> Result<()> {
    let reason = if name.trim().is_empty() {
        Some("snapshot name must not be empty".to_string())
    } else if name.chars().count() > MAX_SNAPSHOT_NAME_LEN {
        Some(format!("must not exceed {MAX_SNAPSHOT_NAME_LEN} characters"))
    } else if name.chars().any(char::is_control) {
        Some("must not contain control characters".to_string())
    } else {
        None
    };
    match reason {
        Some(reason) => Err(BranchStoreError::InvalidSnapshotName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
