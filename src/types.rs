use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

const MAX_NAME_LEN: usize = 128;
const MAX_PATH_LEN: usize = 256;

fn validate_simple_name(value: &str, kind: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidId(format!("{kind} must not be empty")));
    }
    if trimmed.len() > MAX_NAME_LEN {
        return Err(Error::InvalidId(format!(
            "{kind} length must be <= {MAX_NAME_LEN}"
        )));
    }
    if !trimmed.chars().all(is_allowed_name_char) {
        return Err(Error::InvalidId(format!(
            "{kind} contains invalid characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn is_allowed_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, ':' | '_' | '-')
}

macro_rules! define_id_type {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
        #[derive(serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a validated identifier.
            pub fn new(value: impl AsRef<str>) -> Result<Self> {
                validate_simple_name(value.as_ref(), $kind).map(Self)
            }

            /// Creates an identifier from a trusted string without validation.
            pub fn from_string(value: String) -> Self {
                Self(value)
            }

            /// Returns the underlying string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<&str> for $name {
            type Error = Error;

            fn try_from(value: &str) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::from_string(value)
            }
        }
    };
}

define_id_type!(
    /// User identifier.
    UserId,
    "user id"
);
define_id_type!(
    /// Session identifier.
    SessionId,
    "session id"
);
define_id_type!(
    /// Menu node identifier.
    MenuNodeId,
    "menu node id"
);
define_id_type!(
    /// Role name.
    RoleName,
    "role name"
);

/// Set of role names with defined equality and intersection.
///
/// Every component that reasons about grants (the gate, the matrix, the menu
/// tree) speaks in terms of this type instead of ad hoc string lists.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<RoleName>);

impl RoleSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a role, returning whether it was newly added.
    pub fn insert(&mut self, role: RoleName) -> bool {
        self.0.insert(role)
    }

    /// Removes a role, returning whether it was present.
    pub fn remove(&mut self, role: &str) -> bool {
        self.0.remove(role)
    }

    /// Returns whether the named role is a member.
    pub fn contains(&self, role: &str) -> bool {
        self.0.contains(role)
    }

    /// Returns whether the two sets share at least one role.
    pub fn intersects(&self, other: &RoleSet) -> bool {
        let (small, large) = if self.0.len() <= other.0.len() {
            (&self.0, &other.0)
        } else {
            (&other.0, &self.0)
        };
        small.iter().any(|role| large.contains(role))
    }

    /// Returns whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of roles.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates roles in name order.
    pub fn iter(&self) -> impl Iterator<Item = &RoleName> {
        self.0.iter()
    }
}

impl FromIterator<RoleName> for RoleSet {
    fn from_iter<I: IntoIterator<Item = RoleName>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<RoleName> for RoleSet {
    fn extend<I: IntoIterator<Item = RoleName>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for RoleSet {
    type Item = RoleName;
    type IntoIter = std::collections::btree_set::IntoIter<RoleName>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a RoleSet {
    type Item = &'a RoleName;
    type IntoIter = std::collections::btree_set::Iter<'a, RoleName>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Route path template as registered with the router (`/users/:id`).
///
/// Placeholder syntax is preserved verbatim; matching is always against the
/// template, never the substituted URL.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct RoutePath(String);

impl RoutePath {
    /// Creates a validated route path.
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidRoute("route path must not be empty".into()));
        }
        if trimmed.len() > MAX_PATH_LEN {
            return Err(Error::InvalidRoute(format!(
                "route path length must be <= {MAX_PATH_LEN}"
            )));
        }
        if !trimmed.starts_with('/') {
            return Err(Error::InvalidRoute(
                "route path must start with '/'".into(),
            ));
        }
        if !trimmed.chars().all(|ch| ch.is_ascii_graphic()) {
            return Err(Error::InvalidRoute(
                "route path contains invalid characters".into(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Creates a route path from a trusted string without validation.
    pub fn from_string(value: String) -> Self {
        Self(value)
    }

    /// Returns the underlying string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RoutePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RoutePath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for RoutePath {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<String> for RoutePath {
    fn from(value: String) -> Self {
        Self::from_string(value)
    }
}
