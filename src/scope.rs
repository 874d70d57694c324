//! Repository scopes and privilege flags
//!
//! A scope is the `type:name:actions` triple a registry client asks for,
//! e.g. `repository:foo/bar:push,pull`. Privileges are a two-bit set over
//! push and pull; the zero value is illegal and never grants anything.

use std::ops::{BitAnd, BitOr};
use std::str::FromStr;

use thiserror::Error;

/// The only resource type the token protocol covers
pub const RESOURCE_TYPE_REPOSITORY: &str = "repository";

/// Bitmask of repository actions
///
/// Valid values are `PUSH`, `PULL` and their union `ALL`; the empty set is
/// `ILLEGAL` and fails validation. Produced by [`Privilege::parse`] and by
/// intersecting a requested privilege with a granted one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Privilege(u8);

impl Privilege {
    pub const ILLEGAL: Privilege = Privilege(0);
    pub const PUSH: Privilege = Privilege(1);
    pub const PULL: Privilege = Privilege(2);
    pub const ALL: Privilege = Privilege(1 | 2);

    /// Parse the action field of a scope
    ///
    /// Anything outside the known vocabulary parses to `ILLEGAL`, which the
    /// caller is expected to reject via [`Privilege::is_valid`].
    pub fn parse(actions: &str) -> Privilege {
        match actions {
            "push" => Privilege::PUSH,
            "pull" => Privilege::PULL,
            "push,pull" | "pull,push" | "*" => Privilege::ALL,
            _ => Privilege::ILLEGAL,
        }
    }

    /// True if every action in `other` is contained in `self`
    pub fn has(self, other: Privilege) -> bool {
        self.0 & other.0 == other.0
    }

    /// True for any non-empty action set
    pub fn is_valid(self) -> bool {
        self != Privilege::ILLEGAL
    }

    /// Expand to the action names embedded in a token access entry
    pub fn actions(self) -> Vec<&'static str> {
        let mut result = Vec::new();
        if self.has(Privilege::PUSH) {
            result.push("push");
        }
        if self.has(Privilege::PULL) {
            result.push("pull");
        }
        result
    }
}

impl BitAnd for Privilege {
    type Output = Privilege;

    fn bitand(self, rhs: Privilege) -> Privilege {
        Privilege(self.0 & rhs.0)
    }
}

impl BitOr for Privilege {
    type Output = Privilege;

    fn bitor(self, rhs: Privilege) -> Privilege {
        Privilege(self.0 | rhs.0)
    }
}

/// Scope parse failures
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScopeError {
    /// Not exactly three colon-separated fields
    #[error("malformed scope: expected type:name:actions")]
    FieldCount,

    /// First field is not `repository`
    #[error("malformed scope: unsupported resource type {0:?}")]
    ResourceType(String),

    /// Action field outside the push/pull vocabulary
    #[error("malformed scope: invalid privilege {0:?}")]
    InvalidPrivilege(String),
}

/// A requested or granted repository scope
///
/// The empty scope (`Scope::empty()`) stands for "no access claim": it is
/// what an auth-only request authorizes to, and what a request degrades to
/// when the ACL grants nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Scope {
    /// Resource type, `repository` for every parsed scope
    pub resource_type: String,
    /// Repository path, e.g. `foo/bar`
    pub name: String,
    /// Requested or granted actions
    pub actions: Privilege,
}

impl Scope {
    /// The scope that carries no access claim
    pub fn empty() -> Scope {
        Scope::default()
    }

    /// True when this scope carries no access claim
    pub fn is_empty(&self) -> bool {
        self.resource_type.is_empty()
    }
}

impl FromStr for Scope {
    type Err = ScopeError;

    fn from_str(text: &str) -> Result<Scope, ScopeError> {
        let fields: Vec<&str> = text.split(':').collect();
        if fields.len() != 3 {
            return Err(ScopeError::FieldCount);
        }
        if fields[0] != RESOURCE_TYPE_REPOSITORY {
            return Err(ScopeError::ResourceType(fields[0].to_string()));
        }
        let actions = Privilege::parse(fields[2]);
        if !actions.is_valid() {
            return Err(ScopeError::InvalidPrivilege(fields[2].to_string()));
        }
        Ok(Scope {
            resource_type: fields[0].to_string(),
            name: fields[1].to_string(),
            actions,
        })
    }
}
