//! Permission strings: `resource:name:action` triples with `*` wildcards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// The kind of object a permission string governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Collection,
    View,
    /// `*` — matches any resource kind.
    Any,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Collection => "collection",
            ResourceKind::View => "view",
            ResourceKind::Any => "*",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "collection" => Ok(ResourceKind::Collection),
            "view" => Ok(ResourceKind::View),
            "*" => Ok(ResourceKind::Any),
            other => Err(CoreError::BadRequest(format!(
                "unknown resource kind '{other}'"
            ))),
        }
    }
}

/// An action a permission string may grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
    Create,
    Update,
    Delete,
    Execute,
    /// `*` — matches any action.
    Any,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Read => "read",
            Action::Write => "write",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Execute => "execute",
            Action::Any => "*",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Action {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Action::Read),
            "write" => Ok(Action::Write),
            "create" => Ok(Action::Create),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            "execute" => Ok(Action::Execute),
            "*" => Ok(Action::Any),
            other => Err(CoreError::BadRequest(format!("unknown action '{other}'"))),
        }
    }
}

/// A name component of a permission string: a literal identifier or `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NamePattern {
    Literal(String),
    Any,
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamePattern::Literal(s) => write!(f, "{s}"),
            NamePattern::Any => write!(f, "*"),
        }
    }
}

impl NamePattern {
    fn matches(&self, name: &str) -> bool {
        match self {
            NamePattern::Any => true,
            NamePattern::Literal(s) => s == name,
        }
    }
}

/// A single `resource:name:action` permission string, parsed into its
/// components once so matching is a handful of comparisons instead of a
/// string split on every call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionString {
    pub resource: ResourceKind,
    pub name: NamePattern,
    pub action: Action,
}

impl PermissionString {
    pub fn new(resource: ResourceKind, name: NamePattern, action: Action) -> Self {
        Self {
            resource,
            name,
            action,
        }
    }

    /// Does this permission grant `(resource_kind, name, action)`?
    ///
    /// `a:b:c` matches `x:y:z` iff (`a=*` or `a=x`) and (`b=*` or `b=y`) and
    /// (`c=*` or `c=z`).
    pub fn matches(&self, resource_kind: ResourceKind, name: &str, action: Action) -> bool {
        let resource_ok = self.resource == ResourceKind::Any || self.resource == resource_kind;
        let action_ok = self.action == Action::Any || self.action == action;
        resource_ok && action_ok && self.name.matches(name)
    }
}

impl fmt::Display for PermissionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.resource, self.name, self.action)
    }
}

impl FromStr for PermissionString {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let (resource, name, action) = match (parts.next(), parts.next(), parts.next()) {
            (Some(r), Some(n), Some(a)) => (r, n, a),
            _ => {
                return Err(CoreError::BadRequest(format!(
                    "malformed permission string '{s}', expected resource:name:action"
                )))
            }
        };

        let resource = resource.parse()?;
        let action = action.parse()?;
        let name = if name == "*" {
            NamePattern::Any
        } else {
            NamePattern::Literal(name.to_string())
        };

        Ok(PermissionString::new(resource, name, action))
    }
}

impl Serialize for PermissionString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PermissionString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A set of permission strings, as carried by a resolved `Principal`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionSet(pub Vec<PermissionString>);

impl PermissionSet {
    pub fn new(perms: Vec<PermissionString>) -> Self {
        Self(perms)
    }

    pub fn allows(&self, resource_kind: ResourceKind, name: &str, action: Action) -> bool {
        self.0.iter().any(|p| p.matches(resource_kind, name, action))
    }

    pub fn merge(mut self, other: PermissionSet) -> Self {
        self.0.extend(other.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        let p: PermissionString = "collection:products:read".parse().unwrap();
        assert!(p.matches(ResourceKind::Collection, "products", Action::Read));
        assert!(!p.matches(ResourceKind::Collection, "products", Action::Write));
        assert!(!p.matches(ResourceKind::Collection, "other", Action::Read));
    }

    #[test]
    fn wildcard_name_matches_any_name() {
        let p: PermissionString = "collection:*:read".parse().unwrap();
        assert!(p.matches(ResourceKind::Collection, "anything", Action::Read));
    }

    #[test]
    fn wildcard_action_matches_any_action() {
        let p: PermissionString = "collection:products:*".parse().unwrap();
        assert!(p.matches(ResourceKind::Collection, "products", Action::Delete));
    }

    #[test]
    fn full_wildcard_matches_everything() {
        let p: PermissionString = "*:*:*".parse().unwrap();
        assert!(p.matches(ResourceKind::View, "cheap", Action::Execute));
    }

    #[test]
    fn malformed_string_rejected() {
        let result: Result<PermissionString, _> = "collection:products".parse();
        assert!(result.is_err());
    }

    #[test]
    fn set_allows_is_monotonic_in_permissions() {
        let empty = PermissionSet::default();
        assert!(!empty.allows(ResourceKind::Collection, "x", Action::Read));

        let with_perm = PermissionSet::new(vec!["collection:x:read".parse().unwrap()]);
        assert!(with_perm.allows(ResourceKind::Collection, "x", Action::Read));

        // Adding more permissions never removes access already granted.
        let with_more = with_perm
            .clone()
            .merge(PermissionSet::new(vec!["view:y:execute".parse().unwrap()]));
        assert!(with_more.allows(ResourceKind::Collection, "x", Action::Read));
    }

    #[test]
    fn display_roundtrips_through_parse() {
        let original = "view:*:execute";
        let p: PermissionString = original.parse().unwrap();
        assert_eq!(p.to_string(), original);
    }
}
