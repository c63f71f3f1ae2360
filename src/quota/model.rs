//! Quota Model Types
//!
//! Tags, scopes and the request/response shapes exchanged with callers and
//! with the persistence port.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{QuotaError, Result};

/// Separator between the components of a [`Tag`]
pub const TAG_SEPARATOR: char = ':';

/// Identifier of the subsystem that owns a set of quota targets
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetSrv(String);

impl TargetSrv {
    /// Create a new target service identifier
    pub fn new(srv: impl Into<String>) -> Self {
        Self(srv.into())
    }

    /// Borrow the identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetSrv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetSrv {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TargetSrv {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Name of a limited resource within a service
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    /// Create a new target name
    pub fn new(target: impl Into<String>) -> Self {
        Self(target.into())
    }

    /// Borrow the name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Target {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Breadth at which a limit applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// System-wide
    Global,
    /// Per organization
    Org,
    /// Per user
    User,
}

impl Scope {
    /// All recognised scopes
    pub const ALL: [Scope; 3] = [Scope::Global, Scope::Org, Scope::User];

    /// Wire name of the scope
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Org => "org",
            Scope::User => "user",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = QuotaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "global" => Ok(Scope::Global),
            "org" => Ok(Scope::Org),
            "user" => Ok(Scope::User),
            other => Err(QuotaError::InvalidScope(other.to_string())),
        }
    }
}

/// Composite key `service:target:scope` identifying one limit or usage entry
///
/// Tags built with [`Tag::new`] or parsed with [`FromStr`] always decompose.
/// Tags read back from storage go through [`Tag::from_raw`] and are checked
/// lazily by the accessors, so a malformed value surfaces as
/// [`QuotaError::InvalidTag`] at the point of use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    /// Build a tag from its components
    ///
    /// # Errors
    ///
    /// Returns [`QuotaError::InvalidTag`] if the service or target is empty
    /// or contains the separator.
    pub fn new(srv: &TargetSrv, target: &Target, scope: Scope) -> Result<Self> {
        for part in [srv.as_str(), target.as_str()] {
            if part.is_empty() || part.contains(TAG_SEPARATOR) {
                return Err(QuotaError::InvalidTag(format!(
                    "{}{sep}{}{sep}{}",
                    srv,
                    target,
                    scope,
                    sep = TAG_SEPARATOR
                )));
            }
        }
        Ok(Self(format!(
            "{}{sep}{}{sep}{}",
            srv,
            target,
            scope,
            sep = TAG_SEPARATOR
        )))
    }

    /// Wrap a stored tag without validating it
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the string form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn parts(&self) -> Result<(&str, &str, &str)> {
        let mut parts = self.0.splitn(3, TAG_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(srv), Some(target), Some(scope))
                if !srv.is_empty() && !target.is_empty() && !scope.is_empty() =>
            {
                Ok((srv, target, scope))
            }
            _ => Err(QuotaError::InvalidTag(self.0.clone())),
        }
    }

    /// Owning service of this tag
    pub fn srv(&self) -> Result<TargetSrv> {
        self.parts().map(|(srv, _, _)| TargetSrv::new(srv))
    }

    /// Target resource of this tag
    pub fn target(&self) -> Result<Target> {
        self.parts().map(|(_, target, _)| Target::new(target))
    }

    /// Scope of this tag
    pub fn scope(&self) -> Result<Scope> {
        let (_, _, scope) = self.parts()?;
        scope
            .parse()
            .map_err(|_| QuotaError::InvalidTag(self.0.clone()))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Tag {
    type Err = QuotaError;

    fn from_str(s: &str) -> Result<Self> {
        let tag = Self::from_raw(s);
        tag.scope()?;
        Ok(tag)
    }
}

/// Organization and user a decision is made for; zero means "not applicable"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeParameters {
    /// Organization id, 0 when absent
    pub org_id: i64,
    /// User id, 0 when absent
    pub user_id: i64,
}

impl ScopeParameters {
    /// Parameters for an org and a user
    pub fn new(org_id: i64, user_id: i64) -> Self {
        Self { org_id, user_id }
    }

    /// Parameters that place `id` in the slot `scope` needs
    pub fn for_scope(scope: Scope, id: i64) -> Self {
        match scope {
            Scope::Global => Self::default(),
            Scope::Org => Self::new(id, 0),
            Scope::User => Self::new(0, id),
        }
    }

    /// Whether tags of `scope` can be evaluated with these parameters
    pub fn applies_to(params: Option<&Self>, scope: Scope) -> bool {
        match (scope, params) {
            (Scope::Global, _) => true,
            (Scope::Org, Some(p)) => p.org_id != 0,
            (Scope::User, Some(p)) => p.user_id != 0,
            (_, None) => false,
        }
    }
}

/// Caller identity extracted from an inbound request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReqContext {
    /// Organization the caller acts in
    pub org_id: i64,
    /// Caller's user id
    pub user_id: i64,
    /// Whether the caller is authenticated
    pub is_signed_in: bool,
}

impl ReqContext {
    /// Context for an authenticated caller
    pub fn signed_in(org_id: i64, user_id: i64) -> Self {
        Self {
            org_id,
            user_id,
            is_signed_in: true,
        }
    }

    /// Context for an anonymous caller
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Scope parameters for this caller; `None` for anonymous callers
    pub fn scope_parameters(&self) -> Option<ScopeParameters> {
        self.is_signed_in
            .then(|| ScopeParameters::new(self.org_id, self.user_id))
    }
}

/// One row of the quota listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDto {
    /// Target resource name
    pub target: String,
    /// Effective limit (override if present, else default)
    pub limit: i64,
    /// Organization the row applies to
    pub org_id: i64,
    /// User the row applies to
    pub user_id: i64,
    /// Current usage, zero when the service reported none
    pub used: i64,
    /// Owning service
    pub service: String,
    /// Scope kind
    pub scope: Scope,
}

/// Administrator request to override a limit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateQuotaCmd {
    /// Target resource name
    pub target: String,
    /// New limit
    pub limit: i64,
    /// Organization id, selects org scope when non-zero
    #[serde(default)]
    pub org_id: i64,
    /// User id, selects user scope when non-zero and no org id is set
    #[serde(default)]
    pub user_id: i64,
}

impl UpdateQuotaCmd {
    /// Scope the override applies to
    pub fn scope(&self) -> Scope {
        if self.org_id != 0 {
            Scope::Org
        } else if self.user_id != 0 {
            Scope::User
        } else {
            Scope::Global
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_decomposes() {
        let tag = Tag::new(&"dashboards".into(), &"dashboard".into(), Scope::Org).unwrap();
        assert_eq!(tag.as_str(), "dashboards:dashboard:org");
        assert_eq!(tag.srv().unwrap(), TargetSrv::new("dashboards"));
        assert_eq!(tag.target().unwrap(), Target::new("dashboard"));
        assert_eq!(tag.scope().unwrap(), Scope::Org);
    }

    #[test]
    fn test_tag_rejects_separator_in_component() {
        let err = Tag::new(&"a:b".into(), &"c".into(), Scope::Global).unwrap_err();
        assert!(matches!(err, QuotaError::InvalidTag(_)));

        let err = Tag::new(&"a".into(), &"".into(), Scope::Global).unwrap_err();
        assert!(matches!(err, QuotaError::InvalidTag(_)));
    }

    #[test]
    fn test_malformed_raw_tag() {
        for raw in ["", "srv", "srv:target", "srv:target:planet", ":target:org", "a:b:org:extra"] {
            let tag = Tag::from_raw(raw);
            assert!(
                matches!(tag.scope(), Err(QuotaError::InvalidTag(_))),
                "expected {raw:?} to be rejected"
            );
            assert!(raw.parse::<Tag>().is_err());
        }
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!("user".parse::<Scope>().unwrap(), Scope::User);
        assert!(matches!(
            "team".parse::<Scope>(),
            Err(QuotaError::InvalidScope(s)) if s == "team"
        ));
    }

    #[test]
    fn test_scope_parameters_applicability() {
        let both = ScopeParameters::new(1, 2);
        let org_only = ScopeParameters::for_scope(Scope::Org, 7);

        assert!(ScopeParameters::applies_to(None, Scope::Global));
        assert!(!ScopeParameters::applies_to(None, Scope::Org));
        assert!(!ScopeParameters::applies_to(None, Scope::User));
        assert!(ScopeParameters::applies_to(Some(&both), Scope::User));
        assert!(ScopeParameters::applies_to(Some(&org_only), Scope::Org));
        assert!(!ScopeParameters::applies_to(Some(&org_only), Scope::User));
    }

    #[test]
    fn test_req_context_scope_parameters() {
        assert_eq!(
            ReqContext::signed_in(3, 4).scope_parameters(),
            Some(ScopeParameters::new(3, 4))
        );
        assert_eq!(ReqContext::anonymous().scope_parameters(), None);
    }

    #[test]
    fn test_update_cmd_scope() {
        let mut cmd = UpdateQuotaCmd {
            target: "dashboard".into(),
            limit: 5,
            ..Default::default()
        };
        assert_eq!(cmd.scope(), Scope::Global);
        cmd.user_id = 9;
        assert_eq!(cmd.scope(), Scope::User);
        cmd.org_id = 1;
        assert_eq!(cmd.scope(), Scope::Org);
    }
}
