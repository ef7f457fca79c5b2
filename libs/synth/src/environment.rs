//! Deployment environment (target account and region).

use jci_template::{Expr, Pseudo};
use serde::{Deserialize, Serialize};

/// Environment variable holding the target account.
pub const ACCOUNT_ENV: &str = "CDK_DEFAULT_ACCOUNT";

/// Environment variable holding the target region.
pub const REGION_ENV: &str = "CDK_DEFAULT_REGION";

const UNKNOWN_ACCOUNT: &str = "unknown-account";
const UNKNOWN_REGION: &str = "unknown-region";

/// Target account and region of a stack.
///
/// Either part may be unknown at synthesis time; the template then uses the
/// `AWS::AccountId` / `AWS::Region` pseudo parameters and the value is
/// resolved at deploy time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl Environment {
    /// An environment with both parts known.
    pub fn new(account: &str, region: &str) -> Self {
        Self {
            account: Some(account.to_string()),
            region: Some(region.to_string()),
        }
    }

    /// An environment resolved at deploy time.
    pub fn agnostic() -> Self {
        Self::default()
    }

    /// Read `CDK_DEFAULT_ACCOUNT` and `CDK_DEFAULT_REGION`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            account: get(ACCOUNT_ENV),
            region: get(REGION_ENV),
        }
    }

    /// True unless both account and region are known.
    pub fn is_agnostic(&self) -> bool {
        self.account.is_none() || self.region.is_none()
    }

    /// Account id as a template value.
    pub fn account_expr(&self) -> Expr {
        match &self.account {
            Some(account) => Expr::string(account),
            None => Expr::pseudo(Pseudo::AccountId),
        }
    }

    /// Region as a template value.
    pub fn region_expr(&self) -> Expr {
        match &self.region {
            Some(region) => Expr::string(region),
            None => Expr::pseudo(Pseudo::Region),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "aws://{}/{}",
            self.account.as_deref().unwrap_or(UNKNOWN_ACCOUNT),
            self.region.as_deref().unwrap_or(UNKNOWN_REGION)
        )
    }
}
