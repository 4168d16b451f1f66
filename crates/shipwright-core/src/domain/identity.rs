//! Deployment identity and deployment-branch naming.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::error::{Result, ShipwrightError};

/// Reserved prefix for every deployment branch.
///
/// This prefix is the only correlation key between a pull request and a
/// deployment; no stronger identifier is attached to either.
pub const DEPLOY_BRANCH_PREFIX: &str = "deploy/";

const BRANCH_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// One logical deployment target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeploymentIdentity {
    pub application: String,
    pub environment: String,
}

impl DeploymentIdentity {
    /// Create an identity, rejecting names that cannot form a branch segment.
    pub fn new(application: impl Into<String>, environment: impl Into<String>) -> Result<Self> {
        let application = application.into();
        let environment = environment.into();
        validate_segment("application", &application)?;
        validate_segment("environment", &environment)?;
        Ok(Self {
            application,
            environment,
        })
    }

    /// `deploy/<application>/<environment>-<timestamp>`
    pub fn branch_name(&self, at: DateTime<Utc>) -> String {
        format!(
            "{}{}",
            self.branch_prefix(),
            at.format(BRANCH_TIMESTAMP_FORMAT)
        )
    }

    /// Prefix shared by every branch ever created for this identity.
    pub fn branch_prefix(&self) -> String {
        format!(
            "{}{}/{}-",
            DEPLOY_BRANCH_PREFIX, self.application, self.environment
        )
    }

    /// Inputs passed to the remote plan workflow.
    pub fn workflow_inputs(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("environment".to_string(), self.environment.clone()),
            ("application".to_string(), self.application.clone()),
        ])
    }
}

impl fmt::Display for DeploymentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.application, self.environment)
    }
}

fn validate_segment(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ShipwrightError::InvalidIdentity(format!(
            "{field} must not be empty"
        )));
    }
    if value.contains('/') || value.chars().any(char::is_whitespace) {
        return Err(ShipwrightError::InvalidIdentity(format!(
            "{field} '{value}' must not contain '/' or whitespace"
        )));
    }
    Ok(())
}
