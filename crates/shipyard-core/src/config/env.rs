//! Environment-supplied inputs, captured once at startup.
//!
//! Nothing in the core reads process environment mid-operation: the frontend
//! builds an [`EnvOverrides`] (usually from `std::env::vars()`) and hands it to
//! [`super::DeploySettings::resolve`].

use std::collections::HashMap;

pub const ENVIRONMENT: &str = "ENVIRONMENT";
pub const AWS_REGION: &str = "AWS_REGION";
pub const AWS_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";
pub const DATABASE_PASSWORD: &str = "DATABASE_PASSWORD";
pub const AWS_ACCOUNT_ID: &str = "AWS_ACCOUNT_ID";
pub const ECR_REPOSITORY_PREFIX: &str = "ECR_REPOSITORY_PREFIX";

#[derive(Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub environment: Option<String>,
    pub region: Option<String>,
    pub database_password: Option<String>,
    pub account_id: Option<String>,
    pub registry_prefix: Option<String>,
}

impl EnvOverrides {
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();

        Self {
            environment: vars.get(ENVIRONMENT).cloned(),
            region: vars
                .get(AWS_REGION)
                .or_else(|| vars.get(AWS_DEFAULT_REGION))
                .cloned(),
            database_password: vars.get(DATABASE_PASSWORD).cloned(),
            account_id: vars.get(AWS_ACCOUNT_ID).cloned(),
            registry_prefix: vars.get(ECR_REPOSITORY_PREFIX).cloned(),
        }
    }
}

impl std::fmt::Debug for EnvOverrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvOverrides")
            .field("environment", &self.environment)
            .field("region", &self.region)
            .field(
                "database_password",
                &self.database_password.as_ref().map(|_| "<redacted>"),
            )
            .field("account_id", &self.account_id)
            .field("registry_prefix", &self.registry_prefix)
            .finish()
    }
}
