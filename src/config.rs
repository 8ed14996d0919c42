// src/config.rs

use serde::Deserialize;
use std::{fmt, fs, path::Path};

use crate::error::{PipelineError, Result};

/// Connection parameters for the staging database. These are the only
/// recognised options; anything else the driver needs is fixed by the session.
#[derive(Clone)]
pub struct DbConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl DbConfig {
    pub const HOST_VAR: &'static str = "MYSQL_HOST";
    pub const USER_VAR: &'static str = "MYSQL_USER";
    pub const PASSWORD_VAR: &'static str = "MYSQL_PASSWORD";
    pub const DATABASE_VAR: &'static str = "MYSQL_DATABASE";

    /// Build from an arbitrary key lookup. `from_env` is this over `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PipelineError::Config(format!("{key} is not set")))
        };
        Ok(Self {
            host: get(Self::HOST_VAR)?,
            user: get(Self::USER_VAR)?,
            // an empty password is legitimate for local servers
            password: lookup(Self::PASSWORD_VAR).unwrap_or_default(),
            database: get(Self::DATABASE_VAR)?,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .finish()
    }
}

/// One marketplace/region/currency batch: where its files live and which
/// staging table and scripts belong to it.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Profile {
    /// Suffix of the step scripts: `paso{n}_{name}.sql`.
    pub name: String,
    pub staging_schema: Option<String>,
    pub staging_table: String,
    /// Literal written to `divisa` for every staged row.
    pub currency: String,
    pub input_file: String,
    pub staging_file: String,
    pub marker_file: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: "allegro_rj_pl".into(),
            staging_schema: Some("campaigns1".into()),
            staging_table: "t_temp_rj_allegro_pl".into(),
            currency: "PLN".into(),
            input_file: "rj_allegro_pl.xlsx".into(),
            staging_file: "rj_allegro_pl.csv".into(),
            marker_file: ".gitkeep".into(),
        }
    }
}

impl Profile {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let profile: Profile = serde_yaml::from_str(s)
            .map_err(|e| PipelineError::Config(format!("invalid profile: {e}")))?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| PipelineError::io(format!("reading profile {}", path.display()), e))?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("name", &self.name),
            ("staging_table", &self.staging_table),
            ("input_file", &self.input_file),
            ("staging_file", &self.staging_file),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(PipelineError::Config(format!("profile field `{field}` is empty")));
            }
        }
        if self.input_file == self.staging_file {
            return Err(PipelineError::Config(
                "input_file and staging_file must differ".into(),
            ));
        }
        Ok(())
    }

    pub fn script_file_name(&self, step: u8) -> String {
        format!("paso{}_{}.sql", step, self.name)
    }
}
