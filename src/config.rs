// znr - zone notes report for the DynECT DNS API
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use crate::client::ClientOptions;
use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api2.dynect.net";
pub const CREDENTIALS_FILE: &str = "credentials.yaml";
const PLACEHOLDER: &str = "none";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    pub dynect: Option<DynectSection>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub job_poll_interval: Option<u64>,
    pub job_poll_limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct DynectSection {
    pub customer: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Project,
    User,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no credentials file found (looked for {0})")]
    MissingCredentialsFile(String),
}

/// Login triple for the session resource.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub customer: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("customer", &self.customer)
            .field("user", &self.user)
            .field("password", &"*****")
            .finish()
    }
}

#[derive(Debug)]
pub struct EffectiveConfig {
    pub credentials: Credentials,
    pub base_url: String,
    pub client: ClientOptions,
}

pub fn config_path(scope: Scope, cwd: &Path) -> Option<PathBuf> {
    match scope {
        Scope::Project => Some(cwd.join(CREDENTIALS_FILE)),
        Scope::User => {
            if let Ok(custom) = env::var("ZNR_CONFIG_DIR") {
                return Some(PathBuf::from(custom).join(CREDENTIALS_FILE));
            }
            config_dir().map(|base| base.join("znr").join(CREDENTIALS_FILE))
        }
    }
}

/// Loads both scopes; the project file wins field by field. At least one
/// of them has to exist.
pub fn load(cwd: &Path) -> Result<Config> {
    let user_path = config_path(Scope::User, cwd);
    let project_path = config_path(Scope::Project, cwd);

    let user = match &user_path {
        Some(path) => read_if_exists(path)?,
        None => None,
    };
    let project = match &project_path {
        Some(path) => read_if_exists(path)?,
        None => None,
    };

    if user.is_none() && project.is_none() {
        let searched = [project_path, user_path]
            .into_iter()
            .flatten()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ConfigError::MissingCredentialsFile(searched).into());
    }

    Ok(merge(user.unwrap_or_default(), project.unwrap_or_default()))
}

pub fn resolve(cwd: &Path, base_url_override: Option<String>) -> Result<EffectiveConfig> {
    let mut merged = load(cwd)?;

    if let Some(url) = base_url_override {
        merged.base_url = Some(url);
    }

    let section = merged.dynect.unwrap_or_default();
    let credentials = Credentials {
        customer: or_placeholder("customer", section.customer),
        user: or_placeholder("user", section.user),
        password: or_placeholder("password", section.password),
    };

    let defaults = ClientOptions::default();
    let client = ClientOptions {
        timeout: merged
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout),
        job_poll_interval: merged
            .job_poll_interval
            .map(Duration::from_secs)
            .unwrap_or(defaults.job_poll_interval),
        job_poll_limit: merged.job_poll_limit.unwrap_or(defaults.job_poll_limit),
    };

    let base_url = merged
        .base_url
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    Ok(EffectiveConfig {
        credentials,
        base_url,
        client,
    })
}

// Absent values are left for the API to reject.
fn or_placeholder(field: &str, value: Option<String>) -> String {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => v,
        _ => {
            debug!(field, "credential missing, using placeholder");
            PLACEHOLDER.to_string()
        }
    }
}

fn read_if_exists(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    let config = serde_yaml::from_str(&contents).with_context(|| format!("parsing {:?}", path))?;
    Ok(Some(config))
}

fn merge(user: Config, project: Config) -> Config {
    Config {
        dynect: match (user.dynect, project.dynect) {
            (Some(u), Some(p)) => Some(DynectSection {
                customer: p.customer.or(u.customer),
                user: p.user.or(u.user),
                password: p.password.or(u.password),
            }),
            (u, p) => p.or(u),
        },
        base_url: project.base_url.or(user.base_url),
        timeout_secs: project.timeout_secs.or(user.timeout_secs),
        job_poll_interval: project.job_poll_interval.or(user.job_poll_interval),
        job_poll_limit: project.job_poll_limit.or(user.job_poll_limit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};
    use tempfile::tempdir;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn point_user_scope_at(dir: &Path) {
        unsafe {
            env::set_var("ZNR_CONFIG_DIR", dir);
        }
    }

    #[test]
    fn project_file_overrides_user_file() {
        let _guard = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
        let cwd = tempdir().unwrap();
        let user_dir = cwd.path().join("user");
        fs::create_dir_all(&user_dir).unwrap();
        point_user_scope_at(&user_dir);

        fs::write(
            user_dir.join(CREDENTIALS_FILE),
            "dynect:\n  customer: acme\n  user: alice\n  password: user-secret\nbase_url: https://user.test\ntimeout_secs: 12\n",
        )
        .unwrap();
        fs::write(
            cwd.path().join(CREDENTIALS_FILE),
            "dynect:\n  password: project-secret\njob_poll_limit: 4\n",
        )
        .unwrap();

        let effective = resolve(cwd.path(), None).unwrap();
        assert_eq!(effective.credentials.customer, "acme");
        assert_eq!(effective.credentials.user, "alice");
        assert_eq!(effective.credentials.password, "project-secret");
        assert_eq!(effective.base_url, "https://user.test");
        assert_eq!(effective.client.timeout, Duration::from_secs(12));
        assert_eq!(effective.client.job_poll_limit, 4);

        let overridden = resolve(cwd.path(), Some("https://cli.test".into())).unwrap();
        assert_eq!(overridden.base_url, "https://cli.test");
    }

    #[test]
    fn missing_fields_become_placeholder() {
        let _guard = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
        let cwd = tempdir().unwrap();
        point_user_scope_at(&cwd.path().join("nowhere"));

        fs::write(
            cwd.path().join(CREDENTIALS_FILE),
            "dynect:\n  user: bob\n  customer: \"\"\n",
        )
        .unwrap();

        let effective = resolve(cwd.path(), None).unwrap();
        assert_eq!(effective.credentials.user, "bob");
        assert_eq!(effective.credentials.customer, "none");
        assert_eq!(effective.credentials.password, "none");
        assert_eq!(effective.base_url, DEFAULT_BASE_URL);
        assert_eq!(effective.client.timeout, ClientOptions::default().timeout);
    }

    #[test]
    fn errors_when_no_file_exists() {
        let _guard = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
        let cwd = tempdir().unwrap();
        point_user_scope_at(&cwd.path().join("nowhere"));

        let err = resolve(cwd.path(), None).unwrap_err();
        assert!(err.to_string().contains("no credentials file found"));
    }

    #[test]
    fn errors_on_unparsable_file() {
        let _guard = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
        let cwd = tempdir().unwrap();
        point_user_scope_at(&cwd.path().join("nowhere"));

        fs::write(cwd.path().join(CREDENTIALS_FILE), "dynect: [unclosed\n").unwrap();

        let err = resolve(cwd.path(), None).unwrap_err();
        assert!(format!("{err:#}").contains("parsing"));
    }

    #[test]
    fn debug_output_masks_password() {
        let creds = Credentials {
            customer: "c".into(),
            user: "u".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
