// Copyright (c) 2023 Yan Ka, Chiu.
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions
// are met:
// 1. Redistributions of source code must retain the above copyright
//    notice, this list of conditions, and the following disclaimer,
//    without modification, immediately at the beginning of the file.
// 2. The name of the author may not be used to endorse or promote products
//    derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE AUTHOR AND CONTRIBUTORS ``AS IS'' AND
// ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED TO, THE
// IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE
// ARE DISCLAIMED. IN NO EVENT SHALL THE AUTHOR OR CONTRIBUTORS BE LIABLE FOR
// ANY DIRECT, INDIRECT, INCIDENTAL, SPECIAL, EXEMPLARY, OR CONSEQUENTIAL
// DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS
// OR SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION)
// HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT
// LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY
// OUT OF THE USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF
// SUCH DAMAGE.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl BasicAuth {
    pub fn new(username: String, password: String) -> BasicAuth {
        BasicAuth { username, password }
    }
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Transport settings passed through to every request of a call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Timeout of each individual request
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
    /// Extra headers sent with every request
    pub headers: Vec<(String, String)>,
    /// Talk to the registry over `http://` instead of `https://`
    pub plain_http: bool,
}

/// Per-call configuration of [`crate::get_image_manifest`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ManifestRequestOptions {
    /// Credentials sent to the challenge and token endpoints
    pub auth: Option<BasicAuth>,
    pub request_options: RequestOptions,
    /// Skip TLS certificate verification for this call
    pub non_secure: bool,
    /// Upper bound on the whole challenge, token and manifest sequence
    pub deadline: Option<Duration>,
}

impl ManifestRequestOptions {
    pub fn with_auth(self, auth: BasicAuth) -> ManifestRequestOptions {
        ManifestRequestOptions {
            auth: Some(auth),
            ..self
        }
    }

    pub fn with_request_options(self, request_options: RequestOptions) -> ManifestRequestOptions {
        ManifestRequestOptions {
            request_options,
            ..self
        }
    }

    pub fn non_secure(self, non_secure: bool) -> ManifestRequestOptions {
        ManifestRequestOptions { non_secure, ..self }
    }

    pub fn with_deadline(self, deadline: Duration) -> ManifestRequestOptions {
        ManifestRequestOptions {
            deadline: Some(deadline),
            ..self
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read registries file: {0}")]
    Io(std::io::Error),
    #[error("malformed registries file: {0}")]
    Json(serde_json::Error),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> ConfigError {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> ConfigError {
        ConfigError::Json(e)
    }
}

/// Settings of a single registry host
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySettings {
    pub basic_auth: Option<BasicAuth>,
    #[serde(default)]
    pub insecure: bool,
    #[serde(default)]
    pub plain_http: bool,
}

impl RegistrySettings {
    /// Fill in what `options` leaves unset. Values already present in
    /// `options` take precedence; the flags are or-ed.
    pub fn apply_to(&self, options: &ManifestRequestOptions) -> ManifestRequestOptions {
        let mut request_options = options.request_options.clone();
        request_options.plain_http |= self.plain_http;
        ManifestRequestOptions {
            auth: options.auth.clone().or_else(|| self.basic_auth.clone()),
            request_options,
            non_secure: options.non_secure || self.insecure,
            deadline: options.deadline,
        }
    }
}

pub trait RegistriesProvider {
    fn get_registry_by_host(&self, host: &str) -> Option<RegistrySettings>;
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
struct RegistriesJsonScheme {
    #[serde(default)]
    registries: HashMap<String, RegistrySettings>,
}

/// Registry settings keyed by host, read from a json file of the form
/// `{"registries": {"<host>": {"basic_auth": {..}, "insecure": false, "plain_http": false}}}`
#[derive(Debug, Clone, Default)]
pub struct JsonRegistriesProvider {
    data: RegistriesJsonScheme,
}

impl JsonRegistriesProvider {
    pub fn from_path(path: impl AsRef<Path>) -> Result<JsonRegistriesProvider, ConfigError> {
        let file = std::fs::File::open(path)?;
        let data: RegistriesJsonScheme = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(JsonRegistriesProvider { data })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<JsonRegistriesProvider, ConfigError> {
        let data: RegistriesJsonScheme = serde_json::from_slice(bytes)?;
        Ok(JsonRegistriesProvider { data })
    }
}

impl RegistriesProvider for JsonRegistriesProvider {
    fn get_registry_by_host(&self, host: &str) -> Option<RegistrySettings> {
        self.data.registries.get(host).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRIES: &str = r#"{
        "registries": {
            "registry-1.docker.io": {
                "basic_auth": { "username": "alice", "password": "s3cret" }
            },
            "localhost:5000": { "insecure": true, "plain_http": true }
        }
    }"#;

    #[test]
    fn test_lookup_registry_by_host() {
        let provider = JsonRegistriesProvider::from_slice(REGISTRIES.as_bytes()).unwrap();
        let hub = provider.get_registry_by_host("registry-1.docker.io").unwrap();
        assert_eq!(
            hub.basic_auth,
            Some(BasicAuth::new("alice".to_string(), "s3cret".to_string()))
        );
        assert!(!hub.insecure);

        let local = provider.get_registry_by_host("localhost:5000").unwrap();
        assert!(local.insecure && local.plain_http);
        assert!(provider.get_registry_by_host("quay.io").is_none());
    }

    #[test]
    fn test_apply_settings_keeps_explicit_options() {
        let explicit = BasicAuth::new("bob".to_string(), "hunter2".to_string());
        let options = ManifestRequestOptions::default()
            .with_auth(explicit.clone())
            .with_deadline(Duration::from_secs(5));
        let settings = RegistrySettings {
            basic_auth: Some(BasicAuth::new("alice".to_string(), "s3cret".to_string())),
            insecure: true,
            plain_http: false,
        };

        let merged = settings.apply_to(&options);
        assert_eq!(merged.auth, Some(explicit));
        assert!(merged.non_secure);
        assert_eq!(merged.deadline, Some(Duration::from_secs(5)));
        // the caller's value is left untouched
        assert!(!options.non_secure);
    }

    #[test]
    fn test_malformed_registries_file() {
        let err = JsonRegistriesProvider::from_slice(b"{\"registries\": []}").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_basic_auth_debug_hides_password() {
        let auth = BasicAuth::new("alice".to_string(), "s3cret".to_string());
        assert!(!format!("{auth:?}").contains("s3cret"));
    }
}
