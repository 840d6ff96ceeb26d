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
use serde_json::Value;

pub const OCI_IMAGE_INDEX: &str = "application/vnd.oci.image.index.v1+json";
pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const DOCKER_MANIFESTS: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
pub const DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const DOCKER_MANIFEST_V1: &str = "application/vnd.docker.distribution.manifest.v1+prettyjws";

/// Media types sent in the `Accept` header of a manifest request
pub const ACCEPTED_MANIFEST_TYPES: [&str; 5] = [
    OCI_IMAGE_INDEX,
    OCI_MANIFEST,
    DOCKER_MANIFESTS,
    DOCKER_MANIFEST,
    DOCKER_MANIFEST_V1,
];

/// The `realm` and `service` a registry advertises in its `WWW-Authenticate` challenge
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct AuthChallenge {
    pub realm: String,
    pub service: String,
}

/// A bearer token issued for a single manifest request
#[derive(PartialEq, Eq, Clone)]
pub struct AuthToken {
    pub realm: String,
    pub service: String,
    pub token: String,
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("realm", &self.realm)
            .field("service", &self.service)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Response body of the token endpoint
#[derive(PartialEq, Eq, Serialize, Deserialize, Clone, Debug)]
pub struct DockerAuthToken {
    pub token: Option<String>,
    pub access_token: Option<String>,
    pub expires_in: Option<usize>,
    pub issued_at: Option<String>,
}

/// A manifest document as returned by the registry.
///
/// The body is kept as untyped JSON; it may be a schema 1 or schema 2
/// manifest, a manifest list or an OCI index.
#[derive(PartialEq, Eq, Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// `Content-Type` of the response
    pub media_type: Option<String>,
    /// `Docker-Content-Digest` of the response, not verified
    pub digest: Option<String>,
    pub document: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_with_token() {
        let input = r#"{"token":"abc123","expires_in":300,"issued_at":"2023-01-01T00:00:00Z"}"#;
        let token: DockerAuthToken = serde_json::from_str(input).unwrap();
        assert_eq!(token.token.as_deref(), Some("abc123"));
        assert_eq!(token.expires_in, Some(300));
    }

    #[test]
    fn test_token_response_without_token() {
        let token: DockerAuthToken = serde_json::from_str(r#"{"access_token":"xyz"}"#).unwrap();
        assert_eq!(token.token, None);
        assert_eq!(token.access_token.as_deref(), Some("xyz"));
    }

    #[test]
    fn test_auth_token_debug_hides_token() {
        let token = AuthToken {
            realm: "https://auth.example.com/token".to_string(),
            service: "registry.example.com".to_string(),
            token: "abc123".to_string(),
        };
        assert!(!format!("{token:?}").contains("abc123"));
    }
}
