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

use crate::config::{BasicAuth, ManifestRequestOptions};
use crate::distribution::error::{ManifestError, ResponseFailure, ResponseParts};
use crate::image_reference::ImageReference;
use crate::models::{AuthToken, Manifest, ACCEPTED_MANIFEST_TYPES};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder, RequestBuilder};
use serde_json::Value;
use tracing::{debug, info};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const DOCKER_CONTENT_DIGEST: &str = "docker-content-digest";

/// A registry endpoint with the http client configured for one call
#[derive(Clone, Debug)]
pub struct Registry {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub basic_auth: Option<BasicAuth>,
}

impl Registry {
    /// Build the endpoint serving `reference`. The http client is private to
    /// the returned value, so `non_secure` never affects other registries.
    pub fn new(
        reference: &ImageReference,
        options: &ManifestRequestOptions,
    ) -> Result<Registry, ManifestError> {
        let request_options = &options.request_options;

        let mut headers = HeaderMap::new();
        for (name, value) in request_options.headers.iter() {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ManifestError::InvalidHeader(name.to_string()))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| ManifestError::InvalidHeader(name.to_string()))?;
            headers.append(header_name, header_value);
        }

        let mut builder = ClientBuilder::new()
            .default_headers(headers)
            .user_agent(request_options.user_agent.as_deref().unwrap_or(USER_AGENT))
            .danger_accept_invalid_certs(options.non_secure);
        if let Some(timeout) = request_options.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(ManifestError::HttpClient)?;

        let base_url = reference.base_url(request_options.plain_http);
        debug!(%base_url, non_secure = options.non_secure, "resolved registry");

        Ok(Registry {
            client,
            base_url,
            basic_auth: options.auth.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn manifest_url(&self, reference: &ImageReference) -> String {
        format!("{}{}", self.base_url, reference.manifest_path())
    }

    pub(crate) fn with_basic_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.basic_auth {
            None => request,
            Some(auth) => request.basic_auth(&auth.username, Some(&auth.password)),
        }
    }

    /// Fetch the manifest of `reference` using a token from [`Registry::authenticate`]
    pub async fn fetch_manifest(
        &self,
        reference: &ImageReference,
        token: &AuthToken,
    ) -> Result<Manifest, ManifestError> {
        let url = self.manifest_url(reference);
        info!("fetching manifest from {url}");

        let response = self
            .client
            .get(url.as_str())
            .bearer_auth(&token.token)
            .header(ACCEPT, ACCEPTED_MANIFEST_TYPES.join(","))
            .send()
            .await
            .map_err(|e| ManifestError::ManifestFetch(e.into()))?;

        if !response.status().is_success() {
            return Err(ManifestError::ManifestFetch(
                ResponseFailure::from_response(&response),
            ));
        }

        let parts = ResponseParts::of(&response);
        let media_type = header_string(&parts.headers, CONTENT_TYPE.as_str());
        let digest = header_string(&parts.headers, DOCKER_CONTENT_DIGEST);
        debug!(?media_type, ?digest, "manifest response");

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ManifestError::ManifestFetch(e.into()))?;
        let document: Value = serde_json::from_slice(&bytes).map_err(|error| {
            ManifestError::ManifestFetch(ResponseFailure::Decode {
                error,
                response: parts,
            })
        })?;

        Ok(Manifest {
            media_type,
            digest,
            document,
        })
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RequestOptions;
    use std::str::FromStr;

    #[test]
    fn test_manifest_url_follows_reference() {
        let reference = ImageReference::from_str("myregistry.example.com/team/app:v2").unwrap();
        let registry = Registry::new(&reference, &ManifestRequestOptions::default()).unwrap();
        assert_eq!(registry.base_url(), "https://myregistry.example.com/v2/");
        assert_eq!(
            registry.manifest_url(&reference),
            "https://myregistry.example.com/v2/team/app/manifests/v2"
        );
    }

    #[test]
    fn test_manifest_url_matches_reference_url() {
        let options = ManifestRequestOptions::default().with_request_options(RequestOptions {
            plain_http: true,
            ..RequestOptions::default()
        });
        let digest_reference = format!("ghcr.io/org/team/service@sha256:{}", "b".repeat(64));
        for input in ["alpine", "localhost:5000/tools/builder:1.0", digest_reference.as_str()] {
            let reference = ImageReference::from_str(input).unwrap();
            let registry = Registry::new(&reference, &options).unwrap();
            assert_eq!(registry.manifest_url(&reference), reference.manifest_url(true));
        }
    }

    #[test]
    fn test_invalid_extra_header() {
        let reference = ImageReference::from_str("alpine").unwrap();
        let mut options = ManifestRequestOptions::default();
        options
            .request_options
            .headers
            .push(("bad header".to_string(), "value".to_string()));
        let err = Registry::new(&reference, &options).unwrap_err();
        assert!(matches!(err, ManifestError::InvalidHeader(name) if name == "bad header"));
    }
}
