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

//! Bearer token negotiation.
//!
//! A registry answers an anonymous `GET /v2/` with `401` and a header like
//! `WWW-Authenticate: Bearer realm="https://auth.example.com/token",service="registry.example.com"`.
//! The realm is then asked for a token scoped to `repository:<name>:pull`.

use crate::distribution::client::Registry;
use crate::distribution::error::{ManifestError, ResponseFailure, ResponseParts};
use crate::image_reference::ImageReference;
use crate::models::{AuthChallenge, AuthToken, DockerAuthToken};
use reqwest::header::WWW_AUTHENTICATE;
use reqwest::StatusCode;
use tracing::{debug, info};

/// Parse `key="value",key="value"` pairs. Values must be double quoted and
/// cannot contain escaped quotes; parsing stops at the first malformed pair.
pub fn parse_comma_separated_quoted_kv_str(input: &str) -> Vec<(String, String)> {
    let mut ret = Vec::new();
    let mut input = input;

    while let Some((key, remaining)) = input.split_once('=') {
        let Some(remaining) = remaining.strip_prefix('\"') else {
            break;
        };
        let Some((value, remaining)) = remaining.split_once('\"') else {
            break;
        };
        ret.push((key.trim().to_string(), value.to_string()));
        match remaining.trim_start().strip_prefix(',') {
            None => break,
            Some(remaining) => input = remaining,
        }
    }
    ret
}

impl AuthChallenge {
    /// Extract realm and service from a `WWW-Authenticate` value. The scheme
    /// and parameter names are matched case-insensitively.
    pub fn parse(www_auth: &str) -> Option<AuthChallenge> {
        let (scheme, params) = www_auth.trim().split_once(char::is_whitespace)?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let mut realm = None;
        let mut service = None;
        for (key, value) in parse_comma_separated_quoted_kv_str(params) {
            if key.eq_ignore_ascii_case("realm") {
                realm = Some(value);
            } else if key.eq_ignore_ascii_case("service") {
                service = Some(value);
            }
        }

        Some(AuthChallenge {
            realm: realm.filter(|realm| !realm.is_empty())?,
            service: service.filter(|service| !service.is_empty())?,
        })
    }
}

impl Registry {
    /// Ask the registry how to authenticate. Anything but a `401` carrying a
    /// bearer challenge is an error.
    pub async fn challenge(&self) -> Result<AuthChallenge, ManifestError> {
        debug!("requesting authentication challenge from {}", self.base_url);
        let request = self.with_basic_auth(self.client.get(self.base_url.as_str()));
        let response = request
            .send()
            .await
            .map_err(|e| ManifestError::ChallengeParse(e.into()))?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Err(ManifestError::ChallengeParse(
                ResponseFailure::from_response(&response),
            ));
        }

        let www_auth = response.headers().get(WWW_AUTHENTICATE).ok_or_else(|| {
            ManifestError::ChallengeParse(ResponseFailure::MissingHeader {
                name: WWW_AUTHENTICATE.as_str().to_string(),
                response: ResponseParts::of(&response),
            })
        })?;
        let www_auth = String::from_utf8_lossy(www_auth.as_bytes());
        debug!("www-auth: {www_auth}");

        AuthChallenge::parse(&www_auth).ok_or_else(|| {
            ManifestError::ChallengeParse(ResponseFailure::MalformedChallenge {
                value: www_auth.to_string(),
                response: ResponseParts::of(&response),
            })
        })
    }

    /// Exchange a challenge for a token valid for `scope`
    pub async fn exchange_token(
        &self,
        challenge: &AuthChallenge,
        scope: &str,
    ) -> Result<AuthToken, ManifestError> {
        let request = self.with_basic_auth(self.client.get(challenge.realm.as_str()).query(&[
            ("service", challenge.service.as_str()),
            ("scope", scope),
        ]));
        debug!(
            realm = %challenge.realm,
            service = %challenge.service,
            scope,
            "requesting bearer token"
        );
        let response = request
            .send()
            .await
            .map_err(|e| ManifestError::TokenExchange(e.into()))?;

        if !response.status().is_success() {
            return Err(ManifestError::TokenExchange(
                ResponseFailure::from_response(&response),
            ));
        }

        let parts = ResponseParts::of(&response);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ManifestError::TokenExchange(e.into()))?;
        let auth_token: DockerAuthToken = match serde_json::from_slice(&bytes) {
            Ok(auth_token) => auth_token,
            Err(error) => {
                return Err(ManifestError::TokenExchange(ResponseFailure::Decode {
                    error,
                    response: parts,
                }))
            }
        };

        match auth_token.token.filter(|token| !token.is_empty()) {
            None => Err(ManifestError::TokenExchange(
                ResponseFailure::MissingToken { response: parts },
            )),
            Some(token) => Ok(AuthToken {
                realm: challenge.realm.clone(),
                service: challenge.service.clone(),
                token,
            }),
        }
    }

    /// Run the challenge and token exchange for pulling `reference`
    pub async fn authenticate(&self, reference: &ImageReference) -> Result<AuthToken, ManifestError> {
        let challenge = self.challenge().await?;
        info!(
            realm = %challenge.realm,
            service = %challenge.service,
            "registry requested bearer authentication"
        );
        self.exchange_token(&challenge, &reference.pull_scope())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_comma_separated_quoted_string_mulitple_items() {
        let input = "123=\"456\",789=\"abc\"";
        let vec = parse_comma_separated_quoted_kv_str(input);
        assert_eq!(
            vec,
            vec![
                ("123".to_string(), "456".to_string()),
                ("789".to_string(), "abc".to_string())
            ]
        );
    }

    #[test]
    fn test_parse_comma_separated_quoted_string_no_items() {
        let empty: Vec<(String, String)> = Vec::new();
        assert_eq!(parse_comma_separated_quoted_kv_str(""), empty);
        assert_eq!(parse_comma_separated_quoted_kv_str("123"), empty);
    }

    #[test]
    fn test_parse_comma_separated_quoted_string_unquoted_value() {
        let vec = parse_comma_separated_quoted_kv_str("a=\"1\",b=2,c=\"3\"");
        assert_eq!(vec, vec![("a".to_string(), "1".to_string())]);
    }

    #[test]
    fn test_parse_challenge() {
        let challenge = AuthChallenge::parse(
            r#"Bearer realm="https://auth.example.com/token",service="registry.example.com""#,
        )
        .unwrap();
        assert_eq!(challenge.realm, "https://auth.example.com/token");
        assert_eq!(challenge.service, "registry.example.com");
    }

    #[test]
    fn test_parse_challenge_case_insensitive_with_extra_params() {
        let challenge = AuthChallenge::parse(
            r#"bearer Realm="https://auth.docker.io/token", Service="registry.docker.io",scope="repository:library/alpine:pull""#,
        )
        .unwrap();
        assert_eq!(challenge.realm, "https://auth.docker.io/token");
        assert_eq!(challenge.service, "registry.docker.io");
    }

    #[test]
    fn test_parse_challenge_rejects_incomplete() {
        assert_eq!(AuthChallenge::parse(r#"Basic realm="registry""#), None);
        assert_eq!(
            AuthChallenge::parse(r#"Bearer realm="https://auth.example.com/token""#),
            None
        );
        assert_eq!(
            AuthChallenge::parse(r#"Bearer realm="",service="registry.example.com""#),
            None
        );
        assert_eq!(AuthChallenge::parse("Bearer"), None);
    }
}
