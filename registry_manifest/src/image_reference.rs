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

use pest::Parser;
use pest_derive::Parser;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Registry used when the reference does not name one
pub const DEFAULT_REGISTRY: &str = "registry-1.docker.io";
pub const DEFAULT_NAMESPACE: &str = "library";
pub const DEFAULT_TAG: &str = "latest";

#[derive(Parser)]
#[grammar_inline = r#"
alphanum = { ASCII_ALPHANUMERIC }
lowernum = { ASCII_ALPHA_LOWER | ASCII_DIGIT }
tag = { (alphanum | "_") ~ (alphanum | "_" | "." | "-"){0,127} }
digest = { "sha256:" ~ (ASCII_HEX_DIGIT){64} }
hostcomponent = { alphanum ~ ("-"* ~ alphanum)* }
portnum = { ASCII_DIGIT{1,5} }
registry = {
    (
        (hostcomponent ~ ("." ~ hostcomponent)+) |
        (hostcomponent ~ &(":" ~ portnum)) |
        "localhost"
    ) ~ (":" ~ portnum)?
}
separator = { "__" | "_" | "." | "-"+ }
component = { lowernum+ ~ (separator ~ lowernum+)* }
path = { component ~ ("/" ~ component)* }
reference = { SOI ~ (registry ~ "/")? ~ path ~ (":" ~ tag)? ~ ("@" ~ digest)? ~ EOI }
"#]
struct ImageReferenceParser;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid image reference `{input}`: {message}")]
pub struct ReferenceError {
    pub input: String,
    pub message: String,
}

/// A parsed `[registry/][namespace/]repository[:tag][@digest]` image reference.
///
/// Optional parts are kept as given; the `*_or_default` accessors apply the
/// Docker Hub conventions.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct ImageReference {
    pub registry: Option<String>,
    pub namespace: Option<String>,
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl ImageReference {
    pub fn registry_or_default(&self) -> &str {
        self.registry.as_deref().unwrap_or(DEFAULT_REGISTRY)
    }

    pub fn namespace_or_default(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    pub fn tag_or_default(&self) -> &str {
        self.tag.as_deref().unwrap_or(DEFAULT_TAG)
    }

    /// The reference used on the manifests endpoint, a digest wins over a tag
    pub fn manifest_reference(&self) -> &str {
        self.digest
            .as_deref()
            .unwrap_or_else(|| self.tag_or_default())
    }

    /// `<namespace>/<repository>` as it appears in scopes and urls
    pub fn repository_path(&self) -> String {
        format!("{}/{}", self.namespace_or_default(), self.repository)
    }

    /// Token scope granting pull access to this repository
    pub fn pull_scope(&self) -> String {
        format!("repository:{}:pull", self.repository_path())
    }

    /// Base url of the registry API, always ends with `/v2/`
    pub fn base_url(&self, plain_http: bool) -> String {
        let scheme = if plain_http { "http" } else { "https" };
        format!("{scheme}://{}/v2/", self.registry_or_default())
    }

    /// Manifest endpoint relative to the base url
    pub fn manifest_path(&self) -> String {
        format!(
            "{}/manifests/{}",
            self.repository_path(),
            self.manifest_reference()
        )
    }

    pub fn manifest_url(&self, plain_http: bool) -> String {
        format!("{}{}", self.base_url(plain_http), self.manifest_path())
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if let Some(registry) = &self.registry {
            write!(f, "{registry}/")?;
        }
        if let Some(namespace) = &self.namespace {
            write!(f, "{namespace}/")?;
        }
        write!(f, "{}", self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

impl FromStr for ImageReference {
    type Err = ReferenceError;

    fn from_str(input: &str) -> Result<ImageReference, Self::Err> {
        let parsed = ImageReferenceParser::parse(Rule::reference, input).map_err(|e| {
            ReferenceError {
                input: input.to_string(),
                message: e.to_string(),
            }
        })?;

        let mut registry = None;
        let mut path = "";
        let mut tag = None;
        let mut digest = None;

        for pair in parsed.flat_map(|root| root.into_inner()) {
            match pair.as_rule() {
                Rule::registry => registry = Some(pair.as_str().to_string()),
                Rule::path => path = pair.as_str(),
                Rule::tag => tag = Some(pair.as_str().to_string()),
                Rule::digest => digest = Some(pair.as_str().to_string()),
                _ => {}
            }
        }

        // the last path component is the repository, everything before it the namespace
        let (namespace, repository) = match path.rsplit_once('/') {
            Some((namespace, repository)) => (Some(namespace.to_string()), repository),
            None => (None, path),
        };

        Ok(ImageReference {
            registry,
            namespace,
            repository: repository.to_string(),
            tag,
            digest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> ImageReference {
        ImageReference::from_str(input).unwrap()
    }

    #[test]
    fn test_parse_official_image() {
        let reference = parse("alpine:latest");
        assert_eq!(
            reference,
            ImageReference {
                registry: None,
                namespace: None,
                repository: "alpine".to_string(),
                tag: Some("latest".to_string()),
                digest: None,
            }
        );
        assert_eq!(reference.base_url(false), "https://registry-1.docker.io/v2/");
        assert_eq!(
            reference.manifest_url(false),
            "https://registry-1.docker.io/v2/library/alpine/manifests/latest"
        );
    }

    #[test]
    fn test_parse_registry_namespace_and_tag() {
        let reference = parse("myregistry.example.com/team/app:v2");
        assert_eq!(reference.registry.as_deref(), Some("myregistry.example.com"));
        assert_eq!(reference.namespace.as_deref(), Some("team"));
        assert_eq!(reference.repository, "app");
        assert_eq!(reference.base_url(false), "https://myregistry.example.com/v2/");
        assert_eq!(
            reference.manifest_url(false),
            "https://myregistry.example.com/v2/team/app/manifests/v2"
        );
        assert_eq!(reference.pull_scope(), "repository:team/app:pull");
    }

    #[test]
    fn test_defaults_without_tag_or_namespace() {
        let reference = parse("busybox");
        assert_eq!(reference.manifest_path(), "library/busybox/manifests/latest");
        assert_eq!(reference.tag, None);
        assert_eq!(reference.tag_or_default(), "latest");
        assert_eq!(reference.pull_scope(), "repository:library/busybox:pull");
        assert_eq!(
            reference.manifest_url(false),
            "https://registry-1.docker.io/v2/library/busybox/manifests/latest"
        );
    }

    #[test]
    fn test_namespace_without_registry() {
        let reference = parse("bitnami/redis:7.2");
        assert_eq!(reference.registry, None);
        assert_eq!(reference.namespace.as_deref(), Some("bitnami"));
        assert_eq!(reference.repository, "redis");
        assert_eq!(reference.tag.as_deref(), Some("7.2"));
    }

    #[test]
    fn test_registry_without_namespace_uses_library() {
        let reference = parse("quay.io/app");
        assert_eq!(reference.registry.as_deref(), Some("quay.io"));
        assert_eq!(reference.namespace, None);
        assert_eq!(
            reference.manifest_url(false),
            "https://quay.io/v2/library/app/manifests/latest"
        );
    }

    #[test]
    fn test_registry_with_port() {
        let reference = parse("localhost:5000/tools/builder:1.0");
        assert_eq!(reference.registry.as_deref(), Some("localhost:5000"));
        assert_eq!(reference.base_url(true), "http://localhost:5000/v2/");

        let reference = parse("127.0.0.1:8080/app");
        assert_eq!(reference.registry.as_deref(), Some("127.0.0.1:8080"));
        assert_eq!(reference.repository, "app");
    }

    #[test]
    fn test_host_and_port_without_path_is_repository_and_tag() {
        let reference = parse("localhost:5000");
        assert_eq!(reference.registry, None);
        assert_eq!(reference.repository, "localhost");
        assert_eq!(reference.tag.as_deref(), Some("5000"));
    }

    #[test]
    fn test_nested_namespace() {
        let reference = parse("ghcr.io/org/team/service:main");
        assert_eq!(reference.namespace.as_deref(), Some("org/team"));
        assert_eq!(reference.repository, "service");
        assert_eq!(reference.pull_scope(), "repository:org/team/service:pull");
    }

    #[test]
    fn test_digest_reference() {
        let digest = format!("sha256:{}", "a".repeat(64));
        let reference = parse(&format!("alpine@{digest}"));
        assert_eq!(reference.tag, None);
        assert_eq!(reference.digest.as_deref(), Some(digest.as_str()));
        assert_eq!(
            reference.manifest_url(false),
            format!("https://registry-1.docker.io/v2/library/alpine/manifests/{digest}")
        );
    }

    #[test]
    fn test_display_round_trips_input() {
        for input in ["alpine", "127.0.0.1/helloworld:1234567", "docker.io/library/nginx:1.25"] {
            assert_eq!(parse(input).to_string(), input);
        }
    }

    #[test]
    fn test_invalid_references() {
        for input in ["", "Alpine:latest", "alpine:", "team//app", "alpine@sha256:abc"] {
            let err = ImageReference::from_str(input).unwrap_err();
            assert_eq!(err.input, input);
        }
    }
}
