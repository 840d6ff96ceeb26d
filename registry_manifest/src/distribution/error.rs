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

use crate::image_reference::ReferenceError;
use reqwest::header::HeaderMap;
use reqwest::{Response, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Status line and headers of a registry response, kept after the body is consumed
#[derive(Debug, Clone)]
pub struct ResponseParts {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl ResponseParts {
    pub(crate) fn of(response: &Response) -> ResponseParts {
        ResponseParts {
            status: response.status(),
            headers: response.headers().clone(),
        }
    }
}

/// Why a single registry round trip did not produce what was expected
#[derive(Debug, Error)]
pub enum ResponseFailure {
    #[error("cannot send request: {0}")]
    Transport(reqwest::Error),
    #[error("unexpected status {status}")]
    Status { status: StatusCode, headers: HeaderMap },
    #[error("response missing required header: {name}")]
    MissingHeader { name: String, response: ResponseParts },
    #[error("malformed bearer challenge: {value}")]
    MalformedChallenge { value: String, response: ResponseParts },
    #[error("unexpected schema: {error}")]
    Decode {
        #[source]
        error: serde_json::Error,
        response: ResponseParts,
    },
    #[error("missing bearer token")]
    MissingToken { response: ResponseParts },
}

impl ResponseFailure {
    pub(crate) fn from_response(response: &Response) -> ResponseFailure {
        ResponseFailure::Status {
            status: response.status(),
            headers: response.headers().clone(),
        }
    }

    fn response(&self) -> Option<&ResponseParts> {
        match self {
            ResponseFailure::MissingHeader { response, .. }
            | ResponseFailure::MalformedChallenge { response, .. }
            | ResponseFailure::Decode { response, .. }
            | ResponseFailure::MissingToken { response } => Some(response),
            ResponseFailure::Transport(_) | ResponseFailure::Status { .. } => None,
        }
    }

    /// Status of the failing response, if the registry answered at all
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ResponseFailure::Status { status, .. } => Some(*status),
            ResponseFailure::Transport(e) => e.status(),
            other => other.response().map(|response| response.status),
        }
    }

    pub fn headers(&self) -> Option<&HeaderMap> {
        match self {
            ResponseFailure::Status { headers, .. } => Some(headers),
            other => other.response().map(|response| &response.headers),
        }
    }

    /// `true` if the registry could not be reached or the connection broke
    pub fn is_transport(&self) -> bool {
        matches!(self, ResponseFailure::Transport(_))
    }
}

impl From<reqwest::Error> for ResponseFailure {
    fn from(e: reqwest::Error) -> ResponseFailure {
        ResponseFailure::Transport(e)
    }
}

/// Failure of a manifest pull, tagged with the stage that failed
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("{0}")]
    Reference(ReferenceError),
    #[error("failed to parse realm/service from registry: {0}")]
    ChallengeParse(ResponseFailure),
    #[error("failed to obtain authentication token: {0}")]
    TokenExchange(ResponseFailure),
    #[error("unable to get manifest from registry: {0}")]
    ManifestFetch(ResponseFailure),
    #[error("registry did not complete the request within {0:?}")]
    DeadlineExceeded(Duration),
    #[error("cannot build http client: {0}")]
    HttpClient(reqwest::Error),
    #[error("invalid request header: {0}")]
    InvalidHeader(String),
}

impl ManifestError {
    /// The response failure behind a network stage error
    pub fn failure(&self) -> Option<&ResponseFailure> {
        match self {
            ManifestError::ChallengeParse(failure)
            | ManifestError::TokenExchange(failure)
            | ManifestError::ManifestFetch(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<ReferenceError> for ManifestError {
    fn from(e: ReferenceError) -> ManifestError {
        ManifestError::Reference(e)
    }
}
