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

//! Fetch image manifests from registries implementing the Docker Registry
//! HTTP API V2 with bearer token authentication.
//!
//! ```no_run
//! # async fn run() -> Result<(), registry_manifest::ManifestError> {
//! use registry_manifest::{get_image_manifest, ManifestRequestOptions};
//!
//! let manifest = get_image_manifest("alpine:latest", &ManifestRequestOptions::default()).await?;
//! println!("{}", manifest.document);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod distribution;
pub mod image_reference;
pub mod models;

pub use config::{BasicAuth, ManifestRequestOptions, RequestOptions};
pub use distribution::client::Registry;
pub use distribution::error::{ManifestError, ResponseFailure, ResponseParts};
pub use image_reference::ImageReference;
pub use models::Manifest;

use std::str::FromStr;
use tracing::debug;

/// Resolve `image`, authenticate against its registry and fetch its manifest
pub async fn get_image_manifest(
    image: &str,
    options: &ManifestRequestOptions,
) -> Result<Manifest, ManifestError> {
    let reference = ImageReference::from_str(image)?;
    debug!(?reference, "resolved image reference");
    get_reference_manifest(&reference, options).await
}

/// Same as [`get_image_manifest`] for an already parsed reference
pub async fn get_reference_manifest(
    reference: &ImageReference,
    options: &ManifestRequestOptions,
) -> Result<Manifest, ManifestError> {
    match options.deadline {
        None => pull_manifest(reference, options).await,
        Some(deadline) => tokio::time::timeout(deadline, pull_manifest(reference, options))
            .await
            .map_err(|_| ManifestError::DeadlineExceeded(deadline))?,
    }
}

async fn pull_manifest(
    reference: &ImageReference,
    options: &ManifestRequestOptions,
) -> Result<Manifest, ManifestError> {
    let registry = Registry::new(reference, options)?;
    let token = registry.authenticate(reference).await?;
    registry.fetch_manifest(reference, &token).await
}
