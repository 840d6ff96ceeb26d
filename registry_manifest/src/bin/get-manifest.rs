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
use anyhow::{Context, Result};
use clap::Parser;
use registry_manifest::config::{JsonRegistriesProvider, RegistriesProvider};
use registry_manifest::{
    get_reference_manifest, BasicAuth, ImageReference, ManifestRequestOptions, RequestOptions,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Print the manifest of an image from a Docker Registry V2 compatible registry
#[derive(Parser, Debug)]
#[command(version)]
struct Arg {
    #[arg(short = 'u', long = "username", requires = "password")]
    username: Option<String>,
    #[arg(short = 'p', long = "password", requires = "username")]
    password: Option<String>,
    /// Do not verify the registry's TLS certificate
    #[arg(long)]
    insecure: bool,
    /// Talk to the registry over plain http
    #[arg(long)]
    http: bool,
    /// Timeout in seconds of each request
    #[arg(long)]
    timeout: Option<u64>,
    /// Seconds allowed for the whole authentication and fetch sequence
    #[arg(long)]
    deadline: Option<u64>,
    /// Json file with per registry credentials and flags
    #[arg(long)]
    registries: Option<PathBuf>,
    /// Print the manifest on a single line
    #[arg(long)]
    compact: bool,
    /// Image reference, e.g. `alpine:latest` or `myregistry.example.com/team/app:v2`
    image: ImageReference,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let arg = Arg::parse();

    // clap only accepts username and password together
    let auth = arg
        .username
        .zip(arg.password)
        .map(|(username, password)| BasicAuth::new(username, password));

    let options = ManifestRequestOptions {
        auth,
        request_options: RequestOptions {
            timeout: arg.timeout.map(Duration::from_secs),
            plain_http: arg.http,
            ..RequestOptions::default()
        },
        non_secure: arg.insecure,
        deadline: arg.deadline.map(Duration::from_secs),
    };

    let options = match arg.registries {
        None => options,
        Some(path) => {
            let provider = JsonRegistriesProvider::from_path(&path)
                .with_context(|| format!("loading {}", path.display()))?;
            match provider.get_registry_by_host(arg.image.registry_or_default()) {
                None => options,
                Some(settings) => settings.apply_to(&options),
            }
        }
    };
    debug!("options: {options:#?}");

    let manifest = get_reference_manifest(&arg.image, &options).await?;
    let output = if arg.compact {
        serde_json::to_string(&manifest.document)?
    } else {
        serde_json::to_string_pretty(&manifest.document)?
    };
    println!("{output}");

    Ok(())
}
