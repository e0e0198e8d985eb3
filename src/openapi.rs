//! OpenAPI document for the verification routes.
//!
//! Each handler module owns its path and schemas; [`VerifyApiDoc`] mounts
//! them at the same paths [`Verifier::routes`](crate::Verifier::routes)
//! serves.

use std::path::{Path, PathBuf};

use crate::handlers;
use thiserror::Error;
use utoipa::OpenApi;

/// Where `cargo run --bin openapi` writes the document, relative to the
/// crate root.
pub const OPENAPI_DEFAULT_PATH: &str = "docs/openapi.yml";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "fast-verify",
        description = "Quarantine a candidate record until its email address is confirmed."
    ),
    nest(
        (path = handlers::REQUEST_PATH, api = handlers::request::RequestApi, tags = ["verify"]),
        (path = handlers::CONFIRM_PATH, api = handlers::confirm::ConfirmApi, tags = ["verify"]),
        (path = handlers::RESEND_PATH, api = handlers::resend::ResendApi, tags = ["verify"])
    ),
    tags((name = "verify", description = "Request, confirm and resend verification links"))
)]
pub struct VerifyApiDoc;

#[derive(Debug, Error)]
pub enum OpenApiError {
    #[error("openapi document is not representable as yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The document as a `utoipa` value, for serving it from a route.
pub fn openapi_build() -> utoipa::openapi::OpenApi {
    VerifyApiDoc::openapi()
}

pub fn openapi_yaml_generate() -> Result<String, OpenApiError> {
    Ok(serde_yaml::to_string(&openapi_build())?)
}

/// Render the document and write it to `path`, creating missing parents.
pub fn openapi_yaml_write(path: impl AsRef<Path>) -> Result<(), OpenApiError> {
    let path = path.as_ref();
    let yaml = openapi_yaml_generate()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| OpenApiError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    std::fs::write(path, yaml).map_err(|source| OpenApiError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write [`OPENAPI_DEFAULT_PATH`] under the crate root and return its path.
pub fn openapi_yaml_write_default() -> Result<PathBuf, OpenApiError> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(OPENAPI_DEFAULT_PATH);
    openapi_yaml_write(&path)?;
    Ok(path)
}
