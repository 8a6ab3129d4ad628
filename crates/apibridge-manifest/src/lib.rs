//! Declarative API manifest model for apibridge.
//!
//! A manifest describes a remote HTTP API — base URL, auth scheme, and a
//! list of callable actions with typed parameters — as an immutable JSON
//! document.  This crate owns the data model, parsing, and the structural
//! validation rules everything downstream relies on.  Compilation into
//! executable plugins lives in `apibridge-plugins`.

mod credentials;
mod error;
mod parser;
mod types;

pub use credentials::CredentialRecord;
pub use error::{ManifestError, Result};
pub use parser::{NAME_SEPARATOR, is_valid_slug, parse_manifest, parse_manifest_value, validate_manifest};
pub use types::{
    AuthScheme, DeclaredAction, DeclaredParameter, HttpMethod, Manifest, ParamLocation, ParamType,
    SCHEMA_VERSION,
};
