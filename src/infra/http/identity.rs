//! Request identity, read from a header set by the fronting proxy.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderName, StatusCode, request::Parts},
};

use crate::application::error::HttpError;
use crate::domain::types::Username;

/// Name of the header carrying the authenticated username.
#[derive(Debug, Clone)]
pub struct IdentityHeader(pub HeaderName);

/// The attributed user; rejects the request with 401 when absent.
#[derive(Debug, Clone)]
pub struct Identity(pub Username);

/// The attributed user, if any. Anonymous readers may browse listings.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<Username>);

impl Viewer {
    pub fn username(&self) -> Option<&Username> {
        self.0.as_ref()
    }
}

fn read_identity(parts: &Parts, header: &HeaderName) -> Result<Option<Username>, HttpError> {
    const SOURCE: &str = "infra::http::identity";
    let Some(value) = parts.headers.get(header) else {
        return Ok(None);
    };
    let raw = value.to_str().map_err(|err| {
        HttpError::from_error(SOURCE, StatusCode::UNAUTHORIZED, "Invalid identity", &err)
    })?;
    if raw.trim().is_empty() {
        return Ok(None);
    }
    Username::parse(raw).map(Some).map_err(|err| {
        HttpError::from_error(SOURCE, StatusCode::UNAUTHORIZED, "Invalid identity", &err)
    })
}

impl<S> FromRequestParts<S> for Viewer
where
    IdentityHeader: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let IdentityHeader(header) = IdentityHeader::from_ref(state);
        read_identity(parts, &header).map(Viewer)
    }
}

impl<S> FromRequestParts<S> for Identity
where
    IdentityHeader: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let IdentityHeader(header) = IdentityHeader::from_ref(state);
        match read_identity(parts, &header)? {
            Some(user) => Ok(Identity(user)),
            None => Err(HttpError::new(
                "infra::http::identity",
                StatusCode::UNAUTHORIZED,
                "Sign in required",
                format!("missing `{header}` header"),
            )),
        }
    }
}
