use std::fmt;

use axum::{
    extract::{Extension, FromRequestParts},
    http::request::Parts,
};
use serde::{Deserialize, Serialize};

use crate::db::rusqlite::{
    self,
    types::{ToSql, ToSqlOutput},
};

use crate::{ai::Generator, uploads::Uploads, Error, DB};

pub const DEVICE_ID_HEADER: &str = "x-device-id";

#[derive(Clone, Debug, FromRequestParts)]
pub struct BaseParams {
    pub ctx: Ctx,
    #[from_request(via(Extension))]
    pub db: DB,
}

impl BaseParams {
    pub fn new(db: DB, ctx: Ctx) -> Self {
        Self { db, ctx }
    }
}

/// Opaque client-generated identifier. Scopes every row; not authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        (!value.is_empty()).then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ToSql for DeviceId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug)]
pub struct Ctx {
    pub device_id: DeviceId,
}

impl Ctx {
    pub fn new(device_id: DeviceId) -> Self {
        Self { device_id }
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }
}

impl<S> FromRequestParts<S> for Ctx
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(DEVICE_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(DeviceId::parse)
            .map(Ctx::new)
            .ok_or_else(|| Error::validation("Device ID is required"))
    }
}

/// Collaborators needed by the AI routes on top of [`BaseParams`].
#[derive(Clone, FromRequestParts)]
pub struct AiParams {
    pub base: BaseParams,
    #[from_request(via(Extension))]
    pub generator: Generator,
}

/// Collaborators needed by routes that touch the upload directory.
#[derive(Clone, Debug, FromRequestParts)]
pub struct FileParams {
    pub base: BaseParams,
    #[from_request(via(Extension))]
    pub uploads: Uploads,
}
