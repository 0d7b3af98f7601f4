//! Transport-neutral request and response

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use crate::core_types::{ClientId, SessionToken};
use crate::error::{ServiceError, ServiceResult};
use crate::validation::{ValidationError, parse_id};

/// Inbound call: path and query arguments, headers and a JSON body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub path: HashMap<String, String>,
    #[serde(default)]
    pub query: HashMap<String, String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: serde_json::Value,
    /// Set by dispatch once the bearer token is accepted
    #[serde(skip)]
    pub client: Option<ClientId>,
    /// Token the caller presented, before rotation
    #[serde(skip)]
    pub token: Option<SessionToken>,
}

impl Request {
    pub fn parse_body<T: DeserializeOwned>(&self) -> ServiceResult<T> {
        serde_json::from_value(self.body.clone())
            .map_err(|e| ValidationError::InvalidBody(e.to_string()).into())
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn path_id<T: FromStr>(&self, name: &'static str) -> ServiceResult<T> {
        let value = self
            .path
            .get(name)
            .ok_or(ValidationError::MissingArgument(name))?;
        Ok(parse_id(name, value)?)
    }

    pub fn query_i64(&self, name: &'static str, default: i64) -> ServiceResult<i64> {
        match self.query.get(name) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|_| {
                ValidationError::InvalidFormat {
                    field: name,
                    value: value.clone(),
                    expected: "integer",
                }
                .into()
            }),
        }
    }

    /// Identity injected by dispatch; operations that require auth only run
    /// after it is set
    pub fn client_id(&self) -> ServiceResult<ClientId> {
        self.client.ok_or(ServiceError::SessionNotFound)
    }
}

/// Body envelope, `code` is "OK" or a `ServiceError::code()`
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub code: &'static str,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    /// The caller's session chain no longer exists; dispatch must not hand
    /// out its rotated token
    #[serde(skip)]
    pub session_closed: bool,
}

impl Response {
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: None,
            session_closed: false,
        }
    }

    pub fn data<T: Serialize>(status: u16, data: T) -> ServiceResult<Self> {
        Self::with_envelope(status, "OK", "ok".to_string(), Some(data))
    }

    pub fn error(e: &ServiceError) -> Self {
        let envelope = Envelope::<()> {
            code: e.code(),
            msg: e.to_string(),
            data: None,
        };
        Self {
            status: e.http_status(),
            headers: BTreeMap::new(),
            body: serde_json::to_value(envelope).ok(),
            session_closed: false,
        }
    }

    pub fn with_envelope<T: Serialize>(
        status: u16,
        code: &'static str,
        msg: String,
        data: Option<T>,
    ) -> ServiceResult<Self> {
        let body = serde_json::to_value(Envelope { code, msg, data })
            .map_err(|e| ServiceError::Internal(format!("response encoding: {}", e)))?;
        Ok(Self {
            status,
            headers: BTreeMap::new(),
            body: Some(body),
            session_closed: false,
        })
    }

    pub fn with_header(mut self, name: &str, value: String) -> Self {
        self.headers.insert(name.to_string(), value);
        self
    }

    pub fn closing_session(mut self) -> Self {
        self.session_closed = true;
        self
    }
}
