//! Admission parameters carried by every upgrade request.
//!
//! A client identifies itself with two query parameters:
//!
//! ```text
//! GET /ws?uid=<peer id>&ts=<unix seconds>
//! ```
//!
//! Both are required. Extra parameters are ignored; when a parameter is
//! repeated the first occurrence wins.

use url::form_urlencoded;

use crate::{PeerId, ProtocolError};

/// The validated `uid` / `ts` pair from an upgrade request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionParams {
    /// Who is connecting. Never empty.
    pub uid: PeerId,
    /// When the request was issued, seconds since the Unix epoch.
    pub ts: i64,
}

impl AdmissionParams {
    /// Creates a parameter set.
    pub fn new(uid: impl Into<PeerId>, ts: i64) -> Self {
        Self {
            uid: uid.into(),
            ts,
        }
    }

    /// Parses and validates a raw query string (without the leading `?`).
    ///
    /// # Errors
    /// - [`ProtocolError::MissingParam`] if `uid` or `ts` is absent or empty
    /// - [`ProtocolError::InvalidParam`] if `ts` is not an integer
    pub fn from_query(query: Option<&str>) -> Result<Self, ProtocolError> {
        let mut uid = None;
        let mut ts = None;

        let query = query.unwrap_or_default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "uid" if uid.is_none() => uid = Some(value.into_owned()),
                "ts" if ts.is_none() => ts = Some(value.into_owned()),
                _ => {}
            }
        }

        let uid = uid
            .filter(|u| !u.is_empty())
            .ok_or(ProtocolError::MissingParam("uid"))?;
        let ts = ts
            .filter(|t| !t.is_empty())
            .ok_or(ProtocolError::MissingParam("ts"))?;
        let ts = ts.parse::<i64>().map_err(|e| ProtocolError::InvalidParam {
            name: "ts",
            reason: e.to_string(),
        })?;

        Ok(Self {
            uid: PeerId::new(uid),
            ts,
        })
    }

    /// Encodes the pair as a query string, percent-escaping the `uid`.
    pub fn to_query(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair("uid", self.uid.as_str())
            .append_pair("ts", &self.ts.to_string())
            .finish()
    }
}
