//! Session Payload
//!
//! The JSON object the session framework stores per session. Only a few
//! well-known fields are interpreted here; everything else is carried
//! through untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Request metadata kept inside the payload
pub const REQUEST_META_FIELD: &str = "reqMeta";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionPayload(Map<String, Value>);

/// Where a session was last used from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub last_visited: Option<DateTime<Utc>>,
}

/// Identity details the login collaborator leaves in the payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadIdentity {
    pub email: Option<String>,
    pub username: Option<String>,
}

impl SessionPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a serialized payload; anything but a JSON object is rejected.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| format!("payload is not JSON: {e}"))?;
        Self::try_from(value)
    }

    pub fn to_json_string(&self) -> Result<String, String> {
        serde_json::to_string(&self.0).map_err(|e| e.to_string())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    /// Owning user id
    ///
    /// A directly stored `userId` wins over the authentication framework's
    /// `passport.user`. Numeric ids are accepted and kept as strings.
    pub fn owner_user_id(&self) -> Result<Option<String>, String> {
        if let Some(owner) = user_id_value(self.0.get("userId"), "userId")? {
            return Ok(Some(owner));
        }
        let nested = self
            .0
            .get("passport")
            .and_then(Value::as_object)
            .and_then(|passport| passport.get("user"));
        user_id_value(nested, "passport.user")
    }

    /// Declared cookie expiry (`cookie.expires`)
    ///
    /// Accepts an RFC 3339 string or epoch milliseconds.
    pub fn cookie_expires(&self) -> Result<Option<DateTime<Utc>>, String> {
        let Some(cookie) = self.0.get("cookie") else {
            return Ok(None);
        };
        let expires = match cookie {
            Value::Null => return Ok(None),
            Value::Object(cookie) => cookie.get("expires"),
            _ => return Err("cookie must be an object".to_string()),
        };

        match expires {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|e| format!("cookie.expires is not a timestamp: {e}")),
            Some(Value::Number(n)) => n
                .as_i64()
                .and_then(DateTime::from_timestamp_millis)
                .map(Some)
                .ok_or_else(|| format!("cookie.expires out of range: {n}")),
            Some(other) => Err(format!("cookie.expires has unsupported type: {other}")),
        }
    }

    /// Request metadata from `reqMeta`, falling back per field to the legacy
    /// top-level `ip`, `userAgent` and `lastVisited`.
    pub fn request_meta(&self) -> RequestMeta {
        let nested = self.0.get(REQUEST_META_FIELD).and_then(Value::as_object);
        let field = |name: &str| {
            nested
                .and_then(|meta| meta.get(name))
                .filter(|v| !v.is_null())
                .or_else(|| self.0.get(name))
        };

        RequestMeta {
            ip: field("ip").and_then(Value::as_str).map(str::to_string),
            user_agent: field("userAgent").and_then(Value::as_str).map(str::to_string),
            last_visited: field("lastVisited").and_then(parse_timestamp),
        }
    }

    /// Record a request against this session
    ///
    /// The first request fixes ip and user agent; later ones only move
    /// `lastVisited` forward.
    pub fn record_request(
        &mut self,
        ip: Option<String>,
        user_agent: Option<String>,
        now: DateTime<Utc>,
    ) {
        match self
            .0
            .get_mut(REQUEST_META_FIELD)
            .and_then(Value::as_object_mut)
        {
            Some(meta) => {
                meta.insert("lastVisited".to_string(), json!(now.to_rfc3339()));
            }
            None => {
                self.0.insert(
                    REQUEST_META_FIELD.to_string(),
                    json!({
                        "ip": ip,
                        "userAgent": user_agent,
                        "lastVisited": now.to_rfc3339(),
                    }),
                );
            }
        }
    }

    /// Identity details under `identity {email, username}`
    pub fn identity(&self) -> PayloadIdentity {
        let identity = self.0.get("identity").and_then(Value::as_object);
        let text = |name: &str| {
            identity
                .and_then(|i| i.get(name))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        PayloadIdentity {
            email: text("email"),
            username: text("username"),
        }
    }

    /// What the authentication framework writes on login
    pub fn set_passport_user(&mut self, user_id: impl Into<String>) {
        self.0
            .insert("passport".to_string(), json!({ "user": user_id.into() }));
    }

    pub fn set_cookie_expires(&mut self, expires: DateTime<Utc>) {
        self.0.insert(
            "cookie".to_string(),
            json!({ "expires": expires.to_rfc3339() }),
        );
    }
}

impl TryFrom<Value> for SessionPayload {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(format!("payload must be a JSON object, got {other}")),
        }
    }
}

fn user_id_value(value: Option<&Value>, field: &str) -> Result<Option<String>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(format!("{field} must be a string or number, got {other}")),
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}
