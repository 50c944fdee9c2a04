//! Request parameters from either a form or a JSON body.
//!
//! Every endpoint accepts both encodings. Values are kept as text and parsed
//! leniently by the handlers, so a JSON number and a form field behave the
//! same.

use std::collections::HashMap;

use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(HashMap<String, String>);

impl Params {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Decode `body` as JSON when the content type says so or the body looks
    /// like an object; otherwise as `application/x-www-form-urlencoded`.
    /// Undecodable bodies yield no parameters.
    pub fn parse(content_type: Option<&str>, body: &[u8]) -> Self {
        let declared_json = content_type.is_some_and(|ct| ct.contains("json"));
        let looks_json = body.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{');
        if declared_json || looks_json {
            return Self::from_json(body);
        }
        match serde_urlencoded::from_bytes::<Vec<(String, String)>>(body) {
            Ok(pairs) => Self(pairs.into_iter().collect()),
            Err(e) => {
                debug!(error = %e, "ignoring undecodable form body");
                Self::default()
            }
        }
    }

    fn from_json(body: &[u8]) -> Self {
        let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) else {
            return Self::default();
        };
        let fields = map
            .into_iter()
            .filter_map(|(k, v)| {
                let text = match v {
                    Value::String(s) => s,
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => if b { "1" } else { "0" }.to_string(),
                    _ => return None,
                };
                Some((k, text))
            })
            .collect();
        Self(fields)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for Params {
    type Rejection = std::convert::Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = Bytes::from_request(req, state).await.unwrap_or_default();
        Ok(Self::parse(content_type.as_deref(), &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_body() {
        let p = Params::parse(
            Some("application/x-www-form-urlencoded"),
            b"dir=left&speed=80",
        );
        assert_eq!(p.get("dir"), Some("left"));
        assert_eq!(p.get("speed"), Some("80"));
        assert_eq!(p.get("missing"), None);
    }

    #[test]
    fn json_scalars_become_text() {
        let p = Params::parse(
            Some("application/json"),
            br#"{"x": 0.5, "y": -1, "name": "river", "state": true, "nested": {"a": 1}}"#,
        );
        assert_eq!(p.get("x"), Some("0.5"));
        assert_eq!(p.get("y"), Some("-1"));
        assert_eq!(p.get("name"), Some("river"));
        assert_eq!(p.get("state"), Some("1"));
        assert_eq!(p.get("nested"), None);
    }

    #[test]
    fn json_without_content_type() {
        let p = Params::parse(None, br#" {"pan": 100}"#);
        assert_eq!(p.get("pan"), Some("100"));
    }

    #[test]
    fn garbage_is_empty() {
        assert_eq!(Params::parse(Some("application/json"), b"{not json"), Params::default());
        assert_eq!(Params::parse(Some("application/json"), b"[1,2]"), Params::default());
        assert_eq!(Params::parse(None, b""), Params::default());
    }
}
