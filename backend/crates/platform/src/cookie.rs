//! Cookie parsing

use axum::http::{HeaderMap, header};

/// Extract a cookie value from the Cookie header(s)
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|cookie| {
            let (key, value) = cookie.trim().split_once('=')?;
            (key == name && !value.is_empty()).then(|| value.to_string())
        })
}

/// Session id carried by a session cookie.
///
/// Signed cookies look like `s:<id>.<signature>`; verifying the signature is
/// the session framework's job, only the id part is returned here.
pub fn session_id_from_cookie(value: &str) -> &str {
    match value.strip_prefix("s%3A").or_else(|| value.strip_prefix("s:")) {
        Some(signed) => signed.rsplit_once('.').map_or(signed, |(id, _)| id),
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("foo=bar; connect.sid=abc123; other=xyz"),
        );

        assert_eq!(
            extract_cookie(&headers, "connect.sid"),
            Some("abc123".to_string())
        );
        assert_eq!(extract_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_empty_cookie_value_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("connect.sid="));
        assert_eq!(extract_cookie(&headers, "connect.sid"), None);
    }

    #[test]
    fn test_session_id_from_signed_cookie() {
        assert_eq!(session_id_from_cookie("s:abc123.sigsig"), "abc123");
        assert_eq!(session_id_from_cookie("s%3Aabc123.sigsig"), "abc123");
        assert_eq!(session_id_from_cookie("plain-id"), "plain-id");
    }
}
