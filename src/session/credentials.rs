//! Credential extraction from inbound requests.

use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::HeaderMap;
use cookie::Cookie;

use crate::session::cookies::TokenKind;

/// Where a bearer token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// `Authorization` header, used verbatim.
    Header,
    /// Access-token cookie.
    Cookie,
    /// Minted during this request from the refresh cookie.
    Refreshed,
}

/// A resolved `Authorization` header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub bearer: String,
    pub source: CredentialSource,
}

/// Header token first, access-token cookie second.
pub fn bearer_from_headers(headers: &HeaderMap) -> Option<Credential> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(bearer) = header {
        return Some(Credential {
            bearer: bearer.to_string(),
            source: CredentialSource::Header,
        });
    }

    cookie_value(headers, TokenKind::Access).map(|token| Credential {
        bearer: format!("Bearer {}", token),
        source: CredentialSource::Cookie,
    })
}

/// The refresh token cookie, if the browser holds one.
pub fn refresh_token_from_headers(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, TokenKind::Refresh)
}

/// First cookie named after `kind`, percent-decoded. An empty first match
/// counts as absent.
fn cookie_value(headers: &HeaderMap, kind: TokenKind) -> Option<String> {
    let names = kind.cookie_names();

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse_encoded)
        .filter_map(Result::ok)
        .find(|c| names.contains(&c.name()))
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn test_authorization_header_wins() {
        let h = headers(&[("authorization", "Bearer HDR"), ("cookie", "accessToken=CK")]);
        let credential = bearer_from_headers(&h).unwrap();
        assert_eq!(credential.bearer, "Bearer HDR");
        assert_eq!(credential.source, CredentialSource::Header);
    }

    #[test]
    fn test_cookie_fallback_is_decoded() {
        let h = headers(&[("cookie", "theme=dark; accessToken=abc%2Edef%3D ; other=1")]);
        let credential = bearer_from_headers(&h).unwrap();
        assert_eq!(credential.bearer, "Bearer abc.def=");
        assert_eq!(credential.source, CredentialSource::Cookie);
    }

    #[test]
    fn test_host_prefixed_cookie() {
        let h = headers(&[("cookie", "__Host-accessToken=HOST")]);
        assert_eq!(bearer_from_headers(&h).unwrap().bearer, "Bearer HOST");
    }

    #[test]
    fn test_first_matching_cookie_decides() {
        let h = headers(&[("cookie", "__Host-accessToken=FIRST; accessToken=SECOND")]);
        assert_eq!(bearer_from_headers(&h).unwrap().bearer, "Bearer FIRST");

        let empty_first = headers(&[("cookie", "accessToken=; __Host-accessToken=LATER")]);
        assert!(bearer_from_headers(&empty_first).is_none());
    }

    #[test]
    fn test_multiple_cookie_headers_and_junk() {
        let h = headers(&[("cookie", "junk; a=b"), ("cookie", "refreshToken=RT")]);
        assert!(bearer_from_headers(&h).is_none());
        assert_eq!(refresh_token_from_headers(&h).as_deref(), Some("RT"));
    }

    #[test]
    fn test_blank_authorization_falls_through() {
        let h = headers(&[("authorization", " "), ("cookie", "accessToken=CK")]);
        assert_eq!(bearer_from_headers(&h).unwrap().source, CredentialSource::Cookie);
    }

    #[test]
    fn test_no_credentials() {
        assert!(bearer_from_headers(&HeaderMap::new()).is_none());
        assert!(refresh_token_from_headers(&HeaderMap::new()).is_none());
    }
}
