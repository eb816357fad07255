//! Session cookie issuance.
//!
//! Every token is written twice: once under its plain name and once under
//! its `__Host-` name. `__Host-` cookies are only accepted by browsers when
//! they are `Secure`, have `Path=/` and carry no `Domain`, so that variant is
//! always rendered with those attributes regardless of the request policy.

use axum::http::header::{InvalidHeaderValue, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, Uri};
use cookie::time::Duration;
use cookie::{Cookie, SameSite};

use crate::config::{SameSitePolicy, SessionConfig};

/// The two tokens a browser session holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub const ALL: [TokenKind; 2] = [TokenKind::Access, TokenKind::Refresh];

    pub fn cookie_name(self) -> &'static str {
        match self {
            TokenKind::Access => "accessToken",
            TokenKind::Refresh => "refreshToken",
        }
    }

    pub fn host_cookie_name(self) -> &'static str {
        match self {
            TokenKind::Access => "__Host-accessToken",
            TokenKind::Refresh => "__Host-refreshToken",
        }
    }

    /// Both names the token may arrive under, plain first.
    pub fn cookie_names(self) -> [&'static str; 2] {
        [self.cookie_name(), self.host_cookie_name()]
    }
}

/// Tokens obtained from a login or a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub access: String,
    pub refresh: Option<String>,
}

impl SessionTokens {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access)
    }
}

/// Cookie attributes decided once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    pub secure: bool,
    pub same_site: SameSite,
    pub access_max_age: Duration,
    pub refresh_max_age: Duration,
}

impl CookiePolicy {
    /// Derive the policy from the inbound request.
    ///
    /// `secure` follows the client-facing protocol; when the request does not
    /// say it arrived over https, production deployments still force it on.
    pub fn for_request(
        headers: &HeaderMap,
        uri: &Uri,
        session: &SessionConfig,
        same_site: SameSitePolicy,
    ) -> Self {
        Self {
            secure: is_https(headers, uri) || session.production,
            same_site: same_site.into(),
            access_max_age: Duration::seconds(session.access_max_age_secs),
            refresh_max_age: Duration::seconds(session.refresh_max_age_secs),
        }
    }

    fn max_age(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_max_age,
            TokenKind::Refresh => self.refresh_max_age,
        }
    }
}

fn is_https(headers: &HeaderMap, uri: &Uri) -> bool {
    let forwarded = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_ascii_lowercase());

    match forwarded {
        Some(proto) => proto == "https",
        None => uri.scheme_str() == Some("https"),
    }
}

/// One token rendered under both of its cookie names.
#[derive(Debug, Clone)]
pub struct SessionCookiePair {
    kind: TokenKind,
    value: String,
}

impl SessionCookiePair {
    pub fn new(kind: TokenKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// Cookies that store the token.
    pub fn issue(&self, policy: &CookiePolicy) -> Result<[HeaderValue; 2], InvalidHeaderValue> {
        self.render(policy.secure, policy.same_site, policy.max_age(self.kind))
    }

    /// Cookies that make the browser drop both names of `kind`.
    pub fn clear(kind: TokenKind, policy: &CookiePolicy) -> Result<[HeaderValue; 2], InvalidHeaderValue> {
        Self::new(kind, "").render(policy.secure, policy.same_site, Duration::ZERO)
    }

    fn render(
        &self,
        secure: bool,
        same_site: SameSite,
        max_age: Duration,
    ) -> Result<[HeaderValue; 2], InvalidHeaderValue> {
        let plain = build_cookie(self.kind.cookie_name(), &self.value, secure, same_site, max_age);
        let host = build_cookie(self.kind.host_cookie_name(), &self.value, true, same_site, max_age);

        Ok([to_header(&plain)?, to_header(&host)?])
    }
}

fn build_cookie(
    name: &'static str,
    value: &str,
    secure: bool,
    same_site: SameSite,
    max_age: Duration,
) -> Cookie<'static> {
    Cookie::build((name, value.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(same_site)
        .path("/")
        .max_age(max_age)
        .build()
}

fn to_header(cookie: &Cookie<'_>) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&cookie.encoded().to_string())
}

/// `Set-Cookie` values for a freshly obtained session.
///
/// The refresh pair is only written when the upstream rotated the refresh
/// token; otherwise the browser keeps the one it has.
pub fn issue_session(
    tokens: &SessionTokens,
    policy: &CookiePolicy,
) -> Result<Vec<HeaderValue>, InvalidHeaderValue> {
    let mut values = SessionCookiePair::new(TokenKind::Access, &tokens.access)
        .issue(policy)?
        .to_vec();
    if let Some(refresh) = &tokens.refresh {
        values.extend(SessionCookiePair::new(TokenKind::Refresh, refresh).issue(policy)?);
    }
    Ok(values)
}

/// `Set-Cookie` values that clear all four session cookies.
pub fn clear_session(policy: &CookiePolicy) -> Result<Vec<HeaderValue>, InvalidHeaderValue> {
    let mut values = Vec::with_capacity(4);
    for kind in TokenKind::ALL {
        values.extend(SessionCookiePair::clear(kind, policy)?);
    }
    Ok(values)
}

/// Append `Set-Cookie` headers to a response header map.
pub fn append_set_cookies(headers: &mut HeaderMap, values: Vec<HeaderValue>) {
    for value in values {
        headers.append(SET_COOKIE, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(secure: bool, same_site: SameSite) -> CookiePolicy {
        CookiePolicy {
            secure,
            same_site,
            access_max_age: Duration::seconds(900),
            refresh_max_age: Duration::seconds(2_592_000),
        }
    }

    fn parsed(value: &HeaderValue) -> Cookie<'static> {
        Cookie::parse_encoded(value.to_str().unwrap().to_string()).unwrap()
    }

    #[test]
    fn test_pair_renders_both_names() {
        let pair = SessionCookiePair::new(TokenKind::Access, "AT1");
        let [plain, host] = pair.issue(&policy(false, SameSite::Lax)).unwrap();

        let plain = parsed(&plain);
        assert_eq!(plain.name(), "accessToken");
        assert_eq!(plain.value(), "AT1");
        assert_eq!(plain.http_only(), Some(true));
        assert_eq!(plain.secure(), None);
        assert_eq!(plain.path(), Some("/"));
        assert_eq!(plain.same_site(), Some(SameSite::Lax));
        assert_eq!(plain.max_age(), Some(Duration::seconds(900)));

        let host = parsed(&host);
        assert_eq!(host.name(), "__Host-accessToken");
        assert_eq!(host.secure(), Some(true));
        assert_eq!(host.domain(), None);
        assert_eq!(host.path(), Some("/"));
    }

    #[test]
    fn test_refresh_max_age() {
        let pair = SessionCookiePair::new(TokenKind::Refresh, "RT1");
        let [plain, _] = pair.issue(&policy(true, SameSite::Strict)).unwrap();
        let plain = parsed(&plain);
        assert_eq!(plain.max_age(), Some(Duration::seconds(2_592_000)));
        assert_eq!(plain.secure(), Some(true));
        assert_eq!(plain.same_site(), Some(SameSite::Strict));
    }

    #[test]
    fn test_issue_session_without_rotated_refresh() {
        let tokens = SessionTokens {
            access: "AT2".into(),
            refresh: None,
        };
        let values = issue_session(&tokens, &policy(false, SameSite::Lax)).unwrap();
        let names: Vec<_> = values.iter().map(|v| parsed(v).name().to_string()).collect();
        assert_eq!(names, vec!["accessToken", "__Host-accessToken"]);
    }

    #[test]
    fn test_clear_session_zeroes_all_four() {
        let values = clear_session(&policy(false, SameSite::Lax)).unwrap();
        assert_eq!(values.len(), 4);
        for value in &values {
            let cookie = parsed(value);
            assert_eq!(cookie.value(), "");
            assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        }
        let names: Vec<_> = values.iter().map(|v| parsed(v).name().to_string()).collect();
        assert_eq!(
            names,
            vec!["accessToken", "__Host-accessToken", "refreshToken", "__Host-refreshToken"]
        );
    }

    #[test]
    fn test_token_value_is_encoded() {
        let pair = SessionCookiePair::new(TokenKind::Access, "a b;c");
        let [plain, _] = pair.issue(&policy(false, SameSite::Lax)).unwrap();
        assert!(!plain.to_str().unwrap().contains("a b;c"));
        assert_eq!(parsed(&plain).value(), "a b;c");
    }

    #[test]
    fn test_policy_secure_detection() {
        let session = SessionConfig::default();
        let uri: Uri = "/api/coupons".parse().unwrap();

        let mut headers = HeaderMap::new();
        let plain = CookiePolicy::for_request(&headers, &uri, &session, SameSitePolicy::Lax);
        assert!(!plain.secure);

        headers.insert("x-forwarded-proto", HeaderValue::from_static("https, http"));
        let forwarded = CookiePolicy::for_request(&headers, &uri, &session, SameSitePolicy::Lax);
        assert!(forwarded.secure);

        let absolute: Uri = "https://console.example.com/api/coupons".parse().unwrap();
        let direct = CookiePolicy::for_request(&HeaderMap::new(), &absolute, &session, SameSitePolicy::Lax);
        assert!(direct.secure);

        let production = SessionConfig {
            production: true,
            ..SessionConfig::default()
        };
        let fallback = CookiePolicy::for_request(&HeaderMap::new(), &uri, &production, SameSitePolicy::Strict);
        assert!(fallback.secure);
        assert_eq!(fallback.same_site, SameSite::Strict);
    }
}
