//! Request shaping: URLs, headers and flat bodies

use serde_json::Value;

use crate::config::Profile;
use crate::context::AppContext;
use crate::resource::Attributes;
use crate::sync::Paging;

pub const USER_ID_HEADER: &str = "X-ANNOTATIONS-USER-ID";
pub const AUTH_TOKEN_HEADER: &str = "X-ANNOTATIONS-USER-AUTH-TOKEN";
pub const SIGNED_URL_HEADER: &str = "X-ANNOTATIONS-SIGNED-URL";
pub const MEDIA_PACKAGE_HEADER: &str = "X-ANNOTATIONS-MEDIA-PACKAGE-ID";

/// Join the API base and a relative resource path
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if base.is_empty() {
        format!("/{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Move query fragments that ended up mid-path back to the end.
///
/// `videos?x=1/tracks/2` becomes `videos/tracks/2?x=1`.
pub fn sanitize_url(url: &str) -> String {
    let mut path = String::with_capacity(url.len());
    let mut queries: Vec<&str> = Vec::new();
    let mut rest = url;

    while let Some(q) = rest.find('?') {
        path.push_str(&rest[..q]);
        let after = &rest[q + 1..];
        match after.find('/') {
            Some(slash) => {
                queries.push(&after[..slash]);
                rest = &after[slash..];
            }
            None => {
                queries.push(after);
                rest = "";
            }
        }
    }
    path.push_str(rest);

    let queries: Vec<&str> = queries.into_iter().filter(|q| !q.is_empty()).collect();
    if queries.is_empty() {
        path
    } else {
        format!("{}?{}", path, queries.join("&"))
    }
}

/// Append a paging query to a collection URL.
///
/// Only a query in the last path segment is extended; mid-path fragments are
/// left for [`sanitize_url`].
pub fn with_paging(url: &str, paging: Option<Paging>) -> String {
    match paging {
        None => url.to_string(),
        Some(paging) => {
            let last_segment = url.rsplit('/').next().unwrap_or(url);
            let separator = if last_segment.contains('?') { '&' } else { '?' };
            format!("{url}{separator}{}", paging.query())
        }
    }
}

/// Headers attached to every call, computed per request
pub fn auth_headers(ctx: &AppContext) -> Vec<(String, String)> {
    let mut headers = Vec::new();

    if let Some(user) = &ctx.user {
        headers.push((USER_ID_HEADER.to_string(), user.id.clone()));
        if let Some(token) = &user.auth_token {
            headers.push((AUTH_TOKEN_HEADER.to_string(), token.clone()));
        }
    }

    let backend = &ctx.settings.backend;
    if backend.profile == Profile::Opencast {
        if !backend.signed_url.trim().is_empty() {
            headers.push((SIGNED_URL_HEADER.to_string(), backend.signed_url.trim().to_string()));
        }
        if !backend.media_package_id.trim().is_empty() {
            headers.push((
                MEDIA_PACKAGE_HEADER.to_string(),
                backend.media_package_id.trim().to_string(),
            ));
        }
    }

    headers
}

/// Flatten wire attributes into form fields.
///
/// Nested objects and arrays are stringified here so the form encoder only
/// ever sees scalars.
pub fn flatten_body(attrs: &Attributes) -> Vec<(String, String)> {
    attrs
        .iter()
        .filter_map(|(key, value)| {
            let encoded = match value {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                nested @ (Value::Array(_) | Value::Object(_)) => nested.to_string(),
            };
            Some((key.clone(), encoded))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::context::User;
    use serde_json::json;

    #[test]
    fn sanitize_moves_mid_path_query_to_end() {
        assert_eq!(
            sanitize_url("https://h/api/videos?mp=abc/tracks/2"),
            "https://h/api/videos/tracks/2?mp=abc"
        );
        assert_eq!(
            sanitize_url("/videos?a=1/tracks?b=2/annotations"),
            "/videos/tracks/annotations?a=1&b=2"
        );
        assert_eq!(sanitize_url("/videos/1?limit=5"), "/videos/1?limit=5");
        assert_eq!(sanitize_url("/videos/1"), "/videos/1");
    }

    #[test]
    fn join_ignores_duplicate_slashes() {
        assert_eq!(join_url("http://h/api/", "/videos/1"), "http://h/api/videos/1");
        assert_eq!(join_url("", "videos"), "/videos");
    }

    #[test]
    fn paging_appends_query() {
        let paging = Paging { limit: 10, offset: 20 };
        assert_eq!(with_paging("/tracks", Some(paging)), "/tracks?limit=10&offset=20");
        assert_eq!(with_paging("/tracks?x=1", Some(paging)), "/tracks?x=1&limit=10&offset=20");
        assert_eq!(with_paging("/tracks", None), "/tracks");
        assert_eq!(
            sanitize_url(&with_paging("/videos?mp=1/tracks", Some(paging))),
            "/videos/tracks?mp=1&limit=10&offset=20"
        );
    }

    #[test]
    fn anonymous_requests_carry_no_user_headers() {
        let ctx = AppContext::default();
        assert!(auth_headers(&ctx).is_empty());
    }

    #[test]
    fn opencast_profile_adds_signed_url_headers() {
        let mut settings = Settings::default();
        settings.backend.profile = Profile::Opencast;
        settings.backend.signed_url = "https://media/v.mp4?sig=1".to_string();
        settings.backend.media_package_id = "mp-1".to_string();
        let ctx = AppContext::new(settings, Some(User::new("7", "seven").with_token("t0k")));

        let headers = auth_headers(&ctx);
        let names: Vec<&str> = headers.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            names,
            [USER_ID_HEADER, AUTH_TOKEN_HEADER, SIGNED_URL_HEADER, MEDIA_PACKAGE_HEADER]
        );
    }

    #[test]
    fn flatten_stringifies_nested_values() {
        let attrs = match json!({
            "start": 1.5,
            "text": "hi",
            "label": {"id": "1", "category": {"name": "c"}},
            "tags": "{\"a\":1}",
            "missing": null
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };

        let form = flatten_body(&attrs);
        let get = |k: &str| form.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());
        assert_eq!(get("start"), Some("1.5"));
        assert_eq!(get("tags"), Some("{\"a\":1}"));
        assert_eq!(get("missing"), None);

        let label: Value = serde_json::from_str(get("label").unwrap()).unwrap();
        assert_eq!(label["category"]["name"], "c");
    }
}
