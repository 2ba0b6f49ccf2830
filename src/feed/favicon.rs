use crate::util::validate_feed_url;

use super::fetcher::{fetch_bytes, read_limited_bytes, FetchError};
use super::html::{extract_attr_value, find_tags, resolve_url};

const MAX_ICON_SIZE: usize = 1024 * 1024; // 1MB

/// Best-effort favicon lookup for a site home page.
///
/// Looks for a `<link rel="icon">` (or `shortcut icon`, `apple-touch-icon`)
/// in the home page, falling back to `/favicon.ico` when the server actually
/// serves one. `Ok(None)` means the page loaded but no icon was found.
pub async fn favicon_from_home(
    client: &reqwest::Client,
    home_url: &str,
    allow_private_hosts: bool,
) -> Result<Option<String>, FetchError> {
    let home = validate_feed_url(home_url, allow_private_hosts)?;
    let bytes = fetch_bytes(client, &home, 0).await?;
    let html = String::from_utf8_lossy(&bytes);

    if let Some(icon) = find_icon_link(&html, home.as_str()) {
        return Ok(Some(icon));
    }

    let Ok(fallback) = home.join("/favicon.ico") else {
        return Ok(None);
    };
    let response = client.get(fallback.as_str()).send().await?;
    if !response.status().is_success() {
        tracing::debug!(url = %fallback, status = %response.status(), "No favicon.ico");
        return Ok(None);
    }
    let body = read_limited_bytes(response, MAX_ICON_SIZE).await?;
    Ok((!body.is_empty()).then(|| fallback.to_string()))
}

/// First `<link>` whose `rel` names an icon, resolved against `base_url`.
fn find_icon_link(html: &str, base_url: &str) -> Option<String> {
    find_tags(html, "link").into_iter().find_map(|tag| {
        let rel = extract_attr_value(tag, "rel")?.to_ascii_lowercase();
        let is_icon = rel
            .split_ascii_whitespace()
            .any(|token| matches!(token, "icon" | "apple-touch-icon"));
        if !is_icon {
            return None;
        }
        resolve_url(extract_attr_value(tag, "href")?, base_url)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_find_icon_link_variants() {
        let html = r#"<head>
            <link rel="stylesheet" href="/s.css">
            <link rel="shortcut icon" href="/img/fav.png">
        </head>"#;
        assert_eq!(
            find_icon_link(html, "https://example.com/"),
            Some("https://example.com/img/fav.png".to_string())
        );
        assert_eq!(find_icon_link("<link rel=stylesheet href=/a>", "https://e.com/"), None);
    }

    #[tokio::test]
    async fn test_icon_from_link_tag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<html><head><link rel="icon" href="/icon.svg"></head></html>"#),
            )
            .mount(&server)
            .await;

        let home = format!("{}/", server.uri());
        let icon = favicon_from_home(&reqwest::Client::new(), &home, true)
            .await
            .unwrap();
        assert_eq!(icon, Some(format!("{}/icon.svg", server.uri())));
    }

    #[tokio::test]
    async fn test_falls_back_to_favicon_ico() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/favicon.ico"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8, 1, 2]))
            .mount(&server)
            .await;

        let icon = favicon_from_home(&reqwest::Client::new(), &server.uri(), true)
            .await
            .unwrap();
        assert_eq!(icon, Some(format!("{}/favicon.ico", server.uri())));
    }

    #[tokio::test]
    async fn test_no_icon_anywhere() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let icon = favicon_from_home(&reqwest::Client::new(), &server.uri(), true)
            .await
            .unwrap();
        assert_eq!(icon, None);
    }
}
