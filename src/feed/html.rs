//! Minimal string-scanning helpers for HTML pages.
//!
//! No HTML parser is involved: tags are located case-insensitively and
//! attribute values are read from the original text to preserve URL case.

/// Iterate over every `<name ...>` opening tag in `html`, yielding the tag's
/// original text including the angle brackets.
pub(crate) fn find_tags<'a>(html: &'a str, name: &str) -> Vec<&'a str> {
    let lower = html.to_ascii_lowercase();
    let needle = format!("<{name}");
    let mut tags = Vec::new();
    let mut search_from = 0;

    while let Some(pos) = lower[search_from..].find(&needle) {
        let start = search_from + pos;
        let after = start + needle.len();
        // Reject prefixes of longer tag names (`<linkx`, `<link-foo`).
        let boundary = lower[after..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_whitespace() || c == '>' || c == '/');
        let Some(end) = lower[start..].find('>') else {
            break;
        };
        if boundary {
            tags.push(&html[start..=start + end]);
        }
        search_from = start + end + 1;
    }

    tags
}

/// Value of `attr_name` in a single tag, case-preserving. Handles double,
/// single and unquoted values.
pub(crate) fn extract_attr_value<'a>(tag: &'a str, attr_name: &str) -> Option<&'a str> {
    let lower = tag.to_ascii_lowercase();
    let mut search_from = 0;

    loop {
        let pos = lower[search_from..].find(attr_name)? + search_from;
        search_from = pos + attr_name.len();

        let preceded_by_space = lower[..pos]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_whitespace());
        let rest = lower[search_from..].trim_start();
        if !preceded_by_space || !rest.starts_with('=') {
            continue;
        }

        let value_offset = tag.len() - rest.len() + 1;
        let value = tag[value_offset..].trim_start();
        return match value.chars().next()? {
            quote @ ('"' | '\'') => {
                let inner = &value[1..];
                inner.find(quote).map(|end| &inner[..end])
            }
            _ => {
                let end = value
                    .find(|c: char| c.is_ascii_whitespace() || c == '>')
                    .unwrap_or(value.len());
                Some(&value[..end])
            }
        };
    }
}

/// Resolve a possibly relative `href` against `base_url`.
pub(crate) fn resolve_url(href: &str, base_url: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let base = url::Url::parse(base_url).ok()?;
    let resolved = base.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

/// The inner HTML of the main content region of a page: the first
/// `<article>`, else `<main>`, else `<body>`, else the whole document.
pub(crate) fn extract_main_region(html: &str) -> &str {
    ["article", "main", "body"]
        .into_iter()
        .find_map(|name| inner_html(html, name))
        .unwrap_or(html)
        .trim()
}

fn inner_html<'a>(html: &'a str, name: &str) -> Option<&'a str> {
    let open = *find_tags(html, name).first()?;
    let open_start = open.as_ptr() as usize - html.as_ptr() as usize;
    let content_start = open_start + open.len();

    let lower = html.to_ascii_lowercase();
    let close = format!("</{name}");
    let content_end = lower[content_start..]
        .rfind(&close)
        .map(|pos| content_start + pos)?;
    Some(&html[content_start..content_end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_tags_respects_name_boundary() {
        let html = r#"<LINK rel="icon" href="/a.ico"><linkage><link href="/b">"#;
        let tags = find_tags(html, "link");
        assert_eq!(tags, [r#"<LINK rel="icon" href="/a.ico">"#, r#"<link href="/b">"#]);
    }

    #[test]
    fn test_extract_attr_value_quoting() {
        assert_eq!(
            extract_attr_value(r#"<link HREF="/Feed.XML">"#, "href"),
            Some("/Feed.XML")
        );
        assert_eq!(extract_attr_value("<link href='/a'>", "href"), Some("/a"));
        assert_eq!(extract_attr_value("<link href=/a rel=icon>", "href"), Some("/a"));
        assert_eq!(extract_attr_value("<link rel=icon>", "href"), None);
    }

    #[test]
    fn test_extract_attr_value_skips_prefixed_names() {
        assert_eq!(
            extract_attr_value(r#"<link data-href="/x" href="/y">"#, "href"),
            Some("/y")
        );
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url("/favicon.png", "https://example.com/blog/"),
            Some("https://example.com/favicon.png".to_string())
        );
        assert_eq!(
            resolve_url("//cdn.example.com/i.ico", "https://example.com/"),
            Some("https://cdn.example.com/i.ico".to_string())
        );
        assert_eq!(resolve_url("javascript:alert(1)", "https://example.com/"), None);
        assert_eq!(resolve_url("", "https://example.com/"), None);
    }

    #[test]
    fn test_extract_main_region_prefers_article() {
        let html = "<html><body><nav>x</nav><article class=\"post\"><p>Hi</p></article></body></html>";
        assert_eq!(extract_main_region(html), "<p>Hi</p>");
    }

    #[test]
    fn test_extract_main_region_falls_back() {
        assert_eq!(
            extract_main_region("<html><BODY>\n<p>Body</p>\n</BODY></html>"),
            "<p>Body</p>"
        );
        assert_eq!(extract_main_region("plain text"), "plain text");
    }
}
