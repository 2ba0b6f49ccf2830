use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

/// Maximum allowed nesting depth for outline elements.
const MAX_OPML_DEPTH: usize = 50;

#[derive(Debug, Error)]
pub enum OpmlError {
    #[error("OPML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),
    #[error("XML parse error: {0}")]
    XmlParse(String),
    #[error("XML write error: {0}")]
    XmlWrite(String),
    #[error("OPML file error: {0}")]
    Io(#[from] std::io::Error),
}

/// One subscription outline (`xmlUrl` present) from an OPML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpmlFeed {
    /// `title`, falling back to `text`
    pub title: Option<String>,
    pub xml_url: String,
    pub html_url: Option<String>,
    /// Name of the nearest enclosing folder outline, if any
    pub folder: Option<String>,
}

/// Read and parse an OPML file.
pub async fn read_opml_file(path: &Path) -> Result<Vec<OpmlFeed>, OpmlError> {
    let content = tokio::fs::read_to_string(path).await?;
    parse_opml(&content)
}

/// Parse OPML content into subscriptions.
///
/// Outlines without `xmlUrl` are treated as folders; feeds nested under them
/// carry the innermost folder's name.
///
/// quick-xml 0.37 never expands `<!ENTITY>` declarations, and values are read
/// with `decode_and_unescape_value`, so only the five predefined entities
/// resolve. Anything else is a parse error.
pub fn parse_opml(content: &str) -> Result<Vec<OpmlFeed>, OpmlError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut feeds = Vec::new();
    // One entry per open <outline>: Some(name) for folders, None for feeds.
    let mut open_outlines: Vec<Option<String>> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"outline" => {
                if open_outlines.len() >= MAX_OPML_DEPTH {
                    return Err(OpmlError::MaxDepthExceeded(MAX_OPML_DEPTH));
                }
                let outline = read_outline(&e, &reader)?;
                let folder_name = match outline.xml_url {
                    Some(_) => None,
                    None => outline.title.clone(),
                };
                push_feed(&mut feeds, outline, &open_outlines);
                open_outlines.push(folder_name);
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"outline" => {
                let outline = read_outline(&e, &reader)?;
                push_feed(&mut feeds, outline, &open_outlines);
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"outline" => {
                open_outlines.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpmlError::XmlParse(e.to_string())),
            _ => {}
        }
    }

    Ok(feeds)
}

struct Outline {
    title: Option<String>,
    xml_url: Option<String>,
    html_url: Option<String>,
}

fn read_outline(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Outline, OpmlError> {
    let mut outline = Outline {
        title: None,
        xml_url: None,
        html_url: None,
    };
    let mut text = None;

    for attr in e.attributes() {
        let attr = match attr {
            Ok(attr) => attr,
            Err(err) => {
                tracing::warn!(error = %err, "Skipping malformed OPML attribute");
                continue;
            }
        };
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|err| OpmlError::XmlParse(err.to_string()))?;
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match attr.key.as_ref() {
            b"xmlUrl" => outline.xml_url = Some(value.to_owned()),
            b"htmlUrl" => outline.html_url = Some(value.to_owned()),
            b"title" => outline.title = Some(value.to_owned()),
            b"text" => text = Some(value.to_owned()),
            _ => {}
        }
    }

    outline.title = outline.title.or(text);
    Ok(outline)
}

fn push_feed(feeds: &mut Vec<OpmlFeed>, outline: Outline, open_outlines: &[Option<String>]) {
    let Some(xml_url) = outline.xml_url else {
        return;
    };
    feeds.push(OpmlFeed {
        title: outline.title,
        xml_url,
        html_url: outline.html_url,
        folder: open_outlines.iter().rev().find_map(|f| f.clone()),
    });
}

fn write_err(e: impl std::fmt::Display) -> OpmlError {
    OpmlError::XmlWrite(e.to_string())
}

/// Render subscriptions as an OPML 2.0 document. Unfiled feeds come first,
/// then one folder outline per distinct folder in order of first appearance.
pub fn export_opml(feeds: &[OpmlFeed]) -> Result<String, OpmlError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(write_err)?;
    let mut opml = BytesStart::new("opml");
    opml.push_attribute(("version", "2.0"));
    writer.write_event(Event::Start(opml)).map_err(write_err)?;

    writer
        .write_event(Event::Start(BytesStart::new("head")))
        .map_err(write_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("title")))
        .map_err(write_err)?;
    writer
        .write_event(Event::Text(BytesText::new("gather subscriptions")))
        .map_err(write_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("title")))
        .map_err(write_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("head")))
        .map_err(write_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("body")))
        .map_err(write_err)?;

    let mut folders: Vec<(&str, Vec<&OpmlFeed>)> = Vec::new();
    for feed in feeds {
        match feed.folder.as_deref() {
            None => write_feed_outline(&mut writer, feed)?,
            Some(name) => match folders.iter_mut().find(|(n, _)| *n == name) {
                Some((_, members)) => members.push(feed),
                None => folders.push((name, vec![feed])),
            },
        }
    }

    for (name, members) in folders {
        let mut outline = BytesStart::new("outline");
        outline.push_attribute(("text", name));
        outline.push_attribute(("title", name));
        writer.write_event(Event::Start(outline)).map_err(write_err)?;
        for feed in members {
            write_feed_outline(&mut writer, feed)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("outline")))
            .map_err(write_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("body")))
        .map_err(write_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("opml")))
        .map_err(write_err)?;

    String::from_utf8(writer.into_inner().into_inner()).map_err(write_err)
}

fn write_feed_outline(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    feed: &OpmlFeed,
) -> Result<(), OpmlError> {
    let title = feed.title.as_deref().unwrap_or(&feed.xml_url);
    let mut outline = BytesStart::new("outline");
    outline.push_attribute(("type", "rss"));
    outline.push_attribute(("text", title));
    outline.push_attribute(("title", title));
    outline.push_attribute(("xmlUrl", feed.xml_url.as_str()));
    if let Some(html_url) = &feed.html_url {
        outline.push_attribute(("htmlUrl", html_url.as_str()));
    }
    writer.write_event(Event::Empty(outline)).map_err(write_err)
}

/// Write the OPML export to `path` atomically: a uniquely named temp file in
/// the same directory is written, synced, then renamed over the target.
pub async fn export_to_file(feeds: &[OpmlFeed], path: &Path) -> Result<(), OpmlError> {
    use tokio::io::AsyncWriteExt;

    let content = export_opml(feeds)?;

    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let temp_path = path.with_extension(format!("tmp.{}.{:016x}", std::process::id(), nanos));

    let result = async {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temp_path, path).await
    }
    .await;

    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn feed(url: &str, title: Option<&str>, folder: Option<&str>) -> OpmlFeed {
        OpmlFeed {
            title: title.map(str::to_string),
            xml_url: url.to_string(),
            html_url: None,
            folder: folder.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_nested_folders() {
        let content = r#"<?xml version="1.0" encoding="UTF-8"?>
<opml version="2.0">
  <head><title>Test Feeds</title></head>
  <body>
    <outline type="rss" text="Top" xmlUrl="https://top.example.com/rss"/>
    <outline text="Blogs" title="Blogs">
      <outline type="rss" text="Example" xmlUrl="https://example.com/feed.xml" htmlUrl="https://example.com"/>
      <outline text="Deep">
        <outline xmlUrl="https://deep.example.com/atom"/>
      </outline>
      <outline type="rss" text="After" xmlUrl="https://after.example.com/rss"/>
    </outline>
  </body>
</opml>"#;

        let feeds = parse_opml(content).unwrap();
        assert_eq!(
            feeds,
            vec![
                feed("https://top.example.com/rss", Some("Top"), None),
                OpmlFeed {
                    html_url: Some("https://example.com".to_string()),
                    ..feed("https://example.com/feed.xml", Some("Example"), Some("Blogs"))
                },
                feed("https://deep.example.com/atom", None, Some("Deep")),
                feed("https://after.example.com/rss", Some("After"), Some("Blogs")),
            ]
        );
    }

    #[test]
    fn test_title_prefers_title_over_text() {
        let content = r#"<opml version="2.0"><body>
            <outline text="Text" title="Title" xmlUrl="https://a.example.com/rss"/>
            <outline text="Only Text" xmlUrl="https://b.example.com/rss"/>
        </body></opml>"#;
        let feeds = parse_opml(content).unwrap();
        assert_eq!(feeds[0].title.as_deref(), Some("Title"));
        assert_eq!(feeds[1].title.as_deref(), Some("Only Text"));
    }

    #[test]
    fn test_blank_xml_url_is_a_folder() {
        let content = r#"<opml version="2.0"><body>
            <outline text="Empty" xmlUrl="  "/>
        </body></opml>"#;
        assert!(parse_opml(content).unwrap().is_empty());
    }

    #[test]
    fn test_custom_entity_rejected() {
        let content = r#"<?xml version="1.0"?>
<!DOCTYPE opml [<!ENTITY xxe SYSTEM "file:///etc/passwd">]>
<opml version="2.0"><body>
  <outline text="&xxe;" xmlUrl="https://example.com/feed"/>
</body></opml>"#;
        assert!(matches!(parse_opml(content), Err(OpmlError::XmlParse(_))));
    }

    #[test]
    fn test_depth_limit() {
        let mut content = String::from("<opml version=\"2.0\"><body>");
        for _ in 0..=MAX_OPML_DEPTH {
            content.push_str("<outline text=\"f\">");
        }
        for _ in 0..=MAX_OPML_DEPTH {
            content.push_str("</outline>");
        }
        content.push_str("</body></opml>");
        assert!(matches!(
            parse_opml(&content),
            Err(OpmlError::MaxDepthExceeded(_))
        ));
    }

    #[test]
    fn test_export_groups_by_folder_and_reparses() {
        let feeds = vec![
            feed("https://a.example.com/rss", Some("A & B"), Some("News")),
            feed("https://b.example.com/rss", None, None),
            feed("https://c.example.com/rss", Some("C"), Some("Tech")),
            feed("https://d.example.com/rss", Some("D"), Some("News")),
        ];

        let xml = export_opml(&feeds).unwrap();
        assert!(xml.contains("A &amp; B"));

        let reparsed = parse_opml(&xml).unwrap();
        let urls: Vec<_> = reparsed.iter().map(|f| f.xml_url.as_str()).collect();
        assert_eq!(
            urls,
            [
                "https://b.example.com/rss",
                "https://a.example.com/rss",
                "https://d.example.com/rss",
                "https://c.example.com/rss",
            ]
        );
        assert_eq!(reparsed[1].folder.as_deref(), Some("News"));
        assert_eq!(reparsed[3].folder.as_deref(), Some("Tech"));
        // Untitled feeds export their URL as the title
        assert_eq!(
            reparsed[0].title.as_deref(),
            Some("https://b.example.com/rss")
        );
    }

    #[tokio::test]
    async fn test_export_to_file_is_readable() {
        let dir = std::env::temp_dir().join(format!("gather_opml_test_{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("subs.opml");

        export_to_file(&[feed("https://a.example.com/rss", Some("A"), None)], &path)
            .await
            .unwrap();
        let feeds = read_opml_file(&path).await.unwrap();
        assert_eq!(feeds.len(), 1);

        let leftovers: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
