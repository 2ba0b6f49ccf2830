//! Integration tests for the store side of the connector lifecycle:
//! insert, fetch results, folders, proxy settings and deletion.
//!
//! Each test opens its own in-memory SQLite database.

use gather::storage::{
    ConnectorSettings, ConnectorType, Database, DatabaseError, FetchedPage, NewConnector,
    ProxySetting,
};

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

fn new_rss(url: &str) -> NewConnector {
    NewConnector {
        connector_type: ConnectorType::Rss,
        subscribe_url: Some(url.to_string()),
        name: Some("Example".to_string()),
        icon_url: None,
        enabled: true,
        crawl_full_content: false,
        display_sequence: 1,
        inbox_count: 0,
        created_at: 1_700_000_000,
    }
}

fn fetched(guid: &str) -> FetchedPage {
    FetchedPage {
        guid: guid.to_string(),
        url: Some(format!("https://example.com/{}", guid)),
        title: format!("Page {}", guid),
        description: Some("Summary".to_string()),
        content: None,
        author: None,
        published: Some(1_700_000_000),
    }
}

// ============================================================================
// Connectors
// ============================================================================

#[tokio::test]
async fn test_insert_and_lookup_by_url() {
    let db = test_db().await;
    let connector = db
        .insert_connector(&new_rss("https://example.com/feed.xml"))
        .await
        .unwrap();
    assert!(connector.id > 0);
    assert_eq!(connector.folder_id, None);
    assert_eq!(connector.fetch_interval_seconds, None);

    let found = db
        .get_connector_by_subscribe_url("https://example.com/feed.xml", ConnectorType::Rss)
        .await
        .unwrap();
    assert_eq!(found, Some(connector));

    let other_type = db
        .get_connector_by_subscribe_url("https://example.com/feed.xml", ConnectorType::Capture)
        .await
        .unwrap();
    assert_eq!(other_type, None);
}

#[tokio::test]
async fn test_list_connectors_filters_by_type() {
    let db = test_db().await;
    db.insert_connector(&new_rss("https://a.example/feed")).await.unwrap();
    db.insert_connector(&NewConnector {
        connector_type: ConnectorType::Capture,
        subscribe_url: None,
        ..new_rss("unused")
    })
    .await
    .unwrap();

    assert_eq!(db.list_connectors(None).await.unwrap().len(), 2);
    let rss = db.list_connectors(Some(ConnectorType::Rss)).await.unwrap();
    assert_eq!(rss.len(), 1);
    assert_eq!(rss[0].connector_type, ConnectorType::Rss);
}

#[tokio::test]
async fn test_settings_update_roundtrip() {
    let db = test_db().await;
    let folder = db.create_folder("Tech").await.unwrap();
    let connector = db
        .insert_connector(&new_rss("https://example.com/feed.xml"))
        .await
        .unwrap();

    let settings = ConnectorSettings {
        name: Some("Renamed".to_string()),
        enabled: false,
        crawl_full_content: true,
        subscribe_url: Some("https://example.com/atom.xml".to_string()),
        folder_id: Some(folder),
        fetch_interval_seconds: Some(3600),
    };
    let updated = db
        .update_connector_settings(connector.id, &settings)
        .await
        .unwrap();

    assert_eq!(updated.name.as_deref(), Some("Renamed"));
    assert!(!updated.enabled);
    assert!(updated.crawl_full_content);
    assert_eq!(updated.subscribe_url.as_deref(), Some("https://example.com/atom.xml"));
    assert_eq!(updated.folder_id, Some(folder));
    assert_eq!(updated.fetch_interval_seconds, Some(3600));
    assert_eq!(updated.created_at, connector.created_at);
}

// ============================================================================
// Pages
// ============================================================================

#[tokio::test]
async fn test_store_pages_is_idempotent_per_guid() {
    let db = test_db().await;
    let connector = db
        .insert_connector(&new_rss("https://example.com/feed.xml"))
        .await
        .unwrap();

    let inserted = db
        .store_fetched_pages(connector.id, None, &[fetched("a"), fetched("b")])
        .await
        .unwrap();
    assert_eq!(inserted, 2);

    let again = db
        .store_fetched_pages(connector.id, None, &[fetched("b"), fetched("c")])
        .await
        .unwrap();
    assert_eq!(again, 1);

    let pages = db.get_pages_for_connector(connector.id).await.unwrap();
    assert_eq!(pages.len(), 3);
    let stored = db.get_connector(connector.id).await.unwrap().unwrap();
    assert_eq!(stored.inbox_count, 3);
}

#[tokio::test]
async fn test_same_guid_under_two_connectors_is_kept_twice() {
    let db = test_db().await;
    let a = db.insert_connector(&new_rss("https://a.example/feed")).await.unwrap();
    let b = db.insert_connector(&new_rss("https://b.example/feed")).await.unwrap();

    db.store_fetched_pages(a.id, None, &[fetched("shared")]).await.unwrap();
    db.store_fetched_pages(b.id, None, &[fetched("shared")]).await.unwrap();

    assert_eq!(db.get_pages_for_connector(a.id).await.unwrap().len(), 1);
    assert_eq!(db.get_pages_for_connector(b.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_fetch_error_cleared_by_next_success() {
    let db = test_db().await;
    let connector = db
        .insert_connector(&new_rss("https://example.com/feed.xml"))
        .await
        .unwrap();

    db.set_connector_error(connector.id, "HTTP error: status 500").await.unwrap();
    let failed = db.get_connector(connector.id).await.unwrap().unwrap();
    assert_eq!(failed.error.as_deref(), Some("HTTP error: status 500"));

    db.store_fetched_pages(connector.id, None, &[]).await.unwrap();
    let recovered = db.get_connector(connector.id).await.unwrap().unwrap();
    assert_eq!(recovered.error, None);
    assert!(recovered.last_fetched.is_some());
}

#[tokio::test]
async fn test_delete_connector_removes_only_its_pages() {
    let db = test_db().await;
    let doomed = db.insert_connector(&new_rss("https://a.example/feed")).await.unwrap();
    let kept = db.insert_connector(&new_rss("https://b.example/feed")).await.unwrap();
    db.store_fetched_pages(doomed.id, None, &[fetched("1"), fetched("2")])
        .await
        .unwrap();
    db.store_fetched_pages(kept.id, None, &[fetched("3")]).await.unwrap();

    let removed = db.delete_connector_with_pages(doomed.id).await.unwrap();
    assert_eq!(removed, 2);

    assert_eq!(db.get_connector(doomed.id).await.unwrap(), None);
    assert!(db.get_pages_for_connector(doomed.id).await.unwrap().is_empty());
    assert_eq!(db.get_pages_for_connector(kept.id).await.unwrap().len(), 1);
}

// ============================================================================
// Folders
// ============================================================================

#[tokio::test]
async fn test_new_pages_inherit_folder_and_move_with_it() {
    let db = test_db().await;
    let news = db.create_folder("News").await.unwrap();
    let later = db.create_folder("Later").await.unwrap();
    let connector = db
        .insert_connector(&new_rss("https://example.com/feed.xml"))
        .await
        .unwrap();

    db.store_fetched_pages(connector.id, Some(news), &[fetched("a"), fetched("b")])
        .await
        .unwrap();
    let pages = db.get_pages_for_connector(connector.id).await.unwrap();
    assert!(pages.iter().all(|p| p.folder_id == Some(news)));

    let moved = db
        .update_pages_folder_by_connector(connector.id, Some(later))
        .await
        .unwrap();
    assert_eq!(moved, 2);
    let pages = db.get_pages_for_connector(connector.id).await.unwrap();
    assert!(pages.iter().all(|p| p.folder_id == Some(later)));
}

#[tokio::test]
async fn test_folder_name_must_not_be_blank() {
    let db = test_db().await;
    assert!(matches!(
        db.create_folder("   ").await,
        Err(DatabaseError::InvalidName(_))
    ));
}

// ============================================================================
// Proxy
// ============================================================================

#[tokio::test]
async fn test_proxy_setting_roundtrip_and_clear() {
    let db = test_db().await;
    assert_eq!(db.get_proxy_setting().await.unwrap(), None);

    let proxy = ProxySetting {
        host: "127.0.0.1".to_string(),
        port: 7890,
    };
    db.set_proxy_setting(Some(&proxy)).await.unwrap();
    assert_eq!(db.get_proxy_setting().await.unwrap(), Some(proxy));

    db.set_proxy_setting(None).await.unwrap();
    assert_eq!(db.get_proxy_setting().await.unwrap(), None);
}
