//! Peer search over the in-memory store: query building plus paging.

use anyhow::Result;
use chrono::Utc;

use peerlink::search::{build_query, Page, PageMove};
use peerlink::store::{MemoryUserStore, UserRecord, UserStore, DEFAULT_LEVEL_ID, EMPTY_SENTINEL};

fn record(telegram_id: i64, role: &str, level_id: i32, is_registered: bool) -> UserRecord {
    UserRecord {
        id: 0,
        telegram_id,
        username: Some(format!("user{telegram_id}")),
        sber_id: format!("sber.{telegram_id}"),
        school21_nickname: format!("nick{telegram_id}"),
        team_name: "Lab.X".to_string(),
        role: role.to_string(),
        level_id,
        description: EMPTY_SENTINEL.to_string(),
        is_admin: false,
        is_registered,
        field_not_filled: None,
        registration_date: Utc::now(),
    }
}

async fn populated_store() -> MemoryUserStore {
    let store = MemoryUserStore::new();
    for telegram_id in 1..=12 {
        let level = if telegram_id % 2 == 0 { 4 } else { 2 };
        store.insert_record(record(telegram_id, "backend", level, true)).await;
    }
    store.insert_record(record(100, "qa", 3, true)).await;
    store.insert_record(record(101, "analyst", 3, false)).await;
    store.insert_record(record(102, EMPTY_SENTINEL, DEFAULT_LEVEL_ID, true)).await;
    store
}

#[tokio::test]
async fn test_roles_exclude_unregistered_and_sentinel() -> Result<()> {
    let store = populated_store().await;
    assert_eq!(store.registered_roles().await?, vec!["backend", "qa"]);
    Ok(())
}

#[tokio::test]
async fn test_any_level_walks_all_pages() -> Result<()> {
    let store = populated_store().await;
    let limit = 5;

    let mut offset = 0;
    let mut seen = Vec::new();
    loop {
        let result = store
            .search_users(&build_query("backend", DEFAULT_LEVEL_ID, offset, limit))
            .await?;
        let page = Page::new(offset, limit, result.total);
        assert_eq!(page.count(), 3);
        seen.extend(result.users.into_iter().map(|u| u.id));

        if !page.has_next() {
            assert_eq!(page.number(), 3);
            break;
        }
        offset = page.moved(PageMove::Next);
    }

    assert_eq!(seen.len(), 12);
    Ok(())
}

#[tokio::test]
async fn test_level_filter_and_back_to_first() -> Result<()> {
    let store = populated_store().await;

    let result = store.search_users(&build_query("backend", 4, 5, 5)).await?;
    assert_eq!(result.total, 6);
    assert_eq!(result.users.len(), 1);

    let page = Page::new(5, 5, result.total);
    assert!(page.has_prev());
    assert!(!page.has_next());
    assert_eq!(page.moved(PageMove::First), 0);
    assert_eq!(page.moved(PageMove::Previous), 0);
    Ok(())
}

#[tokio::test]
async fn test_no_matches() -> Result<()> {
    let store = populated_store().await;

    let result = store.search_users(&build_query("qa", 4, 0, 10)).await?;
    assert_eq!(result.total, 0);
    assert!(result.users.is_empty());
    assert_eq!(Page::new(0, 10, result.total).count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_user_card_resolves_level_name() -> Result<()> {
    let store = populated_store().await;
    let result = store.search_users(&build_query("qa", DEFAULT_LEVEL_ID, 0, 10)).await?;

    let card = store
        .user_card(result.users[0].id)
        .await?
        .expect("card for listed user");
    assert_eq!(card.level_name, "Middle");
    assert_eq!(card.school21_nickname, "nick100");
    assert!(store.user_card(9999).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_user_card_hides_unregistered_users() -> Result<()> {
    let store = populated_store().await;
    let abandoned = store.insert_record(record(200, "backend", 4, false)).await;

    assert!(store.user_card(abandoned.id).await?.is_none());
    Ok(())
}
