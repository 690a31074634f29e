use anyhow::Result;

use peerlink::bot::callback_handler::CallbackAction;
use peerlink::dialogue::BotState;

/// Dialogue states survive serde the way the storage backends keep them
#[tokio::test]
async fn test_dialogue_state_serialization() -> Result<()> {
    let state = BotState::BrowsingPeers {
        roles: vec!["backend".to_string(), "qa".to_string()],
        role: "qa".to_string(),
        level_id: 4,
        offset: 10,
        total: 25,
    };

    let json = serde_json::to_string(&state)?;
    let restored: BotState = serde_json::from_str(&json)?;
    assert_eq!(restored, state);
    assert_eq!(restored.search_roles().map(<[String]>::len), Some(2));

    Ok(())
}

/// Test basic dialogue functionality
#[tokio::test]
async fn test_dialogue_functionality() -> Result<()> {
    let start_state = BotState::default();
    assert!(matches!(start_state, BotState::Start));
    assert!(start_state.search_roles().is_none());

    let choosing = BotState::ChoosingRole {
        roles: vec!["devops".to_string()],
    };
    assert_eq!(
        choosing.search_roles(),
        Some(&["devops".to_string()][..])
    );

    Ok(())
}

#[test]
fn test_callback_data_parsing() {
    let cases = [
        ("skip_description", CallbackAction::SkipDescription),
        ("confirm", CallbackAction::Confirm),
        ("search_peers", CallbackAction::SearchPeers),
        ("search_restart", CallbackAction::RestartSearch),
        ("role_3", CallbackAction::Role(3)),
        ("level_4", CallbackAction::Level(4)),
        ("level_back", CallbackAction::LevelBack),
        ("page_next", CallbackAction::PageNext),
        ("page_prev", CallbackAction::PagePrevious),
        ("page_first", CallbackAction::PageFirst),
        ("user_42", CallbackAction::User(42)),
    ];

    for (data, action) in cases {
        assert_eq!(CallbackAction::parse(data), Some(action), "{data}");
        assert_eq!(action.to_data(), data);
    }
}

#[test]
fn test_callback_data_rejects_garbage() {
    assert_eq!(CallbackAction::parse(""), None);
    assert_eq!(CallbackAction::parse("role_"), None);
    assert_eq!(CallbackAction::parse("role_x"), None);
    assert_eq!(CallbackAction::parse("user_-"), None);
    assert_eq!(CallbackAction::parse("unknown"), None);
}

/// Callback data stays within Telegram's 64 byte limit
#[test]
fn test_callback_data_length() {
    let longest = CallbackAction::User(i64::MAX).to_data();
    assert!(longest.len() <= 64);
}
