//! # Registration Tests
//!
//! End-to-end tests of the registration controller against the in-memory
//! store. Timer tests run on a paused tokio clock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use peerlink::errors::ValidationError;
use peerlink::registration::{
    ConfirmOutcome, Prompt, RegistrationController, RegistrationNotifier, RegistrationStep,
    StepOutcome, UserIdentity, SKIPPED_DESCRIPTION,
};
use peerlink::store::{Level, MemoryUserStore, UserStore, DEFAULT_LEVEL_ID, EMPTY_SENTINEL};

const TIMEOUT: Duration = Duration::from_secs(6 * 3600);

#[derive(Default)]
struct RecordingNotifier {
    interrupted: Mutex<Vec<UserIdentity>>,
}

impl RecordingNotifier {
    fn count(&self) -> usize {
        self.interrupted.lock().unwrap().len()
    }
}

#[async_trait]
impl RegistrationNotifier for RecordingNotifier {
    async fn registration_interrupted(&self, identity: &UserIdentity) {
        self.interrupted.lock().unwrap().push(identity.clone());
    }
}

struct Harness {
    store: Arc<MemoryUserStore>,
    notifier: Arc<RecordingNotifier>,
    controller: RegistrationController,
}

fn setup() -> Harness {
    let store = Arc::new(MemoryUserStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let controller = RegistrationController::new(store.clone(), notifier.clone(), TIMEOUT);
    Harness {
        store,
        notifier,
        controller,
    }
}

fn identity(telegram_id: i64) -> UserIdentity {
    UserIdentity::new(telegram_id, Some(format!("user{telegram_id}")))
}

async fn submit_all(controller: &RegistrationController, telegram_id: i64, answers: &[&str]) {
    for answer in answers {
        let outcome = controller.submit_text(telegram_id, answer).await.unwrap();
        assert!(
            matches!(outcome, StepOutcome::Advanced(_)),
            "answer {answer:?} was not accepted: {outcome:?}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_before_role_is_saved_partially() {
    let h = setup();
    h.controller.start(identity(1)).await.unwrap();
    submit_all(&h.controller, 1, &["ivanov", "ivanov.s", "Lab.X"]).await;

    tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;

    let record = h.store.find_user(1).await.unwrap().unwrap();
    assert!(!record.is_registered);
    assert_eq!(record.field_not_filled.as_deref(), Some("role_level"));
    assert_eq!(record.school21_nickname, "ivanov");
    assert_eq!(record.sber_id, "ivanov.s");
    assert_eq!(record.team_name, "Lab.X");
    assert_eq!(record.role, EMPTY_SENTINEL);
    assert_eq!(record.level_id, DEFAULT_LEVEL_ID);
    assert_eq!(record.description, EMPTY_SENTINEL);
    assert_eq!(record.username.as_deref(), Some("user1"));

    assert_eq!(h.store.write_count(), 1);
    assert_eq!(h.notifier.count(), 1);
    assert_eq!(h.controller.current_step(1).await, None);
}

#[tokio::test(start_paused = true)]
async fn test_full_registration_then_no_timer_effect() {
    let h = setup();
    assert_eq!(h.controller.start(identity(1)).await.unwrap(), Prompt::AskNickname);
    submit_all(
        &h.controller,
        1,
        &["ivanov", "ivanov.s", "Lab.X", "Senior golang разработчик", "платёжный шлюз"],
    )
    .await;
    assert_eq!(
        h.controller.current_step(1).await,
        Some(RegistrationStep::AwaitingConfirmation)
    );

    let ConfirmOutcome::Registered(record) = h.controller.confirm(1).await.unwrap() else {
        panic!("registration was not confirmed");
    };
    assert!(record.is_registered);
    assert_eq!(record.field_not_filled, None);
    assert_eq!(record.level_id, 4);
    assert_eq!(record.role, "golang разработчик");
    assert_eq!(record.description, "платёжный шлюз");

    tokio::time::sleep(TIMEOUT * 2).await;
    assert_eq!(h.store.write_count(), 1);
    assert_eq!(h.notifier.count(), 0);
    assert_eq!(h.controller.sessions().active_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_fire_writes_nothing() {
    let h = setup();
    h.controller.start(identity(1)).await.unwrap();
    submit_all(&h.controller, 1, &["ivanov"]).await;

    assert!(h.controller.cancel(1).await);
    tokio::time::sleep(TIMEOUT * 2).await;

    assert_eq!(h.store.write_count(), 0);
    assert_eq!(h.notifier.count(), 0);
    assert!(h.store.find_user(1).await.unwrap().is_none());
    assert!(!h.controller.cancel(1).await);
}

#[tokio::test(start_paused = true)]
async fn test_each_step_rearms_the_timer() {
    let h = setup();
    h.controller.start(identity(1)).await.unwrap();

    for answer in ["ivanov", "ivanov.s", "Lab.X", "Middle qa"] {
        tokio::time::sleep(TIMEOUT - Duration::from_secs(60)).await;
        submit_all(&h.controller, 1, &[answer]).await;
    }
    assert_eq!(h.store.write_count(), 0);

    tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;
    assert_eq!(h.store.write_count(), 1);
    assert_eq!(h.notifier.count(), 1);

    let record = h.store.find_user(1).await.unwrap().unwrap();
    assert_eq!(record.field_not_filled.as_deref(), Some("activity_description"));
    assert_eq!(record.level_id, 3);
    assert_eq!(record.role, "qa");
}

#[tokio::test(start_paused = true)]
async fn test_rejected_answer_does_not_rearm() {
    let h = setup();
    h.controller.start(identity(1)).await.unwrap();

    tokio::time::sleep(TIMEOUT - Duration::from_secs(60)).await;
    let outcome = h.controller.submit_text(1, "abc").await.unwrap();
    assert_eq!(outcome, StepOutcome::Rejected(ValidationError::NicknameLength));

    tokio::time::sleep(Duration::from_secs(61)).await;
    let record = h.store.find_user(1).await.unwrap().unwrap();
    assert_eq!(record.field_not_filled.as_deref(), Some("school21_nickname"));
    assert_eq!(record.school21_nickname, EMPTY_SENTINEL);
}

#[tokio::test(start_paused = true)]
async fn test_restart_replaces_pending_timer() {
    let h = setup();
    for _ in 0..5 {
        h.controller.start(identity(1)).await.unwrap();
        submit_all(&h.controller, 1, &["ivanov"]).await;
    }
    assert_eq!(
        h.controller.current_step(1).await,
        Some(RegistrationStep::AwaitingSberId)
    );

    tokio::time::sleep(TIMEOUT * 3).await;
    assert_eq!(h.store.write_count(), 1);
    assert_eq!(h.notifier.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_confirm_racing_the_timer_has_one_effect() {
    let h = setup();
    h.controller.start(identity(1)).await.unwrap();
    submit_all(
        &h.controller,
        1,
        &["ivanov", "ivanov.s", "Lab.X", "Lead", "команда"],
    )
    .await;

    tokio::time::sleep(TIMEOUT).await;
    let outcome = h.controller.confirm(1).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(h.store.write_count(), 1);
    let record = h.store.find_user(1).await.unwrap().unwrap();
    match outcome {
        ConfirmOutcome::Registered(_) => {
            assert!(record.is_registered);
            assert_eq!(h.notifier.count(), 0);
        }
        ConfirmOutcome::NoSession => {
            assert!(!record.is_registered);
            assert_eq!(record.field_not_filled.as_deref(), Some("final_step"));
            assert_eq!(h.notifier.count(), 1);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_resume_rebuilds_manual_progress() {
    let h = setup();

    // User 1 stalls after three answers
    h.controller.start(identity(1)).await.unwrap();
    submit_all(&h.controller, 1, &["ivanov", "ivanov.s", "Lab.X"]).await;
    tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;

    // User 2 gets to the same point by hand
    h.controller.start(identity(2)).await.unwrap();
    submit_all(&h.controller, 2, &["ivanov", "ivanov.s", "Lab.X"]).await;

    let prompt = h.controller.resume(identity(1)).await.unwrap();
    assert_eq!(prompt, Prompt::AskRoleLevel);

    let resumed = h.controller.session(1).await.unwrap();
    let manual = h.controller.session(2).await.unwrap();
    assert_eq!(resumed.fields, manual.fields);
    assert_eq!(resumed.step(), manual.step());
}

#[tokio::test(start_paused = true)]
async fn test_resume_complete_record_goes_to_confirmation() {
    let h = setup();
    h.controller.start(identity(1)).await.unwrap();
    submit_all(
        &h.controller,
        1,
        &["ivanov", "ivanov.s", "Lab.X", "Senior golang разработчик"],
    )
    .await;
    assert_eq!(
        h.controller.skip_description(1).await.unwrap(),
        StepOutcome::Advanced(Prompt::AskConfirmation)
    );
    tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;

    let record = h.store.find_user(1).await.unwrap().unwrap();
    assert_eq!(record.field_not_filled.as_deref(), Some("final_step"));
    assert_eq!(record.description, SKIPPED_DESCRIPTION);

    assert_eq!(
        h.controller.resume(identity(1)).await.unwrap(),
        Prompt::AskConfirmation
    );
    let session = h.controller.session(1).await.unwrap();
    assert_eq!(
        session.fields.role_level.as_deref(),
        Some("Senior golang разработчик")
    );

    let ConfirmOutcome::Registered(record) = h.controller.confirm(1).await.unwrap() else {
        panic!("registration was not confirmed");
    };
    assert_eq!(record.level_id, 4);
    assert_eq!(record.role, "golang разработчик");
    assert_eq!(record.description, SKIPPED_DESCRIPTION);
}

#[tokio::test(start_paused = true)]
async fn test_resume_keeps_session_in_flight() {
    let h = setup();
    h.controller.start(identity(1)).await.unwrap();
    submit_all(&h.controller, 1, &["ivanov"]).await;

    assert_eq!(
        h.controller.resume(identity(1)).await.unwrap(),
        Prompt::AskSberId
    );
    assert_eq!(h.store.write_count(), 0);
}

#[tokio::test]
async fn test_resume_without_record_starts_fresh() {
    let h = setup();
    assert_eq!(
        h.controller.resume(identity(9)).await.unwrap(),
        Prompt::AskNickname
    );
    h.controller.cancel(9).await;
}

#[tokio::test]
async fn test_taken_nickname_and_duplicate_sber_id() {
    let h = setup();
    h.controller.start(identity(1)).await.unwrap();
    submit_all(
        &h.controller,
        1,
        &["ivanov", "ivanov.s", "Lab.X", "Junior qa", "тесты"],
    )
    .await;
    assert!(matches!(
        h.controller.confirm(1).await.unwrap(),
        ConfirmOutcome::Registered(_)
    ));

    h.controller.start(identity(2)).await.unwrap();
    assert_eq!(
        h.controller.submit_text(2, "ivanov").await.unwrap(),
        StepOutcome::Rejected(ValidationError::NicknameTaken)
    );
    submit_all(
        &h.controller,
        2,
        &["petrov", "ivanov.s", "Lab.Y", "Junior qa", "тесты"],
    )
    .await;

    assert_eq!(
        h.controller.confirm(2).await.unwrap(),
        ConfirmOutcome::Duplicate("sber_id".to_string())
    );
    assert_eq!(
        h.controller.current_step(2).await,
        Some(RegistrationStep::AwaitingConfirmation)
    );
    h.controller.cancel(2).await;
}

#[tokio::test]
async fn test_confirm_before_all_fields() {
    let h = setup();
    h.controller.start(identity(1)).await.unwrap();
    submit_all(&h.controller, 1, &["ivanov"]).await;

    assert_eq!(
        h.controller.confirm(1).await.unwrap(),
        ConfirmOutcome::NotReady(Prompt::AskSberId)
    );
    assert_eq!(
        h.controller.skip_description(1).await.unwrap(),
        StepOutcome::Repeat(Prompt::AskSberId)
    );
    assert_eq!(h.store.write_count(), 0);
    h.controller.cancel(1).await;
}

#[tokio::test]
async fn test_no_session() {
    let h = setup();
    assert_eq!(
        h.controller.submit_text(1, "ivanov").await.unwrap(),
        StepOutcome::NoSession
    );
    assert_eq!(h.controller.confirm(1).await.unwrap(), ConfirmOutcome::NoSession);
    assert_eq!(h.controller.sessions().active_sessions(), 0);
}

#[tokio::test]
async fn test_expire_now() {
    let h = setup();
    h.controller.start(identity(1)).await.unwrap();
    submit_all(&h.controller, 1, &["ivanov", "ivanov.s"]).await;

    assert!(h.controller.expire(1).await);
    assert!(!h.controller.expire(1).await);

    let record = h.store.find_user(1).await.unwrap().unwrap();
    assert_eq!(record.field_not_filled.as_deref(), Some("team_name"));
    assert_eq!(h.notifier.count(), 1);
}

#[tokio::test]
async fn test_store_outage_surfaces_as_error() {
    let h = setup();
    h.controller.start(identity(1)).await.unwrap();
    h.store.set_unavailable(true);

    assert!(h.controller.submit_text(1, "ivanov").await.is_err());
    assert_eq!(
        h.controller.current_step(1).await,
        Some(RegistrationStep::AwaitingNickname)
    );
    h.controller.cancel(1).await;
}

#[tokio::test]
async fn test_overlong_role_is_rejected() {
    let h = setup();
    h.controller.start(identity(1)).await.unwrap();
    submit_all(&h.controller, 1, &["ivanov", "ivanov.s", "Lab.X"]).await;

    let overlong = format!("Senior {}", "x".repeat(300));
    assert_eq!(
        h.controller.submit_text(1, &overlong).await.unwrap(),
        StepOutcome::Rejected(ValidationError::RoleLength)
    );
    assert_eq!(
        h.controller.current_step(1).await,
        Some(RegistrationStep::AwaitingRoleLevel)
    );

    submit_all(&h.controller, 1, &["Senior golang разработчик", "шлюз"]).await;
    assert!(matches!(
        h.controller.confirm(1).await.unwrap(),
        ConfirmOutcome::Registered(_)
    ));
}

#[tokio::test]
async fn test_level_list_is_fixed_for_the_session() {
    let h = setup();
    h.controller.start(identity(1)).await.unwrap();

    let mut levels = Level::defaults();
    levels.push(Level::new(7, "Principal"));
    h.store.set_levels(levels).await;

    submit_all(
        &h.controller,
        1,
        &["ivanov", "ivanov.s", "Lab.X", "Principal rust разработчик", "ядро"],
    )
    .await;
    let ConfirmOutcome::Registered(first) = h.controller.confirm(1).await.unwrap() else {
        panic!("registration was not confirmed");
    };
    assert_eq!(first.level_id, DEFAULT_LEVEL_ID);
    assert_eq!(first.role, "Principal rust разработчик");

    h.controller.start(identity(2)).await.unwrap();
    let session = h.controller.session(2).await.unwrap();
    assert!(session.levels.iter().any(|level| level.name == "Principal"));

    submit_all(
        &h.controller,
        2,
        &["petrov", "petrov.p", "Lab.X", "Principal rust разработчик", "ядро"],
    )
    .await;
    let ConfirmOutcome::Registered(second) = h.controller.confirm(2).await.unwrap() else {
        panic!("registration was not confirmed");
    };
    assert_eq!(second.level_id, 7);
    assert_eq!(second.role, "rust разработчик");
}

/// Notifier that takes a while to deliver, recording when it finished
struct SlowNotifier {
    events: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl RegistrationNotifier for SlowNotifier {
    async fn registration_interrupted(&self, _identity: &UserIdentity) {
        tokio::time::sleep(Duration::from_secs(1)).await;
        self.events.lock().unwrap().push("notified");
    }
}

#[tokio::test(start_paused = true)]
async fn test_restart_waits_for_interruption_notice() {
    let store = Arc::new(MemoryUserStore::new());
    let events = Arc::new(Mutex::new(Vec::new()));
    let notifier = Arc::new(SlowNotifier {
        events: Arc::clone(&events),
    });
    let controller = RegistrationController::new(store.clone(), notifier, TIMEOUT);

    controller.start(identity(1)).await.unwrap();
    submit_all(&controller, 1, &["ivanov"]).await;

    // The timer has fired and the notice is still on its way
    tokio::time::sleep(TIMEOUT + Duration::from_millis(500)).await;
    assert_eq!(store.write_count(), 1);

    controller.start(identity(1)).await.unwrap();
    events.lock().unwrap().push("restarted");

    assert_eq!(*events.lock().unwrap(), vec!["notified", "restarted"]);
    assert_eq!(
        controller.current_step(1).await,
        Some(RegistrationStep::AwaitingNickname)
    );
    controller.cancel(1).await;
}
