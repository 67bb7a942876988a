//! End-to-end controller lifecycle tests against in-process providers

use std::sync::Arc;
use std::time::Duration;

use flagsync_core::{
    ConfigurationFetched, ConfigurationSyncController, FetcherStatus, FileProvider, FlagCatalog,
    FlagDefinition, FlagValue, FreezeLevel, ImpressionHandler, ImpressionTracker,
    InMemoryProvider, SyncOptions, SyncState, SyncView, UserContext,
};
use flagsync_utils::FlagsyncError;
use tempfile::TempDir;
use tokio::sync::watch;

fn message_catalog() -> FlagCatalog {
    let mut catalog = FlagCatalog::new();
    catalog
        .register("routes", [FlagDefinition::flag("home", true)])
        .unwrap();
    catalog
        .register(
            "default",
            [
                FlagDefinition::flag("showMessage", false),
                FlagDefinition::string(
                    "message",
                    "This is the default message; try changing some flag values!",
                    Vec::<String>::new(),
                ),
                FlagDefinition::string("fontColor", "White", ["Red", "Green", "Blue", "Black"]),
                FlagDefinition::number("fontSize", 16.0, [12.0, 16.0, 24.0]),
            ],
        )
        .unwrap();
    catalog
}

fn controller_with(
    provider: InMemoryProvider,
) -> (ConfigurationSyncController<InMemoryProvider>, Arc<InMemoryProvider>) {
    let provider = Arc::new(provider);
    let controller = ConfigurationSyncController::new(message_catalog(), Arc::clone(&provider));
    (controller, provider)
}

async fn wait_for_revision(rx: &mut watch::Receiver<SyncView>, revision: u64) -> SyncView {
    rx.wait_for(|v| v.revision >= revision).await.unwrap().clone()
}

/// Multiple initialize calls, concurrent and sequential, set up once
#[tokio::test(start_paused = true)]
async fn test_setup_invoked_exactly_once() {
    let (controller, provider) =
        controller_with(InMemoryProvider::new().with_setup_delay(Duration::from_millis(200)));

    let (a, b, c) = tokio::join!(
        controller.initialize("key", SyncOptions::default()),
        controller.initialize("key", SyncOptions::default()),
        controller.initialize("key", SyncOptions::default()),
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());

    controller.initialize("key", SyncOptions::default()).await.unwrap();
    controller.initialize("other-key", SyncOptions::default()).await.unwrap();

    assert_eq!(provider.setup_calls(), 1);
    assert_eq!(provider.last_setup().unwrap().0, "key");
}

/// Pending with declared defaults until the provider resolves
#[tokio::test(start_paused = true)]
async fn test_pending_with_defaults_before_setup_resolves() {
    let (controller, _provider) =
        controller_with(InMemoryProvider::new().with_setup_delay(Duration::from_millis(200)));
    let defaults = controller.catalog().defaults();
    let mut rx = controller.subscribe();

    let task = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.initialize("key", SyncOptions::default()).await })
    };

    let view = wait_for_revision(&mut rx, 1).await;
    assert_eq!(view.state, SyncState::Pending);
    assert_eq!(view.flags, defaults);
    assert!(view.is_loading());

    task.await.unwrap().unwrap();
    assert!(controller.current().state.is_ready());
}

/// Setup resolving after 200ms with only embedded defaults yields Ready(defaults)
#[tokio::test(start_paused = true)]
async fn test_embedded_only_setup_becomes_ready_with_defaults() {
    let (controller, _provider) =
        controller_with(InMemoryProvider::new().with_setup_delay(Duration::from_millis(200)));
    let start = tokio::time::Instant::now();

    controller.initialize("key", SyncOptions::default()).await.unwrap();

    assert!(start.elapsed() >= Duration::from_millis(200));
    let view = controller.current();
    assert_eq!(view.state, SyncState::Ready);
    assert_eq!(view.flags, controller.catalog().defaults());
    assert_eq!(view.revision, 2);
}

/// Rejected setup surfaces the provider's message and keeps defaults
#[tokio::test]
async fn test_setup_failure_reports_reason() {
    let (controller, provider) = controller_with(InMemoryProvider::new().failing_with("network unreachable"));

    controller.initialize("key", SyncOptions::default()).await.unwrap();

    let view = controller.current();
    assert_eq!(view.state, SyncState::Failed("network unreachable".into()));
    assert_eq!(view.error(), Some("network unreachable"));
    assert_eq!(view.flags, controller.catalog().defaults());
    assert_eq!(provider.setup_calls(), 1);
}

/// Placeholder credential fails fast without touching the provider
#[tokio::test]
async fn test_placeholder_credential_fails_fast() {
    let (controller, provider) = controller_with(InMemoryProvider::new());

    let err = controller
        .initialize("<YOUR-SDK-KEY>", SyncOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_configuration_error());
    assert!(matches!(err, FlagsyncError::PlaceholderCredential { .. }));
    assert_eq!(provider.setup_calls(), 0);

    let view = controller.current();
    assert_eq!(view.error(), Some(err.to_string().as_str()));
    assert!(view.error().unwrap().contains("haven't yet inserted your SDK key"));
    assert_eq!(view.flags, controller.catalog().defaults());

    // Still guarded: a later call with a real key does nothing
    controller.initialize("real-key", SyncOptions::default()).await.unwrap();
    assert_eq!(provider.setup_calls(), 0);
}

/// Missing credential is a configuration error too
#[tokio::test]
async fn test_missing_credential() {
    let (controller, provider) = controller_with(InMemoryProvider::new());

    let err = controller.initialize("", SyncOptions::default()).await.unwrap_err();
    assert!(matches!(err, FlagsyncError::MissingCredential { .. }));
    assert_eq!(provider.setup_calls(), 0);
    assert!(controller.current().error().is_some());
}

/// A network application is reflected in the next snapshot
#[tokio::test]
async fn test_network_application_updates_snapshot() {
    let (controller, provider) = controller_with(InMemoryProvider::new());
    let mut rx = controller.subscribe();
    controller.initialize("key", SyncOptions::default()).await.unwrap();

    assert!(provider.apply_remote([("default.fontColor", "Red")]));

    let view = rx
        .wait_for(|v| v.flags.get_string("default.fontColor") == Some("Red"))
        .await
        .unwrap()
        .clone();
    assert_eq!(view.state, SyncState::Ready);
    assert!(view.flags.is_enabled("routes.home"));
}

/// Network values applied during setup are visible once Ready
#[tokio::test]
async fn test_network_values_during_setup() {
    let (controller, _provider) =
        controller_with(InMemoryProvider::new().with_remote_values([("default.showMessage", true)]));

    controller.initialize("key", SyncOptions::default()).await.unwrap();

    let view = controller.current();
    assert!(view.state.is_ready());
    assert!(view.flags.is_enabled("default.showMessage"));
}

/// Setup resolves, five seconds later fontSize moves 16 -> 24
#[tokio::test(start_paused = true)]
async fn test_later_network_update_publishes_new_snapshot() {
    let (controller, provider) = controller_with(InMemoryProvider::new());
    let mut rx = controller.subscribe();

    controller.initialize("key", SyncOptions::default()).await.unwrap();
    let ready = wait_for_revision(&mut rx, 2).await;
    assert_eq!(ready.state, SyncState::Ready);
    assert_eq!(ready.flags.get_number("default.fontSize"), Some(16.0));

    tokio::time::sleep(Duration::from_secs(5)).await;
    provider.apply_remote([("default.fontSize", 24)]);

    let updated = wait_for_revision(&mut rx, 3).await;
    assert_eq!(updated.state, SyncState::Ready);
    assert_eq!(updated.flags.get_number("default.fontSize"), Some(24.0));
    assert_eq!(ready.flags.changed_keys(&updated.flags), vec!["default.fontSize".to_string()]);
    assert_eq!(controller.current().revision, 3);
}

/// Embedded applications never change state nor clear an error
#[tokio::test]
async fn test_embedded_events_do_not_change_state() {
    let (controller, provider) = controller_with(InMemoryProvider::new().failing_with("boom"));
    let mut rx = controller.subscribe();
    controller.initialize("key", SyncOptions::default()).await.unwrap();
    let failed = controller.current();
    assert_eq!(failed.error(), Some("boom"));

    provider.report(ConfigurationFetched::embedded());
    // A cache application publishes, marking that the embedded one was handled
    provider.report(ConfigurationFetched::new(FetcherStatus::AppliedFromCache, false));

    let view = wait_for_revision(&mut rx, failed.revision + 1).await;
    assert_eq!(view.revision, failed.revision + 1);
    assert_eq!(view.error(), Some("boom"));
}

/// Fetch failures are logged only
#[tokio::test]
async fn test_fetch_failure_keeps_ready() {
    let (controller, provider) = controller_with(InMemoryProvider::new());
    let mut rx = controller.subscribe();
    controller.initialize("key", SyncOptions::default()).await.unwrap();
    let ready = controller.current();

    provider.fail_fetch("timeout");
    provider.report(ConfigurationFetched::new(FetcherStatus::AppliedFromCache, false));

    let view = wait_for_revision(&mut rx, ready.revision + 1).await;
    assert_eq!(view.revision, ready.revision + 1);
    assert_eq!(view.state, SyncState::Ready);
}

/// Network values after a setup failure refresh flags but keep the error
#[tokio::test]
async fn test_network_after_failure_keeps_error() {
    let (controller, provider) = controller_with(InMemoryProvider::new().failing_with("boom"));
    let mut rx = controller.subscribe();
    controller.initialize("key", SyncOptions::default()).await.unwrap();

    provider.apply_remote([("routes.home", false)]);

    let view = rx
        .wait_for(|v| !v.flags.is_enabled("routes.home"))
        .await
        .unwrap()
        .clone();
    assert_eq!(view.error(), Some("boom"));
}

/// A wrongly typed remote value falls back to the declared default
#[tokio::test]
async fn test_type_mismatch_falls_back_to_default() {
    let (controller, _provider) =
        controller_with(InMemoryProvider::new().with_remote_values([("default.fontSize", "huge")]));

    controller.initialize("key", SyncOptions::default()).await.unwrap();

    let view = controller.current();
    assert!(view.state.is_ready());
    assert_eq!(view.flags.get_number("default.fontSize"), Some(16.0));
}

/// Frozen flags hold until unfrozen
#[tokio::test]
async fn test_unfreeze_republishes_latest_value() {
    let mut catalog = FlagCatalog::new();
    catalog
        .register(
            "",
            [
                FlagDefinition::flag("autoUpdateFlag", false),
                FlagDefinition::flag("frozenFlag", false).with_freeze(FreezeLevel::UntilLaunch),
            ],
        )
        .unwrap();
    let provider = Arc::new(InMemoryProvider::new());
    let controller = ConfigurationSyncController::new(catalog, Arc::clone(&provider));
    let mut rx = controller.subscribe();
    controller.initialize("key", SyncOptions::default()).await.unwrap();

    provider.apply_remote([("autoUpdateFlag", true), ("frozenFlag", true)]);
    let view = rx.wait_for(|v| v.flags.is_enabled("autoUpdateFlag")).await.unwrap().clone();
    assert!(!view.flags.is_enabled("frozenFlag"));

    controller.unfreeze("frozenFlag").await.unwrap();
    assert!(controller.current().flags.is_enabled("frozenFlag"));

    let err = controller.unfreeze("missingFlag").await.unwrap_err();
    assert!(matches!(err, FlagsyncError::UnknownFlag(_)));
}

/// Foregrounding releases only until_foreground flags
#[tokio::test]
async fn test_foreground_releases_session_frozen_flags() {
    let mut catalog = FlagCatalog::new();
    catalog
        .register(
            "",
            [
                FlagDefinition::flag("sessionFlag", false).with_freeze(FreezeLevel::UntilForeground),
                FlagDefinition::flag("frozenFlag", false).with_freeze(FreezeLevel::UntilLaunch),
                FlagDefinition::flag("autoUpdateFlag", false),
            ],
        )
        .unwrap();
    let provider = Arc::new(InMemoryProvider::new());
    let controller = ConfigurationSyncController::new(catalog, Arc::clone(&provider));
    let mut rx = controller.subscribe();
    controller.initialize("key", SyncOptions::default()).await.unwrap();

    provider.apply_remote([("sessionFlag", true), ("frozenFlag", true), ("autoUpdateFlag", true)]);
    let view = rx.wait_for(|v| v.flags.is_enabled("autoUpdateFlag")).await.unwrap().clone();
    assert!(!view.flags.is_enabled("sessionFlag"));
    assert!(!view.flags.is_enabled("frozenFlag"));

    controller.on_foreground().await;
    let view = controller.current();
    assert!(view.flags.is_enabled("sessionFlag"));
    assert!(!view.flags.is_enabled("frozenFlag"));
    assert!(view.state.is_ready());
}

/// Reader reports one impression per read, tagged with the user
#[tokio::test]
async fn test_reader_impressions() {
    let (controller, _provider) =
        controller_with(InMemoryProvider::new().with_remote_values([("default.fontColor", "Blue")]));
    let tracker = Arc::new(ImpressionTracker::new());
    let user = UserContext::generate_sample();
    let options = SyncOptions {
        impression_handler: Some(tracker.clone() as Arc<dyn ImpressionHandler>),
        user: Some(user.clone()),
        ..SyncOptions::default()
    };
    controller.initialize("key", options).await.unwrap();

    let reader = controller.reader();
    assert_eq!(reader.get_string("default.fontColor").as_deref(), Some("Blue"));
    assert_eq!(reader.get_string("default.fontColor").as_deref(), Some("Blue"));
    assert!(reader.is_enabled("routes.home"));

    assert_eq!(tracker.count_for("default.fontColor"), 2);
    let results = tracker.ab_results("default.fontColor");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].percentage, "100.0");
    assert!(tracker
        .impressions()
        .iter()
        .all(|i| i.user_id.as_deref() == Some(user.user_id.as_str())));
}

/// The file-backed provider drives the same lifecycle
#[tokio::test]
async fn test_file_provider_lifecycle() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flags.toml");
    std::fs::write(
        &path,
        r#"
        [default]
        fontSize = 12
        message = "Hello from the flags file"
        "#,
    )
    .unwrap();

    let provider = Arc::new(FileProvider::new(&path).without_watch());
    let controller = ConfigurationSyncController::new(message_catalog(), Arc::clone(&provider));
    controller.initialize("key", SyncOptions::default()).await.unwrap();

    let view = controller.current();
    assert!(view.state.is_ready());
    assert_eq!(view.flags.get_number("default.fontSize"), Some(12.0));
    assert_eq!(
        view.flags.get("default.message"),
        Some(&FlagValue::from("Hello from the flags file"))
    );
    assert_eq!(view.flags.get_string("default.fontColor"), Some("White"));
}

/// A malformed flags file fails setup and leaves defaults in place
#[tokio::test]
async fn test_file_provider_malformed_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flags.toml");
    std::fs::write(&path, "fontSize = = 12").unwrap();

    let provider = Arc::new(FileProvider::new(&path).without_watch());
    let controller = ConfigurationSyncController::new(message_catalog(), provider);
    controller.initialize("key", SyncOptions::default()).await.unwrap();

    let view = controller.current();
    assert!(view.error().is_some());
    assert_eq!(view.flags, controller.catalog().defaults());
}

fn replace_file(path: &std::path::Path, content: &str) {
    let staging = path.with_extension("toml.tmp");
    std::fs::write(&staging, content).unwrap();
    std::fs::rename(&staging, path).unwrap();
}

async fn wait_for_font_size(rx: &mut watch::Receiver<SyncView>, size: f64) -> SyncView {
    tokio::time::timeout(
        Duration::from_secs(10),
        rx.wait_for(|v| v.flags.get_number("default.fontSize") == Some(size)),
    )
    .await
    .expect("flags file change was not picked up")
    .unwrap()
    .clone()
}

/// Edits to a watched flags file republish; malformed edits keep the last values
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_file_provider_hot_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flags.toml");
    std::fs::write(&path, "[default]\nfontSize = 12\n").unwrap();

    let provider = Arc::new(FileProvider::new(&path));
    let controller = ConfigurationSyncController::new(message_catalog(), provider);
    let mut rx = controller.subscribe();
    controller.initialize("key", SyncOptions::default()).await.unwrap();
    assert_eq!(controller.current().flags.get_number("default.fontSize"), Some(12.0));

    replace_file(&path, "[default]\nfontSize = 24\nfontColor = \"Red\"\n");
    let view = wait_for_font_size(&mut rx, 24.0).await;
    assert!(view.state.is_ready());
    assert_eq!(view.flags.get_string("default.fontColor"), Some("Red"));

    replace_file(&path, "fontSize = = 12");
    tokio::time::sleep(Duration::from_millis(750)).await;
    let view = controller.current();
    assert_eq!(view.state, SyncState::Ready);
    assert_eq!(view.flags.get_number("default.fontSize"), Some(24.0));
    assert_eq!(view.flags.get_string("default.fontColor"), Some("Red"));

    // The watcher keeps running after a bad edit
    replace_file(&path, "[default]\nfontSize = 16\n");
    let view = wait_for_font_size(&mut rx, 16.0).await;
    assert!(view.state.is_ready());
    assert_eq!(view.flags.get_string("default.fontColor"), Some("White"));
}
