use std::sync::{Arc, OnceLock};
use std::time::Duration;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serial_test::serial;
use tessera::application::metrics::{
    METRIC_PAGE_REORDERS, METRIC_PAGE_SAVES, METRIC_SAVE_MS, METRIC_VERSION_RESTORES,
    METRIC_VERSIONS_CREATED,
};
use tessera::application::pages::{CreatePageCommand, SavePageCommand};
use tessera::domain::blocks::BlockRegistry;
use tessera::domain::entities::PageRecord;
use tessera::domain::types::ContentFormat;
use tessera::infra::http::ApiState;
use tessera::infra::memory::InMemoryRepositories;

fn snapshotter() -> &'static Snapshotter {
    static SNAPSHOTTER: OnceLock<Snapshotter> = OnceLock::new();
    SNAPSHOTTER.get_or_init(|| {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        recorder
            .install()
            .expect("debug metrics recorder should install in this test process");
        snapshotter
    })
}

/// Counter total for `name`, restricted to series carrying `label` when given.
fn counter(name: &str, label: Option<(&str, &str)>) -> u64 {
    snapshotter()
        .snapshot()
        .into_vec()
        .into_iter()
        .filter(|(key, _, _, _)| key.key().name() == name)
        .filter(|(key, _, _, _)| {
            label.is_none_or(|(k, v)| {
                key.key()
                    .labels()
                    .any(|l| l.key() == k && l.value() == v)
            })
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(count) => count,
            _ => 0,
        })
        .sum()
}

fn has_histogram(name: &str) -> bool {
    snapshotter()
        .snapshot()
        .into_vec()
        .into_iter()
        .any(|(key, _, _, value)| {
            key.key().name() == name && matches!(value, DebugValue::Histogram(_))
        })
}

fn state() -> ApiState {
    ApiState::from_repositories(
        Arc::new(InMemoryRepositories::new()),
        Arc::new(BlockRegistry::builtin().expect("builtin catalog")),
        Duration::from_secs(60),
        None,
    )
}

async fn create(state: &ApiState, title: &str) -> PageRecord {
    state
        .pages
        .create(
            "metrics",
            CreatePageCommand {
                title: title.to_string(),
                slug: None,
                content_format: ContentFormat::Html,
            },
        )
        .await
        .expect("create page")
}

#[tokio::test]
#[serial]
async fn saves_are_counted_by_mode() {
    snapshotter();
    let explicit_before = counter(METRIC_PAGE_SAVES, Some(("mode", "explicit")));
    let autosave_before = counter(METRIC_PAGE_SAVES, Some(("mode", "autosave")));
    let versions_before = counter(METRIC_VERSIONS_CREATED, None);

    let state = state();
    let page = create(&state, "Counted").await;
    let command = SavePageCommand {
        content: "<p>draft</p>".into(),
        ..SavePageCommand::from_record(&page)
    };

    state
        .coordinator
        .edit("metrics", page.id, command.clone())
        .await
        .expect("stage");
    state
        .coordinator
        .flush(page.id)
        .await
        .expect("flush")
        .expect("autosave ran");
    state
        .coordinator
        .save("metrics", page.id, Some(command))
        .await
        .expect("explicit save");
    assert!(has_histogram(METRIC_SAVE_MS));

    assert_eq!(
        counter(METRIC_PAGE_SAVES, Some(("mode", "autosave"))),
        autosave_before + 1
    );
    assert_eq!(
        counter(METRIC_PAGE_SAVES, Some(("mode", "explicit"))),
        explicit_before + 1
    );
    assert_eq!(counter(METRIC_VERSIONS_CREATED, None), versions_before + 1);
}

#[tokio::test]
#[serial]
async fn restores_and_reorders_are_counted() {
    snapshotter();
    let restores_before = counter(METRIC_VERSION_RESTORES, None);
    let reorders_before = counter(METRIC_PAGE_REORDERS, None);
    let versions_before = counter(METRIC_VERSIONS_CREATED, None);

    let state = state();
    let first = create(&state, "First").await;
    let second = create(&state, "Second").await;

    let version = state
        .versions
        .snapshot("metrics", first.id)
        .await
        .expect("snapshot");
    state
        .coordinator
        .restore("metrics", first.id, version.id)
        .await
        .expect("restore");
    state
        .ordering
        .reorder("metrics", &[second.id, first.id])
        .await
        .expect("reorder");

    assert_eq!(counter(METRIC_VERSION_RESTORES, None), restores_before + 1);
    assert_eq!(counter(METRIC_PAGE_REORDERS, None), reorders_before + 1);
    // One manual snapshot plus the two written by the restore.
    assert_eq!(counter(METRIC_VERSIONS_CREATED, None), versions_before + 3);
}
