//! Repository behaviour against a live Postgres. Run with
//! `DATABASE_URL=... cargo test --test postgres -- --ignored`.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tessera::application::pages::{CreatePageCommand, SavePageCommand};
use tessera::application::repos::{OrderRepo, RepoError};
use tessera::application::versions::VersionError;
use tessera::domain::blocks::BlockRegistry;
use tessera::domain::entities::PageRecord;
use tessera::domain::types::{ContentFormat, SaveMode};
use tessera::infra::db::PostgresRepositories;
use tessera::infra::http::ApiState;

fn state(pool: PgPool) -> (ApiState, Arc<PostgresRepositories>) {
    let repositories = Arc::new(PostgresRepositories::new(pool));
    let state = ApiState::from_repositories(
        repositories.clone(),
        Arc::new(BlockRegistry::builtin().expect("builtin catalog")),
        Duration::from_secs(60),
        Some(repositories.clone()),
    );
    (state, repositories)
}

async fn create(state: &ApiState, title: &str) -> PageRecord {
    state
        .pages
        .create(
            "pg",
            CreatePageCommand {
                title: title.to_string(),
                slug: None,
                content_format: ContentFormat::Html,
            },
        )
        .await
        .expect("create page")
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_explicit_saves_number_versions_without_gaps(pool: PgPool) {
    let (state, _) = state(pool);
    let page = create(&state, "Concurrent").await;

    let page_id = page.id;
    let mut handles = Vec::new();
    for n in 0..8 {
        let pages = state.pages.clone();
        let command = SavePageCommand {
            content: format!("<p>{n}</p>"),
            ..SavePageCommand::from_record(&page)
        };
        handles.push(tokio::spawn(async move {
            pages.save("pg", page_id, command, SaveMode::Explicit).await
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("save");
    }

    let mut numbers: Vec<i32> = state
        .versions
        .list_for(page.id)
        .await
        .expect("versions")
        .iter()
        .map(|version| version.version_number)
        .collect();
    numbers.sort_unstable();
    assert_eq!(numbers, (1..=8).collect::<Vec<_>>());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn restore_into_a_taken_slug_rolls_back(pool: PgPool) {
    let (state, _) = state(pool);
    let page = create(&state, "Original").await;
    let first = state
        .pages
        .save(
            "pg",
            page.id,
            SavePageCommand::from_record(&page),
            SaveMode::Explicit,
        )
        .await
        .expect("save")
        .version
        .expect("version");

    let renamed = SavePageCommand {
        slug: "renamed".into(),
        ..SavePageCommand::from_record(&page)
    };
    state
        .pages
        .save("pg", page.id, renamed, SaveMode::Explicit)
        .await
        .expect("rename");
    let squatter = create(&state, "Original").await;
    assert_eq!(squatter.slug, "original");

    let err = state
        .versions
        .restore("pg", page.id, first.id)
        .await
        .expect_err("slug taken");
    assert!(matches!(err, VersionError::SlugConflict(_)));

    let versions = state.versions.list_for(page.id).await.expect("versions");
    assert_eq!(versions.len(), 2, "no partial restore is visible");
    let current = state.pages.find(page.id).await.expect("page");
    assert_eq!(current.slug, "renamed");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn reorder_is_all_or_nothing(pool: PgPool) {
    let (state, repositories) = state(pool);
    let one = create(&state, "One").await;
    let two = create(&state, "Two").await;
    let three = create(&state, "Three").await;

    let entries = repositories
        .reorder_pages(&[three.id, one.id, two.id])
        .await
        .expect("reorder");
    let ids: Vec<_> = entries.iter().map(|entry| entry.page_id).collect();
    assert_eq!(ids, [three.id, one.id, two.id]);

    let err = repositories
        .reorder_pages(&[one.id, two.id])
        .await
        .expect_err("partial order");
    assert!(matches!(err, RepoError::OrderMismatch(_)));
    let after = repositories.list_order().await.expect("order");
    assert_eq!(after, entries);

    state.pages.delete("pg", three.id).await.expect("delete");
    let positions: Vec<i32> = repositories
        .list_order()
        .await
        .expect("order")
        .iter()
        .map(|entry| entry.position)
        .collect();
    assert_eq!(positions, [0, 1]);
}
