#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end build, persist, reload and ask against on-disk game sources

use std::fs;
use std::path::Path;
use std::sync::Arc;

use game_memory::MemoryError;
use game_memory::config::Config;
use game_memory::ledger::SourceReference;
use game_memory::providers::ProviderError;
use game_memory::providers::testing::{RuleEmbedder, ScriptedConsultant};
use game_memory::retrieval::{RetrievalOptions, RetrievalService};
use game_memory::sources::discover_sources;
use game_memory::store::KnowledgeBase;
use tempfile::TempDir;

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("should create parent dirs");
    }
    fs::write(path, content).expect("should write source file");
}

/// A small Phaser project with one file per category
fn game_tree(root: &Path) {
    write(
        root,
        "src/managers/EventManager.js",
        "// global bus\nexport class EventManager { emit(name) { /* dispatch */ } }",
    );
    write(
        root,
        "src/player/PlayerController.js",
        "export class PlayerController { jump() { this.body.setVelocityY(-300); } }",
    );
    write(
        root,
        "src/physics/collisionHandlers.js",
        "export function onBulletHit(bullet, enemy) { enemy.damage(); }",
    );
    write(root, "src/main.js", "new Phaser.Game(config);");
    write(root, "src/node_modules/phaser/phaser.js", "ignored();");
    write(root, "src/styles.css", "body {}");
}

fn embedder() -> RuleEmbedder {
    RuleEmbedder::new(4)
        .with_rule("event_system", vec![1.0, 0.0, 0.0, 0.0])
        .with_rule("player_movement", vec![0.0, 1.0, 0.0, 0.0])
        .with_rule("collision_system", vec![0.0, 0.0, 1.0, 0.0])
        .with_rule("general", vec![0.0, 0.0, 0.0, 1.0])
        .with_rule("jump", vec![0.1, 0.9, 0.0, 0.0])
        .with_rule("bullets", vec![0.0, 0.2, 0.8, 0.0])
}

#[tokio::test]
async fn build_persist_reload_and_ask() {
    init_test_tracing();
    let temp_dir = TempDir::new().expect("should create temp dir");
    game_tree(temp_dir.path());
    let data_dir = temp_dir.path().join("data");
    let config = Config::load(&data_dir).expect("defaults load");

    let sources = discover_sources(&temp_dir.path().join("src"), &config.index.extensions)
        .expect("discovery succeeds");
    assert_eq!(sources.len(), 4);

    let mut builder = RetrievalService::new(
        Arc::new(embedder()),
        Arc::new(ScriptedConsultant::replying("unused")),
        RetrievalOptions::from(&config),
    );
    let report = builder
        .build_and_save(&sources, &config.index_dir())
        .await
        .expect("build succeeds");
    assert_eq!(report.indexed, 4);
    assert_eq!(report.dimension, 4);

    let knowledge = KnowledgeBase::load(&config.index_dir()).expect("index loads");
    assert_eq!(knowledge.len(), 4);
    for entry in knowledge.entries() {
        assert_eq!(
            entry.vector,
            builder
                .knowledge()
                .expect("index built")
                .vector(entry.position)
                .expect("in range")
        );
    }

    let consultant = Arc::new(ScriptedConsultant::replying(
        "Call setVelocityY on the player body.",
    ));
    let mut asker = RetrievalService::new(
        Arc::new(embedder()),
        Arc::clone(&consultant) as _,
        RetrievalOptions {
            top_k: 1,
            ..RetrievalOptions::from(&config)
        },
    );
    asker.load(&config.index_dir()).expect("index loads");

    let nearest = asker.search("how does the player jump", 2).expect("search succeeds");
    assert!(nearest[0].ends_with("PlayerController.js (Category: player_movement)"));
    assert!(SourceReference::path_of(&nearest[1]).ends_with("EventManager.js"));

    assert_eq!(
        asker.answer("how does the player jump"),
        "Call setVelocityY on the player body."
    );

    let prompts = consultant.prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(
        prompts[0].1,
        "Context from ShooterGTU game files:\nexport class PlayerController { jump() { this.body.setVelocityY(-300); } }\n\nUser Question: how does the player jump"
    );
}

#[tokio::test]
async fn empty_tree_builds_nothing() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::create_dir_all(temp_dir.path().join("src")).expect("should create src");
    let index_dir = temp_dir.path().join("index");

    let sources =
        discover_sources(&temp_dir.path().join("src"), &["js"]).expect("discovery succeeds");
    let mut service = RetrievalService::new(
        Arc::new(embedder()),
        Arc::new(ScriptedConsultant::replying("unused")),
        RetrievalOptions::default(),
    );

    let result = service.build_and_save(&sources, &index_dir).await;
    assert!(matches!(result, Err(MemoryError::NoInput)));
    assert!(!KnowledgeBase::exists(&index_dir));
}

#[tokio::test]
async fn failed_rebuild_keeps_previous_snapshot() {
    init_test_tracing();
    let temp_dir = TempDir::new().expect("should create temp dir");
    game_tree(temp_dir.path());
    let index_dir = temp_dir.path().join("index");
    let sources =
        discover_sources(&temp_dir.path().join("src"), &["js"]).expect("discovery succeeds");

    let mut service = RetrievalService::new(
        Arc::new(embedder()),
        Arc::new(ScriptedConsultant::replying("unused")),
        RetrievalOptions::default(),
    );
    service
        .build_and_save(&sources, &index_dir)
        .await
        .expect("first build succeeds");

    let failing = RuleEmbedder::new(4)
        .with_rule("event_system", vec![1.0, 0.0, 0.0, 0.0])
        .failing_on("collision_system", ProviderError::Network("reset".to_string()));
    let mut rebuild = RetrievalService::new(
        Arc::new(failing),
        Arc::new(ScriptedConsultant::replying("unused")),
        RetrievalOptions {
            concurrency: 4,
            ..RetrievalOptions::default()
        },
    );
    let result = rebuild.build_and_save(&sources, &index_dir).await;
    assert!(matches!(result, Err(MemoryError::Embedding(_))));

    let knowledge = KnowledgeBase::load(&index_dir).expect("previous index still loads");
    assert_eq!(knowledge.len(), 4);
}

#[tokio::test]
async fn question_survives_provider_outage() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    game_tree(temp_dir.path());
    let sources =
        discover_sources(&temp_dir.path().join("src"), &["js"]).expect("discovery succeeds");

    let mut service = RetrievalService::new(
        Arc::new(embedder()),
        Arc::new(ScriptedConsultant::failing(ProviderError::Timeout(
            "30s".to_string(),
        ))),
        RetrievalOptions::default(),
    );
    service.build_index(&sources).await.expect("build succeeds");

    let reply = service.answer("what happens when bullets hit?");
    assert!(reply.starts_with("❌ Error getting AI response:"));
    assert_eq!(
        service
            .search("what happens when bullets hit?", 1)
            .expect("search succeeds")
            .len(),
        1
    );
}

#[test]
fn load_from_empty_directory_reports_missing_index() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut service = RetrievalService::new(
        Arc::new(embedder()),
        Arc::new(ScriptedConsultant::replying("unused")),
        RetrievalOptions::default(),
    );

    assert!(matches!(
        service.load(temp_dir.path()),
        Err(MemoryError::IndexNotFound(_))
    ));
}
