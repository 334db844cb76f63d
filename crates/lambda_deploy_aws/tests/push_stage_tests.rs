mod support;

use std::fs;

use lambda_deploy_aws::adapters::function::UpdateStatus;
use lambda_deploy_core::stages::Stage;
use support::fakes::{FakeFunctions, FakeRegistry, FakeWorld};
use support::session::{base_config, deployed_config, fast_options, forced_session, seeded_rng};

#[test]
fn push_without_a_visible_image_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let world = FakeWorld {
        registry: FakeRegistry::default(),
        ..FakeWorld::default()
    };
    let options = fast_options(dir.path());
    let mut session = forced_session(&dir, &deployed_config());

    let error = session
        .run_stage(Stage::Push, world.services(), &options, &mut seeded_rng())
        .expect_err("no image was found");

    assert_eq!(error.kind(), "verification");
    assert_eq!(world.registry.count("describe_images"), 2);
    assert!(!session.ledger().is_complete(Stage::Push));
    assert!(!options.push.info_file.exists());
}

#[test]
fn verified_push_writes_info_file_and_reuses_login() {
    let dir = tempfile::tempdir().expect("tempdir");
    let world = FakeWorld::default();
    let options = fast_options(dir.path());
    let mut session = forced_session(&dir, &deployed_config());

    let outcome = session
        .run_stage(Stage::Push, world.services(), &options, &mut seeded_rng())
        .expect("push should pass");
    session
        .run_stage(Stage::Push, world.services(), &options, &mut seeded_rng())
        .expect("second push should pass");

    assert_eq!(outcome.detail["digest"], "sha256:abc123");
    assert_eq!(outcome.detail["login"], "refreshed");

    let calls = world.engine.calls();
    let remote = "123456789012.dkr.ecr.us-east-1.amazonaws.com/movie-predictor:latest";
    assert_eq!(
        &calls[..4],
        &[
            "build movie-predictor:latest".to_string(),
            "login 123456789012.dkr.ecr.us-east-1.amazonaws.com".to_string(),
            format!("tag movie-predictor:latest {remote}"),
            format!("push {remote}"),
        ]
    );
    assert_eq!(
        calls.iter().filter(|call| call.starts_with("login")).count(),
        1
    );
    assert_eq!(world.registry.count("authorization"), 1);

    let info = fs::read_to_string(&options.push.info_file).expect("info file should exist");
    assert!(info.contains("sha256:abc123"));
    assert!(info.contains(remote));
}

#[test]
fn push_requires_the_repository_uri() {
    let dir = tempfile::tempdir().expect("tempdir");
    let world = FakeWorld::default();
    let mut session = forced_session(&dir, &base_config());

    let error = session
        .run_stage(
            Stage::Push,
            world.services(),
            &fast_options(dir.path()),
            &mut seeded_rng(),
        )
        .expect_err("ECR_URI is missing");

    assert_eq!(error.kind(), "precondition");
    assert!(error.to_string().contains("ECR_URI"));
    assert!(world.engine.calls().is_empty());
}

#[test]
fn function_update_waits_for_completion_and_resizes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let world = FakeWorld::default();
    world
        .functions
        .statuses
        .lock()
        .expect("poisoned mutex")
        .extend([UpdateStatus::InProgress, UpdateStatus::InProgress]);
    let mut options = fast_options(dir.path());
    options.function.memory_mb = Some(2048);
    let mut session = forced_session(&dir, &deployed_config());

    let outcome = session
        .run_stage(Stage::Function, world.services(), &options, &mut seeded_rng())
        .expect("function update should pass");

    let calls = world.functions.calls();
    assert_eq!(
        calls[1],
        "update_image 123456789012.dkr.ecr.us-east-1.amazonaws.com/movie-predictor:latest"
    );
    assert_eq!(calls.iter().filter(|call| *call == "update_status").count(), 4);
    assert!(calls.contains(&"update_sizing Some(2048) None".to_string()));
    assert_eq!(outcome.detail["memory_mb"], 2048);
    assert_eq!(outcome.detail["resized"], true);
}

#[test]
fn failed_function_update_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let world = FakeWorld::default();
    world
        .functions
        .statuses
        .lock()
        .expect("poisoned mutex")
        .push_back(UpdateStatus::Failed("image manifest is not supported".to_string()));
    let mut session = forced_session(&dir, &deployed_config());

    let error = session
        .run_stage(
            Stage::Function,
            world.services(),
            &fast_options(dir.path()),
            &mut seeded_rng(),
        )
        .expect_err("update failed");

    assert_eq!(error.kind(), "aws_api");
    assert!(error.to_string().contains("manifest"));
}

#[test]
fn missing_function_points_at_the_console() {
    let dir = tempfile::tempdir().expect("tempdir");
    let world = FakeWorld {
        functions: FakeFunctions::missing(),
        ..FakeWorld::default()
    };
    let mut session = forced_session(&dir, &deployed_config());

    let error = session
        .run_stage(
            Stage::Function,
            world.services(),
            &fast_options(dir.path()),
            &mut seeded_rng(),
        )
        .expect_err("function does not exist");

    assert!(error.to_string().contains("Lambda console"));
    assert_eq!(world.functions.calls(), vec!["get_function".to_string()]);
}
