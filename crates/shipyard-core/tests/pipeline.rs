//! End-to-end runs of the stage pipeline with every collaborator faked.

mod support;

use shipyard_core::convergence::ConvergenceOutcome;
use shipyard_core::error::DeployError;
use shipyard_core::outcome::Outcome;
use shipyard_core::pipeline::{Pipeline, Stage};
use shipyard_core::rollout::AggregatedRollout;
use shipyard_core::types::StackState;
use tempfile::TempDir;

use support::{
    ACCOUNT, FakeControlPlane, FakeImageTool, FakeProbe, RecordingSleeper, scaffold_project,
    settings, settings_with_env,
};

const BACKEND_REPO: &str = "123456789012.dkr.ecr.us-east-1.amazonaws.com/blog/backend";
const FRONTEND_REPO: &str = "123456789012.dkr.ecr.us-east-1.amazonaws.com/blog/frontend";

#[test]
fn full_deploy_against_empty_account() {
    let temp = TempDir::new().unwrap();
    scaffold_project(temp.path());
    let settings = settings(temp.path());
    let control_plane = FakeControlPlane::with_states(&[
        StackState::Absent,
        StackState::Creating,
        StackState::Creating,
        StackState::CreateComplete,
    ]);
    let images = FakeImageTool::new();
    let probe = FakeProbe::new();
    let sleeper = RecordingSleeper::new();

    let report = Pipeline::new(&settings, &control_plane, &images, &probe, &sleeper)
        .run(&Stage::ALL)
        .unwrap();

    // Images
    assert_eq!(report.built.len(), 2);
    assert_eq!(
        images.calls(),
        vec![
            format!("build {}:latest", BACKEND_REPO),
            format!("build {}:latest", FRONTEND_REPO),
            "login 123456789012.dkr.ecr.us-east-1.amazonaws.com".to_string(),
            format!("push {}:latest", BACKEND_REPO),
            format!("push {}:latest", FRONTEND_REPO),
        ]
    );

    // Stack
    let convergence = report.convergence.as_ref().unwrap();
    assert_eq!(convergence.outcome, ConvergenceOutcome::Created);
    assert_eq!(convergence.stack.state(), StackState::CreateComplete);
    let submitted = control_plane.submitted_parameters();
    assert_eq!(submitted.len(), 1);
    let params = &submitted[0];
    assert_eq!(params.get("Environment"), Some("production"));
    assert_eq!(params.get("DatabasePassword"), Some("s3cret-pw"));
    assert!(params.is_secret("DatabasePassword"));
    assert_eq!(params.get("BackendRepositoryUri"), Some(BACKEND_REPO));
    assert_eq!(params.get("FrontendRepositoryUri"), Some(FRONTEND_REPO));

    // Rollout
    let rollout = report.rollout.as_ref().unwrap();
    assert_eq!(rollout.aggregated(), AggregatedRollout::AllAccepted(2));

    // Health
    assert!(report.health.as_ref().unwrap().is_healthy());
    assert_eq!(report.outcome(), Outcome::Success);
    assert_eq!(report.outcome().exit_code(), 0);
    assert_eq!(
        report.application_url("http").as_deref(),
        Some("http://blog-alb-1.us-east-1.elb.amazonaws.com")
    );

    // Account id came from the environment, not the caller identity.
    assert_eq!(control_plane.count("caller-account"), 0);
    assert_eq!(control_plane.count("create-stack"), 1);
    assert_eq!(control_plane.count("update-service"), 2);
}

#[test]
fn redeploy_of_unchanged_stack_skips_polling() {
    let temp = TempDir::new().unwrap();
    scaffold_project(temp.path());
    let settings = settings(temp.path());
    let control_plane = FakeControlPlane::with_states(&[StackState::UpdateComplete]);
    control_plane.answer_update_with(shipyard_core::control_plane::UpdateSubmission::NoChanges);
    let images = FakeImageTool::new();
    let probe = FakeProbe::new();
    let sleeper = RecordingSleeper::new();

    let report = Pipeline::new(&settings, &control_plane, &images, &probe, &sleeper)
        .run(&[Stage::Infrastructure, Stage::Application])
        .unwrap();

    let convergence = report.convergence.unwrap();
    assert_eq!(convergence.outcome, ConvergenceOutcome::NoChanges);
    assert_eq!(convergence.polls, 0);
    assert!(sleeper.sleeps().is_empty());
    assert_eq!(control_plane.count("update-service"), 2);
    assert!(images.calls().is_empty());
}

#[test]
fn unhealthy_application_still_exits_zero() {
    let temp = TempDir::new().unwrap();
    let settings = settings(temp.path());
    let control_plane = FakeControlPlane::with_states(&[StackState::UpdateComplete]);
    let images = FakeImageTool::new();
    let probe = FakeProbe::new().answer(
        "http://blog-alb-1.us-east-1.elb.amazonaws.com/health",
        &[Ok(503)],
    );
    let sleeper = RecordingSleeper::new();

    let report = Pipeline::new(&settings, &control_plane, &images, &probe, &sleeper)
        .run(&[Stage::Application, Stage::Health])
        .unwrap();

    let outcome = report.outcome();
    assert!(matches!(outcome, Outcome::Warning { .. }));
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(control_plane.count("update-service"), 2);
}

#[test]
fn partial_rollout_aborts_before_health_with_nonzero_exit() {
    let temp = TempDir::new().unwrap();
    let settings = settings(temp.path());
    let control_plane =
        FakeControlPlane::with_states(&[StackState::UpdateComplete]).reject_service("blog-frontend");
    let images = FakeImageTool::new();
    let probe = FakeProbe::new();
    let sleeper = RecordingSleeper::new();

    let err = Pipeline::new(&settings, &control_plane, &images, &probe, &sleeper)
        .run(&[Stage::Application, Stage::Health])
        .unwrap_err();

    assert!(err.is_partial_rollout());
    assert_eq!(Outcome::from(&err).exit_code(), 1);
    assert!(probe.requests().is_empty());
}

#[test]
fn failed_build_publishes_nothing_and_skips_later_stages() {
    let temp = TempDir::new().unwrap();
    scaffold_project(temp.path());
    let settings = settings(temp.path());
    let control_plane = FakeControlPlane::with_states(&[StackState::Absent]);
    let images = FakeImageTool::failing_build_in(&temp.path().join("frontend"));
    let probe = FakeProbe::new();
    let sleeper = RecordingSleeper::new();

    let err = Pipeline::new(&settings, &control_plane, &images, &probe, &sleeper)
        .run(&Stage::ALL)
        .unwrap_err();

    match err {
        DeployError::BuildFailure { component, .. } => assert_eq!(component.as_str(), "frontend"),
        other => panic!("expected BuildFailure, got {other:?}"),
    }
    assert_eq!(images.count("push"), 0);
    assert_eq!(images.count("login"), 0);
    assert_eq!(control_plane.count("describe-stack"), 0);
}

#[test]
fn missing_source_directory_is_a_build_failure() {
    let temp = TempDir::new().unwrap();
    let settings = settings(temp.path());
    let control_plane = FakeControlPlane::new();
    let images = FakeImageTool::new();
    let probe = FakeProbe::new();
    let sleeper = RecordingSleeper::new();

    let err = Pipeline::new(&settings, &control_plane, &images, &probe, &sleeper)
        .run(&[Stage::Build])
        .unwrap_err();

    assert!(matches!(err, DeployError::BuildFailure { .. }));
    assert!(err.to_string().contains("source directory not found"));
}

#[test]
fn account_is_resolved_from_caller_identity_when_unset() {
    let temp = TempDir::new().unwrap();
    scaffold_project(temp.path());
    let settings = settings_with_env(temp.path(), &[("DATABASE_PASSWORD", "pw")]);
    let control_plane = FakeControlPlane::new();
    let images = FakeImageTool::new();
    let probe = FakeProbe::new();
    let sleeper = RecordingSleeper::new();
    let pipeline = Pipeline::new(&settings, &control_plane, &images, &probe, &sleeper);

    assert_eq!(pipeline.account_id().unwrap(), ACCOUNT);
    assert_eq!(control_plane.count("caller-account"), 1);

    let without = FakeControlPlane::new().without_account();
    let pipeline = Pipeline::new(&settings, &without, &images, &probe, &sleeper);
    let err = pipeline.run(&[Stage::Build]).unwrap_err();
    assert!(matches!(err, DeployError::MissingPrerequisite { .. }));
    assert_eq!(err.exit_code(), 2);
    assert!(images.calls().is_empty());
}

#[test]
fn missing_password_stops_infrastructure_before_submission() {
    let temp = TempDir::new().unwrap();
    let settings = settings_with_env(temp.path(), &[("AWS_ACCOUNT_ID", ACCOUNT)]);
    let control_plane = FakeControlPlane::with_states(&[StackState::Absent]);
    let images = FakeImageTool::new();
    let probe = FakeProbe::new();
    let sleeper = RecordingSleeper::new();

    let err = Pipeline::new(&settings, &control_plane, &images, &probe, &sleeper)
        .run(&[Stage::Infrastructure])
        .unwrap_err();

    match err {
        DeployError::MissingParameter { name } => assert_eq!(name, "DatabasePassword"),
        other => panic!("expected MissingParameter, got {other:?}"),
    }
    assert!(control_plane.calls().is_empty());
}

#[test]
fn application_stage_refuses_a_busy_stack() {
    let temp = TempDir::new().unwrap();
    let settings = settings(temp.path());
    let control_plane = FakeControlPlane::with_states(&[StackState::Updating]);
    let images = FakeImageTool::new();
    let probe = FakeProbe::new();
    let sleeper = RecordingSleeper::new();

    let err = Pipeline::new(&settings, &control_plane, &images, &probe, &sleeper)
        .run(&[Stage::Application])
        .unwrap_err();

    assert!(matches!(err, DeployError::StackBusy { .. }));
    assert_eq!(control_plane.mutations(), 0);
}

#[test]
fn health_alone_needs_a_settled_stack() {
    let temp = TempDir::new().unwrap();
    let settings = settings(temp.path());
    let control_plane = FakeControlPlane::with_states(&[StackState::Updating]);
    let images = FakeImageTool::new();
    let probe = FakeProbe::new();
    let sleeper = RecordingSleeper::new();

    let err = Pipeline::new(&settings, &control_plane, &images, &probe, &sleeper)
        .run(&[Stage::Health])
        .unwrap_err();

    assert_eq!(err.class(), "stack-busy");
    assert_eq!(Outcome::from(&err).exit_code(), 1);
    assert!(probe.requests().is_empty());
    assert_eq!(control_plane.mutations(), 0);
}

#[test]
fn info_reports_absent_stack_without_error() {
    let temp = TempDir::new().unwrap();
    let settings = settings(temp.path());
    let control_plane = FakeControlPlane::with_states(&[StackState::Absent]);
    let images = FakeImageTool::new();
    let probe = FakeProbe::new();
    let sleeper = RecordingSleeper::new();

    let info = Pipeline::new(&settings, &control_plane, &images, &probe, &sleeper)
        .info()
        .unwrap();

    assert_eq!(info.target.stack_name, "blog-production");
    assert_eq!(info.stack_state, StackState::Absent);
    assert_eq!(info.application_url, None);
    assert_eq!(info.images.len(), 2);
    assert_eq!(control_plane.mutations(), 0);
}

#[test]
fn info_shows_application_url_for_provisioned_stack() {
    let temp = TempDir::new().unwrap();
    let settings = settings(temp.path());
    let control_plane = FakeControlPlane::with_states(&[StackState::CreateComplete]);
    let images = FakeImageTool::new();
    let probe = FakeProbe::new();
    let sleeper = RecordingSleeper::new();

    let info = Pipeline::new(&settings, &control_plane, &images, &probe, &sleeper)
        .info()
        .unwrap();

    assert_eq!(
        info.application_url.as_deref(),
        Some("http://blog-alb-1.us-east-1.elb.amazonaws.com")
    );
    assert_eq!(info.outputs.get("ClusterName").map(String::as_str), Some("blog-cluster"));
}
