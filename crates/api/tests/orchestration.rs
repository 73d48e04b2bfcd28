//! End-to-end generation lifecycle tests: admission, ledger transitions,
//! status checks, and the compensation failsafe, all against a scripted
//! backend and an in-memory database.

mod common;

use std::sync::atomic::Ordering;

use assert_matches::assert_matches;

use genselfie_api::engine::admission::AdmissionRequest;
use genselfie_api::engine::{ImageSource, PaymentProviders, StartRequest};
use genselfie_api::error::AppError;
use genselfie_core::error::CoreError;
use genselfie_db::models::generation::GenerationStatus;
use genselfie_db::models::promo_code::CreatePromoCode;
use genselfie_db::models::settings::UpdateSettings;
use genselfie_db::repositories::{ConsumeOutcome, GenerationRepo, PromoCodeRepo};

use common::{
    empty_queue, history_with_output, queue_with, seed_settings, seed_subject, test_env,
    FakeBackend, FakeProvider, TestEnv,
};

fn code_request(code: &str) -> StartRequest {
    StartRequest {
        admission: AdmissionRequest {
            method: "code".into(),
            code: Some(code.into()),
            payment_ref: None,
        },
        source: ImageSource::Upload {
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
            ext: "png".into(),
        },
        preset_id: None,
        prompt: None,
    }
}

async fn env_with_codes(backend: FakeBackend) -> TestEnv {
    let env = test_env(backend, PaymentProviders::default()).await;
    seed_settings(
        &env.pool,
        UpdateSettings {
            codes_enabled: Some(true),
            failsafe_enabled: Some(true),
            ..Default::default()
        },
    )
    .await;
    seed_subject(&env.pool, &env.data_dir).await;
    env
}

async fn create_code(env: &TestEnv, code: &str, max_uses: Option<i64>) {
    PromoCodeRepo::create(
        &env.pool,
        &CreatePromoCode {
            code: code.into(),
            max_uses,
            expires_at: None,
        },
    )
    .await
    .unwrap();
}

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn code_admission_consumes_and_submits() {
    let env = env_with_codes(FakeBackend::submitting("job-1")).await;
    create_code(&env, "FREE99", Some(2)).await;

    let view = env.orchestrator.start(code_request("free99")).await.unwrap();
    assert_eq!(view.status, GenerationStatus::Processing);

    // One use consumed, both images uploaded, job id on the row.
    let outcome = PromoCodeRepo::consume(&env.pool, "FREE99").await.unwrap();
    assert_matches!(outcome, ConsumeOutcome::Consumed(row) if row.uses_remaining == Some(0));

    let uploads = env.backend.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 2);
    assert!(uploads.iter().any(|u| u.starts_with("fan_")));
    assert!(uploads.iter().any(|u| u == "subject_ref.png"));

    let row = GenerationRepo::find_by_id(&env.pool, view.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.backend_job_id.as_deref(), Some("job-1"));
    assert_eq!(row.authorization_method, "code");
}

#[tokio::test]
async fn invalid_code_is_refused_before_any_ledger_row() {
    let env = env_with_codes(FakeBackend::submitting("job-1")).await;

    let err = env
        .orchestrator
        .start(code_request("NOPE"))
        .await
        .unwrap_err();
    assert_matches!(err, AppError::Core(CoreError::AuthorizationDenied(_)));

    let rows = GenerationRepo::list_recent(&env.pool, 10).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn disabled_codes_are_refused() {
    let env = test_env(FakeBackend::submitting("job-1"), PaymentProviders::default()).await;
    seed_settings(
        &env.pool,
        UpdateSettings {
            codes_enabled: Some(false),
            ..Default::default()
        },
    )
    .await;
    seed_subject(&env.pool, &env.data_dir).await;
    create_code(&env, "FREE99", None).await;

    let err = env
        .orchestrator
        .start(code_request("FREE99"))
        .await
        .unwrap_err();
    assert_matches!(err, AppError::Core(CoreError::AuthorizationDenied(_)));
}

#[tokio::test]
async fn unpaid_payment_is_refused() {
    let providers = PaymentProviders {
        stripe: Some(std::sync::Arc::new(FakeProvider { paid: false })),
        lightning: None,
    };
    let env = test_env(FakeBackend::submitting("job-1"), providers).await;
    seed_settings(
        &env.pool,
        UpdateSettings {
            stripe_enabled: Some(true),
            ..Default::default()
        },
    )
    .await;
    seed_subject(&env.pool, &env.data_dir).await;

    let request = StartRequest {
        admission: AdmissionRequest {
            method: "stripe".into(),
            code: None,
            payment_ref: Some("pi_unpaid".into()),
        },
        source: ImageSource::Upload {
            bytes: vec![1, 2, 3],
            ext: "png".into(),
        },
        preset_id: None,
        prompt: None,
    };
    let err = env.orchestrator.start(request).await.unwrap_err();
    assert_matches!(err, AppError::Core(CoreError::AuthorizationDenied(_)));
}

#[tokio::test]
async fn verified_payment_is_admitted() {
    let providers = PaymentProviders {
        stripe: Some(std::sync::Arc::new(FakeProvider { paid: true })),
        lightning: None,
    };
    let env = test_env(FakeBackend::submitting("job-1"), providers).await;
    seed_settings(
        &env.pool,
        UpdateSettings {
            stripe_enabled: Some(true),
            ..Default::default()
        },
    )
    .await;
    seed_subject(&env.pool, &env.data_dir).await;

    let request = StartRequest {
        admission: AdmissionRequest {
            method: "stripe".into(),
            code: None,
            payment_ref: Some("pi_paid".into()),
        },
        source: ImageSource::Upload {
            bytes: vec![1, 2, 3],
            ext: "png".into(),
        },
        preset_id: None,
        prompt: None,
    };
    let view = env.orchestrator.start(request).await.unwrap();
    assert_eq!(view.status, GenerationStatus::Processing);

    let row = GenerationRepo::find_by_id(&env.pool, view.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.authorization_method, "stripe");
    assert_eq!(row.authorization_ref.as_deref(), Some("pi_paid"));
}

// ---------------------------------------------------------------------------
// Submission failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refused_submission_fails_row_and_mints_compensation() {
    let env = env_with_codes(FakeBackend::refusing()).await;
    create_code(&env, "ONCE", Some(1)).await;

    let view = env.orchestrator.start(code_request("ONCE")).await.unwrap();
    assert_eq!(view.status, GenerationStatus::Failed);

    // The consumed use is made whole by a redeemable single-use code.
    let retry = view.retry_code.expect("compensation code");
    let outcome = PromoCodeRepo::consume(&env.pool, &retry).await.unwrap();
    assert_matches!(outcome, ConsumeOutcome::Consumed(row) if row.max_uses == Some(1));
}

#[tokio::test]
async fn failed_local_write_still_records_the_ledger_row() {
    let env = test_env(FakeBackend::submitting("job-1"), PaymentProviders::default()).await;
    seed_settings(
        &env.pool,
        UpdateSettings {
            codes_enabled: Some(true),
            failsafe_enabled: Some(true),
            ..Default::default()
        },
    )
    .await;
    create_code(&env, "ONCE", Some(1)).await;

    // A regular file where the uploads directory should be makes the
    // local image write fail after the code has been consumed.
    let uploads = env.data_dir.join("uploads");
    tokio::fs::remove_dir_all(&uploads).await.unwrap();
    tokio::fs::write(&uploads, b"not a directory").await.unwrap();

    let view = env.orchestrator.start(code_request("ONCE")).await.unwrap();
    assert_eq!(view.status, GenerationStatus::Failed);

    // The consumed use is on the ledger, not lost, and made whole.
    let rows = GenerationRepo::list_recent(&env.pool, 10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].authorization_method, "code");

    let retry = view.retry_code.expect("compensation code");
    let outcome = PromoCodeRepo::consume(&env.pool, &retry).await.unwrap();
    assert_matches!(outcome, ConsumeOutcome::Consumed(_));
}

// ---------------------------------------------------------------------------
// Status checks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_check_downloads_output_and_completes() {
    let env = env_with_codes(FakeBackend::submitting("job-1")).await;
    create_code(&env, "FREE99", None).await;

    let view = env.orchestrator.start(code_request("FREE99")).await.unwrap();
    assert_eq!(view.status, GenerationStatus::Processing);

    env.backend.script_queue(vec![Ok(empty_queue())]);
    env.backend.set_history(history_with_output("job-1"));
    env.backend.set_download(vec![0xAB; 16]);

    let done = env.orchestrator.check_status(view.id).await.unwrap();
    assert_eq!(done.status, GenerationStatus::Completed);
    let result_ref = done.result_ref.expect("result ref");
    assert!(result_ref.starts_with("generated/gen_"));

    let bytes = tokio::fs::read(env.data_dir.join(&result_ref)).await.unwrap();
    assert_eq!(bytes, vec![0xAB; 16]);
}

#[tokio::test]
async fn status_check_stays_processing_while_job_queued() {
    let env = env_with_codes(FakeBackend::submitting("job-1")).await;
    create_code(&env, "FREE99", None).await;

    let view = env.orchestrator.start(code_request("FREE99")).await.unwrap();
    env.backend.script_queue(vec![Ok(queue_with("job-1"))]);

    let still = env.orchestrator.check_status(view.id).await.unwrap();
    assert_eq!(still.status, GenerationStatus::Processing);
}

#[tokio::test]
async fn completion_without_output_fails_with_compensation() {
    let env = env_with_codes(FakeBackend::submitting("job-1")).await;
    create_code(&env, "FREE99", None).await;

    let view = env.orchestrator.start(code_request("FREE99")).await.unwrap();
    env.backend.script_queue(vec![Ok(empty_queue())]);
    env.backend
        .set_history(serde_json::json!({ "job-1": { "outputs": {} } }));

    let failed = env.orchestrator.check_status(view.id).await.unwrap();
    assert_eq!(failed.status, GenerationStatus::Failed);
    assert!(failed.retry_code.is_some());
}

#[tokio::test]
async fn terminal_rows_are_returned_without_backend_traffic() {
    let env = env_with_codes(FakeBackend::submitting("job-1")).await;
    create_code(&env, "FREE99", None).await;

    let view = env.orchestrator.start(code_request("FREE99")).await.unwrap();
    env.backend.script_queue(vec![Ok(empty_queue())]);
    env.backend.set_history(history_with_output("job-1"));
    env.backend.set_download(vec![1]);
    env.orchestrator.check_status(view.id).await.unwrap();

    let calls_before = env.backend.queue_calls.load(Ordering::SeqCst);
    let again = env.orchestrator.check_status(view.id).await.unwrap();
    assert_eq!(again.status, GenerationStatus::Completed);
    assert_eq!(env.backend.queue_calls.load(Ordering::SeqCst), calls_before);
}

#[tokio::test]
async fn status_check_of_unknown_row_is_not_found() {
    let env = env_with_codes(FakeBackend::submitting("job-1")).await;
    let err = env.orchestrator.check_status(9999).await.unwrap_err();
    assert_matches!(err, AppError::Core(CoreError::NotFound { .. }));
}

// ---------------------------------------------------------------------------
// Bounded blocking resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn blocking_resolution_times_out_and_compensates() {
    let env = env_with_codes(FakeBackend::submitting("job-1")).await;
    create_code(&env, "FREE99", None).await;

    let view = env.orchestrator.start(code_request("FREE99")).await.unwrap();
    // The job never leaves the queue; the budget must end the loop.
    env.backend.script_queue(vec![Ok(queue_with("job-1"))]);

    let resolved = env.orchestrator.resolve_blocking(view.id).await.unwrap();
    assert_eq!(resolved.status, GenerationStatus::Failed);
    assert!(resolved.retry_code.is_some());
}

#[tokio::test]
async fn blocking_resolution_completes_on_output() {
    let env = env_with_codes(FakeBackend::submitting("job-1")).await;
    create_code(&env, "FREE99", None).await;

    let view = env.orchestrator.start(code_request("FREE99")).await.unwrap();
    env.backend.script_queue(vec![
        Ok(queue_with("job-1")),
        Ok(queue_with("job-1")),
        Ok(empty_queue()),
    ]);
    env.backend.set_history(history_with_output("job-1"));
    env.backend.set_download(vec![7; 8]);

    let resolved = env.orchestrator.resolve_blocking(view.id).await.unwrap();
    assert_eq!(resolved.status, GenerationStatus::Completed);
    assert!(resolved.result_ref.is_some());
}
