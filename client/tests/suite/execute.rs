use std::sync::Arc;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

use client_test_support::MockTransport;
use client_test_support::RecordingListener;
use pretty_assertions::assert_eq;
use tsubame_client::ClientError;
use tsubame_client::DiagnosticCode;
use tsubame_client::FixedStrategy;
use tsubame_client::LabelCounter;
use tsubame_client::ServerDiagnostic;
use tsubame_client::Session;
use tsubame_client::SimpleCounter;
use tsubame_client::TransactionOption;
use tsubame_client::UnitVerdict;
use tsubame_client::retry::RetryCode;
use tsubame_client::retry::classifier::DefaultClassifier;

fn serialization_failure() -> ServerDiagnostic {
    ServerDiagnostic::new(DiagnosticCode::SerializationFailure, "conflict")
}

#[tokio::test]
async fn first_attempt_commit_returns_the_value() {
    let transport = MockTransport::new();
    let listener = RecordingListener::new();
    let counter = Arc::new(SimpleCounter::new());
    let session = Session::new(transport.clone());
    let strategy = Arc::new(FixedStrategy::new(TransactionOption::occ()));
    let executor = session
        .executor(strategy)
        .add_listener(listener.clone())
        .add_listener(counter.clone());

    let value = executor
        .execute(|_tx| Box::pin(async move { Ok(UnitVerdict::Commit(42)) }))
        .await
        .unwrap();

    assert_eq!(Some(42), value);
    assert_eq!(1, transport.begin_calls.load(Ordering::SeqCst));
    assert_eq!(1, transport.commit_calls.load(Ordering::SeqCst));
    assert_eq!(0, transport.rollback_calls.load(Ordering::SeqCst));
    // The handle is released exactly once.
    assert_eq!(1, transport.dispose_calls.load(Ordering::SeqCst));

    assert_eq!(
        vec![
            "executeStart",
            "transactionBefore:1:OCC",
            "transactionCreated:1:OCC",
            "beforeCommit:OCC",
            "commit:OCC",
            "executeEndSuccess:OCC:true",
        ],
        listener.events()
    );

    let count = counter.count();
    assert_eq!(1, count.execute_count);
    assert_eq!(1, count.transaction_count);
    assert_eq!(1, count.before_commit_count);
    assert_eq!(1, count.commit_count);
    assert_eq!(1, count.success_commit_count);
    assert_eq!(1, count.success_count());
    assert_eq!(0, count.exception_count);
    assert_eq!(0, count.fail_count);
}

#[tokio::test]
async fn intentional_rollback_is_a_success_without_a_value() {
    let transport = MockTransport::new();
    let listener = RecordingListener::new();
    let counter = Arc::new(SimpleCounter::new());
    let session = Session::new(transport.clone());
    let strategy = Arc::new(FixedStrategy::new(TransactionOption::occ()));
    let executor = session
        .executor(strategy)
        .add_listener(listener.clone())
        .add_listener(counter.clone());

    let value = executor
        .execute::<u32, _>(|_tx| Box::pin(async move { Ok(UnitVerdict::Rollback) }))
        .await
        .unwrap();

    assert_eq!(None, value);
    assert_eq!(0, transport.commit_calls.load(Ordering::SeqCst));
    assert_eq!(1, transport.rollback_calls.load(Ordering::SeqCst));
    assert_eq!(1, transport.dispose_calls.load(Ordering::SeqCst));
    assert_eq!(1, listener.count_of("rollback:"));
    assert_eq!(1, listener.count_of("executeEndSuccess:OCC:false"));

    let count = counter.count();
    assert_eq!(1, count.success_rollback_count);
    assert_eq!(0, count.success_commit_count);
    assert_eq!(0, count.before_commit_count);
}

#[tokio::test]
async fn intentional_rollback_survives_a_dispose_failure() {
    let transport = MockTransport::new();
    transport.push_dispose_failure(ServerDiagnostic::new(
        DiagnosticCode::IoError,
        "dispose hiccup",
    ));
    let counter = Arc::new(SimpleCounter::new());
    let session = Session::new(transport.clone());
    let strategy = Arc::new(FixedStrategy::new(TransactionOption::occ()));
    let executor = session.executor(strategy).add_listener(counter.clone());

    let value = executor
        .execute::<u32, _>(|_tx| Box::pin(async move { Ok(UnitVerdict::Rollback) }))
        .await
        .unwrap();

    // The server rollback succeeded; a cleanup failure afterwards must not
    // turn the outcome into an error.
    assert_eq!(None, value);
    assert_eq!(1, transport.rollback_calls.load(Ordering::SeqCst));
    assert_eq!(1, transport.dispose_calls.load(Ordering::SeqCst));
    let count = counter.count();
    assert_eq!(1, count.success_rollback_count);
    assert_eq!(0, count.fail_count);
}

#[tokio::test]
async fn retryable_commit_failures_exhaust_the_attempt_cap() {
    let transport = MockTransport::new();
    transport.always_fail_commit(serialization_failure());
    let listener = RecordingListener::new();
    let counter = Arc::new(SimpleCounter::new());
    let session = Session::new(transport.clone());
    let strategy =
        Arc::new(FixedStrategy::with_cap(TransactionOption::occ().with_label("cap3"), 3).unwrap());
    let executor = session
        .executor(strategy)
        .add_listener(listener.clone())
        .add_listener(counter.clone());

    let err = executor
        .execute::<(), _>(|_tx| Box::pin(async move { Ok(UnitVerdict::Commit(())) }))
        .await
        .unwrap_err();

    match &err {
        ClientError::RetriesExhausted {
            attempts,
            last_option_label,
            ..
        } => {
            assert_eq!(&3, attempts);
            assert_eq!(&Some("cap3".to_owned()), last_option_label);
        }
        other => panic!("expected retries exhausted, got {other:?}"),
    }
    assert_eq!(
        Some(DiagnosticCode::SerializationFailure),
        err.diagnostic_code()
    );

    assert_eq!(3, transport.begin_calls.load(Ordering::SeqCst));
    assert_eq!(3, transport.commit_calls.load(Ordering::SeqCst));
    // Each failed attempt still releases its handle.
    assert_eq!(3, transport.dispose_calls.load(Ordering::SeqCst));

    assert_eq!(3, listener.count_of("transactionException:"));
    assert_eq!(2, listener.count_of("transactionRetry:"));
    assert_eq!(1, listener.count_of("transactionRetryOver:"));
    assert_eq!(1, listener.count_of("executeEndFail:"));

    let count = counter.count();
    assert_eq!(1, count.execute_count);
    assert_eq!(3, count.transaction_count);
    assert_eq!(3, count.exception_count);
    assert_eq!(2, count.retry_count);
    assert_eq!(1, count.retry_over_count);
    assert_eq!(3, count.retryable_abort_count());
    assert_eq!(1, count.fail_count);
    assert_eq!(0, count.success_count());
}

#[tokio::test]
async fn begin_failure_is_retried_like_any_other_attempt_failure() {
    let transport = MockTransport::new();
    transport.push_begin_failure(serialization_failure());
    let listener = RecordingListener::new();
    let session = Session::new(transport.clone());
    let strategy =
        Arc::new(FixedStrategy::with_cap(TransactionOption::occ(), 3).unwrap());
    let executor = session.executor(strategy).add_listener(listener.clone());

    let value = executor
        .execute(|_tx| Box::pin(async move { Ok(UnitVerdict::Commit("done")) }))
        .await
        .unwrap();

    assert_eq!(Some("done"), value);
    assert_eq!(2, transport.begin_calls.load(Ordering::SeqCst));
    assert_eq!(1, transport.commit_calls.load(Ordering::SeqCst));
    // No transaction was created for the failed begin.
    assert_eq!(2, listener.count_of("transactionBefore:"));
    assert_eq!(1, listener.count_of("transactionCreated:"));
    assert_eq!(1, listener.count_of("transactionRetry:"));
}

#[tokio::test]
async fn non_retryable_failure_surfaces_after_one_attempt() {
    let transport = MockTransport::new();
    transport.always_fail_commit(ServerDiagnostic::new(
        DiagnosticCode::PermissionError,
        "denied",
    ));
    let listener = RecordingListener::new();
    let session = Session::new(transport.clone());
    let strategy = Arc::new(FixedStrategy::new(TransactionOption::occ()));
    let executor = session.executor(strategy).add_listener(listener.clone());

    let err = executor
        .execute::<(), _>(|_tx| Box::pin(async move { Ok(UnitVerdict::Commit(())) }))
        .await
        .unwrap_err();

    assert_eq!(Some(DiagnosticCode::PermissionError), err.diagnostic_code());
    assert!(matches!(err, ClientError::Remote { .. }));
    assert_eq!(1, transport.begin_calls.load(Ordering::SeqCst));
    assert_eq!(1, transport.dispose_calls.load(Ordering::SeqCst));
    assert_eq!(0, listener.count_of("transactionRetry:"));
    assert_eq!(1, listener.count_of("executeEndFail:"));
}

#[tokio::test]
async fn unit_of_work_failure_rolls_back_and_is_terminal() {
    let transport = MockTransport::new();
    let session = Session::new(transport.clone());
    let strategy = Arc::new(FixedStrategy::new(TransactionOption::occ()));
    let executor = session.executor(strategy);

    let err = executor
        .execute::<(), _>(|_tx| {
            Box::pin(async move { Err(anyhow::anyhow!("application invariant violated").into()) })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::User { .. }));
    // The live transaction is rolled back and its handle released.
    assert_eq!(1, transport.rollback_calls.load(Ordering::SeqCst));
    assert_eq!(1, transport.dispose_calls.load(Ordering::SeqCst));
    assert_eq!(0, transport.commit_calls.load(Ordering::SeqCst));
}

#[tokio::test]
async fn unit_of_work_observes_the_current_attempt() {
    let transport = MockTransport::new();
    transport.push_commit_failure(serialization_failure());
    let session = Session::new(transport.clone());
    let strategy =
        Arc::new(FixedStrategy::with_cap(TransactionOption::occ(), 5).unwrap());
    let executor = session.executor(strategy);

    let seen = Arc::new(AtomicU32::new(0));
    let slot = Arc::clone(&seen);
    let value = executor
        .execute(move |tx| {
            slot.store(tx.attempt(), Ordering::SeqCst);
            Box::pin(async move { Ok(UnitVerdict::Commit(tx.attempt())) })
        })
        .await
        .unwrap();

    // The first commit fails retryably; the second attempt succeeds.
    assert_eq!(Some(2), value);
    assert_eq!(2, seen.load(Ordering::SeqCst));
}

#[tokio::test]
async fn classifier_overrides_take_effect() {
    let transport = MockTransport::new();
    transport.push_commit_failure(ServerDiagnostic::new(
        DiagnosticCode::Unavailable,
        "restarting",
    ));
    let classifier = Arc::new(
        DefaultClassifier::new().with_rule(DiagnosticCode::Unavailable, RetryCode::Retryable),
    );
    let session = Session::new(transport.clone()).with_classifier(classifier);
    let strategy =
        Arc::new(FixedStrategy::with_cap(TransactionOption::occ(), 3).unwrap());
    let executor = session.executor(strategy);

    let value = executor
        .execute(|_tx| Box::pin(async move { Ok(UnitVerdict::Commit(1)) }))
        .await
        .unwrap();

    // Unavailable is terminal by default; the override retries it.
    assert_eq!(Some(1), value);
    assert_eq!(2, transport.begin_calls.load(Ordering::SeqCst));
}

#[tokio::test]
async fn label_counter_groups_executions_by_option_label() {
    let transport = MockTransport::new();
    let counter = Arc::new(LabelCounter::new());
    let session = Session::new(transport.clone());

    let nightly = session
        .executor(Arc::new(FixedStrategy::new(
            TransactionOption::occ().with_label("batch-nightly"),
        )))
        .add_listener(counter.clone());
    let online = session
        .executor(Arc::new(FixedStrategy::new(
            TransactionOption::occ().with_label("online"),
        )))
        .add_listener(counter.clone());

    nightly
        .execute(|_tx| Box::pin(async move { Ok(UnitVerdict::Commit(())) }))
        .await
        .unwrap();
    nightly
        .execute(|_tx| Box::pin(async move { Ok(UnitVerdict::Commit(())) }))
        .await
        .unwrap();
    online
        .execute::<(), _>(|_tx| Box::pin(async move { Ok(UnitVerdict::Rollback) }))
        .await
        .unwrap();

    let nightly_count = counter.count("batch-nightly").unwrap();
    assert_eq!(2, nightly_count.execute_count);
    assert_eq!(2, nightly_count.success_commit_count);
    let online_count = counter.count("online").unwrap();
    assert_eq!(1, online_count.execute_count);
    assert_eq!(1, online_count.success_rollback_count);
    assert_eq!(3, counter.sum().success_count());
    assert_eq!(2, counter.sum_by_prefix("batch-").success_commit_count);
}
