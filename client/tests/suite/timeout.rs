use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use client_test_support::MockTransport;
use pretty_assertions::assert_eq;
use tsubame_client::ClientError;
use tsubame_client::FixedStrategy;
use tsubame_client::Session;
use tsubame_client::TimeoutConfig;
use tsubame_client::TimeoutKey;
use tsubame_client::TransactionOption;
use tsubame_client::UnitVerdict;

const SHORT: Duration = Duration::from_millis(25);
const STUCK: Duration = Duration::from_secs(30);

#[tokio::test]
async fn commit_timeout_abandons_the_pending_result_and_is_terminal() {
    let transport = MockTransport::new();
    transport.set_commit_delay(STUCK);
    let config = TimeoutConfig::default().with(TimeoutKey::CommitConnect, SHORT);
    let session = Session::new(transport.clone()).with_timeouts(config);
    let strategy =
        Arc::new(FixedStrategy::with_cap(TransactionOption::occ(), 3).unwrap());
    let executor = session.executor(strategy);

    let err = executor
        .execute::<(), _>(|_tx| Box::pin(async move { Ok(UnitVerdict::Commit(())) }))
        .await
        .unwrap_err();

    // A local timeout is not a server verdict, so it is never retried.
    match &err {
        ClientError::Timeout { key, timeout, .. } => {
            assert_eq!(&TimeoutKey::CommitConnect, key);
            assert_eq!(&SHORT, timeout);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(1, transport.begin_calls.load(Ordering::SeqCst));
    assert_eq!(1, transport.commit_calls.load(Ordering::SeqCst));
    // The stuck commit was abandoned, and the handle still released.
    assert_eq!(1, transport.pending_close_calls());
    assert_eq!(1, transport.dispose_calls.load(Ordering::SeqCst));
}

#[tokio::test]
async fn configured_timeouts_leave_fast_operations_untouched() {
    let transport = MockTransport::new();
    let config = TimeoutConfig::new(Duration::from_secs(5))
        .with(TimeoutKey::CommitConnect, SHORT)
        .with(TimeoutKey::BeginConnect, SHORT);
    let session = Session::new(transport.clone()).with_timeouts(config);
    let strategy = Arc::new(FixedStrategy::new(TransactionOption::occ()));
    let executor = session.executor(strategy);

    let value = executor
        .execute(|_tx| Box::pin(async move { Ok(UnitVerdict::Commit(9)) }))
        .await
        .unwrap();

    assert_eq!(Some(9), value);
    assert_eq!(0, transport.pending_close_calls());
}
