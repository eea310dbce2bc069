use super::*;
use crate::mirror::reasons;
use crate::reconciler::ReconcilerConfig;
use crate::store::InMemoryStore;
use runbridge_api::{
    Build, BuildSpec, Condition, ConditionStatus, ExecutionStatus, Image, Invocation,
    InvocationSpec, Source, Strategy,
};

const NAMESPACE: &str = "build-pipeline";

fn kaniko() -> BuildSpec {
    BuildSpec {
        source: Source {
            url: Some("https://github.com/shipwright-io/sample-go".to_string()),
            revision: None,
            context_dir: None,
        },
        strategy: Strategy {
            kind: None,
            name: "kaniko".to_string(),
        },
        output: Image {
            image: "registry.local/sample-go".to_string(),
        },
        timeout: None,
    }
}

fn controller(store: &Arc<InMemoryStore>, backoff: BackoffConfig) -> Arc<Controller> {
    let reconciler = Reconciler::new(
        store.clone(),
        ReconcilerConfig::default()
            .with_io_timeout(Duration::from_secs(1))
            .with_poll_interval(Duration::from_millis(50))
            .with_dependency_grace(Duration::from_secs(600)),
    );
    let config = ControllerConfig::default()
        .with_workers(2)
        .with_attempt_deadline(Duration::from_secs(5))
        .with_resync_interval(Duration::from_secs(3600))
        .with_backoff(backoff);
    Arc::new(Controller::new(reconciler, store.clone(), config))
}

fn fast_backoff() -> BackoffConfig {
    BackoffConfig::new()
        .with_initial_delay(Duration::from_millis(10))
        .with_max_delay(Duration::from_millis(100))
        .with_jitter(false)
}

fn start(
    controller: &Arc<Controller>,
) -> (CancellationToken, tokio::task::JoinHandle<Result<()>>) {
    let token = CancellationToken::new();
    let handle = {
        let controller = Arc::clone(controller);
        let token = token.clone();
        tokio::spawn(async move { controller.run(token).await })
    };
    (token, handle)
}

async fn stop(token: CancellationToken, handle: tokio::task::JoinHandle<Result<()>>) {
    token.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("controller did not stop")
        .unwrap()
        .unwrap();
}

macro_rules! eventually {
    ($what:expr, $check:expr) => {{
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !($check) {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {}",
                $what
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }};
}

async fn submit(store: &InMemoryStore, name: &str) -> ObjectKey {
    let run = Invocation::new(NAMESPACE, name, InvocationSpec::for_build("image-build"));
    store.apply_invocation(run).await.key()
}

async fn reason(store: &InMemoryStore, key: &ObjectKey) -> Option<String> {
    store
        .get_invocation(key)
        .await
        .ok()
        .flatten()
        .and_then(|run| run.status.succeeded().map(|c| c.reason.clone()))
}

#[tokio::test]
async fn test_existing_and_new_invocations_are_reconciled() {
    let store = Arc::new(InMemoryStore::new(64));
    store.apply_build(Build::new(NAMESPACE, "image-build", kaniko())).await;
    let first = submit(&store, "first").await;

    let controller = controller(&store, fast_backoff());
    let (token, handle) = start(&controller);

    eventually!("first execution", store.get_execution(&first).await.unwrap().is_some());

    let second = submit(&store, "second").await;
    eventually!("second execution", store.get_execution(&second).await.unwrap().is_some());

    stop(token, handle).await;
}

#[tokio::test]
async fn test_engine_completion_is_mirrored() {
    let store = Arc::new(InMemoryStore::new(64));
    store.apply_build(Build::new(NAMESPACE, "image-build", kaniko())).await;
    let key = submit(&store, "image-build").await;

    let controller = controller(&store, fast_backoff());
    let (token, handle) = start(&controller);

    eventually!("execution", store.get_execution(&key).await.unwrap().is_some());

    let mut status = ExecutionStatus {
        conditions: vec![Condition::succeeded(ConditionStatus::True, "Succeeded", "")],
        ..Default::default()
    };
    status
        .results
        .insert("digest".to_string(), "sha256:abc".to_string());
    store.update_execution_status(&key, status).await.unwrap();

    eventually!(
        "succeeded",
        reason(&store, &key).await.as_deref() == Some(reasons::SUCCEEDED)
    );
    let run = store.get_invocation(&key).await.unwrap().unwrap();
    assert_eq!(run.status.results["digest"], "sha256:abc");

    stop(token, handle).await;
}

#[tokio::test]
async fn test_build_arrival_wakes_waiting_invocation() {
    let store = Arc::new(InMemoryStore::new(64));
    let key = submit(&store, "image-build").await;

    // Backoff far longer than the test: only the build event can wake it
    let slow = BackoffConfig::new()
        .with_initial_delay(Duration::from_secs(600))
        .with_max_delay(Duration::from_secs(600))
        .with_jitter(false);
    let controller = controller(&store, slow);
    let (token, handle) = start(&controller);

    eventually!(
        "awaiting",
        reason(&store, &key).await.as_deref() == Some(reasons::AWAITING_EXECUTION)
    );
    eventually!("backoff recorded", controller.queue().num_requeues(&key) > 0);
    assert!(store.get_execution(&key).await.unwrap().is_none());

    store.apply_build(Build::new(NAMESPACE, "image-build", kaniko())).await;
    eventually!("execution", store.get_execution(&key).await.unwrap().is_some());

    stop(token, handle).await;
}

#[tokio::test]
async fn test_watch_lag_relists() {
    let store = Arc::new(InMemoryStore::new(1));
    store.apply_build(Build::new(NAMESPACE, "image-build", kaniko())).await;

    let controller = controller(&store, fast_backoff());
    let (token, handle) = start(&controller);
    tokio::task::yield_now().await;

    let keys: Vec<_> = {
        let mut keys = Vec::new();
        for i in 0..20 {
            keys.push(submit(&store, &format!("run-{i}")).await);
        }
        keys
    };

    eventually!("all executions", store.list_executions().await.len() == keys.len());

    stop(token, handle).await;
}

#[tokio::test]
async fn test_rejected_invocation_is_not_retried() {
    let store = Arc::new(InMemoryStore::new(64));
    let mut spec = InvocationSpec::for_build("image-build");
    spec.retries = 1;
    let key = store
        .apply_invocation(Invocation::new(NAMESPACE, "image-build", spec))
        .await
        .key();

    let controller = controller(&store, fast_backoff());
    let (token, handle) = start(&controller);

    eventually!(
        "rejected",
        reason(&store, &key).await.as_deref() == Some(reasons::VALIDATION_FAILED)
    );
    assert_eq!(controller.queue().num_requeues(&key), 0);

    stop(token, handle).await;
}

#[tokio::test]
async fn test_shutdown_stops_the_queue() {
    let store = Arc::new(InMemoryStore::new(64));
    let controller = controller(&store, fast_backoff());
    let (token, handle) = start(&controller);

    tokio::task::yield_now().await;
    stop(token, handle).await;
    assert!(controller.queue().is_shutting_down());
}

#[test]
fn test_config_builder() {
    let config = ControllerConfig::default()
        .with_workers(8)
        .with_resync_interval(Duration::from_secs(60));
    assert_eq!(config.workers, 8);
    assert_eq!(config.resync_interval, Duration::from_secs(60));
    assert_eq!(config.attempt_deadline, Duration::from_secs(60));
}
