//! End-to-end tests for batch runs: delivery, rejection, abort, panics and
//! the shared admission gate.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use batchpool::{
    run, AdmissionGate, BatchConfig, BatchRunner, ItemContext, ItemError, Outcome, OutcomeKind,
    WorkItem,
};

fn numbered(n: u32) -> Vec<WorkItem<u32, u32>> {
    (0..n).map(|i| WorkItem::new(i, i)).collect()
}

fn ids<R, E>(outcomes: &[Outcome<u32, R, E>]) -> Vec<u32> {
    let mut ids: Vec<u32> = outcomes.iter().map(|o| o.id).collect();
    ids.sort_unstable();
    ids
}

fn counting(
    calls: &Arc<AtomicUsize>,
) -> impl Fn(ItemContext, u32) -> futures::future::Ready<Result<u32, String>> + Send + Sync + 'static
{
    let calls = Arc::clone(calls);
    move |_ctx: ItemContext, n: u32| {
        calls.fetch_add(1, Ordering::SeqCst);
        futures::future::ready(Ok(n))
    }
}

#[tokio::test]
async fn test_every_item_gets_one_outcome() {
    let config = BatchConfig::default().with_workers(8);
    let stream = run(
        &CancellationToken::new(),
        numbered(200),
        |_ctx: ItemContext, n: u32| async move {
            tokio::task::yield_now().await;
            if n % 7 == 0 {
                Err(format!("multiple of seven: {}", n))
            } else {
                Ok(n * 2)
            }
        },
        None,
        config,
    );
    let outcomes = stream.collect_all().await;

    assert_eq!(outcomes.len(), 200);
    assert_eq!(ids(&outcomes), (0..200).collect::<Vec<_>>());
    for outcome in &outcomes {
        match &outcome.result {
            Ok(value) => assert_eq!(*value, outcome.id * 2),
            Err(ItemError::Failed(msg)) => {
                assert_eq!(outcome.id % 7, 0);
                assert_eq!(msg, &format!("multiple of seven: {}", outcome.id));
            }
            Err(other) => panic!("unexpected error for {}: {}", outcome.id, other),
        }
    }
}

#[tokio::test]
async fn test_duplicate_ids_reject_whole_batch() {
    let calls = Arc::new(AtomicUsize::new(0));
    let items = vec![
        WorkItem::new(1u32, 10u32),
        WorkItem::new(2, 20),
        WorkItem::new(1, 30),
    ];
    let outcomes = run(
        &CancellationToken::new(),
        items,
        counting(&calls),
        None,
        BatchConfig::default(),
    )
    .collect_all()
    .await;

    assert_eq!(outcomes.len(), 3);
    assert_eq!(ids(&outcomes), vec![1, 1, 2]);
    for outcome in &outcomes {
        match &outcome.result {
            Err(ItemError::DuplicateId(id)) => assert_eq!(id, "1"),
            other => panic!("expected duplicate rejection, got {:?}", other),
        }
        assert_eq!(outcome.kind(), OutcomeKind::Rejected);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_batch_closes_immediately() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut stream = run(
        &CancellationToken::new(),
        Vec::<WorkItem<u32, u32>>::new(),
        counting(&calls),
        None,
        BatchConfig::default(),
    );
    assert!(stream.recv().await.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancelled_parent_skips_everything() {
    let calls = Arc::new(AtomicUsize::new(0));
    let parent = CancellationToken::new();
    parent.cancel();

    let outcomes = run(&parent, numbered(25), counting(&calls), None, BatchConfig::default())
        .collect_all()
        .await;

    assert_eq!(ids(&outcomes), (0..25).collect::<Vec<_>>());
    assert!(outcomes.iter().all(|o| o.is_skipped()));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_abort_on_first_error_accounts_for_every_item() {
    let config = BatchConfig::default()
        .with_workers(4)
        .with_abort_on_first_error(true);
    let stream = run(
        &CancellationToken::new(),
        numbered(50),
        |ctx: ItemContext, n: u32| async move {
            if n == 0 {
                return Err("first item fails".to_string());
            }
            tokio::select! {
                () = ctx.cancelled() => Err("interrupted".to_string()),
                () = tokio::time::sleep(Duration::from_millis(20)) => Ok(n),
            }
        },
        None,
        config,
    );

    let outcomes = tokio::time::timeout(Duration::from_secs(5), stream.collect_all())
        .await
        .expect("abort must not hang the run");

    assert_eq!(ids(&outcomes), (0..50).collect::<Vec<_>>());
    let first = outcomes.iter().find(|o| o.id == 0).unwrap();
    assert!(matches!(first.result, Err(ItemError::Failed(_))));
    let skipped = outcomes.iter().filter(|o| o.is_skipped()).count();
    assert!(skipped > 0, "items queued after the failure must be skipped");
}

#[tokio::test]
async fn test_failures_without_abort_do_not_stop_the_run() {
    let config = BatchConfig::default().with_workers(3);
    let outcomes = run(
        &CancellationToken::new(),
        numbered(30),
        |_ctx: ItemContext, n: u32| async move {
            if n % 2 == 0 {
                Err(format!("even {}", n))
            } else {
                Ok(n)
            }
        },
        None,
        config,
    )
    .collect_all()
    .await;

    assert_eq!(outcomes.len(), 30);
    assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 15);
    assert!(outcomes.iter().all(|o| !o.is_skipped()));
}

#[tokio::test]
async fn test_panics_are_contained() {
    let stream = run(
        &CancellationToken::new(),
        numbered(10),
        |_ctx: ItemContext, n: u32| async move {
            if n == 3 {
                panic!("item {} exploded", n);
            }
            Ok::<u32, String>(n)
        },
        None,
        BatchConfig::default().with_workers(2),
    );
    let outcomes = stream.collect_all().await;

    assert_eq!(outcomes.len(), 10);
    let exploded = outcomes.iter().find(|o| o.id == 3).unwrap();
    match &exploded.result {
        Err(ItemError::Panicked(msg)) => assert!(msg.contains("item 3 exploded")),
        other => panic!("expected panic outcome, got {:?}", other),
    }
    assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 9);
}

#[tokio::test]
async fn test_worker_count_does_not_change_results() {
    async fn square(_ctx: ItemContext, n: u32) -> Result<u32, String> {
        tokio::task::yield_now().await;
        Ok(n * n)
    }

    let mut results = Vec::new();
    for workers in [1, 16] {
        let outcomes = run(
            &CancellationToken::new(),
            numbered(64),
            square,
            None,
            BatchConfig::default().with_workers(workers),
        )
        .collect_all()
        .await;
        let mut pairs: Vec<(u32, u32)> = outcomes
            .into_iter()
            .map(|o| (o.id, o.result.unwrap()))
            .collect();
        pairs.sort_unstable();
        results.push(pairs);
    }
    assert_eq!(results[0], results[1]);
}

#[tokio::test]
async fn test_shared_gate_bounds_concurrency_across_runs() {
    let gate = AdmissionGate::new(3);
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let make_op = || {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        move |_ctx: ItemContext, n: u32| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<u32, String>(n)
            }
        }
    };

    let runner = BatchRunner::new(BatchConfig::default().with_workers(8)).with_gate(gate.clone());
    let parent = CancellationToken::new();
    let first = runner.run(&parent, numbered(20), make_op());
    let second = runner.run(&parent, numbered(20), make_op());

    let (a, b) = tokio::join!(first.collect_all(), second.collect_all());

    assert_eq!(a.len(), 20);
    assert_eq!(b.len(), 20);
    assert!(a.iter().chain(b.iter()).all(|o| o.is_success()));
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(gate.in_use(), 0);
}

#[tokio::test]
async fn test_closed_gate_skips_items() {
    let gate = AdmissionGate::new(1);
    gate.close();
    let calls = Arc::new(AtomicUsize::new(0));

    let outcomes = run(
        &CancellationToken::new(),
        numbered(5),
        counting(&calls),
        Some(gate),
        BatchConfig::default(),
    )
    .collect_all()
    .await;

    assert_eq!(outcomes.len(), 5);
    for outcome in &outcomes {
        assert!(matches!(outcome.result, Err(ItemError::GateClosed)));
        assert_eq!(outcome.kind(), OutcomeKind::Skipped);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_parent_cancel_mid_run() {
    let parent = CancellationToken::new();
    let started = Arc::new(AtomicUsize::new(0));
    let op = {
        let started = Arc::clone(&started);
        move |ctx: ItemContext, n: u32| {
            started.fetch_add(1, Ordering::SeqCst);
            async move {
                ctx.cancelled().await;
                Err::<u32, String>(format!("item {} cancelled", n))
            }
        }
    };

    let stream = run(
        &parent,
        numbered(40),
        op,
        None,
        BatchConfig::default().with_workers(2),
    );

    let canceller = {
        let parent = parent.clone();
        let started = Arc::clone(&started);
        tokio::spawn(async move {
            while started.load(Ordering::SeqCst) < 2 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            parent.cancel();
        })
    };

    let outcomes = tokio::time::timeout(Duration::from_secs(5), stream.collect_all())
        .await
        .expect("parent cancellation must end the run");
    canceller.await.unwrap();

    assert_eq!(ids(&outcomes), (0..40).collect::<Vec<_>>());
    assert!(started.load(Ordering::SeqCst) < 40);
    assert!(outcomes.iter().filter(|o| o.is_skipped()).count() >= 30);
}

#[tokio::test]
async fn test_stream_trait_yields_all_outcomes() {
    let stream = run(
        &CancellationToken::new(),
        numbered(12),
        |_ctx: ItemContext, n: u32| async move { Ok::<u32, String>(n + 1) },
        None,
        BatchConfig::default().with_workers(4),
    );
    let outcomes: Vec<_> = stream.collect().await;
    let seen: HashSet<u32> = outcomes.iter().map(|o| o.id).collect();
    assert_eq!(seen.len(), 12);
}

#[tokio::test]
async fn test_stats_match_delivered_outcomes() {
    let mut stream = run(
        &CancellationToken::new(),
        numbered(20),
        |_ctx: ItemContext, n: u32| async move {
            if n < 5 {
                Err("low".to_string())
            } else {
                Ok(n)
            }
        },
        None,
        BatchConfig::default().with_workers(4),
    );
    let mut received = 0;
    while stream.recv().await.is_some() {
        received += 1;
    }

    let stats = stream.stats();
    assert_eq!(received, 20);
    assert_eq!(stats.submitted, 20);
    assert_eq!(stats.delivered, 20);
    assert_eq!(stats.invoked, 20);
    assert_eq!(stats.succeeded, 15);
    assert_eq!(stats.failed, 5);
    assert_eq!(stats.dropped_duplicates, 0);
    assert_eq!(stats.latency.count, 20);
}

#[tokio::test]
async fn test_string_ids_supported() {
    let items: Vec<_> = ["alpha", "beta", "gamma"]
        .iter()
        .map(|name| WorkItem::new(name.to_string(), name.len()))
        .collect();
    let outcomes = run(
        &CancellationToken::new(),
        items,
        |_ctx: ItemContext, len: usize| async move { Ok::<usize, String>(len) },
        None,
        BatchConfig::default(),
    )
    .collect_all()
    .await;

    let beta = outcomes.iter().find(|o| o.id == "beta").unwrap();
    assert_eq!(beta.value(), Some(&4));
}
