// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::discoverer::send_groups;
use async_trait::async_trait;
use wd_core::test_support::config;

/// Sends each batch after its delay, then idles until cancelled.
struct Scripted {
    steps: Mutex<Vec<(Duration, Vec<Group>)>>,
}

impl Scripted {
    fn new(steps: Vec<(u64, Vec<Group>)>) -> Arc<Self> {
        let steps = steps.into_iter().map(|(ms, g)| (Duration::from_millis(ms), g)).collect();
        Arc::new(Self { steps: Mutex::new(steps) })
    }
}

#[async_trait]
impl Discoverer for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn discover(&self, cancel: CancellationToken, out: mpsc::Sender<Vec<Group>>) {
        let steps = std::mem::take(&mut *self.steps.lock());
        for (delay, groups) in steps {
            tokio::time::sleep(delay).await;
            if !send_groups(&cancel, &out, groups).await {
                return;
            }
        }
        cancel.cancelled().await;
    }
}

fn group(source: &str, name: &str) -> Group {
    Group::new(source, vec![config("m", name)])
}

fn start(
    discoverer: Arc<Scripted>,
) -> (mpsc::Receiver<Vec<Group>>, CancellationToken, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();
    let manager = DiscoveryManager::new().with_discoverer(discoverer);
    let handle = tokio::spawn(manager.run(cancel.clone(), tx));
    (rx, cancel, handle)
}

#[tokio::test(start_paused = true)]
async fn first_batch_is_forwarded_immediately() {
    let (mut rx, cancel, handle) = start(Scripted::new(vec![(0, vec![group("s1", "a")])]));

    let batch = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await.unwrap().unwrap();
    assert_eq!(batch, vec![group("s1", "a")]);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn later_updates_coalesce_to_latest_per_source() {
    let (mut rx, cancel, handle) = start(Scripted::new(vec![
        (0, vec![group("s1", "a")]),
        (500, vec![group("s1", "b")]),
        (200, vec![group("s1", "c"), group("s2", "x")]),
    ]));

    assert_eq!(rx.recv().await.unwrap(), vec![group("s1", "a")]);
    let batch = rx.recv().await.unwrap();
    assert_eq!(batch, vec![group("s1", "c"), group("s2", "x")]);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn batches_wait_for_the_send_interval() {
    let (mut rx, cancel, handle) = start(Scripted::new(vec![
        (0, vec![group("s1", "a")]),
        (100, vec![group("s2", "x")]),
    ]));

    let start = tokio::time::Instant::now();
    rx.recv().await.unwrap();
    rx.recv().await.unwrap();
    assert!(start.elapsed() >= SEND_EVERY);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn busy_downstream_keeps_batch_with_newer_updates_winning() {
    let (mut rx, cancel, handle) = start(Scripted::new(vec![
        (0, vec![group("s1", "a")]),
        (500, vec![group("s1", "b"), group("s2", "x")]),
        (2000, vec![group("s1", "c")]),
    ]));

    // Leave the first batch unread past the first flush tick.
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(rx.recv().await.unwrap(), vec![group("s1", "a")]);

    let batch = rx.recv().await.unwrap();
    assert_eq!(batch, vec![group("s1", "c"), group("s2", "x")]);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn withdrawal_is_forwarded() {
    let (mut rx, cancel, handle) = start(Scripted::new(vec![
        (0, vec![group("s1", "a")]),
        (100, vec![Group::empty("s1")]),
    ]));

    rx.recv().await.unwrap();
    assert_eq!(rx.recv().await.unwrap(), vec![Group::empty("s1")]);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn closed_downstream_stops_the_manager() {
    let (rx, cancel, handle) = start(Scripted::new(vec![(0, vec![group("s1", "a")])]));
    drop(rx);

    tokio::time::timeout(Duration::from_secs(10), handle).await.unwrap().unwrap();
    assert!(!cancel.is_cancelled());
}
