// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wd_core::Group;

/// A source of job configs.
///
/// Every group a discoverer sends is the complete current list for its
/// source; an empty group withdraws the source.
#[async_trait]
pub trait Discoverer: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Run until done or cancelled, sending batches on `out`.
    async fn discover(&self, cancel: CancellationToken, out: mpsc::Sender<Vec<Group>>);
}

/// Cancel-aware send. Returns false when the receiver is gone or `cancel`
/// fired first.
pub async fn send_groups(
    cancel: &CancellationToken,
    out: &mpsc::Sender<Vec<Group>>,
    groups: Vec<Group>,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        res = out.send(groups) => res.is_ok(),
    }
}
