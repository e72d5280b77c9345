// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Touch Worker
//!
//! Background task that applies the best-effort timestamp writes produced by
//! authentication: API-key last-used and user last-login.
//!
//! ## Strategy
//!
//! The request path calls [`TouchQueue::send`], which never awaits and never
//! fails: a full or closed channel drops the update with a log line. The
//! worker drains the channel and writes each update through the storage
//! traits. Write errors are logged and forgotten.
//!
//! Updates are unordered with respect to later reads of the same record.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`. On cancellation the worker
//! applies whatever is already queued, then stops.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::api_keys::ApiKeyStore;
use super::identity::UserDirectory;

/// Default channel capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// A deferred timestamp write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchEvent {
    ApiKeyUsed { key_id: Uuid, at: DateTime<Utc> },
    UserLogin { user_id: Uuid, at: DateTime<Utc> },
}

/// Sending half handed to the API-key service and the identity resolver.
#[derive(Debug, Clone)]
pub struct TouchQueue {
    tx: mpsc::Sender<TouchEvent>,
}

impl TouchQueue {
    /// Create a queue and the receiver a [`TouchWorker`] consumes.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TouchEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Enqueue without waiting.
    pub fn send(&self, event: TouchEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(?event, "Touch queue full, dropping update");
            }
            Err(TrySendError::Closed(event)) => {
                debug!(?event, "Touch worker stopped, dropping update");
            }
        }
    }
}

/// Consumer of the touch queue.
pub struct TouchWorker {
    users: Arc<dyn UserDirectory>,
    api_keys: Arc<dyn ApiKeyStore>,
    rx: mpsc::Receiver<TouchEvent>,
}

impl TouchWorker {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        api_keys: Arc<dyn ApiKeyStore>,
        rx: mpsc::Receiver<TouchEvent>,
    ) -> Self {
        Self {
            users,
            api_keys,
            rx,
        }
    }

    /// Create the queue, spawn the worker, return both handles.
    pub fn spawn(
        users: Arc<dyn UserDirectory>,
        api_keys: Arc<dyn ApiKeyStore>,
        capacity: usize,
        shutdown: CancellationToken,
    ) -> (TouchQueue, JoinHandle<()>) {
        let (queue, rx) = TouchQueue::channel(capacity);
        let worker = Self::new(users, api_keys, rx);
        let handle = tokio::spawn(worker.run(shutdown));
        (queue, handle)
    }

    /// Run until the cancellation token is triggered or every sender is gone.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Touch worker starting");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    self.drain().await;
                    info!("Touch worker shutting down");
                    return;
                }
                event = self.rx.recv() => match event {
                    Some(event) => self.apply(event).await,
                    None => {
                        info!("Touch queue closed, worker exiting");
                        return;
                    }
                },
            }
        }
    }

    async fn drain(&mut self) {
        self.rx.close();
        while let Some(event) = self.rx.recv().await {
            self.apply(event).await;
        }
    }

    async fn apply(&self, event: TouchEvent) {
        let result = match event {
            TouchEvent::ApiKeyUsed { key_id, at } => self.api_keys.touch_last_used(key_id, at).await,
            TouchEvent::UserLogin { user_id, at } => self.users.touch_last_login(user_id, at).await,
        };

        if let Err(e) = result {
            warn!(?event, error = %e, "Failed to apply touch update");
        }
    }
}
