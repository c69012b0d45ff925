//! Provider data passed to resources and data sources

use crate::api::Client;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Serializes CLB actions that the API rejects when run concurrently on one
/// load balancer (rewrite rules). Shared by every resource the provider hands
/// out, so two redirections created in the same apply take turns.
#[derive(Clone, Default)]
pub struct ClbActionContext {
    lock: Arc<Mutex<()>>,
}

impl ClbActionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

#[derive(Clone)]
pub struct TencentCloudProviderData {
    pub client: Client,
    pub clb_actions: ClbActionContext,
}

impl TencentCloudProviderData {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            clb_actions: ClbActionContext::new(),
        }
    }
}
