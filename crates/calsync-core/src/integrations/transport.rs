//! Blocking bridge over the async HTTP client.
//!
//! Each pass runs to completion on the calling thread; async `reqwest` calls
//! are driven by a current-thread runtime owned here.

use std::future::Future;
use std::sync::Arc;

use reqwest::Client;
use tokio::runtime::{Builder, Runtime};

use crate::error::Result;

/// Shared runtime + HTTP client handed to every external-service client.
#[derive(Clone)]
pub struct Transport {
    runtime: Arc<Runtime>,
    http: Client,
}

impl Transport {
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let http = Client::builder()
            .user_agent(concat!("calsync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            runtime: Arc::new(runtime),
            http,
        })
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Block the calling thread until `future` completes.
    ///
    /// Must not be called from inside an async context.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}
