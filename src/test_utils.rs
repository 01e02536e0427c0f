//! Fake stats sources for testing.

use crate::core::StatsSource;
use crate::invoker::InvokeError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Returns the same output on every fetch.
pub struct StaticSource {
    output: String,
    calls: Arc<AtomicUsize>,
}

impl StaticSource {
    pub fn new(output: &str) -> Self {
        Self {
            output: output.to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A handle to the number of fetches performed so far.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl StatsSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> Result<String, InvokeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.output.clone())
    }
}

/// Returns queued outputs in order, then empty output once exhausted.
pub struct SequenceSource {
    outputs: Mutex<VecDeque<String>>,
}

impl SequenceSource {
    pub fn new<I, S>(outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            outputs: Mutex::new(outputs.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl StatsSource for SequenceSource {
    fn name(&self) -> &str {
        "sequence"
    }

    async fn fetch(&self) -> Result<String, InvokeError> {
        Ok(self.outputs.lock().unwrap().pop_front().unwrap_or_default())
    }
}

/// Sleeps before answering, to exercise the invocation deadline.
pub struct SlowSource {
    delay: Duration,
    output: String,
}

impl SlowSource {
    pub fn new(delay: Duration, output: &str) -> Self {
        Self {
            delay,
            output: output.to_string(),
        }
    }
}

#[async_trait]
impl StatsSource for SlowSource {
    fn name(&self) -> &str {
        "slow"
    }

    async fn fetch(&self) -> Result<String, InvokeError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.output.clone())
    }
}

/// Fails every fetch as if the program could not be started.
pub struct FailingSource {
    message: String,
}

impl FailingSource {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl StatsSource for FailingSource {
    fn name(&self) -> &str {
        "failing"
    }

    async fn fetch(&self) -> Result<String, InvokeError> {
        Err(InvokeError::Spawn {
            program: "conntrack".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, self.message.clone()),
        })
    }
}
