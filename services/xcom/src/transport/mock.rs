//! Mock Transport for Testing
//!
//! Replays queued replies and records every request, so session logic can be
//! exercised without a device.

use async_trait::async_trait;
use errors::{XcomError, XcomResult};
use std::collections::VecDeque;
use tracing::debug;
use xcom_protocol::Package;

use super::traits::{Transport, TransportStats};

/// Mock transport implementation
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: VecDeque<XcomResult<Package>>,
    sent: Vec<Package>,
    /// Never answer; the caller's timeout decides
    silent: bool,
    stats: TransportStats,
}

impl MockTransport {
    pub fn new() -> Self {
        let mut stats = TransportStats::new();
        stats.record_connection();
        Self {
            stats,
            ..Default::default()
        }
    }

    /// Transport that accepts requests and never replies
    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::new()
        }
    }

    /// Queue the next reply
    pub fn push_response(&mut self, reply: Package) -> &mut Self {
        self.responses.push_back(Ok(reply));
        self
    }

    /// Queue a transport failure
    pub fn push_error(&mut self, error: XcomError) -> &mut Self {
        self.responses.push_back(Err(error));
        self
    }

    /// Requests seen so far, oldest first
    pub fn sent(&self) -> &[Package] {
        &self.sent
    }

    pub fn pending_responses(&self) -> usize {
        self.responses.len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn transport_type(&self) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        "mock"
    }

    async fn exchange(&mut self, request: &Package) -> XcomResult<Package> {
        debug!("Mock exchange: {request}");
        self.stats.record_bytes_sent(request.encoded_len());
        self.sent.push(request.clone());

        if self.silent {
            std::future::pending::<()>().await;
        }

        match self.responses.pop_front() {
            Some(Ok(reply)) => {
                self.stats.record_bytes_received(reply.encoded_len());
                self.stats.record_exchange();
                Ok(reply)
            },
            Some(Err(e)) => {
                self.stats.record_failure();
                Err(e)
            },
            None => {
                self.stats.record_failure();
                Err(XcomError::EmptyResponse("mock".to_string()))
            },
        }
    }

    fn stats(&self) -> TransportStats {
        self.stats.clone()
    }

    async fn close(&mut self) -> XcomResult<()> {
        self.stats.record_disconnection();
        Ok(())
    }
}
