//! Collaborator seams: the message queue and the skin source.

use std::sync::Mutex;

use anyhow::{Result, anyhow};
use skinshot_engine::skin::BodyModel;
use skinshot_engine::RenderError;
use skinshot_proto::Profile;

/// One queued request as handed over by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Compressed request frame.
    pub body: Vec<u8>,
    /// Queue the response is published to.
    pub reply_to: String,
    /// Echoed on the response so the dispatcher can match it.
    pub correlation_id: Option<String>,
    /// Acknowledged once the response has been published.
    pub delivery_tag: u64,
}

/// Outbound side of the message queue.
///
/// Shared by every worker thread of a process.
pub trait Transport: Send + Sync {
    fn publish(&self, reply_to: &str, correlation_id: Option<&str>, body: Vec<u8>) -> Result<()>;

    fn ack(&self, delivery_tag: u64) -> Result<()>;
}

/// Supplies a PNG skin for jobs that carry none.
pub trait SkinResolver: Send + Sync {
    fn resolve(&self, profile: &Profile, model: BodyModel) -> Result<Vec<u8>, RenderError>;
}

/// Resolver for deployments where every job carries its skin.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSkinResolver;

impl SkinResolver for NoSkinResolver {
    fn resolve(&self, profile: &Profile, _model: BodyModel) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::decode(format!("job for {} carries no skin", profile.name)))
    }
}

/// A response captured by [`LocalTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub reply_to: String,
    pub correlation_id: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Default)]
struct LocalState {
    published: Vec<Published>,
    acked: Vec<u64>,
}

/// In-process transport that records what workers publish and acknowledge.
#[derive(Debug, Default)]
pub struct LocalTransport {
    state: Mutex<LocalState>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in publish order.
    pub fn published(&self) -> Vec<Published> {
        self.state.lock().map(|s| s.published.clone()).unwrap_or_default()
    }

    /// Every acknowledged delivery tag, in ack order.
    pub fn acked(&self) -> Vec<u64> {
        self.state.lock().map(|s| s.acked.clone()).unwrap_or_default()
    }
}

impl Transport for LocalTransport {
    fn publish(&self, reply_to: &str, correlation_id: Option<&str>, body: Vec<u8>) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow!("local transport poisoned during publish"))?;
        state.published.push(Published {
            reply_to: reply_to.to_string(),
            correlation_id: correlation_id.map(str::to_string),
            body,
        });
        Ok(())
    }

    fn ack(&self, delivery_tag: u64) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow!("local transport poisoned during ack"))?;
        state.acked.push(delivery_tag);
        Ok(())
    }
}
