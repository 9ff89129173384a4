use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, SendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, bail};
use skinshot_engine::RenderError;
use skinshot_proto::ResponseFrame;

use crate::draw::{render_job, Renderers};
use crate::{Delivery, SkinResolver, Transport, WorkerConfig};

/// Handle to one render thread.
///
/// The thread owns its GPU context and renderers; the only thing crossing the
/// thread boundary is the [`Delivery`] queue. Dropping the handle shuts the
/// worker down after it has drained its queue.
pub struct RenderWorker {
    id: usize,
    sender: Option<mpsc::Sender<Delivery>>,
    thread: Option<JoinHandle<()>>,
}

impl RenderWorker {
    /// Starts a worker thread.
    ///
    /// `id` is only used for thread names and logs; the response identity is
    /// `config.name`, which must fit a response frame.
    pub fn spawn(
        id: usize,
        config: WorkerConfig,
        transport: Arc<dyn Transport>,
        resolver: Arc<dyn SkinResolver>,
    ) -> anyhow::Result<Self> {
        // Every response frame carries the name as a u16-length string.
        if config.name.len() > usize::from(u16::MAX) {
            bail!("worker name is {} bytes, at most {} fit a response frame", config.name.len(), u16::MAX);
        }

        let (sender, receiver) = mpsc::channel();
        let thread = thread::Builder::new()
            .name(format!("skinshot-worker-{id}"))
            .spawn(move || run(id, config, transport, resolver, receiver))
            .context("failed to spawn render worker thread")?;

        Ok(Self { id, sender: Some(sender), thread: Some(thread) })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Queues a delivery. Hands it back if the worker has stopped.
    pub fn process(&self, delivery: Delivery) -> Result<(), SendError<Delivery>> {
        match &self.sender {
            Some(sender) => sender.send(delivery),
            None => Err(SendError(delivery)),
        }
    }

    /// Stops accepting work, lets the thread finish what is queued, then joins it.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Closing the channel ends the loop once the queue is empty.
        self.sender = None;
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("worker {} thread panicked outside a job", self.id);
            }
        }
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    id: usize,
    config: WorkerConfig,
    transport: Arc<dyn Transport>,
    resolver: Arc<dyn SkinResolver>,
    queue: mpsc::Receiver<Delivery>,
) {
    let mut renderers = Renderers::new(config.limits, config.gpu.clone());
    if config.eager_gpu {
        if let Err(err) = renderers.start_gpu() {
            log::error!("worker {id}: GPU startup failed, worker stopped: {err:#}");
            return;
        }
    }
    log::info!("worker {id} ({}) ready", config.name);

    let mut jobs = JobLoop {
        id,
        name: config.name,
        renderers,
        transport,
        resolver,
    };
    for delivery in queue {
        jobs.handle(delivery);
    }

    jobs.renderers.destroy_all();
    log::info!("worker {id} stopped");
}

struct JobLoop {
    id: usize,
    name: String,
    renderers: Renderers,
    transport: Arc<dyn Transport>,
    resolver: Arc<dyn SkinResolver>,
}

impl JobLoop {
    fn handle(&mut self, delivery: Delivery) {
        let id = self.id;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            render_job(&mut self.renderers, &*self.resolver, &delivery.body)
        }))
        .unwrap_or_else(|payload| {
            Err(RenderError::render_fault(format!("render panicked: {}", panic_message(&*payload))))
        });

        let response = match result {
            Ok(png) => ResponseFrame::success(self.name.as_str(), png),
            Err(err) => {
                log::error!("worker {id}: job {} failed: {err}", delivery.delivery_tag);
                ResponseFrame::failure(self.name.as_str(), &err.to_description())
            }
        };

        if let Err(err) = self.deliver(&delivery, &response) {
            // Unless only the ack failed, the job stays unacked and is redelivered.
            log::error!("worker {id}: job {}: {err}", delivery.delivery_tag);
        }
    }

    /// Encodes, publishes and acks one response. Every failure here is a
    /// `TransportFault`; the job is only acked once its response is published.
    fn deliver(&self, delivery: &Delivery, response: &ResponseFrame) -> Result<(), RenderError> {
        let body = response
            .encode()
            .map_err(|e| RenderError::transport(format!("response encode failed: {e}")))?;

        let correlation_id = delivery.correlation_id.as_deref();
        self.transport
            .publish(&delivery.reply_to, correlation_id, body)
            .map_err(|e| RenderError::transport(format!("publish failed: {e:#}")))?;
        log::trace!("worker {}: published response for {}", self.id, delivery.delivery_tag);

        self.transport
            .ack(delivery.delivery_tag)
            .map_err(|e| RenderError::transport(format!("ack failed: {e:#}")))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
