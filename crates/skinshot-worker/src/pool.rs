use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::SendError;
use std::sync::Arc;

use crate::{Delivery, RenderWorker, SkinResolver, Transport, WorkerConfig};

/// A fixed set of render workers fed round-robin.
///
/// Worker ids are `0..count`, assigned here.
pub struct WorkerPool {
    workers: Vec<RenderWorker>,
    next: AtomicUsize,
}

impl WorkerPool {
    /// Spawns `count` workers (at least one) sharing `config`, `transport` and `resolver`.
    pub fn new(
        count: usize,
        config: WorkerConfig,
        transport: Arc<dyn Transport>,
        resolver: Arc<dyn SkinResolver>,
    ) -> anyhow::Result<Self> {
        let workers = (0..count.max(1))
            .map(|id| RenderWorker::spawn(id, config.clone(), transport.clone(), resolver.clone()))
            .collect::<anyhow::Result<Vec<_>>>()?;
        log::info!("started {} render worker(s)", workers.len());
        Ok(Self { workers, next: AtomicUsize::new(0) })
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Queues `delivery` on the next worker in turn, skipping stopped workers.
    ///
    /// Hands the delivery back when no worker accepts it.
    pub fn process(&self, delivery: Delivery) -> Result<(), SendError<Delivery>> {
        let start = self.next.fetch_add(1, Ordering::Relaxed);
        let mut delivery = delivery;
        for i in 0..self.workers.len() {
            let worker = &self.workers[(start + i) % self.workers.len()];
            match worker.process(delivery) {
                Ok(()) => return Ok(()),
                Err(SendError(back)) => {
                    log::warn!("worker {} is not running, trying the next one", worker.id());
                    delivery = back;
                }
            }
        }
        Err(SendError(delivery))
    }

    /// Shuts every worker down, draining their queues.
    pub fn shutdown(self) {
        for worker in self.workers {
            worker.shutdown();
        }
    }
}
