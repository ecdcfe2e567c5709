//! # Dispatch engine
//!
//! A bounded worker pool shared by a channel's fan-out and delivery tasks.
//! `core_workers` workers live for the lifetime of the pool; when every
//! worker is busy and the pool is below `max_workers`, submission spawns a
//! spare worker that retires after `keep_alive` without work. Jobs queue in
//! an unbounded backlog by default; a bounded backlog rejects rather than
//! blocks, so publishers are never held up by a slow pool.
//!
//! Workers take jobs from a single shared queue guarded by an async mutex;
//! holding the guard across `recv` hands each job to exactly one worker.

use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::config::DispatchConfig;
use crate::error::{ChannelError, ChannelResult};

pub(crate) type Job = BoxFuture<'static, ()>;

#[derive(Clone)]
enum JobSender {
    Bounded(mpsc::Sender<Job>),
    Unbounded(mpsc::UnboundedSender<Job>),
}

enum JobReceiver {
    Bounded(mpsc::Receiver<Job>),
    Unbounded(mpsc::UnboundedReceiver<Job>),
}

impl JobReceiver {
    async fn recv(&mut self) -> Option<Job> {
        match self {
            JobReceiver::Bounded(rx) => rx.recv().await,
            JobReceiver::Unbounded(rx) => rx.recv().await,
        }
    }
}

struct Inner {
    queue: Mutex<JobReceiver>,
    config: DispatchConfig,
    workers: AtomicUsize,
    idle: AtomicUsize,
}

/// Fixed-identity worker pool executing boxed-future jobs.
pub struct Dispatcher {
    sender: StdMutex<Option<JobSender>>,
    inner: Arc<Inner>,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        let (sender, receiver) = match config.queue_capacity {
            Some(capacity) => {
                let (tx, rx) = mpsc::channel(capacity.max(1));
                (JobSender::Bounded(tx), JobReceiver::Bounded(rx))
            }
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                (JobSender::Unbounded(tx), JobReceiver::Unbounded(rx))
            }
        };

        let inner = Arc::new(Inner {
            queue: Mutex::new(receiver),
            config,
            workers: AtomicUsize::new(0),
            idle: AtomicUsize::new(0),
        });

        let dispatcher = Self {
            sender: StdMutex::new(Some(sender)),
            inner,
        };
        for _ in 0..dispatcher.inner.config.core_workers {
            dispatcher.spawn_core_worker();
        }
        dispatcher
    }

    /// Enqueues a job without blocking.
    ///
    /// Fails with `ChannelDestroyed` after [`Dispatcher::shutdown`], or
    /// `Congested` when a bounded backlog is full.
    pub(crate) fn submit(&self, job: Job) -> ChannelResult<()> {
        let sender = self.sender.lock().unwrap().clone();
        let Some(sender) = sender else {
            return Err(ChannelError::ChannelDestroyed);
        };

        match sender {
            JobSender::Bounded(tx) => tx.try_send(job).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => ChannelError::Congested,
                mpsc::error::TrySendError::Closed(_) => ChannelError::ChannelDestroyed,
            })?,
            JobSender::Unbounded(tx) => tx
                .send(job)
                .map_err(|_| ChannelError::ChannelDestroyed)?,
        }

        // Grow past the core count only while every worker is busy.
        if self.inner.idle.load(Ordering::SeqCst) == 0 {
            self.try_spawn_spare();
        }
        Ok(())
    }

    /// Closes the queue. Idle workers exit once the queue drains; jobs
    /// already picked up run to completion.
    pub fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if sender.is_some() {
            debug!("dispatcher shut down");
        }
    }

    pub fn worker_count(&self) -> usize {
        self.inner.workers.load(Ordering::SeqCst)
    }

    fn spawn_core_worker(&self) {
        self.inner.workers.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.clone();
        tokio::spawn(async move {
            worker_loop(inner, false).await;
        });
    }

    /// Reserves the worker slot with a compare-exchange before spawning,
    /// so racing submits cannot overshoot `max_workers`.
    fn try_spawn_spare(&self) {
        let max = self.inner.config.max_workers;
        let mut workers = self.inner.workers.load(Ordering::SeqCst);
        while workers < max {
            match self.inner.workers.compare_exchange(
                workers,
                workers + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    let inner = self.inner.clone();
                    tokio::spawn(async move {
                        worker_loop(inner, true).await;
                    });
                    return;
                }
                Err(current) => workers = current,
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn worker_loop(inner: Arc<Inner>, spare: bool) {
    trace!(spare, "dispatch worker started");
    loop {
        inner.idle.fetch_add(1, Ordering::SeqCst);
        // The timeout covers acquiring the queue guard too: whichever
        // worker holds the guard camps in `recv`, so a spare must be able
        // to give up while still waiting in line.
        let job = if spare {
            let next = async {
                let mut queue = inner.queue.lock().await;
                queue.recv().await
            };
            match timeout(inner.config.keep_alive, next).await {
                Ok(job) => job,
                Err(_) => {
                    // Idle past the keep-alive: retire.
                    inner.idle.fetch_sub(1, Ordering::SeqCst);
                    break;
                }
            }
        } else {
            let mut queue = inner.queue.lock().await;
            queue.recv().await
        };
        inner.idle.fetch_sub(1, Ordering::SeqCst);

        match job {
            Some(job) => job.await,
            None => break,
        }
    }
    inner.workers.fetch_sub(1, Ordering::SeqCst);
    trace!(spare, "dispatch worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;
    use tokio::time::{sleep, Duration};

    fn test_config(core: usize, max: usize, capacity: Option<usize>) -> DispatchConfig {
        DispatchConfig {
            core_workers: core,
            max_workers: max,
            keep_alive: Duration::from_millis(200),
            queue_capacity: capacity,
            estimated_consumers: 10,
        }
    }

    #[tokio::test]
    async fn test_submitted_jobs_run() {
        let dispatcher = Dispatcher::new(test_config(2, 4, None));
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = counter.clone();
            dispatcher
                .submit(Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }))
                .unwrap();
        }

        sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_grows_past_core_workers() {
        let dispatcher = Dispatcher::new(test_config(1, 4, None));
        let started = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        for _ in 0..3 {
            let started = started.clone();
            let release = release.clone();
            dispatcher
                .submit(Box::pin(async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    release.notified().await;
                }))
                .unwrap();
            // 各ジョブがワーカーに渡るのを待つ
            sleep(Duration::from_millis(50)).await;
        }

        // A single core worker could only have started one job.
        assert_eq!(started.load(Ordering::SeqCst), 3);
        assert!(dispatcher.worker_count() >= 3);
        release.notify_waiters();
    }

    #[tokio::test]
    async fn test_bounded_backlog_rejects_when_full() {
        let dispatcher = Dispatcher::new(test_config(1, 1, Some(1)));
        let release = Arc::new(Notify::new());

        // Occupy the only worker.
        let blocker = release.clone();
        dispatcher
            .submit(Box::pin(async move {
                blocker.notified().await;
            }))
            .unwrap();
        sleep(Duration::from_millis(50)).await;

        // One job fits in the backlog, the next is rejected.
        dispatcher.submit(Box::pin(async {})).unwrap();
        let result = dispatcher.submit(Box::pin(async {}));
        assert!(matches!(result, Err(ChannelError::Congested)));

        release.notify_waiters();
    }

    #[tokio::test]
    async fn test_concurrent_submits_never_exceed_max_workers() {
        let dispatcher = Arc::new(Dispatcher::new(test_config(1, 2, None)));
        let release = Arc::new(Notify::new());

        // 複数タスクから同時に submit を浴びせる
        let mut handles = vec![];
        for _ in 0..8 {
            let dispatcher = dispatcher.clone();
            let release = release.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..5 {
                    let release = release.clone();
                    dispatcher
                        .submit(Box::pin(async move {
                            release.notified().await;
                        }))
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        sleep(Duration::from_millis(50)).await;

        assert!(dispatcher.worker_count() <= 2);
        release.notify_waiters();
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let dispatcher = Dispatcher::new(test_config(1, 2, None));
        dispatcher.shutdown();
        let result = dispatcher.submit(Box::pin(async {}));
        assert!(matches!(result, Err(ChannelError::ChannelDestroyed)));
    }

    #[tokio::test]
    async fn test_spare_workers_retire_after_keep_alive() {
        let dispatcher = Dispatcher::new(test_config(1, 4, None));
        let release = Arc::new(Notify::new());

        for _ in 0..3 {
            let release = release.clone();
            dispatcher
                .submit(Box::pin(async move {
                    release.notified().await;
                }))
                .unwrap();
            sleep(Duration::from_millis(20)).await;
        }
        release.notify_waiters();

        // keep_alive is 200ms in the test config.
        sleep(Duration::from_millis(600)).await;
        assert_eq!(dispatcher.worker_count(), 1);
    }
}
