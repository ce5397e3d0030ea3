//! Stoppable background tasks.
//!
//! A task receives a shutdown receiver and is expected to `select!` on it
//! alongside its main loop. Stopping (or dropping) the handle signals the
//! receiver and aborts the task, so nothing outlives its owner.

use std::future::Future;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub struct BackgroundTask {
    name: &'static str,
    shutdown: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl BackgroundTask {
    pub fn spawn<F, Fut>(name: &'static str, task: F) -> Self
    where
        F: FnOnce(broadcast::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, rx) = broadcast::channel(1);
        let handle = tokio::spawn(task(rx));
        tracing::debug!(task = name, "background task started");
        Self {
            name,
            shutdown,
            handle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        self.handle.abort();
        tracing::debug!(task = self.name, "background task stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn task_exits_on_shutdown_signal() {
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let task = BackgroundTask::spawn("test", move |mut shutdown| async move {
            let _ = shutdown.recv().await;
            let _ = done_tx.send(());
        });
        let _ = task.shutdown.send(());
        tokio::time::timeout(Duration::from_secs(1), done_rx)
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(task.is_finished());
    }

    #[tokio::test]
    async fn dropping_the_handle_aborts_the_task() {
        let dropped = Arc::new(AtomicBool::new(false));

        struct SetOnDrop(Arc<AtomicBool>);
        impl Drop for SetOnDrop {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let guard = SetOnDrop(dropped.clone());
        let task = BackgroundTask::spawn("test", move |_shutdown| async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(task);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(dropped.load(Ordering::SeqCst));
    }
}
