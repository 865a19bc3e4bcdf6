//! Background storage access. All broker I/O runs on one dedicated worker
//! thread; callers await the reply on their own task, so results always come
//! back to the driving task before any shared state is touched. There is no
//! cancellation and no timeout: a slow read only delays its own caller.

use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use tokio::sync::oneshot;

pub mod broker;

pub use broker::{DocHandle, DocumentMeta, FsBroker, StorageBroker, CSV_MIME, RECORDS_FOLDER};

type BrokerTask = Box<dyn FnOnce(&mut dyn StorageBroker) + Send + 'static>;

enum BrokerCommand {
    Execute(BrokerTask),
    Shutdown,
}

struct StorageInner {
    sender: mpsc::Sender<BrokerCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for StorageInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(BrokerCommand::Shutdown) {
                error!("Failed to send shutdown to storage thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join storage thread: {join_err:?}");
            }
        }
    }
}

#[derive(Clone)]
pub struct Storage {
    inner: Arc<StorageInner>,
}

impl Storage {
    pub fn new<B>(mut broker: B) -> Result<Self>
    where
        B: StorageBroker + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel::<BrokerCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("score-storage".into())
            .spawn(move || {
                let init_result = broker.open().context("failed to open storage broker");
                if ready_tx.send(init_result).is_err() {
                    error!("Storage initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        BrokerCommand::Execute(task) => {
                            task(&mut broker);
                        }
                        BrokerCommand::Shutdown => break,
                    }
                }

                info!("Storage thread shutting down");
            })
            .with_context(|| "failed to spawn storage worker thread")?;

        ready_rx
            .recv()
            .context("storage worker exited before signaling readiness")??;

        Ok(Self {
            inner: Arc::new(StorageInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
        })
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut dyn StorageBroker) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = BrokerCommand::Execute(Box::new(move |broker| {
            let result = task(broker);
            if reply_tx.send(result).is_err() {
                error!("Storage caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to storage thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("storage thread terminated unexpectedly"))?
    }

    pub async fn create_document(&self, name: String, mime: &'static str) -> Result<DocHandle> {
        self.execute(move |broker| broker.create(&name, mime)).await
    }

    pub async fn write_document(&self, handle: DocHandle, content: String) -> Result<()> {
        self.execute(move |broker| broker.write(&handle, &content))
            .await
    }

    pub async fn read_document(&self, handle: DocHandle) -> Result<String> {
        self.execute(move |broker| broker.read(&handle)).await
    }

    pub async fn first_line(&self, handle: DocHandle) -> Result<Option<String>> {
        self.execute(move |broker| broker.first_line(&handle)).await
    }

    pub async fn query_documents(&self) -> Result<Vec<DocumentMeta>> {
        self.execute(|broker| broker.query()).await
    }

    pub async fn delete_document(&self, handle: DocHandle) -> Result<bool> {
        self.execute(move |broker| broker.delete(&handle)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_through_the_worker_thread() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(FsBroker::new(dir.path().join(RECORDS_FOLDER))).unwrap();

        let handle = storage
            .create_document("t.csv".into(), CSV_MIME)
            .await
            .unwrap();
        storage
            .write_document(handle.clone(), "a,b\n1,2\n".into())
            .await
            .unwrap();

        assert_eq!(storage.read_document(handle.clone()).await.unwrap(), "a,b\n1,2\n");
        assert_eq!(storage.query_documents().await.unwrap().len(), 1);
        assert!(storage.delete_document(handle).await.unwrap());
        assert!(storage.query_documents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn errors_come_back_to_the_caller() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(FsBroker::new(dir.path().join(RECORDS_FOLDER))).unwrap();

        let missing = DocHandle::new("missing.csv");
        assert!(storage.read_document(missing).await.is_err());
    }
}
