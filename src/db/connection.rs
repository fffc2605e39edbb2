use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

/// Other station processes may hold the write lock while bumping the shared
/// listener count.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum Message {
    Run(Job),
    Stop,
}

/// Owns the analytics worker thread; stopping it on drop flushes every job
/// queued before the last `Database` clone went away.
struct Worker {
    jobs: mpsc::Sender<Message>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let thread = match self.thread.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(thread) = thread else {
            return;
        };

        if self.jobs.send(Message::Stop).is_err() {
            error!("Analytics store worker already gone at shutdown");
        }
        if let Err(panic) = thread.join() {
            error!("Analytics store worker panicked: {panic:?}");
        }
    }
}

/// Listening analytics store. One thread owns the SQLite connection and runs
/// queued closures in order, which serializes listener-count updates from
/// every session in this process.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create analytics directory {}", parent.display())
            })?;
        }

        let (jobs, inbox) = mpsc::channel::<Message>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let path = db_path.clone();

        let thread = thread::Builder::new()
            .name("soundmaster-db".into())
            .spawn(move || match open_store(&path) {
                Ok(mut conn) => {
                    if ready_tx.send(Ok(())).is_ok() {
                        serve_jobs(&mut conn, inbox);
                    }
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })
            .context("failed to spawn analytics store worker")?;

        ready_rx
            .recv()
            .context("analytics store worker exited during startup")??;

        info!("Analytics store ready at {}", db_path.display());

        Ok(Self {
            worker: Arc::new(Worker {
                jobs,
                thread: Mutex::new(Some(thread)),
            }),
        })
    }

    /// Runs `task` on the store thread and awaits its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let job: Job = Box::new(move |conn| {
            // A dropped receiver means the caller stopped waiting; the write
            // itself already happened.
            let _ = reply_tx.send(task(conn));
        });

        self.worker
            .jobs
            .send(Message::Run(job))
            .map_err(|_| anyhow!("analytics store worker is not running"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("analytics store worker dropped the query"))?
    }
}

fn open_store(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open analytics store {}", path.display()))?;

    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        error!("Analytics store stays in rollback journal mode: {err}");
    }
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("failed to set analytics store busy timeout")?;

    run_migrations(&mut conn).context("failed to migrate analytics store")?;
    Ok(conn)
}

fn serve_jobs(conn: &mut Connection, inbox: mpsc::Receiver<Message>) {
    for message in inbox {
        match message {
            Message::Run(job) => job(conn),
            Message::Stop => break,
        }
    }
    info!("Analytics store worker stopped");
}
