use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

/// Several CLI invocations may share one file; writers wait this long for
/// a competing lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

fn open_connection(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open SQLite database {}", path.display()))?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("failed to set SQLite busy timeout")?;

    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        warn!("Failed to enable WAL mode, continuing with the default journal: {err}");
    }
    // Interruptions cascade with their session.
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign keys")?;

    run_migrations(&mut conn).context("failed to run database migrations")?;
    Ok(conn)
}

/// Runs queued tasks until every sender is gone.
fn serve(mut conn: Connection, tasks: mpsc::Receiver<DbTask>) {
    let mut served = 0u64;
    for task in tasks {
        task(&mut conn);
        served += 1;
    }
    debug!("Database worker served {served} tasks");
}

struct DatabaseInner {
    sender: Option<mpsc::Sender<DbTask>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        drop(self.sender.take());

        let handle = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if let Err(join_err) = handle.join() {
                error!("Database worker panicked: {join_err:?}");
            }
        }
        info!("Database worker stopped");
    }
}

/// Durable session store. A single worker thread owns the SQLite
/// connection; every query runs there, one at a time, in submission order.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (task_tx, task_rx) = mpsc::channel::<DbTask>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("focuslog-db".into())
            .spawn(move || match open_connection(&path_for_thread) {
                Ok(conn) => {
                    if ready_tx.send(Ok(())).is_ok() {
                        serve(conn, task_rx);
                    }
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })
            .context("failed to spawn database worker thread")?;

        let ready = ready_rx
            .recv()
            .context("database worker exited before signaling readiness")?;
        if let Err(err) = ready {
            if worker.join().is_err() {
                error!("Database worker panicked during initialization");
            }
            return Err(err);
        }

        info!("Database initialized at {}", db_path.display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: Some(task_tx),
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    /// Queues `task` on the worker thread and waits for its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self
            .inner
            .sender
            .as_ref()
            .ok_or_else(|| anyhow!("database worker has been shut down"))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let queued: DbTask = Box::new(move |conn| {
            if reply_tx.send(task(conn)).is_err() {
                debug!("Database caller went away before its result arrived");
            }
        });

        sender
            .send(queued)
            .map_err(|_| anyhow!("database worker is no longer accepting tasks"))?;
        reply_rx
            .await
            .map_err(|_| anyhow!("database worker stopped before replying"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_file_and_runs_queries_on_worker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("focuslog.sqlite3");
        let db = Database::new(path.clone()).unwrap();

        assert_eq!(db.path(), path.as_path());
        assert!(path.exists());

        let version: i32 = db
            .execute(|conn| {
                Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(version, super::super::migrations::CURRENT_SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn task_errors_reach_the_caller() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("db.sqlite3")).unwrap();

        let result: Result<()> = db
            .execute(|conn| {
                conn.execute("SELECT * FROM no_such_table", [])?;
                Ok(())
            })
            .await;
        assert!(result.is_err());

        // The worker survives a failed task.
        let one: i64 = db
            .execute(|conn| Ok(conn.query_row("SELECT 1", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(one, 1);
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("fk.sqlite3")).unwrap();

        let result: Result<usize> = db
            .execute(|conn| {
                Ok(conn.execute(
                    "INSERT INTO interruptions (id, session_id, started_at)
                     VALUES ('i1', 'no-such-session', '2024-01-01T00:00:00.000000')",
                    [],
                )?)
            })
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn a_file_that_is_not_sqlite_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "definitely not a database file, just some text to fill a page")
            .unwrap();

        assert!(Database::new(path).is_err());
    }
}
