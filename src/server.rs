use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::config::Config;
use crate::connection::Connection;
use crate::dispatch::{dispatch, Session};
use crate::frame::Frame;
use crate::replication::Replication;
use crate::seed;
use crate::snapshot::FormatError;
use crate::store::Store;
use crate::Error;

/// State shared by every connection of the node.
pub struct Node {
    pub config: Config,
    pub store: Store,
    pub replication: Replication,
    coordinator: Mutex<Option<JoinHandle<()>>>,
    saver: Notify,
    save_pending: AtomicBool,
    saving: AtomicBool,
    halting: watch::Sender<bool>,
    started_at: Instant,
    current_connections: AtomicUsize,
    total_connections: AtomicU64,
}

impl Node {
    /// Creates the node with an empty store and starts its replication coordinator. Needs a tokio
    /// runtime.
    pub fn new(config: Config) -> Arc<Node> {
        let store = Store::new(config.authority);
        let (replication, coordinator) = Replication::start(store.clone(), config.reply_timeout);
        let (halting, _) = watch::channel(false);

        Arc::new(Node {
            config,
            store,
            replication,
            coordinator: Mutex::new(Some(coordinator)),
            saver: Notify::new(),
            save_pending: AtomicBool::new(false),
            saving: AtomicBool::new(false),
            halting,
            started_at: Instant::now(),
            current_connections: AtomicUsize::new(0),
            total_connections: AtomicU64::new(0),
        })
    }

    /// An authority node saving to a file of its own in the temp directory.
    #[cfg(test)]
    pub(crate) fn authority() -> Arc<Node> {
        let dump_file =
            std::env::temp_dir().join(format!("replikv-{}.db", uuid::Uuid::new_v4()));

        Node::new(Config {
            authority: true,
            dump_file,
            ..Config::default()
        })
    }

    /// Wakes the saver task. Requests made while a save is pending are merged.
    pub fn request_save(&self) {
        self.save_pending.store(true, Ordering::Relaxed);
        self.saver.notify_one();
    }

    pub fn save_requested(&self) -> bool {
        self.save_pending.load(Ordering::Relaxed)
    }

    /// Writes the snapshot file now.
    pub fn save(&self) -> Result<(), FormatError> {
        self.saving.store(true, Ordering::Relaxed);
        let result = self.store.save(&self.config.dump_file);
        self.saving.store(false, Ordering::Relaxed);
        result
    }

    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::Relaxed) || self.save_requested()
    }

    /// Stops accepting connections and writes. Open connections close after their next command.
    pub fn halt(&self) {
        self.halting.send_replace(true);
    }

    pub fn is_halting(&self) -> bool {
        *self.halting.borrow()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn current_connections(&self) -> usize {
        self.current_connections.load(Ordering::Relaxed)
    }

    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    /// Loads the snapshot file when there is one, otherwise the bootstrap file when there is one.
    /// A freshly initialized store is saved right away.
    pub fn recover(&self) -> Result<(), Error> {
        let dump_file = &self.config.dump_file;
        let init_file = &self.config.init_file;

        if dump_file.is_file() {
            info!(path = %dump_file.display(), "loading database from dump file");
            self.store.load(dump_file)?;
            self.store.lock().mark_saved(0);
            return Ok(());
        }

        if init_file.is_file() {
            info!(path = %init_file.display(), "loading database from init file");
            let entries = seed::load(init_file)?;
            self.store.lock().load_seed(entries);
        } else {
            info!("created empty database");
        }

        self.save()?;
        Ok(())
    }

    async fn run_saver(self: Arc<Self>) {
        loop {
            self.saver.notified().await;
            if !self.save_pending.swap(false, Ordering::Relaxed) {
                continue;
            }
            if let Err(err) = self.save() {
                error!(path = %self.config.dump_file.display(), %err, "cannot save database");
            }
        }
    }
}

/// Serves `config` until SHUTDOWN is received.
pub async fn run(config: Config) -> Result<(), Error> {
    let listener = TcpListener::bind(&config.listen).await?;
    serve(listener, config).await
}

/// Serves on an already bound listener. Tests bind to port 0 and read the address back.
pub async fn serve(listener: TcpListener, config: Config) -> Result<(), Error> {
    let node = Node::new(config);
    node.recover()?;

    let role = if node.config.authority { "master" } else { "slave" };
    info!(address = %listener.local_addr()?, role, "server listening");

    let saver = tokio::spawn(node.clone().run_saver());
    let mut halting = node.halting.subscribe();

    // The grace period ends connections that are still open after SHUTDOWN.
    let (closed, _) = watch::channel(false);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, client_address) = match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        warn!(%err, "cannot accept connection");
                        continue;
                    }
                };
                if node.is_halting() {
                    continue;
                }

                node.total_connections.fetch_add(1, Ordering::Relaxed);
                node.current_connections.fetch_add(1, Ordering::Relaxed);
                debug!(?client_address, "accepted connection");

                let node = node.clone();
                let closed = closed.subscribe();
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(socket, client_address, &node, closed).await {
                        error!(%err, "connection failed");
                    }
                    node.current_connections.fetch_sub(1, Ordering::Relaxed);
                });
            }
            _ = halting.changed() => {
                if node.is_halting() {
                    break;
                }
            }
        }
    }
    drop(listener);

    info!(grace = ?node.config.shutdown_grace, "shutting down");
    let deadline = Instant::now() + node.config.shutdown_grace;
    while node.current_connections() > 0 && Instant::now() < deadline {
        time::sleep(Duration::from_millis(50)).await;
    }
    closed.send_replace(true);

    saver.abort();
    if let Err(err) = node.save() {
        error!(%err, "cannot save database");
    }

    node.replication.shutdown();
    let coordinator = node
        .coordinator
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(coordinator) = coordinator {
        let _ = coordinator.await;
    }

    info!("server stopped");
    Ok(())
}

#[instrument(
    name = "connection",
    skip(stream, node, closed),
    fields(connection_id, client_address)
)]
async fn handle_connection(
    stream: TcpStream,
    client_address: SocketAddr,
    node: &Node,
    mut closed: watch::Receiver<bool>,
) -> Result<(), Error> {
    let mut conn = Connection::new(stream, client_address, node.config.max_request_size);
    let mut session = Session::new(node.config.auth.is_none());

    tracing::Span::current()
        .record("connection_id", conn.id.to_string())
        .record("client_address", client_address.to_string());

    loop {
        let request = tokio::select! {
            request = conn.read_request() => request?,
            _ = closed.changed() => {
                debug!("closing connection after shutdown grace period");
                break;
            }
        };

        let frame = match request {
            Some(Ok(request)) => dispatch(node, &mut session, request).await,
            Some(Err(err)) => Frame::error(err.to_string()),
            None => break,
        };
        debug!(reply = %frame, "sending reply");
        conn.write_frame(frame).await?;

        if session.close_requested {
            break;
        }
    }

    debug!("connection closed");
    Ok(())
}
