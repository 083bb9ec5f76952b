//! Master to replica propagation.
//!
//! Every change the store accepts while at least one replica is attached is recorded together with
//! the version it produced. A single coordinator task owns the replica links: it ships a full
//! snapshot to a replica when it attaches and then forwards every later change as a DO envelope.
//! A link that fails is dropped; an operator has to attach the replica again.

use bytes::{BufMut, Bytes};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info};

use crate::client::Client;
use crate::snapshot::{self, FormatError};
use crate::store::Store;

const ENVELOPE_MAGIC: &[u8; 4] = b"RKVD";
const ENVELOPE_VERSION: u8 = 1;

/// One recorded change. `version` is `None` for commands replicas apply regardless of their
/// version, such as SAVE.
#[derive(Clone, Debug, PartialEq)]
pub struct Change {
    pub db: String,
    pub command: String,
    pub args: Vec<Bytes>,
    pub version: Option<u64>,
}

impl Change {
    /// Encodes the change as the payload of a DO request.
    ///
    /// ```text
    /// [RKVD magic: 4B][envelope version: 1B]
    /// [len: 4B] { [version: i64, -1 = none][db][command][arg_count: 4B] { [arg] } } [crc32: 4B]
    /// ```
    pub fn encode(&self) -> Result<Bytes, FormatError> {
        let mut payload = Vec::new();
        payload.put_i64_le(self.version.map_or(-1, |version| version as i64));
        snapshot::put_bytes(&mut payload, self.db.as_bytes())?;
        snapshot::put_bytes(&mut payload, self.command.as_bytes())?;
        snapshot::put_len(&mut payload, self.args.len())?;
        for arg in &self.args {
            snapshot::put_bytes(&mut payload, arg)?;
        }

        seal(&payload)
    }

    pub fn decode(src: &[u8]) -> Result<Change, FormatError> {
        let mut rest = src
            .strip_prefix(ENVELOPE_MAGIC)
            .ok_or(FormatError::InvalidMagic)?;
        let buf = &mut rest;
        let format = snapshot::get_u8(buf)?;
        if format != ENVELOPE_VERSION {
            return Err(FormatError::UnsupportedVersion(format));
        }

        let mut payload = snapshot::get_blob(buf)?;
        let payload = &mut payload;
        let version = match snapshot::get_i64(payload)? {
            -1 => None,
            version if version >= 0 => Some(version as u64),
            version => {
                return Err(FormatError::InvalidData(format!(
                    "negative version {version}"
                )))
            }
        };
        let db = snapshot::get_string(payload)?;
        let command = snapshot::get_string(payload)?;
        let count = snapshot::get_count(payload)?;
        let mut args = Vec::with_capacity(snapshot::capped_capacity(count));
        for _ in 0..count {
            args.push(snapshot::get_bytes(payload)?);
        }

        Ok(Change {
            db,
            command,
            args,
            version,
        })
    }
}

fn seal(payload: &[u8]) -> Result<Bytes, FormatError> {
    let mut out = Vec::with_capacity(payload.len() + 13);
    out.put_slice(ENVELOPE_MAGIC);
    out.put_u8(ENVELOPE_VERSION);
    snapshot::put_blob(&mut out, payload)?;
    Ok(Bytes::from(out))
}

enum Control {
    Attach {
        host: String,
        port: u16,
        reply: oneshot::Sender<Result<(), String>>,
    },
    Shutdown,
}

/// Handle to the coordinator task.
#[derive(Clone)]
pub struct Replication {
    control: mpsc::UnboundedSender<Control>,
    links: Arc<AtomicUsize>,
}

impl Replication {
    /// Connects the journal of `store` and spawns the coordinator.
    pub fn start(store: Store, reply_timeout: Duration) -> (Replication, JoinHandle<()>) {
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        store.lock().attach_journal(changes_tx);

        let links = Arc::new(AtomicUsize::new(0));
        let coordinator = Coordinator {
            store,
            links: HashMap::new(),
            link_count: links.clone(),
            reply_timeout,
        };
        let handle = tokio::spawn(coordinator.run(changes_rx, control_rx));

        (
            Replication {
                control: control_tx,
                links,
            },
            handle,
        )
    }

    /// Attaches the replica listening at `host:port`, sending it a full copy of the store.
    pub async fn attach(&self, host: &str, port: u16) -> Result<(), String> {
        let (reply, response) = oneshot::channel();
        let unavailable = || "replication is shutting down".to_string();

        self.control
            .send(Control::Attach {
                host: host.to_string(),
                port,
                reply,
            })
            .map_err(|_| unavailable())?;
        response.await.map_err(|_| unavailable())?
    }

    /// Asks the coordinator to deliver what is still queued and stop.
    pub fn shutdown(&self) {
        let _ = self.control.send(Control::Shutdown);
    }

    pub fn link_count(&self) -> usize {
        self.links.load(Ordering::Relaxed)
    }
}

struct Link {
    client: Client,
    version: u64,
}

struct Coordinator {
    store: Store,
    links: HashMap<(String, u16), Link>,
    link_count: Arc<AtomicUsize>,
    reply_timeout: Duration,
}

impl Coordinator {
    async fn run(
        mut self,
        mut changes: mpsc::UnboundedReceiver<Change>,
        mut control: mpsc::UnboundedReceiver<Control>,
    ) {
        loop {
            tokio::select! {
                biased;

                Some(change) = changes.recv() => self.deliver(change).await,
                message = control.recv() => match message {
                    Some(Control::Attach { host, port, reply }) => {
                        let result = self.attach(host, port).await;
                        let _ = reply.send(result);
                    }
                    Some(Control::Shutdown) | None => break,
                },
            }
        }

        while let Ok(change) = changes.try_recv() {
            self.deliver(change).await;
        }
        debug!("replication coordinator stopped");
    }

    async fn attach(&mut self, host: String, port: u16) -> Result<(), String> {
        let address = (host.clone(), port);

        if let Some(link) = self.links.get_mut(&address) {
            if link.client.ping().await.is_ok() {
                return Ok(());
            }
            info!(host, port, "replica link is dead, attaching again");
            self.links.remove(&address);
        }

        let dump = {
            let mut store = self.store.lock();
            store.set_journal_enabled(true);
            store.dump()
        };
        let (version, data) = match dump {
            Ok(dump) => dump,
            Err(err) => {
                error!(host, port, %err, "cannot encode snapshot for replica");
                self.update_link_count();
                return Err(format!(
                    "Couldn't connect to server at ip '{host}' port '{port}'"
                ));
            }
        };

        let result = async {
            let mut client = Client::connect(&host, port, self.reply_timeout).await?;
            client.replace_db(version, &data).await?;
            Ok::<_, crate::Error>(client)
        }
        .await;

        match result {
            Ok(client) => {
                info!(host, port, version, "replica attached");
                self.links.insert(address, Link { client, version });
                self.update_link_count();
                Ok(())
            }
            Err(err) => {
                error!(host, port, %err, "cannot attach replica");
                self.update_link_count();
                Err(format!(
                    "Couldn't connect to server at ip '{host}' port '{port}'"
                ))
            }
        }
    }

    async fn deliver(&mut self, change: Change) {
        let envelope = match change.encode() {
            Ok(envelope) => envelope,
            Err(err) => {
                error!(command = change.command, %err, "cannot encode change, dropping all links");
                self.links.clear();
                self.update_link_count();
                return;
            }
        };
        let mut failed = Vec::new();

        for (address, link) in self.links.iter_mut() {
            if let Some(version) = change.version {
                // Already contained in the snapshot the replica attached with.
                if version <= link.version {
                    continue;
                }
            }

            match link.client.apply(&envelope).await {
                Ok(()) => {
                    if let Some(version) = change.version {
                        link.version = version;
                    }
                }
                Err(err) => {
                    error!(
                        host = address.0,
                        port = address.1,
                        command = change.command,
                        version = ?change.version,
                        %err,
                        "replica rejected change, dropping link"
                    );
                    failed.push(address.clone());
                }
            }
        }

        for address in failed {
            self.links.remove(&address);
        }
        self.update_link_count();
    }

    fn update_link_count(&self) {
        self.link_count.store(self.links.len(), Ordering::Relaxed);
        if self.links.is_empty() {
            self.store.lock().set_journal_enabled(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trip() {
        let change = Change {
            db: "3".to_string(),
            command: "set".to_string(),
            args: vec![Bytes::from("k"), Bytes::from("v\r\nwith lines")],
            version: Some(42),
        };

        assert_eq!(Change::decode(&change.encode().unwrap()).unwrap(), change);
    }

    #[test]
    fn envelope_without_version() {
        let change = Change {
            db: "0".to_string(),
            command: "save".to_string(),
            args: vec![],
            version: None,
        };

        let decoded = Change::decode(&change.encode().unwrap()).unwrap();

        assert_eq!(decoded.version, None);
    }

    #[test]
    fn envelope_rejects_garbage() {
        assert!(matches!(
            Change::decode(b"not an envelope"),
            Err(FormatError::InvalidMagic)
        ));

        let mut data = Change {
            db: "0".to_string(),
            command: "del".to_string(),
            args: vec![Bytes::from("k")],
            version: Some(1),
        }
        .encode()
        .unwrap()
        .to_vec();
        let last = data.len() - 5;
        data[last] ^= 0x01;

        assert!(matches!(
            Change::decode(&data),
            Err(FormatError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn envelope_rejects_oversized_argument_count() {
        let mut payload = Vec::new();
        payload.put_i64_le(-1);
        snapshot::put_bytes(&mut payload, b"0").unwrap();
        snapshot::put_bytes(&mut payload, b"set").unwrap();
        payload.put_u32_le(u32::MAX);

        let envelope = seal(&payload).unwrap();

        assert!(matches!(
            Change::decode(&envelope),
            Err(FormatError::InvalidData(_))
        ));
    }

    #[tokio::test]
    async fn attach_to_unreachable_replica() {
        let store = Store::new(true);
        let (replication, _handle) = Replication::start(store.clone(), Duration::from_secs(1));

        // Bind and drop a listener to get a port nobody listens on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = replication.attach("127.0.0.1", port).await.unwrap_err();

        assert_eq!(
            err,
            format!("Couldn't connect to server at ip '127.0.0.1' port '{port}'")
        );
        assert_eq!(replication.link_count(), 0);
    }
}
