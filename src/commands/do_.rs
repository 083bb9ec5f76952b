use bytes::Bytes;
use tracing::{debug, warn};

use crate::codec::Request;
use crate::commands::executable::Executable;
use crate::commands::{lookup, Command, CommandParser};
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::replication::Change;
use crate::server::Node;
use crate::store::StoreError;
use crate::Error;

/// Applies one change forwarded by the master.
///
/// A versioned change must carry exactly the version following the current one. Anything that
/// goes wrong inside the replayed command is logged and acknowledged so that one bad change does
/// not stop the stream.
#[derive(Debug, PartialEq)]
pub struct Do {
    pub envelope: Bytes,
}

impl Executable for Do {
    fn exec(self, node: &Node, _session: &mut Session) -> Result<Frame, Error> {
        let Change {
            db,
            command,
            args,
            version,
        } = Change::decode(&self.envelope)?;

        if let Some(expected) = version {
            let actual = node.store.lock().version();
            if expected != actual + 1 {
                return Err(StoreError::VersionMismatch { expected, actual }.into());
            }
        }

        if !lookup(&command).map_or(false, |spec| spec.is_replayable()) {
            warn!(command, "ignoring command that cannot be replayed");
            return Ok(Frame::ok());
        }

        debug!(db, command, ?version, "replaying change");
        let mut session = Session::replaying(db);
        let reply = Command::try_from(Request::new(command.clone(), args))
            .and_then(|cmd| cmd.exec(node, &mut session));

        match reply {
            Ok(Frame::Error(message)) => warn!(command, message, "replayed command failed"),
            Err(err) => warn!(command, %err, "replayed command failed"),
            Ok(_) => {}
        }

        Ok(Frame::ok())
    }
}

impl TryFrom<&mut CommandParser> for Do {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let envelope = parser.next_bytes()?;
        Ok(Self { envelope })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::snapshot::FormatError;
    use std::sync::Arc;

    fn replica() -> Arc<Node> {
        Node::new(Config::default())
    }

    fn envelope(db: &str, command: &str, args: &[&'static str], version: Option<u64>) -> Command {
        let change = Change {
            db: db.to_string(),
            command: command.to_string(),
            args: args.iter().map(|arg| Bytes::from(*arg)).collect(),
            version,
        };
        Command::try_from(Request::new("DO", vec![change.encode().unwrap()])).unwrap()
    }

    #[tokio::test]
    async fn applies_next_version() {
        let node = replica();
        let mut session = Session::new(true);

        let reply = envelope("2", "set", &["k", "v"], Some(1))
            .exec(&node, &mut session)
            .unwrap();
        assert_eq!(reply, Frame::ok());

        let reply = envelope("2", "lpush", &["l", "x"], Some(2))
            .exec(&node, &mut session)
            .unwrap();
        assert_eq!(reply, Frame::ok());

        let store = node.store.lock();
        assert_eq!(store.version(), 2);
        assert_eq!(store.get("2", "k"), Some(Bytes::from("v")));
        assert_eq!(store.llen("2", "l"), Ok(1));
        // The connection that delivered the change keeps its own database.
        assert_eq!(session.db, "0");
    }

    #[tokio::test]
    async fn version_gap() {
        let node = replica();
        let mut session = Session::new(true);

        let err = envelope("0", "set", &["k", "v"], Some(3))
            .exec(&node, &mut session)
            .unwrap_err();

        assert_eq!(
            *err.downcast_ref::<StoreError>().unwrap(),
            StoreError::VersionMismatch {
                expected: 3,
                actual: 0
            }
        );
        assert_eq!(err.to_string(), "version mismatch");
        assert!(!node.store.lock().exists("0", "k"));
    }

    #[tokio::test]
    async fn replayed_select_bumps_version() {
        let node = replica();
        let mut session = Session::new(true);

        envelope("0", "select", &["5"], Some(1))
            .exec(&node, &mut session)
            .unwrap();

        assert_eq!(node.store.lock().version(), 1);
        assert_eq!(session.db, "0");
    }

    #[tokio::test]
    async fn failures_are_acknowledged() {
        let node = replica();
        let mut session = Session::new(true);
        node.store
            .lock()
            .set("0", "k".to_string(), Bytes::from("v"));
        let version = node.store.lock().version();

        let reply = envelope("0", "lpush", &["k", "x"], Some(version + 1))
            .exec(&node, &mut session)
            .unwrap();
        assert_eq!(reply, Frame::ok());

        let reply = envelope("0", "get", &["k"], None)
            .exec(&node, &mut session)
            .unwrap();
        assert_eq!(reply, Frame::ok());

        let store = node.store.lock();
        assert_eq!(store.version(), version);
        assert_eq!(store.get("0", "k"), Some(Bytes::from("v")));
    }

    #[tokio::test]
    async fn malformed_envelope() {
        let node = replica();
        let mut session = Session::new(true);

        let cmd = Command::try_from(Request::new("DO", vec![Bytes::from("junk")])).unwrap();
        let err = cmd.exec(&node, &mut session).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<FormatError>(),
            Some(FormatError::InvalidMagic)
        ));
    }

    #[tokio::test]
    async fn argument_count_beyond_envelope() {
        use crate::snapshot::{put_blob, put_bytes};
        use bytes::BufMut;

        let node = replica();
        let mut session = Session::new(true);

        let mut payload = Vec::new();
        payload.put_i64_le(-1);
        put_bytes(&mut payload, b"0").unwrap();
        put_bytes(&mut payload, b"set").unwrap();
        payload.put_u32_le(u32::MAX);
        let mut envelope = b"RKVD\x01".to_vec();
        put_blob(&mut envelope, &payload).unwrap();

        let cmd = Command::try_from(Request::new("DO", vec![Bytes::from(envelope)])).unwrap();
        let err = cmd.exec(&node, &mut session).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<FormatError>(),
            Some(FormatError::InvalidData(_))
        ));
        assert_eq!(node.store.lock().version(), 0);
    }
}
