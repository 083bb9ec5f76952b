use bytes::Bytes;
use tracing::info;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Sent by a master to a replica it attaches: replaces every database and expiry with the
/// snapshot in `data` and adopts the version the snapshot was taken at.
#[derive(Debug, PartialEq)]
pub struct ReplaceDb {
    pub version: u64,
    pub data: Bytes,
}

impl Executable for ReplaceDb {
    fn exec(self, node: &Node, _session: &mut Session) -> Result<Frame, Error> {
        node.store.lock().replace(self.version, &self.data)?;
        info!(version = self.version, "database replaced by master");

        Ok(Frame::ok())
    }
}

impl TryFrom<&mut CommandParser> for ReplaceDb {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let version = parser.next_string()?;
        let version = version
            .parse::<u64>()
            .map_err(|_| CommandParserError::InvalidInteger(version))?;
        let data = parser.next_bytes()?;

        Ok(Self { version, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Request;
    use crate::commands::Command;
    use crate::config::Config;
    use crate::store::{Store, StoreError};

    #[tokio::test]
    async fn replaces_store_and_version() {
        let source = Store::new(true);
        {
            let mut store = source.lock();
            store.set("0", "a".to_string(), Bytes::from("1"));
            store.sadd("2", "s".to_string(), Bytes::from("x")).unwrap();
        }
        let (version, data) = source.lock().dump().unwrap();

        let node = Node::new(Config::default());
        let mut session = Session::new(true);
        node.store
            .lock()
            .set("0", "stale".to_string(), Bytes::from("old"));

        let cmd = Command::try_from(Request::new(
            "REPLACEDB",
            vec![Bytes::from(version.to_string()), data.clone()],
        ))
        .unwrap();
        assert_eq!(cmd, Command::ReplaceDb(ReplaceDb { version: 2, data }));
        assert_eq!(cmd.exec(&node, &mut session).unwrap(), Frame::ok());

        let store = node.store.lock();
        assert_eq!(store.version(), 2);
        assert_eq!(store.get("0", "a"), Some(Bytes::from("1")));
        assert!(!store.exists("0", "stale"));
        assert_eq!(store.scard("2", "s"), Ok(1));
    }

    #[tokio::test]
    async fn rejects_garbage() {
        let node = Node::new(Config::default());
        let mut session = Session::new(true);

        let cmd = Command::try_from(Request::new(
            "REPLACEDB",
            vec![Bytes::from("1"), Bytes::from("garbage")],
        ))
        .unwrap();
        let err = cmd.exec(&node, &mut session).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Snapshot(_))
        ));
        assert_eq!(node.store.lock().version(), 0);
    }

    #[test]
    fn version_must_be_a_number() {
        let err = Command::try_from(Request::new(
            "REPLACEDB",
            vec![Bytes::from("-1"), Bytes::from("data")],
        ))
        .unwrap_err();

        assert_eq!(
            *err.downcast_ref::<CommandParserError>().unwrap(),
            CommandParserError::InvalidInteger("-1".to_string())
        );
    }
}
