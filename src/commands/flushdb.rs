use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Delete all the keys of the currently selected database.
#[derive(Debug, PartialEq)]
pub struct FlushDb;

impl Executable for FlushDb {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        node.store.lock().flush(&session.db);
        Ok(Frame::ok())
    }
}

impl TryFrom<&mut CommandParser> for FlushDb {
    type Error = Error;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Request;
    use crate::commands::Command;
    use bytes::Bytes;

    #[tokio::test]
    async fn only_selected_database() {
        let node = Node::authority();
        let mut session = Session::new(true);
        {
            let mut store = node.store.lock();
            store.set("0", "a".to_string(), Bytes::from("1"));
            store.expire("0", "a".to_string(), 100).unwrap();
            store.set("1", "b".to_string(), Bytes::from("2"));
        }

        let cmd = Command::try_from(Request::new("FLUSHDB", vec![])).unwrap();
        assert_eq!(cmd.exec(&node, &mut session).unwrap(), Frame::ok());

        let store = node.store.lock();
        assert_eq!(store.size("0"), 0);
        assert_eq!(store.ttl("0", "a"), -1);
        assert_eq!(store.size("1"), 1);
    }
}
