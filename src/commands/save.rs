use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Writes the snapshot file before replying. Replicas save when they receive it too.
#[derive(Debug, PartialEq)]
pub struct Save;

impl Executable for Save {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        node.save()?;
        node.store.lock().journal_unversioned(&session.db, "save");

        Ok(Frame::ok())
    }
}

impl TryFrom<&mut CommandParser> for Save {
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
    use crate::store::Store;
    use bytes::Bytes;

    #[tokio::test]
    async fn writes_dump_file() {
        let node = Node::authority();
        let mut session = Session::new(true);
        node.store
            .lock()
            .set("0", "a".to_string(), Bytes::from("1"));

        let cmd = Command::try_from(Request::new("SAVE", vec![])).unwrap();
        assert_eq!(cmd.exec(&node, &mut session).unwrap(), Frame::ok());

        assert_eq!(node.store.lock().changes_since_save(), 0);
        assert!(node.store.lock().last_save() > 0);

        let restored = Store::new(false);
        restored.load(&node.config.dump_file).unwrap();
        assert_eq!(restored.lock().get("0", "a"), Some(Bytes::from("1")));
    }
}
