use tracing::info;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Stops the node: no new connections or writes are accepted, open connections close after
/// their current command and the store is saved one last time. Replicas follow their master.
#[derive(Debug, PartialEq)]
pub struct Shutdown;

impl Executable for Shutdown {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        info!("shutdown requested");
        node.store.lock().journal_unversioned(&session.db, "shutdown");
        node.halt();
        session.close_requested = true;

        Ok(Frame::ok())
    }
}

impl TryFrom<&mut CommandParser> for Shutdown {
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

    #[tokio::test]
    async fn halts_node() {
        let node = Node::authority();
        let mut session = Session::new(true);

        let cmd = Command::try_from(Request::new("SHUTDOWN", vec![])).unwrap();
        assert_eq!(cmd.exec(&node, &mut session).unwrap(), Frame::ok());

        assert!(node.is_halting());
        assert!(session.close_requested);
    }
}
