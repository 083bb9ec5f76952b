use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Delete all the keys of every database.
#[derive(Debug, PartialEq)]
pub struct FlushAll;

impl Executable for FlushAll {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        node.store.lock().flush_all(&session.db);
        Ok(Frame::ok())
    }
}

impl TryFrom<&mut CommandParser> for FlushAll {
    type Error = Error;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}
