use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Removes and returns a random member of the set, or `nil` when the set is empty or missing.
#[derive(Debug, PartialEq)]
pub struct SPop {
    pub key: String,
}

impl Executable for SPop {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let member = node.store.lock().spop(&session.db, self.key)?;
        Ok(member.map_or(Frame::Null, Frame::Bulk))
    }
}

impl TryFrom<&mut CommandParser> for SPop {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        Ok(Self { key })
    }
}
