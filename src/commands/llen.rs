use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Returns the length of the list stored at key.
#[derive(Debug, PartialEq)]
pub struct LLen {
    pub key: String,
}

impl Executable for LLen {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let len = node.store.lock().llen(&session.db, &self.key)?;
        Ok(Frame::Integer(len as i64))
    }
}

impl TryFrom<&mut CommandParser> for LLen {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        Ok(Self { key })
    }
}
