use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Returns the number of members of the set at `key`, 0 when it does not exist.
#[derive(Debug, PartialEq)]
pub struct SCard {
    pub key: String,
}

impl Executable for SCard {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let len = node.store.lock().scard(&session.db, &self.key)?;
        Ok(Frame::Integer(len as i64))
    }
}

impl TryFrom<&mut CommandParser> for SCard {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        Ok(Self { key })
    }
}
