use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Moves `member` from the set at `source` to the set at `destination`. Replies `:1` when the
/// member was moved and `:0` when `source` did not contain it.
#[derive(Debug, PartialEq)]
pub struct SMove {
    pub source: String,
    pub destination: String,
    pub member: Bytes,
}

impl Executable for SMove {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let moved =
            node.store
                .lock()
                .smove(&session.db, self.source, self.destination, self.member)?;

        Ok(Frame::Integer(moved as i64))
    }
}

impl TryFrom<&mut CommandParser> for SMove {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let source = parser.next_string()?;
        let destination = parser.next_string()?;
        let member = parser.next_bytes()?;

        Ok(Self {
            source,
            destination,
            member,
        })
    }
}
