use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Removes occurrences of `value` from the list and replies with how many were removed. A positive
/// `count` removes the first `count` matches, a negative one the last `-count` matches and zero
/// removes them all.
#[derive(Debug, PartialEq)]
pub struct LRem {
    pub key: String,
    pub count: i64,
    pub value: Bytes,
}

impl Executable for LRem {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let removed = node
            .store
            .lock()
            .lrem(&session.db, self.key, self.count, self.value)?;

        Ok(Frame::Integer(removed as i64))
    }
}

impl TryFrom<&mut CommandParser> for LRem {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let count = parser.next_integer()?;
        let value = parser.next_bytes()?;

        Ok(Self { key, count, value })
    }
}
