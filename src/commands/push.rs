use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::store::End;
use crate::Error;

/// LPUSH and RPUSH: adds `value` at the head or the tail of the list at `key`, creating the list
/// when the key does not exist.
#[derive(Debug, PartialEq)]
pub struct Push {
    pub key: String,
    pub value: Bytes,
    pub end: End,
}

impl Push {
    pub(crate) fn parse(parser: &mut CommandParser, end: End) -> Result<Self, Error> {
        let key = parser.next_string()?;
        let value = parser.next_bytes()?;

        Ok(Self { key, value, end })
    }
}

impl Executable for Push {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        node.store
            .lock()
            .push(&session.db, self.key, self.value, self.end)?;

        Ok(Frame::ok())
    }
}
