use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Adds `member` to the set at `key`, creating the set when needed. Replies `:1` when the member is
/// new and `:0` when it was already there.
#[derive(Debug, PartialEq)]
pub struct SAdd {
    pub key: String,
    pub member: Bytes,
}

impl Executable for SAdd {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let added = node.store.lock().sadd(&session.db, self.key, self.member)?;
        Ok(Frame::Integer(added as i64))
    }
}

impl TryFrom<&mut CommandParser> for SAdd {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let member = parser.next_bytes()?;

        Ok(Self { key, member })
    }
}
