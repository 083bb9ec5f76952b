use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Returns a random key from the selected database, or `nil` when it is empty.
#[derive(Debug, PartialEq)]
pub struct RandomKey;

impl Executable for RandomKey {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let key = node.store.lock().random_key(&session.db);
        Ok(key.map_or(Frame::Null, |key| Frame::Bulk(Bytes::from(key))))
    }
}

impl TryFrom<&mut CommandParser> for RandomKey {
    type Error = Error;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}
