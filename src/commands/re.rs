use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Like KEYS, with a regular expression anchored at the start of each name.
#[derive(Debug, PartialEq)]
pub struct Re {
    pub pattern: String,
}

impl Executable for Re {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let names = node.store.lock().re(&session.db, &self.pattern)?;
        Ok(Frame::Bulk(Bytes::from(names)))
    }
}

impl TryFrom<&mut CommandParser> for Re {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let pattern = parser.next_string()?;
        Ok(Self { pattern })
    }
}
