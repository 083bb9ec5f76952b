use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Trims the list so it only keeps the items between `start` and `end`, both inclusive.
#[derive(Debug, PartialEq)]
pub struct LTrim {
    pub key: String,
    pub start: i64,
    pub end: i64,
}

impl Executable for LTrim {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        node.store
            .lock()
            .ltrim(&session.db, self.key, self.start, self.end)?;

        Ok(Frame::ok())
    }
}

impl TryFrom<&mut CommandParser> for LTrim {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let start = parser.next_integer()?;
        let end = parser.next_integer()?;

        Ok(Self { key, start, end })
    }
}
