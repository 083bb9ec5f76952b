use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Returns the items of the list between `start` and `end`, both inclusive. Negative indexes count
/// from the tail, `-1` being the last item.
#[derive(Debug, PartialEq)]
pub struct LRange {
    pub key: String,
    pub start: i64,
    pub end: i64,
}

impl Executable for LRange {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let items = node
            .store
            .lock()
            .lrange(&session.db, &self.key, self.start, self.end)?;

        Ok(Frame::bulk_array(items))
    }
}

impl TryFrom<&mut CommandParser> for LRange {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let start = parser.next_integer()?;
        let end = parser.next_integer()?;

        Ok(Self { key, start, end })
    }
}
