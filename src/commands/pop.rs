use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::store::End;
use crate::Error;

/// LPOP and RPOP: removes and returns the first or last item of the list at `key`, or `nil`.
#[derive(Debug, PartialEq)]
pub struct Pop {
    pub key: String,
    pub end: End,
}

impl Pop {
    pub(crate) fn parse(parser: &mut CommandParser, end: End) -> Result<Self, Error> {
        let key = parser.next_string()?;

        Ok(Self { key, end })
    }
}

impl Executable for Pop {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let item = node.store.lock().pop(&session.db, self.key, self.end)?;

        Ok(item.map_or(Frame::Null, Frame::Bulk))
    }
}
