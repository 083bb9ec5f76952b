use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Returns the values of all specified keys. Keys that are missing or do not hold a string come
/// back as `nil`.
#[derive(Debug, PartialEq)]
pub struct Mget {
    pub keys: Vec<String>,
}

impl Executable for Mget {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let store = node.store.lock();
        let values = self
            .keys
            .iter()
            .map(|key| store.get(&session.db, key).map_or(Frame::Null, Frame::Bulk))
            .collect::<Vec<_>>();

        Ok(Frame::Array(values))
    }
}

impl TryFrom<&mut CommandParser> for Mget {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let keys = parser.remaining_strings()?;

        Ok(Self { keys })
    }
}
