use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Renames `key` to `new_key` only when `new_key` does not exist yet. Replies `:1` when the key was
/// renamed and `:0` when `new_key` was taken.
#[derive(Debug, PartialEq)]
pub struct RenameNx {
    pub key: String,
    pub new_key: String,
}

impl Executable for RenameNx {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let renamed = node
            .store
            .lock()
            .renamenx(&session.db, self.key, self.new_key)?;

        Ok(Frame::Integer(renamed as i64))
    }
}

impl TryFrom<&mut CommandParser> for RenameNx {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let new_key = parser.next_string()?;

        Ok(Self { key, new_key })
    }
}
