use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Selects the database that the following commands of the connection work on, creating it when
/// needed. New connections always use the database `0`.
///
/// On the authority, and when replayed on a replica, selecting counts as a change so that versions
/// stay aligned. A client selecting a database on a replica changes nothing.
#[derive(Debug, PartialEq)]
pub struct Select {
    /// Databases are named; numeric names are only a convention.
    pub db: String,
}

impl Executable for Select {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        {
            let mut store = node.store.lock();
            if store.is_authority() || session.replaying {
                store.select(&self.db);
            } else {
                store.ensure_db(&self.db);
            }
        }
        session.db = self.db;

        Ok(Frame::ok())
    }
}

impl TryFrom<&mut CommandParser> for Select {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let db = parser.next_string()?;
        Ok(Self { db })
    }
}
