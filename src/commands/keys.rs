use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Names matching a glob pattern, sorted and returned as one space separated bulk string.
#[derive(Debug, PartialEq)]
pub struct Keys {
    pub pattern: String,
}

impl Executable for Keys {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let names = node.store.lock().keys(&session.db, &self.pattern);
        Ok(Frame::Bulk(Bytes::from(names)))
    }
}

impl TryFrom<&mut CommandParser> for Keys {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let pattern = parser.next_string()?;
        Ok(Self { pattern })
    }
}

#[cfg(test)]
mod tests {
    use crate::codec::Request;
    use crate::commands::{Command, CommandParserError};

    use super::*;

    #[tokio::test]
    async fn with_wildcard_pattern() {
        let cmd = Command::try_from(Request::new("KEYS", vec![Bytes::from("user:*")])).unwrap();
        assert_eq!(
            cmd,
            Command::Keys(Keys {
                pattern: String::from("user:*")
            })
        );

        let node = Node::authority();
        let mut session = Session::new(true);
        {
            let mut store = node.store.lock();
            for key in ["user:2", "user:1", "group:1"] {
                store.set("0", key.to_string(), Bytes::from("x"));
            }
        }

        let res = cmd.exec(&node, &mut session).unwrap();

        assert_eq!(res, Frame::Bulk(Bytes::from("user:1 user:2")));
    }

    #[tokio::test]
    async fn no_match() {
        let node = Node::authority();
        let mut session = Session::new(true);
        let cmd = Command::try_from(Request::new("KEYS", vec![Bytes::from("*")])).unwrap();

        assert_eq!(
            cmd.exec(&node, &mut session).unwrap(),
            Frame::Bulk(Bytes::new())
        );
    }

    #[test]
    fn missing_pattern() {
        let err = Command::try_from(Request::new("KEYS", vec![])).unwrap_err();
        let err = err.downcast_ref::<CommandParserError>().unwrap();

        assert_eq!(*err, CommandParserError::EndOfStream);
    }
}
