use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Decrements the number stored at key by decrement.
#[derive(Debug, PartialEq)]
pub struct DecrBy {
    pub key: String,
    pub decrement: i64,
}

impl Executable for DecrBy {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let delta = self
            .decrement
            .checked_neg()
            .ok_or_else(|| CommandParserError::InvalidInteger(self.decrement.to_string()))?;
        let res = node.store.lock().add(&session.db, self.key, delta);

        match res {
            Ok(value) => Ok(Frame::Integer(value)),
            Err(msg) => Ok(Frame::Error(msg.to_string())),
        }
    }
}

impl TryFrom<&mut CommandParser> for DecrBy {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let decrement = parser.next_integer()?;

        Ok(Self { key, decrement })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Request;
    use crate::commands::Command;
    use bytes::Bytes;

    #[tokio::test]
    async fn existing_key() {
        let request = Request::new("DECRBY", vec![Bytes::from("key1"), Bytes::from("5")]);
        let cmd = Command::try_from(request).unwrap();

        assert_eq!(
            cmd,
            Command::DecrBy(DecrBy {
                key: "key1".to_string(),
                decrement: 5,
            })
        );

        let node = Node::authority();
        let mut session = Session::new(true);
        node.store
            .lock()
            .set("0", String::from("key1"), Bytes::from("12"));

        let result = cmd.exec(&node, &mut session).unwrap();

        assert_eq!(result, Frame::Integer(7));
    }

    #[tokio::test]
    async fn unrepresentable_decrement() {
        let node = Node::authority();
        let mut session = Session::new(true);
        let cmd = Command::DecrBy(DecrBy {
            key: "key1".to_string(),
            decrement: i64::MIN,
        });

        assert!(cmd.exec(&node, &mut session).is_err());
        assert_eq!(node.store.lock().version(), 0);
    }
}
