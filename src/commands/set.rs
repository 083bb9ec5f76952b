use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Set `key` to hold the string `value`, replacing whatever it held and dropping its TTL.
#[derive(Debug, PartialEq)]
pub struct Set {
    pub key: String,
    pub value: Bytes,
}

impl Executable for Set {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        node.store.lock().set(&session.db, self.key, self.value);

        Ok(Frame::ok())
    }
}

impl TryFrom<&mut CommandParser> for Set {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let value = parser.next_bytes()?;

        Ok(Self { key, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Request;
    use crate::commands::{Command, CommandParserError};
    use crate::store::ValueType;

    #[tokio::test]
    async fn replaces_any_value() {
        let node = Node::authority();
        let mut session = Session::new(true);
        node.store
            .lock()
            .push("0", "key1".to_string(), Bytes::from("a"), crate::store::End::Tail)
            .unwrap();

        let request = Request::new("SET", vec![Bytes::from("key1"), Bytes::from("value")]);
        let cmd = Command::try_from(request).unwrap();
        let res = cmd.exec(&node, &mut session).unwrap();

        assert_eq!(res, Frame::ok());
        let store = node.store.lock();
        assert_eq!(store.value_type("0", "key1"), ValueType::String);
        assert_eq!(store.get("0", "key1"), Some(Bytes::from("value")));
    }

    #[test]
    fn missing_value() {
        let err = Command::try_from(Request::new("SET", vec![Bytes::from("key1")])).unwrap_err();
        let err = err.downcast_ref::<CommandParserError>().unwrap();

        assert_eq!(*err, CommandParserError::EndOfStream);
    }
}
