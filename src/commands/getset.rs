use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Atomically sets `key` to `value` and returns the string it held before, or `nil`.
#[derive(Debug, PartialEq)]
pub struct GetSet {
    pub key: String,
    pub value: Bytes,
}

impl Executable for GetSet {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let old = node.store.lock().getset(&session.db, self.key, self.value);

        Ok(old.map_or(Frame::Null, Frame::Bulk))
    }
}

impl TryFrom<&mut CommandParser> for GetSet {
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
    use crate::commands::Command;

    #[tokio::test]
    async fn returns_previous_value() {
        let node = Node::authority();
        let mut session = Session::new(true);

        let getset = |value: &'static str| {
            Command::try_from(Request::new(
                "GETSET",
                vec![Bytes::from("key1"), Bytes::from(value)],
            ))
            .unwrap()
        };

        assert_eq!(getset("1").exec(&node, &mut session).unwrap(), Frame::Null);
        assert_eq!(
            getset("2").exec(&node, &mut session).unwrap(),
            Frame::Bulk(Bytes::from("1"))
        );
        assert_eq!(node.store.lock().get("0", "key1"), Some(Bytes::from("2")));
    }
}
