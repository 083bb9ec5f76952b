use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Replaces the item at `index` in the list.
#[derive(Debug, PartialEq)]
pub struct LSet {
    pub key: String,
    pub index: i64,
    pub value: Bytes,
}

impl Executable for LSet {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        node.store
            .lock()
            .lset(&session.db, self.key, self.index, self.value)?;

        Ok(Frame::ok())
    }
}

impl TryFrom<&mut CommandParser> for LSet {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let index = parser.next_integer()?;
        let value = parser.next_bytes()?;

        Ok(Self { key, index, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Request;
    use crate::commands::Command;
    use crate::store::{End, StoreError};

    fn lset(index: &'static str) -> Command {
        Command::try_from(Request::new(
            "LSET",
            vec![Bytes::from("list"), Bytes::from(index), Bytes::from("z")],
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn replaces_item() {
        let node = Node::authority();
        let mut session = Session::new(true);
        {
            let mut store = node.store.lock();
            for item in ["a", "b"] {
                store
                    .push("0", "list".to_string(), Bytes::from(item), End::Tail)
                    .unwrap();
            }
        }

        assert_eq!(lset("-1").exec(&node, &mut session).unwrap(), Frame::ok());
        assert_eq!(
            node.store.lock().lrange("0", "list", 0, -1).unwrap(),
            vec![Bytes::from("a"), Bytes::from("z")]
        );

        let err = lset("2").exec(&node, &mut session).unwrap_err();
        assert_eq!(
            err.downcast_ref::<StoreError>(),
            Some(&StoreError::IndexOutOfRange)
        );
    }
}
