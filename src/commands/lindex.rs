use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Returns the item at `index` in the list, or `nil` when the index is out of range.
#[derive(Debug, PartialEq)]
pub struct LIndex {
    pub key: String,
    pub index: i64,
}

impl Executable for LIndex {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let item = node
            .store
            .lock()
            .lindex(&session.db, &self.key, self.index)?;

        Ok(item.map_or(Frame::Null, Frame::Bulk))
    }
}

impl TryFrom<&mut CommandParser> for LIndex {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let index = parser.next_integer()?;

        Ok(Self { key, index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Request;
    use crate::commands::Command;
    use crate::store::End;
    use bytes::Bytes;

    #[tokio::test]
    async fn positive_negative_and_out_of_range() {
        let node = Node::authority();
        let mut session = Session::new(true);
        {
            let mut store = node.store.lock();
            for item in ["a", "b", "c"] {
                store
                    .push("0", "list".to_string(), Bytes::from(item), End::Tail)
                    .unwrap();
            }
        }

        let lindex = |index: &'static str| {
            Command::try_from(Request::new(
                "LINDEX",
                vec![Bytes::from("list"), Bytes::from(index)],
            ))
            .unwrap()
        };

        assert_eq!(
            lindex("0").exec(&node, &mut session).unwrap(),
            Frame::Bulk(Bytes::from("a"))
        );
        assert_eq!(
            lindex("-1").exec(&node, &mut session).unwrap(),
            Frame::Bulk(Bytes::from("c"))
        );
        assert_eq!(lindex("3").exec(&node, &mut session).unwrap(), Frame::Null);
    }
}
