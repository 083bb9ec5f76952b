use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::store::SortOptions;
use crate::Error;

/// Sorts the items of a list or set.
///
/// ```text
/// SORT <key> [BY <pattern>] [GET <pattern>] [LIMIT <start> <count>] [ASC|DESC] [ALPHA]
/// ```
///
/// Options may come in any order. Items compare as numbers unless ALPHA is given. In a BY or GET
/// pattern the first `*` is replaced by the item; `GET #` returns the item itself.
#[derive(Debug, PartialEq)]
pub struct Sort {
    pub key: String,
    pub options: SortOptions,
}

impl Executable for Sort {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let items = node
            .store
            .lock()
            .sort(&session.db, &self.key, &self.options)?;

        Ok(Frame::Array(
            items
                .into_iter()
                .map(|item| item.map_or(Frame::Null, Frame::Bulk))
                .collect(),
        ))
    }
}

impl TryFrom<&mut CommandParser> for Sort {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let mut options = SortOptions::default();

        loop {
            let option = match parser.next_string() {
                Ok(option) => option,
                Err(CommandParserError::EndOfStream) => break,
                Err(err) => return Err(err.into()),
            };

            match &option.to_lowercase()[..] {
                // Doubled spaces on the command line leave empty tokens behind.
                "" => {}
                "by" => options.by = Some(parser.next_string()?),
                "get" => options.get = Some(parser.next_string()?),
                "limit" => {
                    let start = next_count(parser)?;
                    let count = next_count(parser)?;
                    options.limit = Some((start, count));
                }
                "asc" => options.descending = false,
                "desc" => options.descending = true,
                "alpha" => options.alpha = true,
                _ => {
                    return Err(CommandParserError::InvalidCommandArgument {
                        command: "sort".to_string(),
                        argument: option,
                    }
                    .into())
                }
            }
        }

        Ok(Self { key, options })
    }
}

fn next_count(parser: &mut CommandParser) -> Result<usize, CommandParserError> {
    let value = parser.next_integer()?;
    usize::try_from(value).map_err(|_| CommandParserError::InvalidInteger(value.to_string()))
}
