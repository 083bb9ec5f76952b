use crate::commands::{CommandParser, CommandParserError};
use crate::config::DEFAULT_HOST;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Attaches the node listening at `host:port` as a replica of this one. The replica first gets a
/// full copy of the store and then every change made after it.
#[derive(Debug, PartialEq)]
pub struct Slave {
    pub host: String,
    pub port: u16,
}

impl Slave {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Unlike other commands this one waits on the network, so it is not run through
    /// [`Executable`](crate::commands::executable::Executable).
    pub async fn attach(self, node: &Node) -> Frame {
        match node.replication.attach(&self.host, self.port).await {
            Ok(()) => Frame::ok(),
            Err(message) => Frame::error(message),
        }
    }
}

impl TryFrom<&mut CommandParser> for Slave {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let address = parser.next_string()?;
        let invalid = || CommandParserError::InvalidCommandArgument {
            command: parser.command.clone(),
            argument: address.clone(),
        };

        let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        let host = if host.is_empty() { DEFAULT_HOST } else { host };

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Request;
    use crate::commands::Command;
    use bytes::Bytes;

    fn parse(address: &'static str) -> Result<Command, Error> {
        Command::try_from(Request::new("SLAVE", vec![Bytes::from(address)]))
    }

    #[test]
    fn parse_address() {
        assert_eq!(
            parse("10.0.0.2:6380").unwrap(),
            Command::Slave(Slave {
                host: "10.0.0.2".to_string(),
                port: 6380
            })
        );
        assert_eq!(
            parse(":6380").unwrap(),
            Command::Slave(Slave {
                host: "localhost".to_string(),
                port: 6380
            })
        );
    }

    #[test]
    fn invalid_address() {
        for address in ["10.0.0.2", "10.0.0.2:", "10.0.0.2:port", "h:70000"] {
            let err = parse(address).unwrap_err();
            assert_eq!(
                *err.downcast_ref::<CommandParserError>().unwrap(),
                CommandParserError::InvalidCommandArgument {
                    command: "slave".to_string(),
                    argument: address.to_string()
                }
            );
        }
    }

    #[tokio::test]
    async fn attach_unreachable() {
        let node = Node::authority();
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let slave = Slave {
            host: "127.0.0.1".to_string(),
            port,
        };

        assert_eq!(
            slave.attach(&node).await,
            Frame::error(format!(
                "Couldn't connect to server at ip '127.0.0.1' port '{port}'"
            ))
        );
    }
}
