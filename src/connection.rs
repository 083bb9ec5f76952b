use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use uuid::Uuid;

use crate::codec::{Request, RequestCodec, RequestError};
use crate::frame::Frame;
use crate::Error;

/// A client socket. Requests are decoded off the socket as they become complete; replies are
/// written back as serialized frames.
pub struct Connection {
    pub id: Uuid,
    pub client_address: SocketAddr,
    stream: Framed<TcpStream, RequestCodec>,
}

impl Connection {
    pub fn new(stream: TcpStream, client_address: SocketAddr, max_request_size: usize) -> Connection {
        Connection {
            id: Uuid::new_v4(),
            client_address,
            stream: Framed::new(stream, RequestCodec::new(max_request_size)),
        }
    }

    /// Reads the next request. `None` means the peer closed the connection.
    pub async fn read_request(&mut self) -> Result<Option<Result<Request, RequestError>>, Error> {
        self.stream.next().await.transpose()
    }

    pub async fn write_frame(&mut self, frame: Frame) -> Result<(), Error> {
        self.stream.send(frame).await
    }
}
