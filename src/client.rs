use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_util::codec::Framed;

use crate::codec::{encode_request, ReplyCodec};
use crate::frame::Frame;
use crate::Error;

/// Outbound connection from a node to one of its replicas. Only the commands a replica link
/// needs are exposed.
pub struct Client {
    stream: Framed<TcpStream, ReplyCodec>,
    reply_timeout: Duration,
}

impl Client {
    pub async fn connect(host: &str, port: u16, reply_timeout: Duration) -> Result<Client, Error> {
        let stream = timeout(reply_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| format!("timed out connecting to {host}:{port}"))??;

        Ok(Client {
            stream: Framed::new(stream, ReplyCodec),
            reply_timeout,
        })
    }

    pub async fn ping(&mut self) -> Result<(), Error> {
        match self.request(encode_request("PING", &[], None)).await? {
            Frame::Simple(s) if s == "PONG" => Ok(()),
            frame => Err(format!("unexpected reply to PING: {frame}").into()),
        }
    }

    /// Sends the whole store of this node, replacing everything the replica holds.
    pub async fn replace_db(&mut self, version: u64, data: &[u8]) -> Result<(), Error> {
        let request = encode_request("REPLACEDB", &[&version.to_string()], Some(data));
        self.expect_ok(request).await
    }

    /// Sends one encoded change envelope.
    pub async fn apply(&mut self, envelope: &[u8]) -> Result<(), Error> {
        self.expect_ok(encode_request("DO", &[], Some(envelope))).await
    }

    async fn expect_ok(&mut self, request: Bytes) -> Result<(), Error> {
        match self.request(request).await? {
            Frame::Simple(s) if s == "OK" => Ok(()),
            frame => Err(format!("unexpected reply: {frame}").into()),
        }
    }

    async fn request(&mut self, request: Bytes) -> Result<Frame, Error> {
        self.stream.send(request).await?;

        let reply = timeout(self.reply_timeout, self.stream.next())
            .await
            .map_err(|_| "timed out waiting for reply")?;

        match reply {
            Some(Ok(Frame::Error(message))) => Err(message.into()),
            Some(reply) => reply,
            None => Err("connection closed by peer".into()),
        }
    }
}
