use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedSender};

use replikv::codec::{Request, RequestError};
use replikv::connection::Connection;
use replikv::frame::Frame;

async fn create_connection() -> Result<(UnboundedSender<Vec<u8>>, Connection), std::io::Error> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let local_addr = listener.local_addr()?;

    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();

    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            while let Some(data) = rx.recv().await {
                if socket.write_all(&data).await.is_err() {
                    break;
                }
            }
        }
    });

    let stream = TcpStream::connect(local_addr).await?;
    let client_address = stream.local_addr()?;

    Ok((tx, Connection::new(stream, client_address, 1024)))
}

fn args(items: &[&'static str]) -> Vec<Bytes> {
    items.iter().map(|item| Bytes::from(*item)).collect()
}

#[tokio::test]
async fn test_read_command_line() {
    let (tx, mut connection) = create_connection().await.unwrap();

    tx.send(b"GET foo\r\n".to_vec()).unwrap();

    let actual = connection.read_request().await.unwrap();

    assert_eq!(actual, Some(Ok(Request::new("get", args(&["foo"])))));
}

#[tokio::test]
async fn test_read_payload() {
    let (tx, mut connection) = create_connection().await.unwrap();

    tx.send(b"SET foo 12\r\nhello\r\nworld\r\n".to_vec()).unwrap();

    let actual = connection.read_request().await.unwrap();

    assert_eq!(
        actual,
        Some(Ok(Request::new("set", args(&["foo", "hello\r\nworld"]))))
    );
}

#[tokio::test]
async fn test_read_invalid_length() {
    let (tx, mut connection) = create_connection().await.unwrap();

    tx.send(b"SET foo bar\r\nhello\r\n".to_vec()).unwrap();

    let actual = connection.read_request().await.unwrap();

    assert_eq!(
        actual,
        Some(Err(RequestError::InvalidLength("bar".to_string())))
    );
}

#[tokio::test]
async fn test_read_requests_in_turn() {
    let (tx, mut connection) = create_connection().await.unwrap();

    tx.send(b"PING\r\n".to_vec()).unwrap();
    let first = connection.read_request().await.unwrap();

    tx.send(b"DBSIZE\r\n".to_vec()).unwrap();
    let second = connection.read_request().await.unwrap();

    assert_eq!(first, Some(Ok(Request::new("ping", vec![]))));
    assert_eq!(second, Some(Ok(Request::new("dbsize", vec![]))));
}

#[tokio::test]
async fn test_peer_closed() {
    let (tx, mut connection) = create_connection().await.unwrap();

    drop(tx);

    assert_eq!(connection.read_request().await.unwrap(), None);
}

#[tokio::test]
async fn test_write_frame() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let local_addr = listener.local_addr().unwrap();

    let client = tokio::spawn(async move {
        use tokio::io::AsyncReadExt;

        let mut stream = TcpStream::connect(local_addr).await.unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        buf
    });

    let (stream, client_address) = listener.accept().await.unwrap();
    let mut connection = Connection::new(stream, client_address, 1024);
    connection
        .write_frame(Frame::Array(vec![
            Frame::Bulk(Bytes::from("a")),
            Frame::Null,
        ]))
        .await
        .unwrap();
    connection.write_frame(Frame::error("no such key")).await.unwrap();
    drop(connection);

    assert_eq!(
        client.await.unwrap(),
        b"*2\r\n$1\r\na\r\n$-1\r\n-ERR no such key\r\n".to_vec()
    );
}
