//! An in-process fake nameserver, for exercising the `Server` and
//! `QueryEngine` without touching the network.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};

use dns_codec::{Message, Question};

/// A response builder: given the question a client asked, produce the
/// message to send back (callers typically start from
/// `request.make_response()`-style construction and fill in answers).
pub type Responder = Arc<dyn Fn(u16, &Question) -> Message + Send + Sync>;

/// Spawn a fake UDP nameserver on an ephemeral loopback port, answering
/// every datagram with `responder`'s output. Runs until the process
/// exits; intended for short-lived tests only.
pub async fn fake_udp_nameserver(responder: Responder) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let address = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        loop {
            let (len, peer) = match socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(_) => return,
            };
            let Ok(request) = Message::from_octets(&buf[..len]) else {
                continue;
            };
            let Some(question) = request.sole_question() else {
                continue;
            };
            let response = responder(request.header.id, question);
            if let Ok(bytes) = response.into_octets() {
                let _ = socket.send_to(&bytes, peer).await;
            }
        }
    });

    address
}

/// Spawn a fake TCP nameserver on an ephemeral loopback port, answering
/// every length-prefixed request with `responder`'s output.
pub async fn fake_tcp_nameserver(responder: Responder) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(v) => v,
                Err(_) => return,
            };
            let responder = responder.clone();
            tokio::spawn(async move {
                loop {
                    let len = match stream.read_u16().await {
                        Ok(len) => len,
                        Err(_) => return,
                    };
                    let mut buf = vec![0u8; len.into()];
                    if stream.read_exact(&mut buf).await.is_err() {
                        return;
                    }
                    let Ok(request) = Message::from_octets(&buf) else {
                        continue;
                    };
                    let Some(question) = request.sole_question() else {
                        continue;
                    };
                    let response = responder(request.header.id, question);
                    if let Ok(bytes) = response.into_octets() {
                        let out_len = bytes.len() as u16;
                        if stream.write_all(&out_len.to_be_bytes()).await.is_err() {
                            return;
                        }
                        if stream.write_all(&bytes).await.is_err() {
                            return;
                        }
                    }
                }
            });
        }
    });

    address
}
