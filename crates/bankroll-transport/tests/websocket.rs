//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on an OS-assigned port and talk to it
//! with a plain `tokio-tungstenite` client.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;
    use std::time::Duration;

    use bankroll_transport::{Connection, Transport, WebSocketTransport};
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn connect_client(addr: &str) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        ws
    }

    async fn pair() -> (bankroll_transport::WebSocketConnection, ClientWs) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr").to_string();

        let server = tokio::spawn(async move { transport.accept().await.expect("accept") });
        let client = connect_client(&addr).await;
        let conn = server.await.expect("task should complete");
        (conn, client)
    }

    #[tokio::test]
    async fn test_send_arrives_as_text_frame() {
        let (conn, mut client) = pair().await;

        conn.send(br#"{"hello":"table"}"#).await.expect("send");

        let msg = client.next().await.unwrap().unwrap();
        match msg {
            Message::Text(text) => assert_eq!(text.as_str(), r#"{"hello":"table"}"#),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_recv_accepts_text_and_binary() {
        let (conn, mut client) = pair().await;

        client.send(Message::Text("bank".into())).await.unwrap();
        client.send(Message::Binary(vec![1u8, 2, 3].into())).await.unwrap();

        assert_eq!(conn.recv().await.unwrap(), Some(b"bank".to_vec()));
        assert_eq!(conn.recv().await.unwrap(), Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_ping_surfaces_as_empty_frame_and_gets_pong() {
        let (conn, mut client) = pair().await;

        client.send(Message::Ping(b"alive".to_vec().into())).await.unwrap();
        client.send(Message::Text("bank".into())).await.unwrap();

        assert_eq!(conn.recv().await.unwrap(), Some(Vec::new()));
        assert_eq!(conn.recv().await.unwrap(), Some(b"bank".to_vec()));

        conn.send(b"{}").await.expect("send");
        let mut saw_pong = false;
        loop {
            match client.next().await.unwrap().unwrap() {
                Message::Pong(data) => {
                    assert_eq!(data.as_ref(), b"alive");
                    saw_pong = true;
                }
                Message::Text(_) => break,
                other => panic!("unexpected frame {other:?}"),
            }
        }
        assert!(saw_pong);
    }

    #[tokio::test]
    async fn test_recv_returns_none_on_close() {
        let (conn, mut client) = pair().await;

        client.close(None).await.unwrap();

        assert_eq!(conn.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_send_while_recv_is_pending() {
        // A broadcast must go out while the handler is parked in recv().
        let (conn, mut client) = pair().await;
        let conn = Arc::new(conn);

        let reader = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(2), conn.send(b"roll"))
            .await
            .expect("send must not wait for recv")
            .expect("send");

        let got = client.next().await.unwrap().unwrap();
        assert_eq!(got.into_data().as_ref(), b"roll");

        client.send(Message::Text("done".into())).await.unwrap();
        let read = reader.await.unwrap().unwrap();
        assert_eq!(read, Some(b"done".to_vec()));
    }

    #[tokio::test]
    async fn test_connection_ids_are_unique() {
        let (a, _ca) = pair().await;
        let (b, _cb) = pair().await;
        assert_ne!(a.id(), b.id());
    }
}
