//! WebSocket round-trip tests.
//!
//! A real listener on a loopback port, driven by a tungstenite client.

use collapse_core::components::Team;
use collapse_core::config::GameConfig;
use collapse_core::simulation::Simulation;
use collapse_server::protocol::{ClientMsg, ServerMsg};
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

async fn start() -> (String, watch::Sender<bool>, tokio::task::JoinHandle<Simulation>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let sim = Simulation::new(GameConfig::default()).unwrap();
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move { collapse_server::serve(listener, sim, rx).await.unwrap() });
    (url, tx, handle)
}

fn frame(msg: &ClientMsg) -> Message {
    Message::text(serde_json::to_string(msg).unwrap())
}

async fn next_msg<S>(read: &mut S) -> ServerMsg
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match read.next().await.unwrap().unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            _ => continue,
        }
    }
}

#[tokio::test]
async fn test_join_receives_init_then_updates() {
    let (url, shutdown, handle) = start().await;
    let (socket, _) = connect_async(url.as_str()).await.unwrap();
    let (mut write, mut read) = socket.split();

    write
        .send(frame(&ClientMsg::Join {
            username: "ada".to_string(),
            team: Some(Team::Blue),
        }))
        .await
        .unwrap();

    let ServerMsg::Init(view) = next_msg(&mut read).await else {
        panic!("expected init first");
    };
    assert_eq!(view.player.name, "ada");
    assert_eq!(view.player.team, Team::Blue);

    loop {
        if let ServerMsg::GameUpdate(view) = next_msg(&mut read).await {
            assert_eq!(view.player.name, "ada");
            break;
        }
    }

    shutdown.send(true).unwrap();
    let sim = handle.await.unwrap();
    assert!(sim.get_tick() > 0);
}

#[tokio::test]
async fn test_malformed_frame_gets_error_reply() {
    let (url, shutdown, handle) = start().await;
    let (socket, _) = connect_async(url.as_str()).await.unwrap();
    let (mut write, mut read) = socket.split();

    write.send(Message::text("{\"type\":\"teleport\"}")).await.unwrap();

    let ServerMsg::Error { message } = next_msg(&mut read).await else {
        panic!("expected an error reply");
    };
    assert!(message.starts_with("Malformed message"));

    shutdown.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_closing_socket_removes_player() {
    let (url, shutdown, handle) = start().await;

    let (first, _) = connect_async(url.as_str()).await.unwrap();
    let (mut first_write, mut first_read) = first.split();
    first_write
        .send(frame(&ClientMsg::Join {
            username: "ada".to_string(),
            team: None,
        }))
        .await
        .unwrap();
    assert!(matches!(next_msg(&mut first_read).await, ServerMsg::Init(_)));

    let (second, _) = connect_async(url.as_str()).await.unwrap();
    let (mut second_write, mut second_read) = second.split();
    second_write
        .send(frame(&ClientMsg::Join {
            username: "bob".to_string(),
            team: Some(Team::Blue),
        }))
        .await
        .unwrap();
    assert!(matches!(next_msg(&mut second_read).await, ServerMsg::Init(_)));

    let first_id = loop {
        if let ServerMsg::GameUpdate(view) = next_msg(&mut first_read).await {
            break view.player.id;
        }
    };
    first_write.send(Message::Close(None)).await.unwrap();

    loop {
        if let ServerMsg::PlayerLeft { id } = next_msg(&mut second_read).await {
            assert_eq!(id, first_id);
            break;
        }
    }

    shutdown.send(true).unwrap();
    let sim = handle.await.unwrap();
    assert_eq!(sim.player_count(), 1);
}
