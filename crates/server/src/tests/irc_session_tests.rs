use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::anyhow;
use bridge::{MediaDownloader, TimestampWriter};
use media_cache::{FsBlobStore, MediaCache};
use shared::{
    domain::{ChatDescriptor, ContactId, Me, MessageId},
    protocol::{ChatEvent, Media, Message, MessageContent},
};
use storage::MemoryStore;
use tokio::{
    io::{duplex, AsyncWriteExt, DuplexStream, ReadHalf},
    task::JoinHandle,
    time::timeout,
};

use super::*;

struct NoDownloads;

#[async_trait]
impl MediaDownloader for NoDownloads {
    async fn download_media(&self, _media: &Media) -> Result<Vec<u8>> {
        Err(anyhow!("downloads disabled in tests"))
    }
}

struct Client {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: tokio::io::WriteHalf<DuplexStream>,
}

impl Client {
    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .expect("client write");
    }

    async fn expect_line(&mut self) -> String {
        timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("line in time")
            .expect("client read")
            .expect("open socket")
    }
}

async fn context(registry: &SessionRegistry, files: &std::path::Path) -> SessionContext {
    let store = FsBlobStore::open(files, "http://files.test/")
        .await
        .expect("blob store");
    let (timestamps, _task) = TimestampWriter::spawn(Arc::new(MemoryStore::new()), 16);
    SessionContext {
        registry: registry.clone(),
        services: BridgeServices {
            media: Arc::new(MediaCache::new(Arc::new(store))),
            downloader: Arc::new(NoDownloads),
            timestamps,
        },
        queue_capacity: 8,
    }
}

fn connect(ctx: SessionContext) -> (Client, JoinHandle<Result<()>>) {
    let (client, server) = duplex(64 * 1024);
    let session = tokio::spawn(run(server, ctx));
    let (reader, writer) = tokio::io::split(client);
    (
        Client {
            lines: BufReader::new(reader).lines(),
            writer,
        },
        session,
    )
}

fn me() -> Me {
    Me {
        self_id: ContactId::new("31600000000@c.us"),
        push_name: "Myself".to_string(),
    }
}

fn direct_message(id: &str, body: &str) -> ChatEvent {
    let bob = shared::domain::Contact::new("31600000002@c.us").with_push_name("Bob");
    ChatEvent::from(Message {
        id: MessageId::new(id),
        chat: ChatDescriptor {
            id: shared::domain::ChatId::new("31600000002@c.us"),
            name: "Bob".to_string(),
            ..ChatDescriptor::default()
        },
        sender: Some(bob),
        from: None,
        timestamp: 1_700_000_000,
        sent_by_me: false,
        sent_by_me_from_web: false,
        quoted: None,
        content: MessageContent::Text {
            body: body.to_string(),
        },
    })
}

#[test]
fn parses_commands_with_prefix_tags_and_trailing() {
    assert_eq!(
        parse_line("ping :token with spaces\r"),
        Some(("PING".to_string(), vec!["token with spaces".to_string()]))
    );
    assert_eq!(
        parse_line("@label=1 :alice!a@host USER alice 0 * :Alice A"),
        Some((
            "USER".to_string(),
            vec![
                "alice".to_string(),
                "0".to_string(),
                "*".to_string(),
                "Alice A".to_string()
            ]
        ))
    );
    assert_eq!(parse_line("   "), None);
}

#[tokio::test]
async fn registered_session_relays_bound_events() {
    let registry = SessionRegistry::new();
    let files = tempfile::tempdir().expect("tempdir");
    let (mut client, session) = connect(context(&registry, files.path()).await);

    client.send("PING :early").await;
    assert_eq!(client.expect_line().await, ":chat-bridge PONG chat-bridge :early");

    client.send("NICK alice").await;
    client.send("USER alice 0 * :Alice").await;
    assert_eq!(
        client.expect_line().await,
        ":chat-bridge 001 alice :Welcome to the chat bridge, alice"
    );

    registry
        .bind("alice", me(), HashMap::new())
        .await
        .expect("bind");
    registry
        .dispatch("alice", direct_message("m1", "hello\nworld"))
        .await
        .expect("dispatch");

    assert_eq!(
        client.expect_line().await,
        "@time=2023-11-14T22:13:20.000Z :Bob PRIVMSG alice :hello"
    );
    assert_eq!(
        client.expect_line().await,
        "@time=2023-11-14T22:13:20.000Z :Bob PRIVMSG alice :world"
    );

    client.send("QUIT :bye").await;
    session.await.expect("join").expect("session result");
    assert!(registry.is_empty());
}

#[tokio::test]
async fn duplicate_nickname_is_refused() {
    let registry = SessionRegistry::new();
    let (tx, _rx) = mpsc::channel(1);
    registry.register("alice", tx).expect("first session");

    let files = tempfile::tempdir().expect("tempdir");
    let (mut client, session) = connect(context(&registry, files.path()).await);
    client.send("NICK alice").await;
    client.send("USER alice 0 * :Alice").await;

    assert_eq!(
        client.expect_line().await,
        ":chat-bridge 433 * alice :Nickname is already in use"
    );
    session.await.expect("join").expect("session result");
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn disconnect_unregisters_session() {
    let registry = SessionRegistry::new();
    let files = tempfile::tempdir().expect("tempdir");
    let (mut client, session) = connect(context(&registry, files.path()).await);

    client.send("NICK carol").await;
    client.send("USER carol 0 * :Carol").await;
    client.expect_line().await;
    assert_eq!(registry.len(), 1);

    drop(client);
    session.await.expect("join").expect("session result");
    assert!(registry.is_empty());
}

#[tokio::test]
async fn rebinding_same_identity_keeps_delivered_messages() {
    let registry = SessionRegistry::new();
    let files = tempfile::tempdir().expect("tempdir");
    let (mut client, session) = connect(context(&registry, files.path()).await);

    client.send("NICK alice").await;
    client.send("USER alice 0 * :Alice").await;
    client.expect_line().await;

    registry
        .bind("alice", me(), HashMap::new())
        .await
        .expect("bind");
    registry
        .dispatch("alice", direct_message("m1", "hello"))
        .await
        .expect("first delivery");
    assert_eq!(
        client.expect_line().await,
        "@time=2023-11-14T22:13:20.000Z :Bob PRIVMSG alice :hello"
    );

    registry
        .bind("alice", me(), HashMap::new())
        .await
        .expect("rebind");
    registry
        .dispatch("alice", direct_message("m1", "hello"))
        .await
        .expect("redelivery");
    registry
        .dispatch("alice", direct_message("m2", "again"))
        .await
        .expect("next message");

    assert_eq!(
        client.expect_line().await,
        "@time=2023-11-14T22:13:20.000Z :Bob PRIVMSG alice :again"
    );

    client.send("QUIT").await;
    session.await.expect("join").expect("session result");
}

#[tokio::test]
async fn nick_change_moves_session_to_new_name() {
    let registry = SessionRegistry::new();
    let (tx, _rx) = mpsc::channel(1);
    registry.register("bob", tx).expect("other session");

    let files = tempfile::tempdir().expect("tempdir");
    let (mut client, session) = connect(context(&registry, files.path()).await);
    client.send("NICK alice").await;
    client.send("USER alice 0 * :Alice").await;
    client.expect_line().await;
    registry
        .bind("alice", me(), HashMap::new())
        .await
        .expect("bind");

    client.send("NICK alicia").await;
    assert_eq!(client.expect_line().await, ":alice NICK alicia");

    client.send("NICK bob").await;
    assert_eq!(
        client.expect_line().await,
        ":chat-bridge 433 alicia bob :Nickname is already in use"
    );

    registry
        .dispatch("alicia", direct_message("m1", "hello"))
        .await
        .expect("dispatch");
    assert_eq!(
        client.expect_line().await,
        "@time=2023-11-14T22:13:20.000Z :Bob PRIVMSG alicia :hello"
    );

    client.send("QUIT").await;
    session.await.expect("join").expect("session result");
    assert_eq!(registry.len(), 1);
    assert!(registry.identity("alicia").is_err());
}
