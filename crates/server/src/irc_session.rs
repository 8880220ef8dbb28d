use anyhow::{Context, Result};
use async_trait::async_trait;
use bridge::{irc::SERVER_NAME, BridgeServices, Connection, IrcLine, LineSink};
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::{
    io::{
        AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter,
        Lines,
    },
    sync::mpsc,
};
use tracing::{debug, info, warn, Span};

use crate::sessions::{SessionCommand, SessionRegistry};

#[derive(Clone)]
pub struct SessionContext {
    pub registry: SessionRegistry,
    pub services: BridgeServices,
    pub queue_capacity: usize,
}

/// Writes protocol lines to the client, tagged with the message time.
pub struct SocketSink<W> {
    writer: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin + Send> SocketSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    pub async fn write_raw(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> LineSink for SocketSink<W> {
    async fn write_line(&mut self, at: DateTime<Utc>, line: IrcLine) -> Result<()> {
        let time = at.to_rfc3339_opts(SecondsFormat::Millis, true);
        self.write_raw(&format!("@time={time} {line}")).await
    }
}

/// Removes the current nickname from the registry however the session ends.
struct Registration {
    registry: SessionRegistry,
    nickname: String,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.unregister(&self.nickname);
    }
}

/// Drives one client socket from registration until it disconnects.
pub async fn run<S>(stream: S, ctx: SessionContext) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    let (reader, writer) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();
    let mut sink = SocketSink::new(writer);

    let Some(nickname) = register(&mut lines, &mut sink).await? else {
        debug!("irc: client left before registering");
        return Ok(());
    };
    Span::current().record("nick", nickname.as_str());

    let (tx, mut rx) = mpsc::channel(ctx.queue_capacity.max(1));
    if let Err(error) = ctx.registry.register(&nickname, tx) {
        warn!(%error, "irc: registration rejected");
        sink.write_raw(&format!(
            ":{SERVER_NAME} 433 * {nickname} :Nickname is already in use"
        ))
        .await?;
        return Ok(());
    }
    let mut registration = Registration {
        registry: ctx.registry.clone(),
        nickname: nickname.clone(),
    };

    sink.write_raw(&format!(
        ":{SERVER_NAME} 001 {nickname} :Welcome to the chat bridge, {nickname}"
    ))
    .await?;
    info!("irc: session registered");

    let mut connection: Option<Connection> = None;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read from client")? else {
                    info!("irc: client disconnected");
                    return Ok(());
                };
                match parse_line(&line) {
                    Some((command, params)) if command == "PING" => {
                        pong(&mut sink, &params).await?;
                    }
                    Some((command, params)) if command == "NICK" => {
                        change_nickname(&mut registration, connection.as_mut(), &mut sink, &params)
                            .await?;
                    }
                    Some((command, _)) if command == "QUIT" => {
                        info!("irc: client quit");
                        return Ok(());
                    }
                    Some((command, _)) => debug!(%command, "irc: ignoring command"),
                    None => {}
                }
            }
            command = rx.recv() => {
                let Some(command) = command else {
                    return Ok(());
                };
                match command {
                    SessionCommand::Bind { me, timestamps } => {
                        match connection.as_mut().filter(|conn| conn.me().self_id == me.self_id) {
                            Some(conn) => {
                                info!(identity = %me.self_id, chats = timestamps.len(), "irc: chat identity refreshed");
                                conn.merge_timestamps(timestamps);
                            }
                            None => {
                                info!(identity = %me.self_id, chats = timestamps.len(), "irc: chat identity bound");
                                connection = Some(
                                    Connection::new(registration.nickname.clone(), me, ctx.services.clone())
                                        .with_timestamps(timestamps),
                                );
                            }
                        }
                    }
                    SessionCommand::Event(event) => {
                        let Some(conn) = connection.as_mut() else {
                            warn!(tag = %event.tag(), "irc: event before identity, dropping");
                            continue;
                        };
                        if let Err(error) = conn.handle_event(event, &mut sink).await {
                            if error.is_fatal() {
                                return Err(error).context("session output failed");
                            }
                            warn!(%error, "irc: event not delivered");
                        }
                    }
                }
            }
        }
    }
}

/// Reads until both `NICK` and `USER` arrived. `None` when the client left.
async fn register<R, W>(lines: &mut Lines<R>, sink: &mut SocketSink<W>) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send,
{
    let mut nickname: Option<String> = None;
    let mut user_seen = false;

    while let Some(line) = lines
        .next_line()
        .await
        .context("failed to read from client")?
    {
        let Some((command, params)) = parse_line(&line) else {
            continue;
        };
        match command.as_str() {
            "NICK" => match params.first().filter(|nick| !nick.is_empty()) {
                Some(nick) => nickname = Some(nick.clone()),
                None => {
                    sink.write_raw(&format!(":{SERVER_NAME} 431 * :No nickname given"))
                        .await?
                }
            },
            "USER" => user_seen = true,
            "PING" => pong(sink, &params).await?,
            "QUIT" => return Ok(None),
            other => debug!(command = %other, "irc: ignoring command before registration"),
        }

        if user_seen && nickname.is_some() {
            return Ok(nickname);
        }
    }
    Ok(None)
}

/// Handles `NICK` after registration. Rejections leave the session as it was.
async fn change_nickname<W>(
    registration: &mut Registration,
    connection: Option<&mut Connection>,
    sink: &mut SocketSink<W>,
    params: &[String],
) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let current = registration.nickname.clone();
    let Some(requested) = params.first().filter(|nick| !nick.is_empty()) else {
        return sink
            .write_raw(&format!(":{SERVER_NAME} 431 {current} :No nickname given"))
            .await;
    };
    if *requested == current {
        return Ok(());
    }

    if let Err(error) = registration.registry.rename(&current, requested) {
        warn!(%error, "irc: nickname change rejected");
        return sink
            .write_raw(&format!(
                ":{SERVER_NAME} 433 {current} {requested} :Nickname is already in use"
            ))
            .await;
    }
    registration.nickname = requested.clone();
    if let Some(conn) = connection {
        conn.set_nickname(requested.clone());
    }
    Span::current().record("nick", requested.as_str());
    info!(previous = %current, "irc: nickname changed");
    sink.write_raw(&format!(":{current} NICK {requested}")).await
}

async fn pong<W>(sink: &mut SocketSink<W>, params: &[String]) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let token = params.first().map(String::as_str).unwrap_or(SERVER_NAME);
    sink.write_raw(&format!(":{SERVER_NAME} PONG {SERVER_NAME} :{token}"))
        .await
}

/// Splits a client line into an upper-cased command and its parameters,
/// skipping message tags and the source prefix.
fn parse_line(line: &str) -> Option<(String, Vec<String>)> {
    let mut rest = line.trim_end_matches(['\r', '\n']).trim_start();
    if rest.starts_with('@') {
        rest = rest.split_once(' ').map_or("", |(_, tail)| tail).trim_start();
    }
    if rest.starts_with(':') {
        rest = rest.split_once(' ').map_or("", |(_, tail)| tail).trim_start();
    }

    let (head, trailing) = match rest.split_once(" :") {
        Some((head, trailing)) => (head, Some(trailing)),
        None => (rest, None),
    };
    let mut words = head.split_whitespace();
    let command = words.next()?.to_ascii_uppercase();
    let mut params: Vec<String> = words.map(str::to_string).collect();
    params.extend(trailing.map(str::to_string));
    Some((command, params))
}

#[cfg(test)]
#[path = "tests/irc_session_tests.rs"]
mod tests;
