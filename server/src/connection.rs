//! Per-connection command handling
//!
//! Each accepted stream gets one task running [`handle_connection`]: the
//! player joins, every text line is turned into a board operation, and the
//! player leaves when the stream ends. Board calls are synchronous and never
//! held across the socket writes.

use crate::network::ServerMessage;
use crate::spatial::SpatialState;
use gridworld_shared::{Command, Direction, PlayerId, ProtocolError, Reply};
use log::{debug, error, info, warn};
use std::io;
use std::sync::Arc;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::sync::mpsc;

/// Longest command line accepted, newline included
pub const MAX_LINE_LEN: usize = 256;

/// What a connection task needs from the server
#[derive(Clone)]
pub struct ConnectionContext {
    pub state: Arc<SpatialState>,
    pub server_tx: mpsc::UnboundedSender<ServerMessage>,
    pub exit_on_show: bool,
}

impl ConnectionContext {
    fn notify(&self, message: ServerMessage) {
        if let Err(e) = self.server_tx.send(message) {
            error!("Failed to notify server loop: {}", e);
        }
    }
}

async fn send_line<W>(writer: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(format!("{}\n", line).as_bytes()).await?;
    writer.flush().await
}

fn move_reply(state: &SpatialState, player: &PlayerId, direction: Direction) -> Reply {
    match state.move_in(player, direction) {
        Ok(outcome) => Reply::Moved {
            player: player.clone(),
            position: outcome.position,
        },
        Err(e) => {
            debug!("Move {} by {} failed: {}", direction, player, e);
            Reply::MoveFailed {
                player: player.clone(),
                reason: e.to_string(),
            }
        }
    }
}

/// Serves one client until it disconnects.
///
/// A client that cannot join because the board is full is told so and the
/// stream is dropped. Otherwise the player's cell is freed on every exit
/// path, including I/O errors.
pub async fn handle_connection<S>(
    stream: S,
    player: PlayerId,
    context: ConnectionContext,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);

    let position = match context.state.join(&player) {
        Ok(position) => position,
        Err(e) => {
            warn!("Refusing client <{}>: {}", player, e);
            send_line(&mut writer, &Reply::ServerFull { player }.to_string()).await?;
            return Ok(());
        }
    };

    info!("Client <{}> logged in at {}", player, position);
    context.notify(ServerMessage::PlayerJoined {
        player: player.clone(),
    });

    let welcome = Reply::Welcome {
        player: player.clone(),
        position,
    };
    let result = match send_line(&mut writer, &welcome.to_string()).await {
        Ok(()) => serve_commands(reader, &mut writer, &player, &context).await,
        Err(e) => Err(e),
    };

    if let Some(position) = context.state.leave(&player) {
        info!("Client <{}> disconnected, freed {}", player, position);
    }
    context.notify(ServerMessage::PlayerLeft { player });

    result
}

/// One line read from a client
enum Incoming {
    Line(String),
    /// Longer than [`MAX_LINE_LEN`]; the rest of it has been skipped
    Overlong,
    Closed,
}

/// Reads the next line without ever buffering more than [`MAX_LINE_LEN`]
/// bytes. Invalid UTF-8 is replaced rather than treated as an I/O error.
async fn next_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Incoming>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let read = (&mut *reader)
        .take(MAX_LINE_LEN as u64)
        .read_until(b'\n', buf)
        .await?;
    if read == 0 {
        return Ok(Incoming::Closed);
    }

    if buf.last() != Some(&b'\n') && buf.len() >= MAX_LINE_LEN {
        skip_rest_of_line(reader).await?;
        return Ok(Incoming::Overlong);
    }

    let line = String::from_utf8_lossy(buf);
    Ok(Incoming::Line(
        line.trim_end_matches(|c| c == '\r' || c == '\n').to_string(),
    ))
}

async fn skip_rest_of_line<R>(reader: &mut R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let (newline, available) = {
            let chunk = reader.fill_buf().await?;
            (chunk.iter().position(|&byte| byte == b'\n'), chunk.len())
        };
        match newline {
            Some(index) => {
                reader.consume(index + 1);
                return Ok(());
            }
            None if available == 0 => return Ok(()),
            None => reader.consume(available),
        }
    }
}

async fn serve_commands<R, W>(
    reader: R,
    writer: &mut W,
    player: &PlayerId,
    context: &ConnectionContext,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(MAX_LINE_LEN);

    loop {
        let line = match next_line(&mut reader, &mut buf).await? {
            Incoming::Line(line) => line,
            Incoming::Overlong => {
                warn!("Ignoring line over {} bytes from {}", MAX_LINE_LEN, player);
                continue;
            }
            Incoming::Closed => return Ok(()),
        };
        debug!("Message from {}: {}", player, line);

        match line.parse::<Command>() {
            Ok(Command::Move(direction)) => {
                let reply = move_reply(&context.state, player, direction);
                send_line(writer, &reply.to_string()).await?;
            }
            Ok(Command::Show) => {
                let snapshot = context.state.snapshot();
                send_line(writer, &snapshot.to_string()).await?;

                if context.exit_on_show {
                    println!("{}", snapshot);
                    info!("Client <{}> requested SHOW, stopping server", player);
                    context.notify(ServerMessage::Shutdown);
                    return Ok(());
                }
            }
            Err(ProtocolError::MissingDirection) | Err(ProtocolError::InvalidDirection(_)) => {
                let reply = Reply::InvalidMove {
                    player: player.clone(),
                };
                send_line(writer, &reply.to_string()).await?;
            }
            Err(ProtocolError::Empty) => {}
            Err(e) => warn!("Ignoring command from {}: {}", player, e),
        }
    }
}
