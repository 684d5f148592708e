//! Line-oriented connection to the grid world server

use gridworld_shared::{Command, Reply};
use log::debug;
use std::io;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};
use tokio::net::TcpStream;

pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

/// One player's session with the server
pub struct GameConnection<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
}

impl GameConnection<TcpStream> {
    pub async fn connect(server_addr: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(server_addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }
}

impl<S> GameConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(|c| c == '\r' || c == '\n').to_string()))
    }

    /// Reads and parses the next reply line.
    pub async fn read_reply(&mut self) -> Result<Reply, ClientError> {
        let line = self
            .read_line()
            .await?
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "server closed the connection"))?;
        debug!("Message from server: {}", line);
        Ok(line.parse()?)
    }

    pub async fn send(&mut self, command: Command) -> io::Result<()> {
        self.writer
            .write_all(format!("{}\n", command).as_bytes())
            .await?;
        self.writer.flush().await
    }

    /// Sends a command and waits for its single reply line.
    pub async fn request(&mut self, command: Command) -> Result<Reply, ClientError> {
        self.send(command).await?;
        self.read_reply().await
    }

    /// Requests the board rendering, which ends with an empty line.
    pub async fn show(&mut self) -> Result<String, ClientError> {
        self.send(Command::Show).await?;

        let mut board = String::new();
        while let Some(line) = self.read_line().await? {
            if line.is_empty() {
                return Ok(board);
            }
            board.push_str(&line);
            board.push('\n');
        }
        Err(io::Error::new(io::ErrorKind::UnexpectedEof, "board rendering cut short").into())
    }
}
