//! Periodic dump of the board to a file
//!
//! The text format starts with a `Game State:` header and appends the grid
//! rendering of every snapshot followed by a blank line. The binary format is
//! a sequence of frames, each a little-endian `u32` length followed by a
//! bincode-encoded [`Snapshot`].

use crate::config::DumpConfig;
use crate::snapshot::Snapshot;
use crate::spatial::SpatialState;
use log::{error, info};
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

pub const TEXT_HEADER: &str = "Game State:\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DumpFormat {
    Text,
    Binary,
}

#[derive(Debug, Error)]
pub enum DumpError {
    #[error("dump I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("snapshot encoding failed: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("dump ends in the middle of a frame")]
    Truncated,
}

pub async fn write_header<W>(writer: &mut W, format: DumpFormat) -> Result<(), DumpError>
where
    W: AsyncWrite + Unpin,
{
    if format == DumpFormat::Text {
        writer.write_all(TEXT_HEADER.as_bytes()).await?;
    }
    Ok(())
}

pub async fn write_snapshot<W>(
    writer: &mut W,
    snapshot: &Snapshot,
    format: DumpFormat,
) -> Result<(), DumpError>
where
    W: AsyncWrite + Unpin,
{
    match format {
        DumpFormat::Text => {
            writer.write_all(format!("{}\n\n", snapshot).as_bytes()).await?;
        }
        DumpFormat::Binary => {
            let frame = bincode::serialize(snapshot)?;
            writer.write_u32_le(frame.len() as u32).await?;
            writer.write_all(&frame).await?;
        }
    }
    Ok(())
}

/// Decodes every frame of a binary dump.
pub fn read_binary_dump(mut bytes: &[u8]) -> Result<Vec<Snapshot>, DumpError> {
    let mut snapshots = Vec::new();

    while !bytes.is_empty() {
        if bytes.len() < 4 {
            return Err(DumpError::Truncated);
        }
        let (length, rest) = bytes.split_at(4);
        let length = u32::from_le_bytes([length[0], length[1], length[2], length[3]]) as usize;
        if rest.len() < length {
            return Err(DumpError::Truncated);
        }
        let (frame, rest) = rest.split_at(length);
        snapshots.push(bincode::deserialize(frame)?);
        bytes = rest;
    }

    Ok(snapshots)
}

async fn run_dumper(state: Arc<SpatialState>, config: DumpConfig) -> Result<(), DumpError> {
    let mut writer = BufWriter::new(File::create(&config.path).await?);
    write_header(&mut writer, config.format).await?;

    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let snapshot = state.snapshot();
        write_snapshot(&mut writer, &snapshot, config.format).await?;
        writer.flush().await?;
    }
}

/// Spawns the task that dumps the board every `config.interval`.
pub fn spawn_state_dumper(state: Arc<SpatialState>, config: DumpConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let path = config.path.clone();
        info!(
            "Dumping board state to {} every {:?}",
            path.display(),
            config.interval
        );
        if let Err(e) = run_dumper(state, config).await {
            error!("State dump to {} stopped: {}", path.display(), e);
        }
    })
}
