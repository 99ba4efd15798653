//! Raw-frame tee sink and stream replay.
//!
//! The ingest context tees every raw frame to a sink before any processing,
//! so recording is unaffected by descramble errors or queue eviction. The
//! on-disk format here is a minimal length-prefixed record stream
//! (`u32` payload length, `u8` channel tag, payload bytes); the production
//! stream writer lives outside the core and only needs to implement
//! [`FrameSink`].

use crate::error::Result;
use crate::frame::RawFrame;
use async_trait::async_trait;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::info;

/// Receives every raw frame the pipeline ingests.
#[async_trait]
pub trait FrameSink: Send {
    /// Persist one raw frame.
    async fn write_frame(&mut self, frame: &RawFrame) -> Result<()>;

    /// Flush buffered records to stable storage.
    async fn flush(&mut self) -> Result<()>;
}

/// Length-prefixed raw stream file writer.
pub struct FileSink {
    writer: BufWriter<File>,
    frames: u64,
}

impl FileSink {
    /// Create (or truncate) a raw stream file.
    pub async fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).await?;
        info!(path = %path.display(), "raw stream sink opened");
        Ok(Self {
            writer: BufWriter::new(file),
            frames: 0,
        })
    }

    /// Frames written so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

#[async_trait]
impl FrameSink for FileSink {
    async fn write_frame(&mut self, frame: &RawFrame) -> Result<()> {
        self.writer
            .write_u32_le(frame.payload.len() as u32)
            .await?;
        self.writer.write_u8(frame.channel).await?;
        self.writer.write_all(&frame.payload).await?;
        self.frames += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }
}

/// Reads frames back from a length-prefixed raw stream file.
pub struct StreamReader {
    reader: BufReader<File>,
}

impl StreamReader {
    /// Open a raw stream file for replay.
    pub async fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).await?;
        Ok(Self {
            reader: BufReader::new(file),
        })
    }

    /// Next frame, or `None` at end of stream.
    pub async fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        let len = match self.reader.read_u32_le().await {
            Ok(len) => len as usize,
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let channel = self.reader.read_u8().await?;
        let mut payload = vec![0u8; len];
        self.reader.read_exact(&mut payload).await?;
        Ok(Some(RawFrame::new(channel, payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_round_trip_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.raw");

        let frames = vec![
            RawFrame::new(1, vec![1u8; 40]),
            RawFrame::new(2, vec![2u8; 100]),
            RawFrame::new(3, vec![3u8; 64]),
        ];

        let mut sink = FileSink::create(&path).await.unwrap();
        for frame in &frames {
            sink.write_frame(frame).await.unwrap();
        }
        sink.flush().await.unwrap();
        assert_eq!(sink.frames(), 3);

        let mut reader = StreamReader::open(&path).await.unwrap();
        for expected in &frames {
            let frame = reader.next_frame().await.unwrap().unwrap();
            assert_eq!(frame.channel, expected.channel);
            assert_eq!(frame.payload, expected.payload);
        }
        assert!(reader.next_frame().await.unwrap().is_none());
    }
}
