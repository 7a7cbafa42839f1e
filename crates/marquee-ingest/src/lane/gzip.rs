//! Gzip lane: decompress, frame, skip headers, parse
//!
//! Reading and decompression run on the blocking pool and hand complete lines
//! to the async side through a bounded channel. Lines are parsed on the
//! runtime with bounded parallelism while keeping file order.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use bytes::BytesMut;
use flate2::read::MultiGzDecoder;
use futures::{stream, StreamExt};
use marquee_common::{IngestError, InputFile, Result};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder};
use tracing::{debug, Instrument, Span};

use super::parser::TitleLineParser;
use super::{Lane, RecordStream};
use crate::config::ImportConfig;

/// Size of each read from the decoder
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Default number of framed lines buffered between reader and parser
pub const DEFAULT_LINE_BUFFER: usize = 64;

/// Tuning for a gzip lane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneSettings {
    pub lines_to_skip: usize,
    pub max_line_length: usize,
    pub parse_parallelism: usize,
    pub line_buffer: usize,
}

impl LaneSettings {
    pub fn from_config(config: &ImportConfig) -> Self {
        Self {
            lines_to_skip: config.lines_to_skip,
            max_line_length: config.max_line_length,
            parse_parallelism: config.parse_parallelism,
            line_buffer: DEFAULT_LINE_BUFFER,
        }
    }
}

impl Default for LaneSettings {
    fn default() -> Self {
        Self::from_config(&ImportConfig::default())
    }
}

/// A framed line and its 1-based position in the decompressed file
#[derive(Debug)]
struct Line {
    number: u64,
    text: String,
}

/// Lane for gzip-compressed, tab-separated title dumps
#[derive(Debug, Clone)]
pub struct GzipLane {
    parser: TitleLineParser,
    settings: LaneSettings,
}

impl GzipLane {
    pub fn new(settings: LaneSettings) -> Self {
        Self {
            parser: TitleLineParser::new(),
            settings,
        }
    }
}

impl Lane for GzipLane {
    fn process(&self, file: InputFile) -> RecordStream {
        let parser = self.parser;
        let settings = self.settings.clone();
        let parallelism = settings.parse_parallelism.max(1);

        stream::once(async move { read_lines(file, settings) })
            .flatten()
            .map(move |line| async move {
                let line = line?;
                // Each line is an independent unit of CPU work
                tokio::spawn(
                    async move { parser.parse_line(&line.text, line.number) }.in_current_span(),
                )
                .await
                .map_err(|e| IngestError::task(format!("line parser failed: {}", e)))
            })
            .buffered(parallelism)
            .boxed()
    }
}

/// Start the blocking reader for `file` and stream its lines
///
/// A reader failure is yielded after every line sent before it.
fn read_lines(file: InputFile, settings: LaneSettings) -> stream::BoxStream<'static, Result<Line>> {
    let (tx, rx) = mpsc::channel(settings.line_buffer.max(1));
    let span = Span::current();

    let reader = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        read_file(file.path(), &settings, &tx)
    });

    let outcome = stream::once(async move {
        match reader.await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(Err(e)),
            Err(e) => Some(Err(IngestError::task(format!("file reader failed: {}", e)))),
        }
    })
    .filter_map(futures::future::ready);

    ReceiverStream::new(rx).map(Ok).chain(outcome).boxed()
}

/// Decompress and frame one file, sending every non-header line
///
/// Returns early without error once the receiving side is gone.
fn read_file(path: &Path, settings: &LaneSettings, tx: &mpsc::Sender<Line>) -> Result<()> {
    let handle = File::open(path).map_err(|e| IngestError::resource(path, e))?;
    let mut decoder = MultiGzDecoder::new(BufReader::new(handle));
    let mut codec = AnyDelimiterCodec::new_with_max_length(
        vec![b'\n'],
        vec![b'\n'],
        settings.max_line_length,
    );

    debug!(path = %path.display(), "Opened input file");

    let mut buffer = BytesMut::with_capacity(READ_CHUNK_SIZE);
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    let mut line_num: u64 = 0;
    let mut eof = false;

    while !eof {
        let read = decoder
            .read(&mut chunk)
            .map_err(|e| IngestError::resource(path, e))?;
        if read == 0 {
            eof = true;
        } else {
            buffer.extend_from_slice(&chunk[..read]);
        }

        loop {
            let frame = if eof {
                codec.decode_eof(&mut buffer)
            } else {
                codec.decode(&mut buffer)
            };

            let frame = match frame {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => {
                    return Err(IngestError::framing(
                        path,
                        line_num + 1,
                        settings.max_line_length,
                    ));
                },
                Err(AnyDelimiterCodecError::Io(e)) => {
                    return Err(IngestError::resource(path, e));
                },
            };

            line_num += 1;
            if line_num <= settings.lines_to_skip as u64 {
                continue;
            }

            let bytes = frame.strip_suffix(b"\r").unwrap_or(&frame[..]);
            let line = Line {
                number: line_num,
                text: String::from_utf8_lossy(bytes).into_owned(),
            };

            if tx.blocking_send(line).is_err() {
                debug!(path = %path.display(), line = line_num, "Lane stopped, closing input file");
                return Ok(());
            }
        }
    }

    debug!(path = %path.display(), lines = line_num, "Finished reading input file");

    Ok(())
}
