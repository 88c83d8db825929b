//! Streaming plumbing shared by every vendor.
//!
//! A streamed response is split into frames (server-sent event payloads or
//! JSON lines), and each frame goes through [`Vendor::parse_chunk`] to become
//! a text fragment, nothing, or the end of the stream.

use std::io::{self, BufRead};

use async_stream::try_stream;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};

use crate::error::{Error, LlmError, Result};
use crate::providers::Vendor;

/// Wire framing of a streamed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    /// `text/event-stream`: frames are the `data:` payload of each event.
    Sse,
    /// Newline-delimited JSON: each non-empty line is a frame.
    JsonLines,
}

/// What a single frame means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkEvent {
    /// A text fragment for the caller.
    Text(String),
    /// Bookkeeping frame with no text.
    Skip,
    /// The vendor signalled the end of the stream.
    Done,
}

/// Splits a blocking reader into frames.
#[derive(Debug)]
pub struct Frames<R> {
    reader: R,
    format: StreamFormat,
    data: Vec<String>,
}

impl<R: BufRead> Frames<R> {
    /// Frames `reader` according to `format`.
    pub const fn new(reader: R, format: StreamFormat) -> Self {
        Self {
            reader,
            format,
            data: Vec::new(),
        }
    }

    fn flush(&mut self) -> Option<io::Result<String>> {
        if self.data.is_empty() {
            None
        } else {
            Some(Ok(std::mem::take(&mut self.data).join("\n")))
        }
    }
}

impl<R: BufRead> Iterator for Frames<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Ok(0) => return self.flush(),
                Ok(_) => {}
                Err(e) => return Some(Err(e)),
            }
            let line = line.trim_end_matches(['\r', '\n']);

            match self.format {
                StreamFormat::JsonLines => {
                    let line = line.trim();
                    if !line.is_empty() {
                        return Some(Ok(line.to_owned()));
                    }
                }
                StreamFormat::Sse => {
                    if line.is_empty() {
                        if let Some(frame) = self.flush() {
                            return Some(frame);
                        }
                        continue;
                    }
                    if line.starts_with(':') {
                        continue;
                    }
                    let (field, value) = line.split_once(':').map_or((line, ""), |(f, v)| {
                        (f, v.strip_prefix(' ').unwrap_or(v))
                    });
                    if field == "data" {
                        self.data.push(value.to_owned());
                    }
                }
            }
        }
    }
}

/// Blocking fragment iterator over a streamed response body.
#[derive(Debug)]
pub(crate) struct BlockingFragments<V, R> {
    vendor: V,
    frames: Frames<R>,
    finished: bool,
}

impl<V: Vendor, R: BufRead> BlockingFragments<V, R> {
    pub(crate) fn new(vendor: V, reader: R) -> Self {
        let format = vendor.stream_format();
        Self {
            vendor,
            frames: Frames::new(reader, format),
            finished: false,
        }
    }
}

impl<V: Vendor, R: BufRead> Iterator for BlockingFragments<V, R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            let frame = match self.frames.next() {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(stream_error(self.vendor.name(), e)));
                }
                None => {
                    self.finished = true;
                    return None;
                }
            };
            tracing::trace!(provider = self.vendor.name(), %frame, "stream frame");

            match self.vendor.parse_chunk(&frame) {
                Ok(ChunkEvent::Text(text)) => return Some(Ok(text)),
                Ok(ChunkEvent::Skip) => {}
                Ok(ChunkEvent::Done) => {
                    self.finished = true;
                    return None;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

fn stream_error(provider: &str, err: impl std::fmt::Display) -> Error {
    LlmError::stream(err.to_string()).with_provider(provider).into()
}

/// Decodes one JSON line. Invalid UTF-8 is a stream error, as it is for
/// `read_line` on the blocking path and for the SSE decoder.
fn decode_line(provider: &str, raw: Vec<u8>) -> Result<String> {
    String::from_utf8(raw)
        .map(|line| line.trim().to_owned())
        .map_err(|e| stream_error(provider, e))
}

/// Asynchronous fragment stream over a streamed response body.
pub(crate) fn async_fragments<V: Vendor>(
    vendor: V,
    response: reqwest::Response,
) -> impl Stream<Item = Result<String>> + Send {
    try_stream! {
        match vendor.stream_format() {
            StreamFormat::Sse => {
                let mut events = response.bytes_stream().eventsource();
                while let Some(event) = events.next().await {
                    let event = event.map_err(|e| stream_error(vendor.name(), e))?;
                    tracing::trace!(provider = vendor.name(), frame = %event.data, "stream frame");
                    match vendor.parse_chunk(&event.data)? {
                        ChunkEvent::Text(text) => yield text,
                        ChunkEvent::Skip => {}
                        ChunkEvent::Done => break,
                    }
                }
            }
            StreamFormat::JsonLines => {
                let mut bytes = response.bytes_stream();
                let mut buffer: Vec<u8> = Vec::new();
                let mut finished = false;

                while !finished {
                    let Some(chunk) = bytes.next().await else { break };
                    let chunk = chunk.map_err(|e| stream_error(vendor.name(), e))?;
                    buffer.extend_from_slice(&chunk);

                    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                        let raw: Vec<u8> = buffer.drain(..=pos).collect();
                        let line = decode_line(vendor.name(), raw)?;
                        if line.is_empty() {
                            continue;
                        }
                        tracing::trace!(provider = vendor.name(), frame = %line, "stream frame");
                        match vendor.parse_chunk(&line)? {
                            ChunkEvent::Text(text) => yield text,
                            ChunkEvent::Skip => {}
                            ChunkEvent::Done => {
                                finished = true;
                                break;
                            }
                        }
                    }
                }

                let tail = decode_line(vendor.name(), buffer)?;
                if !finished && !tail.is_empty() {
                    if let ChunkEvent::Text(text) = vendor.parse_chunk(&tail)? {
                        yield text;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn frames(input: &str, format: StreamFormat) -> Vec<String> {
        Frames::new(Cursor::new(input.to_owned()), format)
            .map(io::Result::unwrap)
            .collect()
    }

    mod sse_frames {
        use super::*;

        #[test]
        fn splits_on_blank_lines() {
            let input = "data: {\"a\":1}\n\ndata: {\"a\":2}\n\n";
            assert_eq!(frames(input, StreamFormat::Sse), vec!["{\"a\":1}", "{\"a\":2}"]);
        }

        #[test]
        fn ignores_comments_and_other_fields() {
            let input = ": keep-alive\nevent: content_block_delta\nid: 7\ndata: x\n\n";
            assert_eq!(frames(input, StreamFormat::Sse), vec!["x"]);
        }

        #[test]
        fn joins_multiline_data() {
            let input = "data: line one\ndata: line two\n\n";
            assert_eq!(frames(input, StreamFormat::Sse), vec!["line one\nline two"]);
        }

        #[test]
        fn handles_crlf_and_missing_space() {
            let input = "data:first\r\n\r\ndata: second\r\n\r\n";
            assert_eq!(frames(input, StreamFormat::Sse), vec!["first", "second"]);
        }

        #[test]
        fn flushes_pending_data_at_eof() {
            let input = "data: [DONE]";
            assert_eq!(frames(input, StreamFormat::Sse), vec!["[DONE]"]);
        }

        #[test]
        fn empty_input_has_no_frames() {
            assert!(frames("", StreamFormat::Sse).is_empty());
            assert!(frames("\n\n\n", StreamFormat::Sse).is_empty());
        }
    }

    mod json_lines_frames {
        use super::*;

        #[test]
        fn one_frame_per_line() {
            let input = "{\"a\":1}\n\n{\"a\":2}\n";
            assert_eq!(
                frames(input, StreamFormat::JsonLines),
                vec!["{\"a\":1}", "{\"a\":2}"]
            );
        }

        #[test]
        fn last_line_without_newline() {
            assert_eq!(frames("{}", StreamFormat::JsonLines), vec!["{}"]);
        }

        #[test]
        fn iterator_stays_exhausted() {
            let mut it = Frames::new(Cursor::new("x\n".to_owned()), StreamFormat::JsonLines);
            assert_eq!(it.next().unwrap().unwrap(), "x");
            assert!(it.next().is_none());
            assert!(it.next().is_none());
        }

        #[test]
        fn invalid_utf8_is_error() {
            let input = b"{\"a\":\"\xff\"}\n".to_vec();
            let mut it = Frames::new(Cursor::new(input), StreamFormat::JsonLines);
            assert!(it.next().unwrap().is_err());
        }
    }

    mod decode_line {
        use super::*;

        #[test]
        fn trims_valid_line() {
            assert_eq!(decode_line("ollama", b"  {}\r\n".to_vec()).unwrap(), "{}");
        }

        #[test]
        fn invalid_utf8_is_stream_error() {
            let err = decode_line("ollama", vec![b'{', 0xff, b'}']).unwrap_err();
            let llm = err.as_llm().unwrap();
            assert_eq!(llm.kind, crate::error::LlmErrorKind::Stream);
            assert_eq!(llm.provider.as_deref(), Some("ollama"));
        }
    }
}
