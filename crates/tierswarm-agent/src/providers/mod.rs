// ABOUTME: HTTP provider adapters plus helpers they share: status mapping and line-framed stream decoding.
// ABOUTME: OpenAI-compatible endpoints stream SSE; Ollama streams newline-delimited JSON.

pub mod ollama;
pub mod openai;

use std::fmt::Display;

use futures::{Stream, StreamExt};

use crate::model::{ModelError, TextStream};

/// Longest error body excerpt kept in `ModelError::Http`.
const ERROR_BODY_CHARS: usize = 500;

/// Map a non-success HTTP response onto a ModelError.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ModelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status.as_u16() == 429 {
        return Err(ModelError::RateLimited);
    }
    if status.as_u16() == 401 {
        return Err(ModelError::Unauthorized);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ModelError::Http {
        status: status.as_u16(),
        body: body.chars().take(ERROR_BODY_CHARS).collect(),
    })
}

pub(crate) fn transport(e: reqwest::Error) -> ModelError {
    if e.is_timeout() {
        ModelError::Timeout(e.to_string())
    } else {
        ModelError::Transport(e.to_string())
    }
}

/// What one decoded line of a streaming body means.
#[derive(Debug)]
pub(crate) enum LineEvent {
    Text(String),
    Skip,
    Done,
    Fail(ModelError),
}

struct LineDecoder<S> {
    bytes: std::pin::Pin<Box<S>>,
    buffer: Vec<u8>,
    finished: bool,
}

impl<S> LineDecoder<S> {
    fn next_line(&mut self) -> Option<String> {
        let end = self.buffer.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.buffer.drain(..=end).collect();
        Some(String::from_utf8_lossy(&line).trim_end_matches(['\r', '\n']).to_string())
    }

    fn take_rest(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&rest).trim().to_string())
    }
}

/// Split a byte stream into lines and decode each with `parse`, yielding
/// text increments until a `Done` line, a failure, or end of input.
pub(crate) fn decode_lines<S, B, E, F>(bytes: S, parse: F) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
    F: Fn(&str) -> LineEvent + Send + 'static,
{
    let decoder = LineDecoder {
        bytes: Box::pin(bytes),
        buffer: Vec::new(),
        finished: false,
    };

    let stream = futures::stream::unfold((decoder, parse), |(mut decoder, parse)| async move {
        loop {
            if decoder.finished {
                return None;
            }
            let line = match decoder.next_line() {
                Some(line) => Some(line),
                None => match decoder.bytes.next().await {
                    Some(Ok(chunk)) => {
                        decoder.buffer.extend_from_slice(chunk.as_ref());
                        continue;
                    }
                    Some(Err(e)) => {
                        decoder.finished = true;
                        return Some((Err(ModelError::Transport(e.to_string())), (decoder, parse)));
                    }
                    None => {
                        decoder.finished = true;
                        decoder.take_rest()
                    }
                },
            };
            let Some(line) = line else {
                return None;
            };
            match parse(&line) {
                LineEvent::Text(text) => return Some((Ok(text), (decoder, parse))),
                LineEvent::Skip => continue,
                LineEvent::Done => return None,
                LineEvent::Fail(e) => {
                    decoder.finished = true;
                    return Some((Err(e), (decoder, parse)));
                }
            }
        }
    });
    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn echo_lines(line: &str) -> LineEvent {
        match line.trim() {
            "" => LineEvent::Skip,
            "END" => LineEvent::Done,
            "BAD" => LineEvent::Fail(ModelError::InvalidResponse("bad line".into())),
            other => LineEvent::Text(other.to_string()),
        }
    }

    async fn collect(chunks: Vec<&'static str>) -> Vec<Result<String, String>> {
        let bytes = stream::iter(chunks.into_iter().map(Ok::<_, std::io::Error>));
        decode_lines(bytes, echo_lines)
            .map(|r| r.map_err(|e| e.to_string()))
            .collect()
            .await
    }

    #[tokio::test]
    async fn lines_reassembled_across_chunks() {
        let out = collect(vec!["hel", "lo\nwor", "ld\n\n", "tail"]).await;
        assert_eq!(
            out,
            vec![Ok("hello".to_string()), Ok("world".to_string()), Ok("tail".to_string())]
        );
    }

    #[tokio::test]
    async fn done_line_stops_stream() {
        let out = collect(vec!["a\nEND\nb\n"]).await;
        assert_eq!(out, vec![Ok("a".to_string())]);
    }

    #[tokio::test]
    async fn failure_is_yielded_once_then_ends() {
        let out = collect(vec!["a\r\nBAD\nb\n"]).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Ok("a".to_string()));
        assert!(out[1].as_ref().unwrap_err().contains("bad line"));
    }
}
