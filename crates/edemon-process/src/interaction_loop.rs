//! The per-process output consumer
//!
//! stdout and stderr are pumped into one channel of byte chunks. The loop
//! decodes them and scans the result one character at a time, because prompts
//! such as `yes/no? ` are not newline-terminated and must be answered before
//! a line ever completes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::ChildStdin;
use tokio::sync::{mpsc, watch};

use crate::answer::{Answer, AnswerKind};
use crate::execution::OutputLog;
use crate::interaction::ProcessInteraction;
use crate::sentence::Sentence;
use crate::sink::OutputSink;
use edemon_core::prelude::*;

const READ_BUFFER_SIZE: usize = 1024;
const SENTENCE_CAPACITY: usize = 256;

/// Copy a child stream into the merged chunk channel until EOF.
pub(crate) async fn pump<R>(mut reader: R, tx: mpsc::Sender<Vec<u8>>, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_BUFFER_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).await.is_err() {
                    trace!("{} consumer gone, stop pumping", stream);
                    break;
                }
            }
            Err(e) => {
                debug!("{} read failed: {}", stream, e);
                break;
            }
        }
    }
    trace!("{} pump finished", stream);
}

/// Incremental UTF-8 decoding across chunk boundaries.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Decode every complete character, keeping an incomplete tail for later.
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut decoded = String::with_capacity(self.pending.len());

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    decoded.push_str(text);
                    self.pending.clear();
                    return decoded;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    decoded.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(invalid) => {
                            decoded.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + invalid);
                        }
                        None => {
                            self.pending.drain(..valid);
                            return decoded;
                        }
                    }
                }
            }
        }
    }

    /// Whatever is left at end of stream.
    fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

/// Why the scan of a chunk stopped early.
enum Flow {
    Continue,
    Stop,
}

/// Drives one process: output classification, logging and replies.
pub(crate) struct InteractionLoop {
    pub(crate) label: String,
    pub(crate) interaction: Arc<ProcessInteraction>,
    pub(crate) sink: Arc<dyn OutputSink>,
    pub(crate) output: OutputLog,
    /// Cleared once stdin is closed, so queued replies can be refused early.
    pub(crate) input_open: Arc<AtomicBool>,
}

impl InteractionLoop {
    pub(crate) async fn run(
        self,
        mut chunks: mpsc::Receiver<Vec<u8>>,
        stdin: Option<ChildStdin>,
        mut replies: mpsc::UnboundedReceiver<Answer>,
        done_tx: watch::Sender<bool>,
    ) {
        let mut stdin = stdin;
        if !self.interaction.requires_input_interaction() {
            // Some children block until their input reaches EOF.
            trace!("{}: no reply rules, closing input", self.label);
            self.close_input(&mut stdin).await;
        }

        let mut sentence = Sentence::with_capacity(SENTENCE_CAPACITY);
        let mut decoder = Utf8Decoder::default();

        loop {
            tokio::select! {
                chunk = chunks.recv() => match chunk {
                    Some(bytes) => {
                        let text = decoder.decode(&bytes);
                        if let Flow::Stop = self.scan(&text, &mut sentence, &mut stdin).await {
                            debug!("{}: EOF answer, stop reading output", self.label);
                            break;
                        }
                    }
                    None => {
                        let rest = decoder.finish();
                        if !rest.is_empty() {
                            let _ = self.scan(&rest, &mut sentence, &mut stdin).await;
                        }
                        break;
                    }
                },
                Some(answer) = replies.recv() => {
                    if answer.kind() == AnswerKind::Eof {
                        self.close_input(&mut stdin).await;
                    } else {
                        self.write(&mut stdin, &answer).await;
                    }
                }
            }
        }

        if !sentence.trim().is_empty() {
            self.emit(sentence.trim());
        }
        sentence.reset();

        self.close_input(&mut stdin).await;
        let _ = done_tx.send(true);
        trace!("{}: interaction loop finished", self.label);
    }

    /// Feed decoded text one character at a time.
    async fn scan(
        &self,
        text: &str,
        sentence: &mut Sentence,
        stdin: &mut Option<ChildStdin>,
    ) -> Flow {
        for c in text.chars() {
            sentence.append(c);

            let answer = self.interaction.reply_to(sentence.as_str());
            match answer.kind() {
                AnswerKind::None => {}
                AnswerKind::Text => {
                    self.write(stdin, answer).await;
                    sentence.append_str(answer.payload());
                }
                AnswerKind::Eof => {
                    self.close_input(stdin).await;
                    return Flow::Stop;
                }
            }

            if sentence.is_finished() {
                self.emit(sentence.trim());
                sentence.reset();
            }
        }
        Flow::Continue
    }

    /// Classify, echo and record a completed line.
    fn emit(&self, line: &str) {
        if self.interaction.should_output(line) {
            self.sink.out(line);
        }
        if self.interaction.should_output_to_err(line) {
            self.sink.err(line);
        }
        trace!("{}: {}", self.label, line);
        self.output.push(line.to_string());
    }

    async fn write(&self, stdin: &mut Option<ChildStdin>, answer: &Answer) {
        let Some(input) = stdin.as_mut() else {
            debug!(
                "{}: input already closed, dropping reply {:?}",
                self.label,
                answer.payload()
            );
            return;
        };

        debug!("{}: replying {:?}", self.label, answer.payload());
        let result = async {
            input.write_all(answer.payload().as_bytes()).await?;
            input.flush().await
        }
        .await;

        if let Err(e) = result {
            debug!("{}: failed to write reply: {}", self.label, e);
            *stdin = None;
            self.input_open.store(false, Ordering::SeqCst);
        }
    }

    async fn close_input(&self, stdin: &mut Option<ChildStdin>) {
        self.input_open.store(false, Ordering::SeqCst);
        if let Some(mut input) = stdin.take() {
            let _ = input.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_passes_ascii_through() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.decode(b"hello\n"), "hello\n");
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_decoder_joins_split_characters() {
        let bytes = "héllo ✓".as_bytes();
        let mut decoder = Utf8Decoder::default();

        // Split inside the two-byte 'é' and the three-byte '✓'
        let mut decoded = decoder.decode(&bytes[..2]);
        decoded.push_str(&decoder.decode(&bytes[2..bytes.len() - 1]));
        decoded.push_str(&decoder.decode(&bytes[bytes.len() - 1..]));

        assert_eq!(decoded, "héllo ✓");
    }

    #[test]
    fn test_decoder_replaces_invalid_bytes() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_decoder_flushes_truncated_tail() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.decode(&[b'x', 0xE2, 0x9C]), "x");
        assert_eq!(decoder.finish(), "\u{FFFD}");
    }
}
