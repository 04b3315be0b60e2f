//! Text writer layered over an established connection.

use std::{
    borrow::Cow,
    io::{self, BufWriter, Write},
};

use encoding_rs::{EncoderResult, Encoding, UTF_8};

use super::transport::Connection;

/// Retries writes and flushes interrupted by a signal.
#[derive(Debug)]
pub struct Uninterruptible<W> {
    inner: W,
}

impl<W: Write> Uninterruptible<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for Uninterruptible<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            match self.inner.write(buf) {
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        loop {
            match self.inner.flush() {
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }
}

/// Encodes text with the configured character set and buffers it for the
/// underlying stream.
#[derive(Debug)]
pub struct ConnectionWriter<W: Write> {
    inner: BufWriter<Uninterruptible<W>>,
    encoding: &'static Encoding,
    auto_flush: bool,
}

impl<W: Write> ConnectionWriter<W> {
    pub fn new(stream: W, encoding: &'static Encoding, auto_flush: bool) -> Self {
        Self {
            inner: BufWriter::new(Uninterruptible::new(stream)),
            encoding,
            auto_flush,
        }
    }

    /// Write `text` in full, flushing afterwards when auto-flush is on.
    pub fn write_str(&mut self, text: &str) -> io::Result<()> {
        let bytes = encode_lossy(self.encoding, text);
        self.inner.write_all(&bytes)?;
        if self.auto_flush {
            self.inner.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    /// Flush buffered output and hand back the stream.
    pub fn into_stream(self) -> io::Result<W> {
        self.inner
            .into_inner()
            .map(Uninterruptible::into_inner)
            .map_err(|err| err.into_error())
    }
}

/// Encode `text`, writing `?` for characters the encoding cannot represent.
fn encode_lossy<'a>(encoding: &'static Encoding, text: &'a str) -> Cow<'a, [u8]> {
    if encoding == UTF_8 {
        return Cow::Borrowed(text.as_bytes());
    }
    let mut encoder = encoding.new_encoder();
    let mut out = Vec::with_capacity(text.len() + 16);
    let mut rest = text;
    loop {
        let (result, read) =
            encoder.encode_from_utf8_to_vec_without_replacement(rest, &mut out, true);
        rest = &rest[read..];
        match result {
            EncoderResult::InputEmpty => return Cow::Owned(out),
            EncoderResult::OutputFull => out.reserve(rest.len() + 16),
            EncoderResult::Unmappable(_) => {
                out.reserve(16);
                encoder.encode_from_utf8_to_vec_without_replacement("?", &mut out, false);
            }
        }
    }
}

impl ConnectionWriter<Connection> {
    /// Flush, then shut the connection down.
    pub fn close(self) -> io::Result<()> {
        let mut connection = self.into_stream()?;
        connection.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use encoding_rs::{SHIFT_JIS, UTF_8, WINDOWS_1252};
    use rstest::rstest;

    use super::*;

    /// Fails every other call with `Interrupted`.
    #[derive(Default)]
    struct Flaky {
        data: Vec<u8>,
        calls: usize,
        flushes: usize,
    }

    impl Write for Flaky {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls += 1;
            if self.calls % 2 == 1 {
                return Err(io::ErrorKind::Interrupted.into());
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushes += 1;
            if self.flushes == 1 {
                return Err(io::ErrorKind::Interrupted.into());
            }
            Ok(())
        }
    }

    #[rstest]
    fn retries_interrupted_operations() {
        let mut writer = Uninterruptible::new(Flaky::default());
        assert_eq!(writer.write(b"abc").expect("write"), 3);
        writer.flush().expect("flush");
        let inner = writer.into_inner();
        assert_eq!(inner.data, b"abc");
        assert_eq!(inner.flushes, 2);
    }

    #[rstest]
    fn auto_flush_pushes_each_line_through() {
        let mut writer = ConnectionWriter::new(Vec::new(), UTF_8, true);
        writer.write_str("one\n").expect("write");
        assert_eq!(writer.inner.get_ref().inner, b"one\n");
    }

    #[rstest]
    fn buffered_mode_holds_output_until_flush() {
        let mut writer = ConnectionWriter::new(Vec::new(), UTF_8, false);
        writer.write_str("one\n").expect("write");
        assert!(writer.inner.get_ref().inner.is_empty());
        writer.flush().expect("flush");
        assert_eq!(writer.into_stream().expect("stream"), b"one\n");
    }

    #[rstest]
    fn applies_configured_encoding() {
        let mut writer = ConnectionWriter::new(Vec::new(), WINDOWS_1252, true);
        writer.write_str("café").expect("write");
        assert_eq!(writer.into_stream().expect("stream"), b"caf\xe9");
    }

    #[rstest]
    #[case::latin1(WINDOWS_1252, "caf\u{e9} \u{65e5}\u{672c}", b"caf\xe9 ??".as_slice())]
    #[case::ascii_only(WINDOWS_1252, "plain", b"plain".as_slice())]
    #[case::shift_jis(SHIFT_JIS, "a\u{1F600}b", b"a?b".as_slice())]
    fn unmappable_characters_become_question_marks(
        #[case] encoding: &'static Encoding,
        #[case] text: &str,
        #[case] expected: &[u8],
    ) {
        let mut writer = ConnectionWriter::new(Vec::new(), encoding, true);
        writer.write_str(text).expect("write");
        assert_eq!(writer.into_stream().expect("stream"), expected);
    }
}
