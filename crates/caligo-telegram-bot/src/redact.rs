//! Log redaction
//!
//! Bot tokens end up in request URLs and error messages; every line written
//! by the fmt layer passes through [`Redactor`] first.

use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;

/// Ordered replacement rules for secrets
pub struct Redactor {
    rules: Vec<(Regex, &'static str)>,
}

impl Redactor {
    /// Compile the redaction rules.
    ///
    /// # Errors
    ///
    /// Returns an error if any pattern is invalid
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            rules: vec![
                (
                    Regex::new(r"(https?://[^/]+/(?:file/)?bot)([0-9]+:[A-Za-z0-9_-]+)")?,
                    "$1[TELEGRAM_TOKEN]",
                ),
                (
                    Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
                    "$1[TELEGRAM_TOKEN]",
                ),
                (
                    Regex::new(r"[0-9]{8,10}:[A-Za-z0-9_-]{35}")?,
                    "[TELEGRAM_TOKEN]",
                ),
                (
                    Regex::new(r"(TELEGRAM_TOKEN=)[^\s&]+")?,
                    "$1[MASKED]",
                ),
            ],
        })
    }

    /// Apply every rule in order.
    #[must_use]
    pub fn redact(&self, input: &str) -> String {
        self.rules
            .iter()
            .fold(input.to_string(), |text, (pattern, replacement)| {
                pattern.replace_all(&text, *replacement).into_owned()
            })
    }
}

/// Writer that redacts each buffer before forwarding it
pub struct RedactingWriter<W: Write> {
    inner: W,
    redactor: Arc<Redactor>,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let redacted = self.redactor.redact(&String::from_utf8_lossy(buf));
        self.inner.write_all(redacted.as_bytes())?;
        // The whole input buffer counts as written.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// `MakeWriter` wrapping another writer factory with redaction
pub struct RedactingMakeWriter<F> {
    make_inner: F,
    redactor: Arc<Redactor>,
}

impl<F> RedactingMakeWriter<F> {
    /// Wrap `make_inner`.
    pub const fn new(make_inner: F, redactor: Arc<Redactor>) -> Self {
        Self {
            make_inner,
            redactor,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
            redactor: Arc::clone(&self.redactor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsawA";

    fn redactor() -> Redactor {
        match Redactor::new() {
            Ok(r) => r,
            Err(e) => panic!("invalid pattern: {e}"),
        }
    }

    #[test]
    fn api_and_file_urls_lose_the_token() {
        let r = redactor();
        let api = format!("error sending request for url (https://api.telegram.org/bot{TOKEN}/getFile)");
        let file = format!("https://api.telegram.org/file/bot{TOKEN}/documents/file_1.pdf");

        let api = r.redact(&api);
        let file = r.redact(&file);
        assert!(!api.contains(TOKEN) && api.contains("/bot[TELEGRAM_TOKEN]/getFile"));
        assert!(!file.contains(TOKEN) && file.contains("/file/bot[TELEGRAM_TOKEN]/documents"));
    }

    #[test]
    fn bare_and_env_tokens_are_masked() {
        let r = redactor();
        assert_eq!(r.redact(TOKEN), "[TELEGRAM_TOKEN]");
        assert_eq!(r.redact("TELEGRAM_TOKEN=abc:def x"), "TELEGRAM_TOKEN=[MASKED] x");
        assert_eq!(r.redact("Download completed"), "Download completed");
    }

    #[test]
    fn writer_reports_original_length() {
        let redactor = Arc::new(redactor());
        let mut writer = RedactingWriter {
            inner: Vec::new(),
            redactor,
        };
        let line = format!("token {TOKEN}\n");

        let written = writer.write(line.as_bytes()).ok();
        assert_eq!(written, Some(line.len()));
        assert_eq!(String::from_utf8_lossy(&writer.inner), "token [TELEGRAM_TOKEN]\n");
    }
}
