//! Newline-delimited JSON transport.
//!
//! Every message is one complete JSON-RPC object on a single line:
//!
//! ```text
//! {"jsonrpc":"2.0","id":1,"method":"eval_json","params":{...}}\n
//! {"jsonrpc":"2.0","id":1,"result":{...}}\n
//! ```

use std::io::{BufRead, BufReader, BufWriter, Stdin, Stdout, Write};

use crate::types::errors::CelError;
use crate::CelResult;

use super::protocol::{JsonRpcRequest, JsonRpcResponse};

/// Line-oriented JSON-RPC transport over any reader and writer.
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
}

/// Transport bound to the process's stdin and stdout.
pub type StdioTransport = LineTransport<BufReader<Stdin>, BufWriter<Stdout>>;

impl StdioTransport {
    pub fn stdio() -> Self {
        LineTransport::new(
            BufReader::new(std::io::stdin()),
            BufWriter::new(std::io::stdout()),
        )
    }
}

impl<R: BufRead, W: Write> LineTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Reads the next request. Blank lines are skipped; `Ok(None)` means EOF.
    ///
    /// A line that is not a valid request yields [`CelError::Json`] and the
    /// transport stays usable.
    pub fn read_message(&mut self) -> CelResult<Option<JsonRpcRequest>> {
        loop {
            let mut line = String::new();
            let bytes_read = self.reader.read_line(&mut line).map_err(CelError::Io)?;

            if bytes_read == 0 {
                return Ok(None);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = serde_json::from_str(trimmed)?;

            tracing::debug!(
                method = %request.method,
                id = ?request.id,
                "Received request"
            );

            return Ok(Some(request));
        }
    }

    /// Writes a response as compact JSON followed by a newline.
    pub fn write_response(&mut self, response: &JsonRpcResponse) -> CelResult<()> {
        let body = serde_json::to_string(response)?;

        self.writer.write_all(body.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;

        tracing::debug!(
            id = ?response.id,
            is_error = response.is_error(),
            "Sent response"
        );

        Ok(())
    }

    /// Consumes the transport, returning the writer.
    pub fn into_writer(self) -> W {
        self.writer
    }
}
