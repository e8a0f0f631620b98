//! Raw HTTP/1.1 exchange handling over a decrypted byte stream.
//!
//! # Responsibilities
//! - Parse one request head at a time off the stream (no pipelining).
//! - Honour `Expect: 100-continue` with an interim response.
//! - Drain declared request bodies so keep-alive stays aligned.
//! - Write the fixed `200` response and decide connection reuse.
//!
//! Malformed input closes the connection without writing anything; a partial
//! or garbage response is never sent.

use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::ConnectionError;

/// Upper bound on the request line + headers. Anything larger is malformed.
const MAX_HEAD_BYTES: usize = 16 * 1024;
const MAX_HEADERS: usize = 64;

/// The response every request receives, fixed at server construction.
#[derive(Debug, Clone)]
pub(crate) struct FixedResponse {
    pub(crate) body: Bytes,
    pub(crate) delay: Option<Duration>,
}

/// The parts of a parsed request head the handler acts on.
#[derive(Debug)]
struct RequestHead {
    method: String,
    path: String,
    keep_alive: bool,
    expects_continue: bool,
    content_length: u64,
}

/// Serve request/response cycles on one connection until it closes.
///
/// Returns `Ok(())` on clean EOF or after a non-keep-alive response has been
/// flushed and the stream shut down.
pub(crate) async fn serve_connection<S>(
    mut stream: S,
    response: &FixedResponse,
) -> Result<(), ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(4096);

    loop {
        let head = match read_request_head(&mut stream, &mut buf).await? {
            Some(head) => head,
            // Peer closed between requests.
            None => return Ok(()),
        };
        debug!(
            method = %head.method,
            path = %head.path,
            keep_alive = head.keep_alive,
            "request received"
        );

        if head.expects_continue {
            stream.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await?;
            stream.flush().await?;
        }

        drain_body(&mut stream, &mut buf, head.content_length).await?;

        if let Some(delay) = response.delay {
            tokio::time::sleep(delay).await;
        }

        stream
            .write_all(&render_response(&response.body, head.keep_alive))
            .await?;
        stream.flush().await?;

        if !head.keep_alive {
            // Close strictly after the last response byte is flushed.
            stream.shutdown().await?;
            return Ok(());
        }
    }
}

/// Accumulate bytes until a full request head parses.
///
/// Returns `None` on clean EOF before any byte of a new request.
async fn read_request_head<S>(
    stream: &mut S,
    buf: &mut BytesMut,
) -> Result<Option<RequestHead>, ConnectionError>
where
    S: AsyncRead + Unpin,
{
    loop {
        if !buf.is_empty() {
            let parsed = {
                let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
                let mut req = httparse::Request::new(&mut headers);
                match req.parse(&buf[..]) {
                    Ok(httparse::Status::Complete(head_len)) => {
                        Some((head_len, interpret_head(&req)?))
                    }
                    Ok(httparse::Status::Partial) => {
                        if buf.len() > MAX_HEAD_BYTES {
                            return Err(ConnectionError::Parse("request head too large".into()));
                        }
                        None
                    }
                    Err(e) => return Err(ConnectionError::Parse(e.to_string())),
                }
            };
            if let Some((head_len, head)) = parsed {
                buf.advance(head_len);
                return Ok(Some(head));
            }
        }

        let read = stream.read_buf(buf).await?;
        if read == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(ConnectionError::Parse(
                "connection closed mid-request".into(),
            ));
        }
    }
}

/// Extract keep-alive, 100-continue, and body length from a complete head.
fn interpret_head(req: &httparse::Request<'_, '_>) -> Result<RequestHead, ConnectionError> {
    let version = req
        .version
        .ok_or_else(|| ConnectionError::Parse("missing HTTP version".into()))?;

    let mut connection: Option<String> = None;
    let mut expects_continue = false;
    let mut content_length = 0u64;

    for header in req.headers.iter() {
        if header.name.eq_ignore_ascii_case("connection") {
            connection = Some(String::from_utf8_lossy(header.value).into_owned());
        } else if header.name.eq_ignore_ascii_case("expect") {
            expects_continue = header.value.eq_ignore_ascii_case(b"100-continue");
        } else if header.name.eq_ignore_ascii_case("content-length") {
            content_length = std::str::from_utf8(header.value)
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .ok_or_else(|| ConnectionError::Parse("invalid Content-Length".into()))?;
        } else if header.name.eq_ignore_ascii_case("transfer-encoding") {
            return Err(ConnectionError::Parse(
                "chunked request bodies are not supported".into(),
            ));
        }
    }

    let keep_alive = match version {
        // HTTP/1.0 closes unless the client opts in.
        0 => connection_has_token(connection.as_deref(), "keep-alive"),
        // HTTP/1.1 keeps alive unless the client opts out.
        _ => !connection_has_token(connection.as_deref(), "close"),
    };

    Ok(RequestHead {
        method: req.method.unwrap_or("").to_owned(),
        path: req.path.unwrap_or("/").to_owned(),
        keep_alive,
        // Interim responses exist only in HTTP/1.1.
        expects_continue: expects_continue && version >= 1,
        content_length,
    })
}

fn connection_has_token(value: Option<&str>, token: &str) -> bool {
    value
        .map(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case(token)))
        .unwrap_or(false)
}

/// Read and discard exactly `remaining` body bytes, some of which may
/// already sit in `buf` behind the parsed head.
async fn drain_body<S>(
    stream: &mut S,
    buf: &mut BytesMut,
    mut remaining: u64,
) -> Result<(), ConnectionError>
where
    S: AsyncRead + Unpin,
{
    loop {
        let buffered = u64::min(buf.len() as u64, remaining) as usize;
        buf.advance(buffered);
        remaining -= buffered as u64;
        if remaining == 0 {
            return Ok(());
        }

        let read = stream.read_buf(buf).await?;
        if read == 0 {
            return Err(ConnectionError::Parse("connection closed mid-body".into()));
        }
    }
}

fn render_response(body: &Bytes, keep_alive: bool) -> Vec<u8> {
    let mut head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n",
        body.len()
    );
    if keep_alive {
        head.push_str("Connection: keep-alive\r\n");
    }
    head.push_str("\r\n");

    let mut rendered = head.into_bytes();
    rendered.extend_from_slice(body);
    rendered
}
