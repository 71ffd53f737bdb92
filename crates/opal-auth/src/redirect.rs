//! Ephemeral loopback HTTP endpoint for the authorization-code flow.
//!
//! The identity platform redirects the user's browser to
//! `http://127.0.0.1:{port}{callback_path}?code=...&state=...`; the
//! listener captures the query parameters and serves a static
//! confirmation page. It keeps accepting connections until stopped, since
//! a user may reload the page, and releases its port on every exit path.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use crate::errors::Result;

const CONFIRMATION_PAGE: &str = "<!DOCTYPE html>\n<html>\n<head><title>Login complete</title></head>\n<body style=\"font-family: sans-serif; text-align: center; margin-top: 4em;\">\n<h1>You are signed in</h1>\n<p>You can close this tab and return to the launcher.</p>\n</body>\n</html>\n";

/// Query parameters captured from one redirect request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRedirect {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Loopback redirect listener bound to an OS-assigned port
#[derive(Debug)]
pub struct RedirectListener {
    port: u16,
    slot: Arc<Mutex<Option<CapturedRedirect>>>,
    task: JoinHandle<()>,
}

impl RedirectListener {
    /// Bind `127.0.0.1:0` and start serving the callback path
    pub async fn bind(callback_path: &str) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        let slot = Arc::new(Mutex::new(None));

        debug!("Redirect listener bound on 127.0.0.1:{}", port);
        let task = tokio::spawn(accept_loop(
            listener,
            callback_path.to_string(),
            Arc::clone(&slot),
        ));

        Ok(Self { port, slot, task })
    }

    pub fn local_port(&self) -> u16 {
        self.port
    }

    /// Take the captured redirect, if any. The first capture wins; later
    /// page reloads do not overwrite it.
    pub fn take_capture(&self) -> Option<CapturedRedirect> {
        self.slot.lock().ok()?.take()
    }

    /// Stop accepting and release the port. Idempotent; also runs on drop.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for RedirectListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    callback_path: String,
    slot: Arc<Mutex<Option<CapturedRedirect>>>,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Redirect listener accept failed: {}", e);
                continue;
            }
        };

        debug!("Redirect listener connection from {}", peer);
        if let Err(e) = handle_connection(stream, &callback_path, &slot).await {
            warn!("Redirect listener connection error: {}", e);
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    callback_path: &str,
    slot: &Mutex<Option<CapturedRedirect>>,
) -> std::io::Result<()> {
    let target = read_request_target(&mut stream).await?;

    let (status_line, matched) = match &target {
        Some(target) if target_path(target) == callback_path => ("HTTP/1.1 200 OK", true),
        Some(_) => ("HTTP/1.1 404 Not Found", false),
        None => ("HTTP/1.1 400 Bad Request", false),
    };

    if matched {
        let capture = parse_capture(target.as_deref().unwrap_or(""));
        if let Ok(mut guard) = slot.lock()
            && guard.is_none()
        {
            *guard = Some(capture);
        }
    }

    let response = format!(
        "{status_line}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        CONFIRMATION_PAGE.len(),
        CONFIRMATION_PAGE
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

/// Read until the end of the request line and return its target, e.g.
/// `/callback?code=abc&state=xyz`
async fn read_request_target(stream: &mut TcpStream) -> std::io::Result<Option<String>> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 512];

    while !buf.windows(2).any(|w| w == b"\r\n") {
        if buf.len() > 8192 {
            return Ok(None);
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let line_end = match buf.windows(2).position(|w| w == b"\r\n") {
        Some(pos) => pos,
        None => return Ok(None),
    };
    let request_line = String::from_utf8_lossy(&buf[..line_end]);

    let mut parts = request_line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET"), Some(target)) => Ok(Some(target.to_string())),
        _ => Ok(None),
    }
}

fn target_path(target: &str) -> &str {
    target.split('?').next().unwrap_or(target)
}

fn parse_capture(target: &str) -> CapturedRedirect {
    let mut capture = CapturedRedirect {
        code: None,
        state: None,
        error: None,
    };

    let Ok(url) = Url::parse(&format!("http://localhost{target}")) else {
        return capture;
    };

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => capture.code = Some(value.into_owned()),
            "state" => capture.state = Some(value.into_owned()),
            "error" => capture.error = Some(value.into_owned()),
            _ => {}
        }
    }

    capture
}
