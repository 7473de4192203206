//! WebSocket transport implementation using `tokio-tungstenite`.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{
    CloseFrame as WsCloseFrame, WebSocketConfig,
};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{
    CloseFrame, Connection, ConnectionId, Frame, Transport, TransportError,
};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Server-side connection over a plain TCP stream.
pub type ServerConnection = WebSocketConnection<TcpStream>;

/// Client-side connection as produced by [`connect`].
pub type ClientConnection = WebSocketConnection<MaybeTlsStream<TcpStream>>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
    config: WebSocketConfig,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self {
            listener,
            config: WebSocketConfig::default(),
        })
    }

    /// Caps the size of a single inbound message. Larger messages fail the
    /// read and end the connection.
    pub fn with_max_message_size(mut self, limit: usize) -> Self {
        self.config.max_message_size = Some(limit);
        self
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Incoming = PendingConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<PendingConnection, TransportError> {
        let (stream, remote) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::trace!(%remote, "accepted TCP stream");
        Ok(PendingConnection {
            stream,
            remote,
            config: self.config.clone(),
        })
    }
}

/// The parts of an upgrade request a gate may inspect.
pub struct UpgradeRequest<'a> {
    request: &'a Request,
}

impl UpgradeRequest<'_> {
    /// Raw query string without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.request.uri().query()
    }

    /// Value of a header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
    }
}

/// Why a gate refused an upgrade. Sent back as the HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub reason: String,
}

impl Rejection {
    fn to_response(&self) -> ErrorResponse {
        let mut response = ErrorResponse::new(Some(self.reason.clone()));
        *response.status_mut() = StatusCode::from_u16(self.status)
            .unwrap_or(StatusCode::BAD_REQUEST);
        response
    }
}

/// A TCP stream that has been accepted but not yet upgraded.
///
/// Nothing session-related exists yet; dropping it simply closes the socket.
pub struct PendingConnection {
    stream: TcpStream,
    remote: SocketAddr,
    config: WebSocketConfig,
}

impl PendingConnection {
    /// Address of the remote peer.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    /// Runs the WebSocket handshake, consulting `gate` before the
    /// `101 Switching Protocols` response is written.
    ///
    /// If the gate returns `Err`, the client receives the rejection as a
    /// plain HTTP response and [`TransportError::Rejected`] is returned.
    pub async fn upgrade<T, F>(
        self,
        gate: F,
    ) -> Result<(ServerConnection, T), TransportError>
    where
        F: FnOnce(&UpgradeRequest<'_>) -> Result<T, Rejection> + Send + Unpin,
        T: Send,
    {
        let remote = self.remote;
        let mut verdict: Option<Result<T, Rejection>> = None;

        let callback = |request: &Request,
                        response: Response|
         -> Result<Response, ErrorResponse> {
            let outcome = gate(&UpgradeRequest { request });
            let reply = match &outcome {
                Ok(_) => Ok(response),
                Err(rejection) => Err(rejection.to_response()),
            };
            verdict = Some(outcome);
            reply
        };

        let handshake = tokio_tungstenite::accept_hdr_async_with_config(
            self.stream,
            callback,
            Some(self.config),
        )
        .await;

        match (handshake, verdict) {
            (_, Some(Err(rejection))) => Err(TransportError::Rejected {
                status: rejection.status,
                reason: rejection.reason,
            }),
            (Ok(ws), Some(Ok(admitted))) => {
                let conn = WebSocketConnection::new(ws);
                tracing::debug!(
                    id = %conn.id(),
                    %remote,
                    "upgraded WebSocket connection"
                );
                Ok((conn, admitted))
            }
            (Err(e), _) => Err(TransportError::HandshakeFailed(
                io::Error::new(io::ErrorKind::InvalidData, e),
            )),
            (Ok(_), None) => Err(TransportError::HandshakeFailed(
                io::Error::other("handshake finished without the gate"),
            )),
        }
    }
}

/// A single WebSocket connection, owned by exactly one task.
pub struct WebSocketConnection<S> {
    id: ConnectionId,
    ws: WebSocketStream<S>,
}

impl<S> WebSocketConnection<S> {
    fn new(ws: WebSocketStream<S>) -> Self {
        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        Self { id, ws }
    }
}

impl<S> Connection for WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let msg = match frame {
            Frame::Data(data) => Message::Binary(data.into()),
            Frame::Ping(data) => Message::Ping(data.into()),
            Frame::Pong(data) => Message::Pong(data.into()),
            Frame::Close(close) => Message::Close(close.map(into_ws_close)),
        };
        self.ws.send(msg).await.map_err(send_error)
    }

    async fn recv(&mut self) -> Result<Option<Frame>, TransportError> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(Frame::Data(data.into())));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(Frame::Data(text.as_bytes().to_vec())));
                }
                Some(Ok(Message::Ping(data))) => {
                    return Ok(Some(Frame::Ping(data.into())));
                }
                Some(Ok(Message::Pong(data))) => {
                    return Ok(Some(Frame::Pong(data.into())));
                }
                Some(Ok(Message::Close(close))) => {
                    return Ok(Some(Frame::Close(close.map(|c| {
                        CloseFrame::new(c.code.into(), c.reason.as_str())
                    }))));
                }
                Some(Ok(Message::Frame(_))) => continue,
                Some(Err(tungstenite::Error::ConnectionClosed)) | None => {
                    return Ok(None);
                }
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        io::Error::new(io::ErrorKind::ConnectionReset, e),
                    ));
                }
            }
        }
    }

    async fn close(&mut self, frame: CloseFrame) -> Result<(), TransportError> {
        self.ws
            .close(Some(into_ws_close(frame)))
            .await
            .map_err(send_error)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Opens a client connection to `url`, presenting `bearer` in the
/// `Authorization` header.
pub async fn connect(
    url: &str,
    bearer: &str,
) -> Result<ClientConnection, TransportError> {
    let mut request = url.into_client_request().map_err(connect_error)?;
    let value = HeaderValue::from_str(&format!("Bearer {bearer}")).map_err(
        |e| {
            TransportError::ConnectFailed(io::Error::new(
                io::ErrorKind::InvalidInput,
                e,
            ))
        },
    )?;
    request.headers_mut().insert(AUTHORIZATION, value);

    let (ws, _) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(connect_error)?;
    let conn = WebSocketConnection::new(ws);
    tracing::debug!(id = %conn.id(), url, "connected");
    Ok(conn)
}

fn into_ws_close(frame: CloseFrame) -> WsCloseFrame {
    WsCloseFrame {
        code: CloseCode::from(frame.code),
        reason: frame.reason.into(),
    }
}

fn send_error(err: tungstenite::Error) -> TransportError {
    match err {
        err @ (tungstenite::Error::ConnectionClosed
        | tungstenite::Error::AlreadyClosed
        | tungstenite::Error::Protocol(
            tungstenite::error::ProtocolError::SendAfterClosing,
        )) => TransportError::ConnectionClosed(err.to_string()),
        tungstenite::Error::Io(e) => TransportError::SendFailed(e),
        other => TransportError::SendFailed(io::Error::new(
            io::ErrorKind::BrokenPipe,
            other,
        )),
    }
}

fn connect_error(err: tungstenite::Error) -> TransportError {
    match err {
        tungstenite::Error::Http(response) => TransportError::Rejected {
            status: response.status().as_u16(),
            reason: response
                .body()
                .as_deref()
                .map(|body| String::from_utf8_lossy(body).into_owned())
                .unwrap_or_default(),
        },
        tungstenite::Error::Io(e) => TransportError::ConnectFailed(e),
        other => TransportError::ConnectFailed(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            other,
        )),
    }
}
