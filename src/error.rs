use thiserror::Error;

use crate::ws::MessageKind;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("message is not valid json: {0}")]
    Json(#[source] serde_json::Error),

    #[error("message has no string `type` tag")]
    MissingType,

    #[error("unknown message type `{0}`")]
    UnknownType(String),

    #[error("invalid `{kind}` payload: {source}")]
    Payload {
        kind: MessageKind,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectError {
    #[error("a connection is already {0}")]
    AlreadyActive(&'static str),

    #[error("reconnect attempts exhausted")]
    GaveUp,

    #[error("connection manager was disposed")]
    Disposed,
}

#[derive(Debug, Error)]
pub enum SocketError {
    #[error(transparent)]
    Handshake(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("handshake did not finish within {}ms", .0.as_millis())]
    Timeout(std::time::Duration),
}

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("invalid page url: {0}")]
    Url(#[from] url::ParseError),

    #[error("page url scheme `{0}` is not http or https")]
    UnsupportedScheme(String),

    #[error("page url has no host")]
    MissingHost,
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("playback of {url} rejected: {reason}")]
    Rejected { url: String, reason: String },
}
