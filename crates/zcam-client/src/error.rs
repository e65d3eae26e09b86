//! Client error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("not connected")]
    NotConnected,

    #[error("already connected")]
    AlreadyConnected,

    #[error("send failed: {0}")]
    SendFailed(String),

    /// Control-plane call answered with a non-zero `code`
    #[error("{code} : {msg} [{desc}]")]
    Api { code: i64, msg: String, desc: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transport error: {0}")]
    Transport(#[from] zcam_transport::TransportError),
}
