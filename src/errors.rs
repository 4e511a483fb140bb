use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("Client error: status {status_code}: {error_message}")]
    ClientRequest {
        status_code: u16,
        error_message: String,
    },
    #[error("Server error: status {status_code}: {error_message}")]
    ServerRequest {
        status_code: u16,
        error_message: String,
    },
    #[error("Generic request error: {0}")]
    GenericRequest(String),
    #[error("Exchange error (code {code}): {message}")]
    Api { code: String, message: String },
    #[error("Json parse error: {0}")]
    JsonParse(String),
    #[error("Invalid float string")]
    FloatStringParse,
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Websocket error: {0}")]
    Websocket(String),
    #[error("Websocket send error: {0}")]
    WsSend(String),
    #[error("Order rejected by post-only check after {attempts} attempts")]
    MakerRejected { attempts: u32 },
    #[error("{op} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        op: &'static str,
        attempts: u32,
        last_error: String,
    },
    #[error("Unexpected order status: {0}")]
    UnexpectedOrderStatus(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Errors worth retrying: network-level failures and server-side (5xx)
    /// responses. Client errors, exchange rejections and parse failures are
    /// not retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::ServerRequest { .. } | Error::GenericRequest(_) | Error::Websocket(_)
        )
    }
}
