use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use std::io::Cursor;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("model detection failed: {0}")]
    Detection(String),
    #[error("metric data missing: {0}")]
    MissingData(String),
    #[error("invalid response: {0} (body: {1})")]
    InvalidResponse(String, String),
    #[error("not supported by this gateway: {0}")]
    Unsupported(String),
    #[error("gateway redirected to HTTPS")]
    SwitchToHttps,
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Error::Transport(error.to_string())
    }
}

impl<'r> Responder<'r, 'static> for Error {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let (status, error) = match self {
            Error::Auth(s) => (
                Status::Forbidden,
                format!("<html><body><h3>403 Forbidden</h3>Error while authenticating to gateway: <code>{}</code></body></html>", s),
            ),
            Error::Transport(s) => (
                Status::ServiceUnavailable,
                format!("<html><body><h3>503 Service Unavailable</h3>Gateway unreachable: <code>{}</code></body></html>", s),
            ),
            _ => (
                Status::InternalServerError,
                format!(
                    "<html><body><h3>Unknown exception</h3><code>{:?}</code></body></html>",
                    self
                ),
            ),
        };

        Response::build()
            .status(status)
            .sized_body(error.len(), Cursor::new(error))
            .header(ContentType::new("text", "html"))
            .ok()
    }
}
