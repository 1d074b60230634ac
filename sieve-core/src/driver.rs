use crate::{Connection, ErrorKind, Result};
use std::future::Future;

/// Entry point of a backend.
pub trait Driver: Default + Send + Sync {
    type Connection: Connection;

    /// URL scheme the driver accepts.
    const NAME: &'static str;

    fn connect(&self, url: &str) -> impl Future<Output = Result<Self::Connection>> + Send {
        Self::Connection::connect(url)
    }
}

/// Fails with [`ErrorKind::ConnectFailed`] unless `url` starts with `<scheme>://`.
pub fn expect_scheme(url: &str, scheme: &str) -> Result<()> {
    let matches = url
        .split_once("://")
        .is_some_and(|(prefix, _)| prefix.eq_ignore_ascii_case(scheme));
    if matches {
        return Ok(());
    }
    let error = ErrorKind::ConnectFailed {
        url: url.to_string(),
    }
    .into_error()
    .context(format!("Expected a URL starting with `{}://`", scheme));
    log::error!("{:#}", error);
    Err(error)
}

/// Wraps a failure to reach the backend as [`ErrorKind::ConnectFailed`].
pub fn connect_failed(error: crate::Error, url: &str) -> crate::Error {
    let error = error.context(ErrorKind::ConnectFailed {
        url: url.to_string(),
    });
    log::error!("{:#}", error);
    error
}
