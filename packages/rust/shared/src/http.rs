//! The HTTP client shared by every collaborator in a run.

use std::time::Duration;

use reqwest::Client;

use crate::error::{ContentPipeError, Result};

pub const USER_AGENT: &str = concat!("contentpipe/", env!("CARGO_PKG_VERSION"));

/// Build the pooled client. `request_timeout` bounds every request sent with it.
pub fn build_client(request_timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(request_timeout)
        .build()
        .map_err(|e| ContentPipeError::Network(format!("failed to build HTTP client: {e}")))
}

/// Map a transport error, keeping timeouts distinguishable.
pub fn transport_error(url: &str, err: reqwest::Error) -> ContentPipeError {
    if err.is_timeout() {
        ContentPipeError::Timeout(format!("{url}: {err}"))
    } else {
        ContentPipeError::Network(format!("{url}: {err}"))
    }
}
