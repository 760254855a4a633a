//! Error types for stackward-remote.

use thiserror::Error;

/// Longest response body excerpt kept in a [`RemoteError::Status`].
const BODY_EXCERPT: usize = 512;

/// A failed remote call: transport, non-success status, or undecodable body.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("{method} {url} failed: {source}")]
    Transport {
        method: &'static str,
        url: String,
        #[source]
        source: Box<ureq::Transport>,
    },

    #[error("{method} {url} returned HTTP {status}: {body}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },

    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

impl RemoteError {
    pub(crate) fn from_ureq(method: &'static str, url: &str, err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => {
                let mut body = response.into_string().unwrap_or_default();
                if body.len() > BODY_EXCERPT {
                    let mut cut = BODY_EXCERPT;
                    while !body.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    body.truncate(cut);
                }
                RemoteError::Status {
                    method,
                    url: url.to_string(),
                    status,
                    body,
                }
            }
            ureq::Error::Transport(transport) => RemoteError::Transport {
                method,
                url: url.to_string(),
                source: Box::new(transport),
            },
        }
    }
}
