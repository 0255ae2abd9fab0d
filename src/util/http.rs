use futures::StreamExt;
use thiserror::Error;

/// Failure while reading a response body under a size cap.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Response too large (exceeds {0} bytes)")]
    TooLarge(usize),
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    Incomplete { expected: u64, received: usize },
}

/// Reads a response body, failing as soon as it would exceed `limit` bytes.
///
/// A declared `Content-Length` above the limit is rejected before reading.
/// A body shorter than its declared length is an error.
pub async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, BodyError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(BodyError::TooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(BodyError::TooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(BodyError::Incomplete {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
