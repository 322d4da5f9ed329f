use tokio_util::sync::CancellationToken;

/// Cancellation signal bound to the lifetime of one request.
///
/// The server attaches a child of the connection token to every request.
/// Requests without this extension get a token that never fires.
#[derive(Debug, Clone, Default)]
pub struct RequestCancellation(CancellationToken);

impl RequestCancellation {
    pub fn new(token: CancellationToken) -> Self {
        Self(token)
    }

    pub fn token(&self) -> &CancellationToken {
        &self.0
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }

    /// Resolves once the request has been cancelled.
    pub async fn cancelled(&self) {
        self.0.cancelled().await;
    }
}

impl From<CancellationToken> for RequestCancellation {
    fn from(token: CancellationToken) -> Self {
        Self::new(token)
    }
}
