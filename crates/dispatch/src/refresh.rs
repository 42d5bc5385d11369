//! Session refresh call
//!
//! The refresh operation is a POST to the backend's token endpoint, issued
//! through the general-purpose client. The backend validates the refresh
//! cookie and rotates the session cookies; the response body is not used.

use std::future::Future;
use std::pin::Pin;

use tracing::{debug, warn};
use transport::HttpRequest;

use crate::client::Client;
use crate::error::Result;

/// Renews the session credentials.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Refresher>`).
pub trait Refresher: Send + Sync {
    fn refresh(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Refresher that POSTs the refresh path through a general-purpose client.
///
/// The refresh path's key must be exempt from deduplication on that client's
/// tracker; `ClientSet` arranges this.
pub struct SessionRefresher {
    client: Client,
    path: String,
}

impl SessionRefresher {
    pub fn new(client: Client, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Refresher for SessionRefresher {
    fn refresh(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let request = HttpRequest::post(self.path()).tag("purpose", "session-refresh");
            match self.client.send(request).await {
                Ok(response) => {
                    debug!(status = response.status.as_u16(), "session refresh accepted");
                    Ok(())
                }
                Err(e) => {
                    warn!(error = %e, "session refresh rejected");
                    Err(e)
                }
            }
        })
    }
}
