use std::sync::Arc;

use sl_domain::config::Config;
use sl_platform::{DeviceApi, TokenCache};

/// Shared application state passed to all API handlers.
///
/// Everything here is built once at startup and lives for the process:
/// the parsed config, the signature secret (read from the environment by
/// bootstrap), the token cache, and the device API client.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Shared secret for inbound signature verification.
    pub signature_secret: Arc<String>,
    /// Process-wide access-token cache; the only writer of the token.
    pub tokens: Arc<TokenCache>,
    pub devices: Arc<dyn DeviceApi>,
}
