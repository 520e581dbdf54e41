use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

static SHARED: Lazy<Client> = Lazy::new(build_client);

/// Shared HTTP client for all outbound vendor calls. `reqwest::Client` is a
/// cheap handle, so cloning the lazily built instance is the normal way to
/// hand it around.
pub fn client() -> Client {
    SHARED.clone()
}

pub fn build_client() -> Client {
    let timeout = std::env::var("HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(30);
    let connect = std::env::var("HTTP_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(5);
    Client::builder()
        .user_agent(concat!("snaplist-api/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(timeout))
        .connect_timeout(Duration::from_secs(connect))
        .build()
        .unwrap_or_else(|_| Client::new())
}
