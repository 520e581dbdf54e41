use crate::ebay::config::{EbayEndpoints, SELL_INVENTORY_SCOPE};
use crate::http;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use urlencoding::encode;

#[derive(Debug, Error)]
pub enum EbayAuthError {
    #[error("oauth request failed: {0}")]
    Request(String),
    #[error("oauth exchange rejected: HTTP {status}: {message}")]
    Rejected { status: u16, message: String },
}

/// Access/refresh token pair from a successful authorization-code exchange.
/// Lives only in the session that performed the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Build the user-consent URL the client redirects the seller to. The
/// authorization code comes back out of band on the configured redirect URI.
pub fn authorization_url(endpoints: &EbayEndpoints) -> String {
    format!(
        "{}?client_id={}&response_type=code&redirect_uri={}&scope={}",
        endpoints.authorize_base(),
        encode(endpoints.client_id()),
        encode(endpoints.redirect_uri()),
        encode(SELL_INVENTORY_SCOPE),
    )
}

pub async fn exchange_code(
    endpoints: &EbayEndpoints,
    code: &str,
) -> Result<TokenPair, EbayAuthError> {
    let client = http::client();
    let params = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", endpoints.redirect_uri()),
    ];

    let response = client
        .post(endpoints.token_url())
        .basic_auth(endpoints.client_id(), Some(endpoints.client_secret()))
        .form(&params)
        .send()
        .await
        .map_err(|err| EbayAuthError::Request(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(EbayAuthError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json::<TokenPair>()
        .await
        .map_err(|err| EbayAuthError::Request(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EbaySettings;

    #[test]
    fn authorization_url_carries_encoded_parameters() {
        let endpoints = EbayEndpoints::new(EbaySettings {
            client_id: "my client".into(),
            client_secret: "secret".into(),
            redirect_uri: "https://example.com/cb?x=1".into(),
            sandbox: true,
        });

        let url = authorization_url(&endpoints);
        assert!(url.starts_with("https://auth.sandbox.ebay.com/oauth2/authorize?"));
        assert!(url.contains("client_id=my%20client"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fexample.com%2Fcb%3Fx%3D1"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=https%3A%2F%2Fapi.ebay.com%2Foauth%2Fapi_scope%2Fsell.inventory"));
    }
}
