use crate::config::EbaySettings;

pub const SANDBOX_API_ROOT: &str = "https://api.sandbox.ebay.com";
pub const PRODUCTION_API_ROOT: &str = "https://api.ebay.com";

const SANDBOX_AUTHORIZE_URL: &str = "https://auth.sandbox.ebay.com/oauth2/authorize";
const PRODUCTION_AUTHORIZE_URL: &str = "https://auth.ebay.com/oauth2/authorize";

pub const SELL_INVENTORY_SCOPE: &str = "https://api.ebay.com/oauth/api_scope/sell.inventory";

/// Resolved eBay endpoints for this process. The sandbox flag picks the API
/// root once at startup; everything downstream derives its URLs from here.
#[derive(Debug, Clone)]
pub struct EbayEndpoints {
    settings: EbaySettings,
    api_root: String,
}

impl EbayEndpoints {
    pub fn new(settings: EbaySettings) -> Self {
        let api_root = if settings.sandbox {
            SANDBOX_API_ROOT
        } else {
            PRODUCTION_API_ROOT
        }
        .to_string();
        Self { settings, api_root }
    }

    /// Point the API root somewhere else, e.g. a mock server in tests.
    pub fn with_api_root(settings: EbaySettings, api_root: impl Into<String>) -> Self {
        Self {
            settings,
            api_root: api_root.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.settings.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.settings.client_secret
    }

    pub fn redirect_uri(&self) -> &str {
        &self.settings.redirect_uri
    }

    pub fn authorize_base(&self) -> &'static str {
        if self.settings.sandbox {
            SANDBOX_AUTHORIZE_URL
        } else {
            PRODUCTION_AUTHORIZE_URL
        }
    }

    pub fn token_url(&self) -> String {
        format!("{}/identity/v1/oauth2/token", self.api_root)
    }

    pub fn draft_listing_url(&self) -> String {
        format!("{}/sell/inventory/v1/inventory_item/draft", self.api_root)
    }
}
