use crate::ebay::auth::TokenPair;
use crate::ebay::config::EbayEndpoints;
use crate::http;
use crate::models::ListingRecord;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EbayPublishError {
    #[error("not authenticated with eBay; complete the OAuth exchange first")]
    NotAuthenticated,
    #[error("request failed: {0}")]
    Request(String),
    #[error("draft rejected: HTTP {status}: {message}")]
    Rejected { status: u16, message: String },
}

#[derive(Debug, Clone, Default)]
enum AuthPhase {
    #[default]
    Unauthenticated,
    Authenticated(TokenPair),
}

/// Values the draft payload needs that the pipeline cannot invent. All of
/// them must be supplied by the caller; there are no placeholder defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct DraftInputs {
    pub brand: String,
    pub condition: String,
    pub category_id: String,
    pub price: PriceInput,
    pub fulfillment_policy_id: String,
    pub payment_policy_id: String,
    pub return_policy_id: String,
    pub merchant_location_key: String,
    #[serde(default = "default_marketplace")]
    pub marketplace_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceInput {
    pub value: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_marketplace() -> String {
    "EBAY_US".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct DraftReceipt {
    pub listing_id: String,
}

/// Draft-listing client with two states. Publishing while Unauthenticated
/// fails before any byte goes over the wire; the OAuth exchange is the only
/// transition into Authenticated.
pub struct Publisher {
    endpoints: EbayEndpoints,
    http: Client,
    phase: AuthPhase,
}

impl Publisher {
    pub fn new(endpoints: EbayEndpoints) -> Self {
        Self {
            endpoints,
            http: http::client(),
            phase: AuthPhase::Unauthenticated,
        }
    }

    pub fn authenticated(endpoints: EbayEndpoints, tokens: TokenPair) -> Self {
        Self {
            endpoints,
            http: http::client(),
            phase: AuthPhase::Authenticated(tokens),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.phase, AuthPhase::Authenticated(_))
    }

    pub fn authenticate(&mut self, tokens: TokenPair) {
        self.phase = AuthPhase::Authenticated(tokens);
    }

    pub async fn create_draft(
        &self,
        record: &ListingRecord,
        image_urls: &[String],
        inputs: &DraftInputs,
    ) -> Result<DraftReceipt, EbayPublishError> {
        let AuthPhase::Authenticated(tokens) = &self.phase else {
            return Err(EbayPublishError::NotAuthenticated);
        };

        let payload = draft_payload(record, image_urls, inputs);
        let response = self
            .http
            .post(self.endpoints.draft_listing_url())
            .bearer_auth(&tokens.access_token)
            .header("X-EBAY-C-MARKETPLACE-ID", &inputs.marketplace_id)
            .json(&payload)
            .send()
            .await
            .map_err(|err| EbayPublishError::Request(err.to_string()))?;

        let status = response.status();
        if status.as_u16() != 201 {
            let message = response.text().await.unwrap_or_default();
            return Err(EbayPublishError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        #[derive(Deserialize)]
        struct DraftResponse {
            #[serde(default)]
            sku: Option<String>,
        }

        let body: DraftResponse = response
            .json()
            .await
            .map_err(|err| EbayPublishError::Request(err.to_string()))?;

        let listing_id = body
            .sku
            .filter(|sku| !sku.trim().is_empty())
            .unwrap_or_else(fallback_listing_id);
        Ok(DraftReceipt { listing_id })
    }
}

fn fallback_listing_id() -> String {
    format!("DRAFT-{}", Uuid::new_v4().simple())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftListingRequest {
    pub product: DraftProduct,
    pub condition: String,
    pub format: &'static str,
    pub marketplace_id: String,
    pub category_id: String,
    pub listing_policies: ListingPolicies,
    pub pricing_summary: PricingSummary,
    pub merchant_location_key: String,
    pub tax: TaxSettings,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftProduct {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub image_urls: Vec<String>,
    pub aspects: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPolicies {
    pub fulfillment_policy_id: String,
    pub payment_policy_id: String,
    pub return_policy_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PricingSummary {
    pub price: WirePrice,
}

#[derive(Debug, Clone, Serialize)]
pub struct WirePrice {
    pub value: String,
    pub currency: String,
}

impl WirePrice {
    pub fn from_amount(amount: f64, currency: &str) -> Self {
        Self {
            value: format!("{amount:.2}"),
            currency: currency.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxSettings {
    pub apply_tax: bool,
    pub vat_percentage: f64,
}

pub fn draft_payload(
    record: &ListingRecord,
    image_urls: &[String],
    inputs: &DraftInputs,
) -> DraftListingRequest {
    let mut aspects = BTreeMap::new();
    aspects.insert("Brand".to_string(), vec![inputs.brand.clone()]);
    aspects.insert("Condition".to_string(), vec![inputs.condition.clone()]);

    DraftListingRequest {
        product: DraftProduct {
            title: record.title.clone(),
            description: record.description.clone(),
            image_urls: image_urls.to_vec(),
            aspects,
        },
        condition: inputs.condition.clone(),
        format: "FIXED_PRICE",
        marketplace_id: inputs.marketplace_id.clone(),
        category_id: inputs.category_id.clone(),
        listing_policies: ListingPolicies {
            fulfillment_policy_id: inputs.fulfillment_policy_id.clone(),
            payment_policy_id: inputs.payment_policy_id.clone(),
            return_policy_id: inputs.return_policy_id.clone(),
        },
        pricing_summary: PricingSummary {
            price: WirePrice::from_amount(inputs.price.value, &inputs.price.currency),
        },
        merchant_location_key: inputs.merchant_location_key.clone(),
        tax: TaxSettings {
            apply_tax: true,
            vat_percentage: 0.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EbaySettings;

    fn endpoints() -> EbayEndpoints {
        EbayEndpoints::new(EbaySettings {
            client_id: "client".into(),
            client_secret: "secret".into(),
            redirect_uri: "https://example.com/callback".into(),
            sandbox: true,
        })
    }

    fn record() -> ListingRecord {
        ListingRecord {
            title: "Vintage Brown Leather Jacket".into(),
            description: "<p>Soft brown leather.</p>".into(),
            category: "Fashion > Men's Clothing > Coats & Jackets".into(),
            postage_weight: 1.4,
            suggested_price: None,
        }
    }

    fn inputs() -> DraftInputs {
        DraftInputs {
            brand: "Schott".into(),
            condition: "USED_EXCELLENT".into(),
            category_id: "57988".into(),
            price: PriceInput {
                value: 120.0,
                currency: "USD".into(),
            },
            fulfillment_policy_id: "fulfill-1".into(),
            payment_policy_id: "pay-1".into(),
            return_policy_id: "return-1".into(),
            merchant_location_key: "warehouse-1".into(),
            marketplace_id: "EBAY_US".into(),
        }
    }

    #[tokio::test]
    async fn create_draft_fails_fast_when_unauthenticated() {
        let publisher = Publisher::new(endpoints());
        let err = publisher
            .create_draft(&record(), &["https://img/0.jpg".into()], &inputs())
            .await
            .expect_err("must fail before any network call");
        assert!(matches!(err, EbayPublishError::NotAuthenticated));
    }

    #[test]
    fn oauth_exchange_is_the_only_way_in() {
        let mut publisher = Publisher::new(endpoints());
        assert!(!publisher.is_authenticated());
        publisher.authenticate(TokenPair {
            access_token: "access".into(),
            refresh_token: None,
        });
        assert!(publisher.is_authenticated());
    }

    #[test]
    fn draft_payload_serializes_in_ebay_wire_shape() {
        let payload = draft_payload(&record(), &["https://img/0.jpg".to_string()], &inputs());
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["product"]["title"], "Vintage Brown Leather Jacket");
        assert_eq!(value["product"]["imageUrls"][0], "https://img/0.jpg");
        assert_eq!(value["product"]["aspects"]["Brand"][0], "Schott");
        assert_eq!(value["format"], "FIXED_PRICE");
        assert_eq!(value["marketplaceId"], "EBAY_US");
        assert_eq!(value["categoryId"], "57988");
        assert_eq!(value["pricingSummary"]["price"]["value"], "120.00");
        assert_eq!(
            value["listingPolicies"]["fulfillmentPolicyId"],
            "fulfill-1"
        );
        assert_eq!(value["merchantLocationKey"], "warehouse-1");
        assert_eq!(value["tax"]["applyTax"], true);
    }

    #[test]
    fn wire_price_formats_two_decimals() {
        assert_eq!(WirePrice::from_amount(10.0, "USD").value, "10.00");
        assert_eq!(WirePrice::from_amount(9.999, "GBP").value, "10.00");
    }
}
