use base64::Engine;

use x402::{
    encode_payment, PaymentRequiredBody, SchemeClient, SettlementInfo, UptoError, SCHEME_NAME,
};

/// Settlement response headers set by the resource server on a paid success.
pub const PAYMENT_RESPONSE_HEADER: &str = "x-payment-response";
pub const PAYMENT_SETTLED_HEADER: &str = "x-payment-settled";
pub const PAYMENT_TX_HASH_HEADER: &str = "x-payment-txhash";

/// HTTP client that automatically handles 402 payment responses.
///
/// Wraps `reqwest::Client`. On a 402 response, it parses the advertised
/// requirements, signs a ceiling authorization via the provided
/// [`SchemeClient`], and retries the request with an `X-Payment` header.
pub struct X402Client<S: SchemeClient> {
    http: reqwest::Client,
    scheme: S,
}

impl<S: SchemeClient> X402Client<S> {
    pub fn new(scheme: S) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .expect("failed to build HTTP client"),
            scheme,
        }
    }

    /// Create a client with a custom `reqwest::Client`.
    pub fn with_http_client(scheme: S, http: reqwest::Client) -> Self {
        Self { http, scheme }
    }

    /// Make a request, automatically paying a 402 challenge.
    /// Returns the final response and the settlement info, when present.
    pub async fn fetch(
        &self,
        url: &str,
        method: reqwest::Method,
    ) -> Result<(reqwest::Response, Option<SettlementInfo>), UptoError> {
        self.fetch_with_body(url, method, None).await
    }

    /// Make a request with an optional body, automatically paying a 402
    /// challenge.
    pub async fn fetch_with_body(
        &self,
        url: &str,
        method: reqwest::Method,
        body: Option<Vec<u8>>,
    ) -> Result<(reqwest::Response, Option<SettlementInfo>), UptoError> {
        let mut req = self.http.request(method.clone(), url);
        if let Some(ref b) = body {
            req = req.body(b.clone());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| UptoError::HttpError(format!("request failed: {e}")))?;

        if resp.status().as_u16() != 402 {
            return Ok((resp, None));
        }

        let challenge: PaymentRequiredBody = resp
            .json()
            .await
            .map_err(|e| UptoError::HttpError(format!("failed to parse 402 body: {e}")))?;

        let requirements = challenge
            .accepts
            .iter()
            .find(|r| r.scheme == SCHEME_NAME)
            .ok_or_else(|| {
                UptoError::UnsupportedScheme(format!(
                    "no upto entry in accepts: {:?}",
                    challenge
                        .accepts
                        .iter()
                        .map(|r| &r.scheme)
                        .collect::<Vec<_>>()
                ))
            })?;

        let payload = self.scheme.create_payment_payload(requirements).await?;
        let encoded = encode_payment(&payload)?;

        let mut req = self.http.request(method, url);
        req = req.header("X-Payment", &encoded);
        if let Some(b) = body {
            req = req.body(b);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| UptoError::HttpError(format!("paid request failed: {e}")))?;

        let settlement = resp
            .headers()
            .get(PAYMENT_RESPONSE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(decode_settlement_header);

        Ok((resp, settlement))
    }
}

/// Decode the base64 JSON settlement summary from `X-Payment-Response`.
pub fn decode_settlement_header(value: &str) -> Option<SettlementInfo> {
    base64::engine::general_purpose::STANDARD
        .decode(value)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
}
