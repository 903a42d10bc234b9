use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::Address;

use x402::usd::parse_usdc_amount;
use x402::{usdc_for_network, PaymentRequirements, DEFAULT_MAX_TIMEOUT_SECONDS, SCHEME_NAME};

use crate::meter::{FullAmountMeter, Meter};

/// Payment configuration for a single gated route.
#[derive(Clone)]
pub struct RoutePaymentConfig {
    pub requirements: PaymentRequirements,
    pub meter: Arc<dyn Meter>,
}

/// Environment-driven knobs for the payment gate.
#[derive(Debug, Clone)]
pub struct PaymentGateConfig {
    pub facilitator_url: String,
    pub rate_limit_rpm: u64,
    pub allowed_origins: Vec<String>,
}

impl PaymentGateConfig {
    pub fn from_env(facilitator_url: &str) -> Self {
        let rate_limit_rpm: u64 = std::env::var("RATE_LIMIT_RPM")
            .ok()
            .and_then(|r| r.parse().ok())
            .unwrap_or(60);

        let allowed_origins: Vec<String> = std::env::var("ALLOWED_ORIGINS")
            .ok()
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            facilitator_url: facilitator_url.to_string(),
            rate_limit_rpm,
            allowed_origins,
        }
    }
}

/// Holds payment configuration for all gated routes.
pub struct PaymentConfig {
    pub routes: HashMap<String, RoutePaymentConfig>,
    pub facilitator_url: String,
}

/// Builder registering priced routes on a network.
///
/// Route setup fails (panics) on an unknown network or unparseable price:
/// both are deployment mistakes that must not reach serving.
pub struct PaymentConfigBuilder {
    network: String,
    pay_to: Address,
    facilitator_url: String,
    routes: HashMap<String, RoutePaymentConfig>,
}

impl PaymentConfigBuilder {
    pub fn new(network: &str, pay_to: Address, facilitator_url: &str) -> Self {
        Self {
            network: network.to_string(),
            pay_to,
            facilitator_url: facilitator_url.to_string(),
            routes: HashMap::new(),
        }
    }

    /// Register a flat-priced route: the full amount settles every time.
    pub fn route(self, method: &str, path: &str, price: &str, description: Option<&str>) -> Self {
        self.metered_route(method, path, price, Arc::new(FullAmountMeter), description)
    }

    /// Register a metered route: `price` is the ceiling advertised in the
    /// 402; `meter` decides the settled amount per request. The settlement
    /// asset defaults to the network's USDC.
    pub fn metered_route(
        self,
        method: &str,
        path: &str,
        price: &str,
        meter: Arc<dyn Meter>,
        description: Option<&str>,
    ) -> Self {
        let asset = usdc_for_network(&self.network)
            .unwrap_or_else(|| panic!("no default asset for network {}", self.network));
        self.metered_route_with_asset(method, path, price, asset, meter, description)
    }

    /// Register a metered route settling in an explicit token instead of the
    /// network default.
    pub fn metered_route_with_asset(
        mut self,
        method: &str,
        path: &str,
        price: &str,
        asset: Address,
        meter: Arc<dyn Meter>,
        description: Option<&str>,
    ) -> Self {
        let max_amount = parse_usdc_amount(price)
            .unwrap_or_else(|e| panic!("failed to parse price {price}: {e}"));

        let key = format!("{method} {path}");
        self.routes.insert(
            key,
            RoutePaymentConfig {
                requirements: PaymentRequirements {
                    scheme: SCHEME_NAME.to_string(),
                    network: self.network.clone(),
                    asset,
                    max_amount: max_amount.to_string(),
                    pay_to: self.pay_to,
                    max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
                    description: description.map(String::from),
                    mime_type: Some("application/json".to_string()),
                },
                meter,
            },
        );
        self
    }

    pub fn build(self) -> PaymentConfig {
        PaymentConfig {
            routes: self.routes,
            facilitator_url: self.facilitator_url,
        }
    }
}

impl PaymentConfig {
    /// Look up the payment config for `"METHOD path"`.
    pub fn get_route(&self, method: &str, path: &str) -> Option<&RoutePaymentConfig> {
        let key = format!("{method} {path}");
        self.routes.get(&key)
    }
}

/// Shared state for a resource server using the payment gate.
pub struct ServerState {
    pub config: PaymentConfig,
    pub http: reqwest::Client,
}

#[cfg(test)]
mod tests {
    use super::*;
    use x402::{BASE_SEPOLIA_NETWORK, BASE_SEPOLIA_USDC};

    #[test]
    fn test_builder_registers_routes() {
        let config = PaymentConfigBuilder::new(
            BASE_SEPOLIA_NETWORK,
            Address::with_last_byte(0x77),
            "http://localhost:4402",
        )
        .route("GET", "/data", "$1.00", Some("dataset"))
        .route("POST", "/submit", "$0.01", None)
        .build();

        assert_eq!(config.routes.len(), 2);

        let r = &config.get_route("GET", "/data").unwrap().requirements;
        assert_eq!(r.scheme, "upto");
        assert_eq!(r.network, "eip155:84532");
        assert_eq!(r.asset, BASE_SEPOLIA_USDC);
        assert_eq!(r.max_amount, "1000000");
        assert_eq!(r.description.as_deref(), Some("dataset"));

        let r2 = &config.get_route("POST", "/submit").unwrap().requirements;
        assert_eq!(r2.max_amount, "10000");
    }

    #[test]
    fn test_explicit_asset_overrides_network_default() {
        let custom = Address::with_last_byte(0xaa);
        let config = PaymentConfigBuilder::new(BASE_SEPOLIA_NETWORK, Address::ZERO, "http://x")
            .metered_route_with_asset(
                "GET",
                "/alt",
                "$0.10",
                custom,
                Arc::new(FullAmountMeter),
                None,
            )
            .build();

        let r = &config.get_route("GET", "/alt").unwrap().requirements;
        assert_eq!(r.asset, custom);
        assert_eq!(r.max_amount, "100000");
    }

    #[test]
    fn test_unknown_route_is_none() {
        let config = PaymentConfigBuilder::new(
            BASE_SEPOLIA_NETWORK,
            Address::ZERO,
            "http://localhost:4402",
        )
        .route("GET", "/data", "$1.00", None)
        .build();

        assert!(config.get_route("GET", "/other").is_none());
        assert!(config.get_route("POST", "/data").is_none());
    }

    #[test]
    #[should_panic(expected = "no default asset")]
    fn test_unknown_network_fails_route_setup() {
        let _ = PaymentConfigBuilder::new("eip155:1", Address::ZERO, "http://localhost:4402")
            .route("GET", "/data", "$1.00", None);
    }

    #[test]
    #[should_panic(expected = "failed to parse price")]
    fn test_bad_price_fails_route_setup() {
        let _ = PaymentConfigBuilder::new(BASE_SEPOLIA_NETWORK, Address::ZERO, "http://x")
            .route("GET", "/data", "not-a-price", None);
    }
}
