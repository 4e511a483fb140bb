pub(crate) const MAINNET_API_URL: &str = "https://pro.edgex.exchange";
pub(crate) const MAINNET_WS_URL: &str = "wss://quote.edgex.exchange";
pub(crate) const TESTNET_API_URL: &str = "https://testnet.edgex.exchange";
pub(crate) const TESTNET_WS_URL: &str = "wss://quote-testnet.edgex.exchange";
pub(crate) const LOCAL_API_URL: &str = "http://localhost:3001";
pub(crate) const LOCAL_WS_URL: &str = "ws://localhost:3001";

/// Tolerance for f64 size/price comparisons.
pub const EPSILON: f64 = 1e-9;

/// Contract whose ticker stream feeds the volatility window by default.
pub const DEFAULT_REFERENCE_CONTRACT: &str = "10000001";
