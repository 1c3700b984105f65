//! User agent handling for HTTP requests.

use rand::Rng;

pub const USER_AGENT: &str = "dealscout/0.3 (price research)";

/// Real browser user agents for impersonate mode. Retail sites serve
/// different markup (or a block page) to obvious bots, so live fetches
/// default to these.
pub const IMPERSONATE_USER_AGENTS: &[&str] = &[
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    // Chrome on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    // Chrome on Android
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36",
    // Firefox on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    // Safari on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
    // Edge on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
];

/// Get a random user agent for impersonate mode.
pub fn random_user_agent() -> &'static str {
    let idx = rand::rng().random_range(0..IMPERSONATE_USER_AGENTS.len());
    IMPERSONATE_USER_AGENTS[idx]
}

/// Resolve user agent from config value.
/// - None => impersonate a real browser
/// - "plain" => honest dealscout user agent
/// - other => custom user agent string
pub fn resolve_user_agent(config: Option<&str>) -> String {
    match config {
        None => random_user_agent().to_string(),
        Some("plain") => USER_AGENT.to_string(),
        Some(custom) => custom.to_string(),
    }
}
