//! Live-fetch machinery: HTTP client, bounded retries, and the
//! selector-driven site fetcher.

mod http_client;
mod retry;
mod site;
mod user_agent;

pub use http_client::HttpClient;
pub use retry::fetch_with_retry;
pub use site::{
    is_trial_title, normalize_price, parse_listing, SiteConfig, SiteFetcher, TRIAL_KEYWORDS,
};
pub use user_agent::{random_user_agent, resolve_user_agent, IMPERSONATE_USER_AGENTS, USER_AGENT};
