//! Service-token lifecycle: cache, exchange call, and single-flight refresh.

mod cache;
mod exchange;
mod exchanger;

pub use cache::{CacheLookup, ServiceToken, TokenCache};
pub use exchange::{ExchangedToken, GithubTokenExchange, TokenExchange, EXCHANGE_USER_AGENT};
pub use exchanger::CredentialExchanger;
