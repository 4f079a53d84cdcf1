//! Reverse proxy from this frontend to the backend API.
//!
//! Requests that no page route handles are matched against the configured
//! [`Rewrites`]; a match is forwarded verbatim by [`forward`].
//!
//! ```rust
//! use auto_ledger_frontend::proxy::RewriteRule;
//!
//! let rule = RewriteRule::new("/api/:path*", "http://localhost:9090/api/:path*").unwrap();
//! let url = rule.apply("/api/cars/7", Some("unit=km")).unwrap();
//! assert_eq!(url.as_str(), "http://localhost:9090/api/cars/7?unit=km");
//! ```

mod forward;
mod rewrite;

pub use forward::{forward, strip_hop_by_hop};
pub use rewrite::{ProxyConfigError, RewriteConfig, RewriteRule, Rewrites};
