//! DNS MX resolution.
//!
//! [`MxResolver::resolve`] turns a domain into a [`MailRoute`]: published MX
//! hosts sorted by preference, the implicit A/AAAA route when no MX exists, or
//! a null MX. Answers are cached per ASCII domain.

mod cache;
mod error;
mod options;
mod resolver;
mod types;

pub use cache::MxResolver;
pub use error::DnsError;
pub use options::DnsOptions;
pub use resolver::{LookupFailure, LookupMx, system_resolver};
pub use types::{MailRoute, MxRecord, RouteKind};
