//! HTTP middleware chain, outermost first: gzip, request log, signature
//! validate+sign, RSA decrypt, trusted subnet.

mod compress;
mod decrypt;
mod logging;
mod signature;
mod subnet;

pub use compress::compress;
pub use decrypt::decrypt;
pub use logging::request_log;
pub use signature::signature;
pub use subnet::trusted_subnet;

use std::sync::Arc;

use ipnet::IpNet;
use rsa::RsaPrivateKey;

/// Shared state for the payload-protection middleware. Each middleware
/// passes requests through untouched when its field is unset.
#[derive(Clone, Default)]
pub struct ProtectionConfig {
    pub key: Option<Arc<String>>,
    pub private_key: Option<Arc<RsaPrivateKey>>,
    pub trusted_subnet: Option<IpNet>,
}
