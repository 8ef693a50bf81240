//! `OAuth2` provider adapters
//!
//! Each provider is implemented as a separate module with its own adapter
//! struct. Only endpoints and payload mapping differ between them.

pub mod google;
pub mod microsoft;
pub mod procore;

pub use google::GoogleAdapter;
pub use microsoft::MicrosoftAdapter;
pub use procore::ProcoreAdapter;

use std::sync::Arc;

use super::ProviderAdapter;
use crate::models::OAuth2Provider;

/// Adapter lookup table
#[must_use]
pub fn adapter_for(provider: OAuth2Provider) -> Arc<dyn ProviderAdapter> {
    match provider {
        OAuth2Provider::Google => Arc::new(GoogleAdapter),
        OAuth2Provider::Microsoft => Arc::new(MicrosoftAdapter),
        OAuth2Provider::Procore => Arc::new(ProcoreAdapter),
    }
}
