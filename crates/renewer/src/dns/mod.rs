//! DNS-01 challenge support
//!
//! - [`DnsProvider`] - Trait for DNS provider implementations
//! - [`AliyunDnsProvider`] - Aliyun DNS (Alidns) RPC API
//! - [`DnsChallengeManager`] - Writes, waits on and removes challenge records

mod aliyun;
pub mod challenge;
mod provider;

pub use aliyun::AliyunDnsProvider;
pub use challenge::{ChallengeRecord, DnsChallengeManager};
pub use provider::{DnsProvider, DnsProviderError, DnsRecord, DnsResult, TXT_RECORD_TYPE};
