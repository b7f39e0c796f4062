//! Validation modules

pub mod url_safety;

pub use url_safety::{
    is_blocked_source_url, is_blocked_url, is_private_ip, verify_resolved_addresses,
};
