//! Biolink Storage Library
//!
//! Relays validated image payloads into third-party object storage behind a signed
//! upload broker, and derives transformation URLs from the provider's canonical URL.
//!
//! # Destination layout
//!
//! Assets are namespaced per user: `{folder}/{user_id}` (e.g. `avatars/u1`). The
//! provider assigns the object id inside that folder. Folder construction is
//! centralized in the `keys` module so the signer and the uploader always agree.
//!
//! # Upload flow
//!
//! 1. Request a single-use `SignedUploadGrant` from the first-party signing endpoint.
//! 2. POST the payload, the grant fields and the canonical crop directive to the
//!    provider as multipart form data.
//!
//! Neither call is retried and grants are never cached.

pub mod broker;
pub mod factory;
pub mod keys;
pub mod provider;
pub mod signer;
pub mod transform;
pub mod traits;

// Re-export commonly used types
pub use broker::SignedUploadBroker;
pub use factory::create_upload_broker;
pub use keys::DestinationFolder;
pub use provider::ProviderUploader;
pub use signer::SigningClient;
pub use transform::{derive_thumbnail_url, CANONICAL_TRANSFORMATION, THUMBNAIL_SIZE};
pub use traits::UploadBroker;
