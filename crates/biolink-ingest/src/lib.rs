//! Biolink Ingest Library
//!
//! Remote image ingestion: given a user-supplied URL, refuse private targets, fetch
//! the resource under a hard deadline, check that it really is a bounded image, and
//! relay it into object storage through the signed upload broker.
//!
//! ```text
//! ValidatingUrl -> Fetching -> ValidatingContent -> Uploading -> DerivingUrls -> Done
//! ```
//!
//! The first failure is final. No stage retries and nothing is cached between calls.

pub mod fetcher;
pub mod gatekeeper;
pub mod pipeline;
pub mod resolver;

pub use fetcher::{BoundedFetcher, FetcherOptions, RawResponse};
pub use gatekeeper::validate_and_collect;
pub use pipeline::{IngestionPipeline, PipelineOptions};
pub use resolver::{PrivateAddressResolved, PublicAddressResolver, SystemResolver};
