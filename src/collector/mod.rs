//! Screeps memory collection
//!
//! Reads the metrics a bot keeps in its memory through the Screeps HTTP API.
//!
//! # Example
//!
//! ```ignore
//! use screeps_exporter::collector::{ScreepsClient, ScreepsCollector, Target};
//!
//! let target = Target::builder("mmo")
//!     .shard("shard2")
//!     .path("metrics")
//!     .token(token)
//!     .build()?;
//! let collector = ScreepsCollector::new(ScreepsClient::new(10_000)?, vec![target]);
//! ```

mod auth;
mod client;
mod decode;
mod scraper;
mod target;

pub use auth::{AuthMode, AuthState, Credentials};
pub use client::{
    MemoryResponse, RateLimit, ScreepsClient, RATE_LIMIT_REMAINING_HEADER, TOKEN_HEADER,
    USERNAME_HEADER,
};
pub use decode::{decode, decode_data, MetricRecord, MARKER_LEN};
pub use scraper::{
    rate_limit_metrics, target_up_metric, ScreepsCollector, RATE_LIMIT_REMAINING_METRIC,
    RATE_LIMIT_RESET_METRIC, SERVER_LABEL, TARGET_UP_METRIC,
};
pub use target::{Target, TargetBuilder};
