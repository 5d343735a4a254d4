//! Garden Linux Release Database
//!
//! Keeps the release records of Garden Linux and answers questions about
//! them: which releases are maintained, which one is the latest, when a
//! release reaches its end of life.
//!
//! ## Features
//!
//! - **Lifecycle Derivation**: default maintenance windows for stable releases
//!   and chained end-of-life dates for patch releases
//! - **Queries**: filter by type, version prefix and lifecycle state
//! - **Multiple Formats**: JSON/YAML release files, shell/markdown tables,
//!   Mermaid Gantt charts
//! - **Validation**: per-type JSON Schemas for both version eras
//! - **Safe Writes**: checksums detect release files changed by someone else
//!
//! ## Architecture
//!
//! ```text
//!  release files ──► store ──► ReleaseRepository ──► query ──► fields ──► render
//!  (JSON / YAML)                 ▲          │
//!                                │          ▼
//!                 lifecycle (create, chain)  validate ──► store
//! ```

pub mod checksum;
pub mod clock;
pub mod config;
pub mod diff;
pub mod error;
pub mod fields;
pub mod git;
pub mod lifecycle;
pub mod query;
pub mod release;
pub mod render;
pub mod repository;
pub mod store;
pub mod validate;
pub mod version;

pub use checksum::{Checksum, ContentSnapshot};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::GlrdConfig;
pub use error::{GlrdError, Result};
pub use lifecycle::{LifecycleDeriver, LifecycleWarning, ReleaseRequest};
pub use query::Query;
pub use release::{Lifecycle, LifecycleDate, Release, ReleaseType};
pub use render::{OutputFormat, RenderOptions};
pub use repository::ReleaseRepository;
pub use store::{FileFormat, InputType, ReleaseStore, Source};
pub use version::Version;
