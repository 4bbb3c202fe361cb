//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     public RouteTable + protected RouteTable
//!     → merge (protected wins on collision)
//!     → frozen inside the Gateway
//!
//! Per request:
//!     (method, path) → table.rs (exact lookup)
//!     → matched Route (access, quota category, handler) or miss → 404
//! ```
//!
//! # Design Decisions
//! - No patterns or prefixes: every endpoint is a literal path
//! - Access and quota are route attributes, read by the pipeline stages

pub mod route;
pub mod table;

pub use route::{Access, Handler, Route};
pub use table::RouteTable;
