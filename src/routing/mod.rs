//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → router.rs (route lookup)
//!     → matcher.rs (segment-aligned prefix match)
//!     → Return: RouteMatch { route, remainder } or no match
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Resolve backend references
//!     → Reject duplicate prefixes
//!     → Sort by prefix length
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - Longest prefix wins

pub mod matcher;
pub mod router;

pub use matcher::PathPrefixMatcher;
pub use router::{Destination, Route, RouteError, RouteMatch, RouteTable};
