//! Read-only queries over a snapshot: driver ranking, composite scores,
//! hierarchies and structural diagnostics.
pub mod drivers;
pub mod hierarchy;
pub mod topology;

pub use drivers::{net_score, rank_parents, top_drivers, DriverImpact, TopDrivers};
pub use hierarchy::{ancestor_chain, forest, subtree, AncestorChain, Subtree, SubtreeNode};
pub use topology::{diagnose, GraphDiagnostics};
