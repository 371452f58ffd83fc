//! Sisu curricula as Graphviz graphs
//!
//! Fetches degree programme structure from the Tampere University Sisu API
//! (with a local disk cache of raw responses), resolves module groups and
//! courses for one curriculum period, and renders a DOT file with clustered
//! modules and styled prerequisite edges.

pub mod api;
pub use api::{ApiError, Cache, CacheError, SisuApi, SisuClient};

pub mod domain;
pub use domain::{Course, Module, Node, ResolveError, Resolver, compress};

pub mod graph;
pub use graph::{RenderOptions, render, write_atomic};

pub mod supplement;
pub use supplement::Supplement;
