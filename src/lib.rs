pub mod cache;
pub mod config;
pub mod error;
pub mod input;
pub mod network;
pub mod overlap;
pub mod pipeline;
pub mod pool;
pub mod prediction;
pub mod report;
pub mod resolver;

pub use config::Config;
pub use error::{RegnetError, Result};
pub use network::{GraphAssembler, HubRecord, InteractionEdge, Layer, NodeKind, RegulatoryGraph};
pub use pipeline::{NetworkRun, Pipeline, StageReport};
pub use pool::{PoolResult, ResolutionPool};
pub use resolver::{PartnerSource, RemoteResolver, ResolutionOutcome};
