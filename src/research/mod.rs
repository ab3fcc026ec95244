//! The research pipeline: plan, search fan-out, write, deliver

pub mod delivery;
pub mod model;
pub mod orchestrator;
pub mod planner;
pub mod search;
pub mod state;
pub mod writer;

pub use model::{
    DeliveryResult, FindingsSet, ReportArtifact, SearchDirective, SearchFinding, SearchPlan,
};
pub use orchestrator::{PipelineSettings, ResearchManager};
pub use state::PipelineState;

pub use delivery::deliver;
pub use planner::plan;
pub use search::search_all;
pub use writer::write;
