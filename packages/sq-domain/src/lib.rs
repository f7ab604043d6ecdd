pub mod brief;
pub mod metrics;
pub mod product;
pub mod query;
pub mod selection;
pub mod text;

pub use brief::{Brief, BriefItem, BriefSolution};
pub use metrics::{JudgeAnalysis, Phase, PhaseMetrics, PhaseStats};
pub use product::{Origin, Product, ProductChange, derive_point_id, split_tags};
pub use query::{QueryFilters, QueryKind, QuerySpec, SourceRef};
pub use selection::{Candidate, JudgeReport, OutcomeStatus, Provenance, SelectionOutcome};
