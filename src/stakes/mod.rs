pub mod escalation;
pub mod policy;

pub use escalation::{calculate_stakes_after_matchday, recalculate_all_stakes_from_last_draw, StakeRunSummary};
pub use policy::{EscalationPolicy, StakePolicy};
