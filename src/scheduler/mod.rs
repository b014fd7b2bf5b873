//! The scheduling core: observability predicate, candidate pool, target
//! ranking and selection, the stateful night loop, and the pure night
//! simulator.

pub mod clock;
pub mod focus;
pub mod milestones;
pub mod night;
pub mod observability;
pub mod pool;
pub mod ranker;
pub mod selector;
pub mod session;
pub mod simulator;
pub mod standards;

pub use clock::{Clock, ManualClock, SystemClock};
pub use milestones::{FocusResult, Milestone, NightMilestones};
pub use night::{ObservingLoop, RunOptions};
pub use observability::{is_observable, min_moon_separation_deg, ConstraintViolation, ObservingConstraints};
pub use ranker::{rank, SortKey, SortOrder};
pub use selector::{next_observable_target, RejectionReason, Selection, SelectorOutcome};
pub use session::SchedulerSession;
pub use simulator::{simulate_night, NightPlan, PlannedSlot};
