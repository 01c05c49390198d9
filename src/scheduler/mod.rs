//! Task-set scheduler: the state machine, its events and the actor that
//! serialises control requests with worker completions.

pub mod actor;
pub mod events;
pub mod messages;
pub mod state;

pub use actor::{SchedulerActor, SchedulerHandle};
pub use events::SchedulerEvent;
pub use messages::SchedulerCommand;
pub use state::{Dispatch, Scheduler, SchedulerSnapshot};
