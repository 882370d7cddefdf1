//! Task orchestration: the result store, the bounded worker pool that fills
//! it, single-key regeneration, and the studio session that ties a mode and
//! a source photo to a run.

pub mod config;
pub mod events;
pub mod regenerate;
pub mod scheduler;
pub mod store;
pub mod studio;

pub use config::StudioConfig;
pub use regenerate::RegenerationController;
pub use scheduler::{RunSummary, TaskScheduler};
pub use store::{RecordState, RecordStatus, ResultRecord, ResultStore, StoreSnapshot};
pub use studio::{Download, Phase, Studio, StudioError};
