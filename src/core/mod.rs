pub mod differ;
pub mod events;
pub mod executor;
pub mod planner;
pub mod scanner;

pub use differ::{CompareConfig, DiffEntry, DiffResult, Differ};
pub use events::{Event, EventHub, EventReceiver};
pub use executor::{ExecutionReport, Executor, OperationFailure};
pub use planner::Planner;
pub use scanner::{ScanConfig, TreeScanner};
