//! Action engine for Deskpilot.
//!
//! Queues computer actions from client connections for a single automation
//! worker, and schedules tasks so at most one runs at a time.

pub mod dispatch;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod processor;
pub mod scheduler;
pub mod task;
pub mod types;
pub mod worker;

pub use dispatch::{ActionDispatchQueue, ActionResult, Job, ResultHandle};
pub use error::{ActionError, DispatchError, SchedulerError, TaskError};
pub use executor::{ActionExecutor, HeadlessDesktop};
pub use gateway::{ActionGateway, Connection};
pub use processor::{AgentProcessor, ScriptedRunner, TaskOutcome, TaskProcessor, TaskRunner};
pub use scheduler::{FileUpload, FileWriter, QueueFileWriter, TaskScheduler, TickReport};
pub use task::{InMemoryTaskStore, NewTask, TaskStore};
pub use types::{
    ActionKind, ActionRequest, ActionResponse, ComputerAction, Coordinates, Task, TaskFile,
    TaskPriority, TaskStatus, TaskUpdate,
};
pub use worker::AutomationWorker;
