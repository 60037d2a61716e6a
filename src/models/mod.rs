pub mod budget;
pub mod diesel_ulid;
pub mod event;
pub mod message;
pub mod queued_message;
pub mod shared;
pub mod task;
pub mod user;

pub use budget::{Budget, NewBudget};
pub use diesel_ulid::DieselUlid;
pub use event::{Event, EventDeadLetter, EventMetadata, NewEvent, NewEventDeadLetter};
pub use message::{Message, MessageRole, MessageStatus, NewMessage};
pub use queued_message::{EnqueueRequest, NewQueuedMessage, QueuedMessage, QueuedMessagePayload, QueuedMessageStatus};
pub use shared::Priority;
pub use task::{CreateTask, NewTask, Task, TaskStatus};
pub use user::{NewUser, ResponsePattern, User};
