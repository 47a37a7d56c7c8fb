//! Worker runtime primitives for cairn coordinators.
//!
//! * [`spawn`]: runtime entry that works inside or outside a Tokio runtime.
//! * [`Mailbox`]: bounded FIFO queue with backpressure.
//! * [`spawn_supervised_actor`]: single-consumer actor with restart policy and
//!   graceful/immediate shutdown.

mod class;
mod mailbox;
mod spawn;
mod supervisor;

pub use class::TaskClass;
pub use mailbox::{Mailbox, MailboxReceiver, MailboxSendError, MailboxSender};
pub use spawn::spawn;
pub use supervisor::{
	ActorContext, ActorExit, ActorFlow, ActorHandle, ActorRestartPolicy, ActorSendError, ActorShutdownMode, ActorShutdownReport, ActorSpec, WorkerActor,
	spawn_supervised_actor,
};
