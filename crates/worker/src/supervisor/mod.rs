use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

use crate::TaskClass;
use crate::mailbox::{Mailbox, MailboxReceiver, MailboxSender};

mod join_ctrl;

use join_ctrl::SupervisorJoinCtrl;

const EVENT_BUFFER: usize = 128;

/// Continuation directive from one actor command handling step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorFlow {
	Continue,
	/// Stop this actor instance. The supervisor does not restart it.
	Stop,
}

/// Why an actor instance exited.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ActorExit {
	Stopped,
	MailboxClosed,
	Cancelled,
	StartupFailed(String),
	HandlerFailed(String),
	Panicked,
	JoinFailed(String),
}

impl ActorExit {
	pub fn is_failure(&self) -> bool {
		matches!(self, Self::StartupFailed(_) | Self::HandlerFailed(_) | Self::Panicked | Self::JoinFailed(_))
	}
}

/// Supervisor restart policy.
#[derive(Debug, Clone)]
pub enum ActorRestartPolicy {
	Never,
	OnFailure { max_restarts: usize, backoff: Duration },
}

impl ActorRestartPolicy {
	/// Delay before the next generation, or `None` to retire the actor.
	fn backoff_after(&self, exit: &ActorExit, restarts_so_far: usize) -> Option<Duration> {
		let Self::OnFailure { max_restarts, backoff } = self else {
			return None;
		};
		(exit.is_failure() && restarts_so_far < *max_restarts).then_some(*backoff)
	}
}

impl Default for ActorRestartPolicy {
	fn default() -> Self {
		Self::OnFailure {
			max_restarts: 3,
			backoff: Duration::from_millis(50),
		}
	}
}

/// Shutdown mode for supervised actors.
#[derive(Debug, Clone, Copy)]
pub enum ActorShutdownMode {
	/// Cancel the running handler and discard queued commands.
	Immediate,
	/// Close the mailbox and let queued commands drain, up to `timeout`.
	Graceful { timeout: Duration },
}

/// Shutdown report for one actor.
#[derive(Debug, Clone)]
pub struct ActorShutdownReport {
	completed: bool,
	last_exit: Option<ActorExit>,
}

impl ActorShutdownReport {
	pub fn completed(&self) -> bool {
		self.completed
	}

	pub fn timed_out(&self) -> bool {
		!self.completed
	}

	pub fn last_exit(&self) -> Option<&ActorExit> {
		self.last_exit.as_ref()
	}
}

/// Actor trait executed by the supervisor.
///
/// Commands are handled strictly one at a time, in mailbox order.
#[async_trait]
pub trait WorkerActor: Send + 'static {
	type Cmd: Send + 'static;
	type Evt: Clone + Send + 'static;

	async fn on_start(&mut self, _ctx: &mut ActorContext<Self::Evt>) -> Result<(), String> {
		Ok(())
	}

	async fn on_stop(&mut self, _ctx: &mut ActorContext<Self::Evt>) {}

	async fn handle(&mut self, cmd: Self::Cmd, ctx: &mut ActorContext<Self::Evt>) -> Result<ActorFlow, String>;
}

/// Handed to every actor callback.
pub struct ActorContext<Evt> {
	events: broadcast::Sender<Evt>,
	cancel: CancellationToken,
}

impl<Evt> ActorContext<Evt>
where
	Evt: Clone + Send + 'static,
{
	/// Emits one actor event to subscribers. Events without subscribers are dropped.
	pub fn emit(&self, evt: Evt) {
		let _ = self.events.send(evt);
	}
}

/// Builder spec for one supervised actor.
pub struct ActorSpec<A>
where
	A: WorkerActor,
{
	name: String,
	class: TaskClass,
	capacity: usize,
	restart: ActorRestartPolicy,
	factory: Arc<dyn Fn() -> A + Send + Sync>,
}

impl<A> ActorSpec<A>
where
	A: WorkerActor,
{
	/// The factory runs once per generation, so restarted instances start from
	/// whatever shared state the closure captures.
	pub fn new(name: impl Into<String>, class: TaskClass, factory: impl Fn() -> A + Send + Sync + 'static) -> Self {
		Self {
			name: name.into(),
			class,
			capacity: 128,
			restart: ActorRestartPolicy::default(),
			factory: Arc::new(factory),
		}
	}

	/// Sets the mailbox capacity.
	///
	/// # Panics
	///
	/// Panics if `capacity` is zero.
	#[must_use]
	pub fn capacity(mut self, capacity: usize) -> Self {
		assert!(capacity > 0, "mailbox capacity must be > 0");
		self.capacity = capacity;
		self
	}

	#[must_use]
	pub fn restart(mut self, restart: ActorRestartPolicy) -> Self {
		self.restart = restart;
		self
	}
}

/// Counters shared by the supervisor task and the handle.
#[derive(Default)]
struct Ledger {
	generation: AtomicU64,
	restarts: AtomicUsize,
	last_exit: Mutex<Option<ActorExit>>,
}

impl Ledger {
	async fn record(&self, exit: ActorExit) {
		*self.last_exit.lock().await = Some(exit);
	}
}

/// Error returned when sending a command to an actor that no longer accepts work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ActorSendError {
	#[error("actor mailbox closed")]
	Closed,
}

/// Handle for one supervised actor.
///
/// Dropping the handle cancels the actor.
pub struct ActorHandle<Cmd, Evt>
where
	Cmd: Send + 'static,
	Evt: Clone + Send + 'static,
{
	name: String,
	tx: MailboxSender<Cmd>,
	rx: MailboxReceiver<Cmd>,
	events: broadcast::Sender<Evt>,
	cancel: CancellationToken,
	ledger: Arc<Ledger>,
	join_ctrl: Arc<SupervisorJoinCtrl>,
}

impl<Cmd, Evt> Drop for ActorHandle<Cmd, Evt>
where
	Cmd: Send + 'static,
	Evt: Clone + Send + 'static,
{
	fn drop(&mut self) {
		self.cancel.cancel();
		self.tx.close_now();
	}
}

impl<Cmd, Evt> ActorHandle<Cmd, Evt>
where
	Cmd: Send + 'static,
	Evt: Clone + Send + 'static,
{
	/// Generation of the current (or last) instance, starting at 1.
	pub fn generation(&self) -> u64 {
		self.ledger.generation.load(Ordering::Acquire)
	}

	pub fn restart_count(&self) -> usize {
		self.ledger.restarts.load(Ordering::Acquire)
	}

	/// Subscribes to actor events emitted after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<Evt> {
		self.events.subscribe()
	}

	/// Enqueues one command, waiting for mailbox capacity.
	///
	/// Fails once the actor is shut down or has been retired by its supervisor.
	pub async fn send(&self, cmd: Cmd) -> Result<(), ActorSendError> {
		self.tx.send(cmd).await.map_err(|_| ActorSendError::Closed)
	}

	async fn last_exit(&self) -> Option<ActorExit> {
		self.ledger.last_exit.lock().await.clone()
	}

	/// Shuts down this actor.
	///
	/// Commands still queued after an immediate shutdown are dropped, which
	/// closes any reply channels they carry.
	pub async fn shutdown(&self, mode: ActorShutdownMode) -> ActorShutdownReport {
		let completed = match mode {
			ActorShutdownMode::Immediate => {
				self.cancel.cancel();
				self.tx.close().await;
				self.join_ctrl.join_forever().await;
				drop(self.rx.drain().await);
				true
			}
			ActorShutdownMode::Graceful { timeout } => {
				self.tx.close().await;
				self.join_ctrl.join_with_timeout(timeout).await
			}
		};
		ActorShutdownReport {
			completed,
			last_exit: self.last_exit().await,
		}
	}

	/// Two-phase shutdown: graceful first, immediate on timeout.
	pub async fn shutdown_graceful_or_force(&self, timeout: Duration) -> ActorShutdownReport {
		let report = self.shutdown(ActorShutdownMode::Graceful { timeout }).await;
		if report.completed() {
			return report;
		}
		tracing::warn!(actor = %self.name, "graceful shutdown timed out; forcing immediate");
		self.shutdown(ActorShutdownMode::Immediate).await
	}
}

/// Owns the restart loop of one actor.
struct Supervisor<A: WorkerActor> {
	name: String,
	class: TaskClass,
	restart: ActorRestartPolicy,
	factory: Arc<dyn Fn() -> A + Send + Sync>,
	tx: MailboxSender<A::Cmd>,
	rx: MailboxReceiver<A::Cmd>,
	events: broadcast::Sender<A::Evt>,
	cancel: CancellationToken,
	ledger: Arc<Ledger>,
}

impl<A: WorkerActor> Supervisor<A> {
	async fn run(self) {
		let mut restarts = 0usize;
		while !self.cancel.is_cancelled() {
			let generation = self.ledger.generation.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
			let exit = self.run_generation().await;
			tracing::debug!(
				actor = %self.name,
				class = self.class.as_str(),
				generation,
				restarts,
				exit = ?exit,
				"worker.actor.exit"
			);
			let backoff = self.restart.backoff_after(&exit, restarts);
			self.ledger.record(exit).await;

			let Some(backoff) = backoff.filter(|_| !self.cancel.is_cancelled()) else {
				break;
			};
			restarts = restarts.wrapping_add(1);
			self.ledger.restarts.store(restarts, Ordering::Release);
			tracing::warn!(actor = %self.name, generation, restarts, "worker.actor.restart");
			tokio::select! {
				_ = self.cancel.cancelled() => break,
				_ = tokio::time::sleep(backoff) => {}
			}
		}
		if self.cancel.is_cancelled() && self.ledger.last_exit.lock().await.is_none() {
			self.ledger.record(ActorExit::Cancelled).await;
		}
		self.retire().await;
	}

	async fn run_generation(&self) -> ActorExit {
		let ctx = ActorContext {
			events: self.events.clone(),
			cancel: self.cancel.child_token(),
		};
		let instance = crate::spawn(self.class, run_actor_instance((self.factory)(), self.rx.clone(), ctx));
		match instance.await {
			Ok(exit) => exit,
			Err(err) if err.is_panic() => ActorExit::Panicked,
			Err(err) if err.is_cancelled() => ActorExit::Cancelled,
			Err(err) => ActorExit::JoinFailed(err.to_string()),
		}
	}

	/// No instance will consume the mailbox again: refuse new commands and
	/// drop the queued ones so their senders observe the shutdown.
	async fn retire(&self) {
		self.tx.close().await;
		let orphaned = self.rx.drain().await;
		if !orphaned.is_empty() {
			tracing::warn!(actor = %self.name, dropped = orphaned.len(), "worker.actor.retired");
		}
	}
}

/// Spawns a supervised actor.
pub fn spawn_supervised_actor<A>(spec: ActorSpec<A>) -> ActorHandle<A::Cmd, A::Evt>
where
	A: WorkerActor,
{
	let mailbox = Mailbox::new(spec.capacity);
	let (events, _) = broadcast::channel(EVENT_BUFFER);
	let cancel = CancellationToken::new();
	let ledger = Arc::new(Ledger::default());

	let supervisor = Supervisor {
		name: spec.name.clone(),
		class: spec.class,
		restart: spec.restart,
		factory: spec.factory,
		tx: mailbox.sender(),
		rx: mailbox.receiver(),
		events: events.clone(),
		cancel: cancel.clone(),
		ledger: Arc::clone(&ledger),
	};
	let supervisor_task = crate::spawn(spec.class, supervisor.run());

	ActorHandle {
		name: spec.name,
		tx: mailbox.sender(),
		rx: mailbox.receiver(),
		events,
		cancel,
		ledger,
		join_ctrl: Arc::new(SupervisorJoinCtrl::new(supervisor_task)),
	}
}

async fn run_actor_instance<A>(mut actor: A, rx: MailboxReceiver<A::Cmd>, mut ctx: ActorContext<A::Evt>) -> ActorExit
where
	A: WorkerActor,
{
	let token = ctx.cancel.clone();

	let started = tokio::select! {
		biased;
		_ = token.cancelled() => None,
		res = actor.on_start(&mut ctx) => Some(res),
	};
	match started {
		None => return ActorExit::Cancelled,
		Some(Err(err)) => return ActorExit::StartupFailed(err),
		Some(Ok(())) => {}
	}

	let exit = loop {
		let cmd = tokio::select! {
			biased;
			_ = token.cancelled() => break ActorExit::Cancelled,
			msg = rx.recv() => match msg {
				Some(cmd) => cmd,
				None => break ActorExit::MailboxClosed,
			},
		};

		let flow = tokio::select! {
			biased;
			_ = token.cancelled() => break ActorExit::Cancelled,
			res = actor.handle(cmd, &mut ctx) => res,
		};

		match flow {
			Ok(ActorFlow::Continue) => {}
			Ok(ActorFlow::Stop) => break ActorExit::Stopped,
			Err(err) => break ActorExit::HandlerFailed(err),
		}
	};

	actor.on_stop(&mut ctx).await;
	exit
}
