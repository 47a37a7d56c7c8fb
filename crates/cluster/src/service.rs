//! Serialized cluster state updates.
//!
//! All metadata and block changes flow through one supervised actor. It is
//! the only writer of the published state slot; readers load the slot
//! without locking and always see a complete, committed state.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use cairn_metadata::{IndexMetadata, Metadata};
use cairn_worker::{ActorContext, ActorFlow, ActorHandle, ActorShutdownReport, ActorSpec, TaskClass, WorkerActor, spawn_supervised_actor};
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::blocks::{ClusterBlock, ClusterBlocks};
use crate::commit::{CommitReply, CommitWaiter};
use crate::config::{CairnConfig, NodeConfig, QueueConfig};
use crate::error::{ClusterError, Result};
use crate::indices::validate_index_name;
use crate::state::ClusterState;
use crate::task::{BlocksUpdate, ClusterEvent, StatePublisher, Transition, UpdateTask, panic_message};

type Publishers = Arc<RwLock<Vec<Arc<dyn StatePublisher>>>>;

/// Handle to the update queue and the published cluster state.
///
/// Cloning is cheap; all clones share one queue.
#[derive(Clone)]
pub struct ClusterService {
	inner: Arc<ServiceInner>,
}

struct ServiceInner {
	node: NodeConfig,
	slot: Arc<ArcSwap<ClusterState>>,
	publishers: Publishers,
	actor: ActorHandle<QueuedTask, ClusterEvent>,
}

impl std::fmt::Debug for ClusterService {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ClusterService")
			.field("node", &self.inner.node.name)
			.field("version", &self.inner.slot.load().version())
			.finish()
	}
}

impl ClusterService {
	/// Starts the update queue with `initial` as the published state.
	pub fn new(node: NodeConfig, queue: &QueueConfig, initial: ClusterState) -> Self {
		let slot = Arc::new(ArcSwap::from_pointee(initial));
		let publishers: Publishers = Arc::new(RwLock::new(Vec::new()));

		let actor_slot = Arc::clone(&slot);
		let actor_publishers = Arc::clone(&publishers);
		let spec = ActorSpec::new("cluster.state_update", TaskClass::Coordination, move || StateUpdateActor {
			slot: Arc::clone(&actor_slot),
			publishers: Arc::clone(&actor_publishers),
		})
		.capacity(queue.capacity.max(1));
		let actor = spawn_supervised_actor(spec);

		tracing::info!(node = %node.name, master = node.master, capacity = queue.capacity, "cluster.service.started");
		Self {
			inner: Arc::new(ServiceInner {
				node,
				slot,
				publishers,
				actor,
			}),
		}
	}

	/// Starts a service whose initial state holds the configured seed indices.
	pub fn from_config(config: &CairnConfig) -> Result<Self> {
		let mut builder = Metadata::new().builder();
		let mut blocks = ClusterBlocks::new();
		for seed in &config.indices {
			validate_index_name(&seed.name)?;
			if builder.contains(&seed.name) {
				return Err(ClusterError::IndexAlreadyExists { index: seed.name.clone() });
			}
			builder.put(Arc::new(IndexMetadata::new(seed.name.as_str()).with_settings(seed.settings.clone())));
			if seed.read_only {
				blocks = blocks.with_index_block(&seed.name, ClusterBlock::index_read_only());
			}
		}
		Ok(Self::new(config.node.clone(), &config.queue, ClusterState::new(builder.build(), blocks)))
	}

	pub fn node(&self) -> &NodeConfig {
		&self.inner.node
	}

	pub fn is_master(&self) -> bool {
		self.inner.node.master
	}

	/// Latest published state.
	pub fn state(&self) -> Arc<ClusterState> {
		self.inner.slot.load_full()
	}

	/// Subscribes to outcomes of tasks processed after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<ClusterEvent> {
		self.inner.actor.subscribe()
	}

	/// Registers a publisher invoked after every commit.
	pub fn add_publisher(&self, publisher: Arc<dyn StatePublisher>) {
		self.inner.publishers.write().push(publisher);
	}

	/// Enqueues a metadata transition.
	///
	/// Waits for queue capacity, not for the task to run; use the returned
	/// waiter for that.
	pub async fn submit_state_update_task(&self, source: impl Into<String>, task: impl UpdateTask) -> Result<CommitWaiter> {
		self.enqueue(source.into(), Transition::Metadata(Box::new(task))).await
	}

	/// Submits a task and waits for it to commit.
	pub async fn submit_and_wait(&self, source: impl Into<String>, task: impl UpdateTask, timeout: Option<Duration>) -> Result<Arc<ClusterState>> {
		self.submit_state_update_task(source, task).await?.wait_with(timeout, None).await
	}

	/// Enqueues a change of the block table, ordered with metadata tasks.
	pub async fn update_blocks(&self, source: impl Into<String>, update: impl FnOnce(&ClusterBlocks) -> ClusterBlocks + Send + 'static) -> Result<CommitWaiter> {
		let update: BlocksUpdate = Box::new(update);
		self.enqueue(source.into(), Transition::Blocks(update)).await
	}

	async fn enqueue(&self, source: String, transition: Transition) -> Result<CommitWaiter> {
		let (reply, waiter) = CommitWaiter::channel(source.clone());
		let task = QueuedTask { source, transition, reply };
		self.inner.actor.send(task).await.map_err(|_| ClusterError::QueueClosed)?;
		Ok(waiter)
	}

	/// Stops accepting tasks and drains the queue.
	///
	/// Tasks still queued when `timeout` elapses are dropped; their waiters
	/// observe an interrupted wait.
	pub async fn shutdown(&self, timeout: Duration) -> ActorShutdownReport {
		let report = self.inner.actor.shutdown_graceful_or_force(timeout).await;
		tracing::info!(node = %self.inner.node.name, completed = report.completed(), timed_out = report.timed_out(), "cluster.service.stopped");
		report
	}
}

pub(crate) struct QueuedTask {
	source: String,
	transition: Transition,
	reply: CommitReply,
}

struct StateUpdateActor {
	slot: Arc<ArcSwap<ClusterState>>,
	publishers: Publishers,
}

impl StateUpdateActor {
	async fn run(&self, task: QueuedTask, ctx: &ActorContext<ClusterEvent>) {
		let QueuedTask { source, transition, reply } = task;
		let current = self.slot.load_full();
		tracing::debug!(source = %source, version = current.version(), "cluster.task.dequeue");

		let outcome = compute(&source, transition, Arc::clone(&current)).await;
		let answer = match outcome {
			Ok(None) => {
				tracing::debug!(source = %source, version = current.version(), "cluster.task.unchanged");
				ctx.emit(ClusterEvent::Unchanged {
					task: source,
					version: current.version(),
				});
				Ok(current)
			}
			Ok(Some((metadata, blocks))) => {
				let next = Arc::new(current.successor(metadata, blocks));
				self.slot.store(Arc::clone(&next));
				self.publish(&source, &next);
				tracing::debug!(source = %source, version = next.version(), "cluster.task.commit");
				ctx.emit(ClusterEvent::Committed {
					task: source,
					version: next.version(),
				});
				Ok(next)
			}
			Err(error) => {
				tracing::warn!(source = %source, version = current.version(), error = %error, "cluster.task.failed");
				ctx.emit(ClusterEvent::Failed {
					task: source,
					error: error.clone(),
				});
				Err(error)
			}
		};

		// The submitter may have stopped waiting.
		let _ = reply.send(answer);
	}

	/// Hands `state` to every publisher. A panicking publisher is logged and skipped.
	fn publish(&self, source: &str, state: &Arc<ClusterState>) {
		let publishers = self.publishers.read().clone();
		for publisher in &publishers {
			if let Err(payload) = catch_unwind(AssertUnwindSafe(|| publisher.publish(state))) {
				tracing::warn!(source = %source, version = state.version(), panic = %panic_message(&*payload), "cluster.publish.panicked");
			}
		}
	}
}

/// Runs the transition on the blocking pool so slow tasks never stall the
/// async workers.
async fn compute(source: &str, transition: Transition, current: Arc<ClusterState>) -> Result<Option<(Metadata, ClusterBlocks)>> {
	let panicked = |message: String| ClusterError::TaskPanicked {
		task: source.to_string(),
		message,
	};
	let joined = tokio::task::spawn_blocking(move || catch_unwind(AssertUnwindSafe(|| transition.apply(&current)))).await;
	match joined {
		Ok(Ok(outcome)) => outcome,
		Ok(Err(payload)) => Err(panicked(panic_message(&*payload))),
		Err(err) => Err(panicked(err.to_string())),
	}
}

#[async_trait]
impl WorkerActor for StateUpdateActor {
	type Cmd = QueuedTask;
	type Evt = ClusterEvent;

	async fn handle(&mut self, cmd: Self::Cmd, ctx: &mut ActorContext<Self::Evt>) -> std::result::Result<ActorFlow, String> {
		self.run(cmd, ctx).await;
		Ok(ActorFlow::Continue)
	}
}
