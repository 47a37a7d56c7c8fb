use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

/// Mailbox send error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MailboxSendError {
	/// Mailbox is closed.
	#[error("mailbox closed")]
	Closed,
	/// Queue is full and non-blocking send was used.
	#[error("mailbox full")]
	Full,
}

struct Slots<T> {
	queue: VecDeque<T>,
	closed: bool,
}

struct Shared<T> {
	capacity: usize,
	slots: Mutex<Slots<T>>,
	/// Signalled when a message is pushed or the mailbox closes.
	readable: Notify,
	/// Signalled when a slot frees up or the mailbox closes.
	writable: Notify,
}

impl<T> Shared<T> {
	fn mark_closed(&self, slots: &mut Slots<T>) {
		slots.closed = true;
		self.readable.notify_waiters();
		self.writable.notify_waiters();
	}
}

/// Producer side. Any number of clones may send concurrently.
pub struct MailboxSender<T> {
	shared: Arc<Shared<T>>,
}

/// Consumer side. Clones share one queue and each message is delivered once.
pub struct MailboxReceiver<T> {
	shared: Arc<Shared<T>>,
}

/// Bounded FIFO mailbox with backpressure.
///
/// Senders wait for capacity instead of dropping, so every accepted message is
/// delivered exactly once and in submission order.
pub struct Mailbox<T> {
	shared: Arc<Shared<T>>,
}

impl<T> Clone for MailboxSender<T> {
	fn clone(&self) -> Self {
		Self {
			shared: Arc::clone(&self.shared),
		}
	}
}

impl<T> Clone for MailboxReceiver<T> {
	fn clone(&self) -> Self {
		Self {
			shared: Arc::clone(&self.shared),
		}
	}
}

impl<T> Mailbox<T> {
	/// # Panics
	///
	/// Panics if `capacity` is zero.
	pub fn new(capacity: usize) -> Self {
		assert!(capacity > 0, "mailbox capacity must be > 0");
		let slots = Slots {
			queue: VecDeque::with_capacity(capacity.min(1024)),
			closed: false,
		};
		Self {
			shared: Arc::new(Shared {
				capacity,
				slots: Mutex::new(slots),
				readable: Notify::new(),
				writable: Notify::new(),
			}),
		}
	}

	pub fn sender(&self) -> MailboxSender<T> {
		MailboxSender {
			shared: Arc::clone(&self.shared),
		}
	}

	pub fn receiver(&self) -> MailboxReceiver<T> {
		MailboxReceiver {
			shared: Arc::clone(&self.shared),
		}
	}
}

impl<T> MailboxSender<T> {
	/// Stops accepting messages. Already queued messages stay receivable.
	pub async fn close(&self) {
		let mut slots = self.shared.slots.lock().await;
		self.shared.mark_closed(&mut slots);
	}

	/// Like [`close`](Self::close), but gives up if the lock is contended.
	/// Usable from `Drop`.
	pub fn close_now(&self) {
		if let Ok(mut slots) = self.shared.slots.try_lock() {
			self.shared.mark_closed(&mut slots);
		}
	}

	/// Enqueues without waiting; fails with `Full` at capacity.
	pub async fn try_send(&self, msg: T) -> Result<(), MailboxSendError> {
		let mut slots = self.shared.slots.lock().await;
		if slots.closed {
			return Err(MailboxSendError::Closed);
		}
		if slots.queue.len() >= self.shared.capacity {
			return Err(MailboxSendError::Full);
		}
		slots.queue.push_back(msg);
		self.shared.readable.notify_one();
		Ok(())
	}

	/// Enqueues, waiting for a free slot when full.
	pub async fn send(&self, msg: T) -> Result<(), MailboxSendError> {
		loop {
			// Created before the capacity check so a pop in between is not missed.
			let freed = self.shared.writable.notified();
			{
				let mut slots = self.shared.slots.lock().await;
				if slots.closed {
					return Err(MailboxSendError::Closed);
				}
				if slots.queue.len() < self.shared.capacity {
					slots.queue.push_back(msg);
					self.shared.readable.notify_one();
					return Ok(());
				}
			}
			freed.await;
		}
	}

	pub async fn len(&self) -> usize {
		self.shared.slots.lock().await.queue.len()
	}
}

impl<T> MailboxReceiver<T> {
	/// Next message in FIFO order, or `None` once closed and empty.
	pub async fn recv(&self) -> Option<T> {
		loop {
			let pushed = self.shared.readable.notified();
			{
				let mut slots = self.shared.slots.lock().await;
				if let Some(msg) = slots.queue.pop_front() {
					self.shared.writable.notify_one();
					return Some(msg);
				}
				if slots.closed {
					return None;
				}
			}
			pushed.await;
		}
	}

	/// Takes every queued message out without delivering it.
	pub async fn drain(&self) -> Vec<T> {
		let drained: Vec<T> = self.shared.slots.lock().await.queue.drain(..).collect();
		self.shared.writable.notify_waiters();
		drained
	}
}
