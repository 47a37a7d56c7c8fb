/// Execution classes used for worker scheduling and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Serialized state transitions owned by a single consumer.
	Coordination,
	/// Housekeeping that can be delayed without affecting callers.
	Background,
}

impl TaskClass {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Coordination => "coordination",
			Self::Background => "background",
		}
	}
}
