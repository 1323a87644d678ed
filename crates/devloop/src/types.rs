/// State of a launched child, as recorded by its wrapper task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
	Running { pid: u32 },
	Exited { code: Option<i32> },
}

impl ProcessState {
	pub fn is_running(&self) -> bool {
		matches!(self, ProcessState::Running { .. })
	}
}

/// Lifecycle of a supervised application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
	Idle,
	Building,
	Running { pid: u32 },
	Exited { code: Option<i32> },
}

impl AppState {
	pub fn is_running(&self) -> bool {
		matches!(self, AppState::Running { .. })
	}
}

impl From<ProcessState> for AppState {
	fn from(state: ProcessState) -> Self {
		match state {
			ProcessState::Running { pid } => AppState::Running { pid },
			ProcessState::Exited { code } => AppState::Exited { code },
		}
	}
}

impl std::fmt::Display for AppState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			AppState::Idle => write!(f, "idle"),
			AppState::Building => write!(f, "building"),
			AppState::Running { pid } => write!(f, "running (pid {})", pid),
			AppState::Exited { code: Some(code) } => write!(f, "exited ({})", code),
			AppState::Exited { code: None } => write!(f, "exited (signal)"),
		}
	}
}
