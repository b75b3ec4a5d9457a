use std::fmt;
use std::path::PathBuf;

/// Rule a violation was raised by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViolationKind {
    /// A plugin is invoked outside the tool runner
    DirectInvocation,
    /// The runner has no drop-guard that records execution metrics
    MissingCleanup,
    /// A lifecycle state outside the approved set
    UnknownLifecycleState,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::DirectInvocation => write!(f, "direct-invocation"),
            ViolationKind::MissingCleanup => write!(f, "missing-cleanup"),
            ViolationKind::UnknownLifecycleState => write!(f, "unknown-lifecycle-state"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub kind: ViolationKind,
    /// Path relative to the scanned root
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    pub message: String,
}

impl Violation {
    pub fn new(kind: ViolationKind, path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: [{}] {}",
            self.path.display(),
            self.line,
            self.kind,
            self.message
        )
    }
}
