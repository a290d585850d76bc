/// Recording session state machine.
///
/// State transitions:
/// ```text
/// idle → pending-confirmation → active → stopping → idle
///   │            │                 ↑
///   │            └── no ──→ idle   │
///   └────────── no existing files ─┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Idle,
    PendingConfirmation,
    Active,
    Stopping,
}

impl RecordState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::PendingConfirmation)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::PendingConfirmation => "pending confirmation",
            Self::Active => "active",
            Self::Stopping => "stopping",
        }
    }
}
