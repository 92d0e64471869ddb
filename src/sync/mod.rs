//! Message synchronization
//!
//! - `mirror` - ordered local copy of a conversation's messages
//! - `view` - derived thread view (separators, labels, ticks)
//! - `selection` - delete-mode selection
//! - `receipts` - read-state reconciliation
//! - `outbox` - composing and sending messages
//! - `engine` - the per-conversation state machine tying them together

pub mod engine;
pub mod mirror;
pub mod outbox;
pub mod receipts;
pub mod selection;
pub mod view;

pub use engine::{EngineState, SyncEngine, SyncEvent};
pub use mirror::Mirror;
pub use outbox::{MessageSender, SendGate, SendPermit};
pub use receipts::{plan_read_receipts, read_receipt_batch, reconcile_reads};
pub use selection::Selection;
pub use view::{build_thread_view, date_label, separator_flags, time_label, MessageView, ReadTick, ThreadView};
