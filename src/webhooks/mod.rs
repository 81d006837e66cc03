//! Webhook dispatching: signed outbound events with bounded, backed-off retries,
//! and verification of inbound processor events.
//!
//! Outbound events are written inside the atomic unit that produced them but are
//! only handed to the [`TaskQueue`] after that unit commits. Workers then drive
//! each event `pending -> succeeded` or `pending -> failed`.

mod delivery;
mod events;
mod inbound;
mod queue;

pub use delivery::{DeliveryOutcome, deliver, http_client};
pub use events::{record_transaction_event, transaction_event_type};
pub use inbound::receive_processor_event;
pub use queue::{
    ChannelQueue, QueuedTask, RecordingQueue, TaskQueue, recover_pending, start_workers,
};

pub const SIGNATURE_HEADER: &str = "X-WEBHOOK-SIGNATURE";
pub const EVENT_TYPE_HEADER: &str = "X-WEBHOOK-EVENT-TYPE";
