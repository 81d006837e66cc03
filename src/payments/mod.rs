//! Payment intents and the state machine that advances them.
//!
//! ```text
//! created --authorize ok--> authorized --capture ok--> captured --refund--> captured
//!    |  \--authorize fail--> failed          |
//!    \------------ void ok ------------------+--> canceled
//! ```

mod intents;
mod state_machine;

pub use intents::{create_payment_intent, get_intent_view, intent_view, list_intent_views};
pub use state_machine::{Operation, authorize, capture, execute, refund, void};
