mod audit_log;
mod customer;
mod idempotency_record;
mod ledger_entry;
mod merchant;
mod payment_intent;
mod payment_method;
mod transaction;
mod webhook_event;

pub use audit_log::*;
pub use customer::*;
pub use idempotency_record::*;
pub use ledger_entry::*;
pub use merchant::*;
pub use payment_intent::*;
pub use payment_method::*;
pub use transaction::*;
pub use webhook_event::*;
