pub mod payment_orchestrator;
pub mod transaction_status;
pub mod webhook_processor;
