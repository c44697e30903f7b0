pub mod approval;
pub mod retry;

pub use crate::domain::ports::{ApprovalWorkflow, ConfigProvider, QuotationStore};
pub use crate::utils::error::Result;
