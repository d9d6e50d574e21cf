//! Database repositories module
//!
//! This module contains all repository implementations for data access

pub mod user;
pub mod case;
pub mod checklist;
pub mod document;
pub mod invoice;
pub mod subscription;
pub mod message;
pub mod webhook;

// Re-export repositories
pub use user::UserRepository;
pub use case::CaseRepository;
pub use checklist::ChecklistRepository;
pub use document::DocumentRepository;
pub use invoice::InvoiceRepository;
pub use subscription::SubscriptionRepository;
pub use message::MessageRepository;
pub use webhook::WebhookRepository;
