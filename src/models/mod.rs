//! Data models module
//!
//! This module contains all data structures used throughout the application

pub mod user;
pub mod case;
pub mod checklist;
pub mod document;
pub mod billing;
pub mod message;
pub mod visa;

// Re-export commonly used models
pub use user::{User, UserRole, CreateUserRequest, UpdateProfileRequest};
pub use case::{Case, CaseStatus, CreateCaseRequest, UpdateCaseRequest};
pub use checklist::{ChecklistTemplate, CaseChecklistItem};
pub use document::{Document, DocumentStatus, CreateDocumentRequest, ReviewDocumentRequest};
pub use billing::{
    Invoice, UserInvoice, Subscription, SubscriptionStatus, PaymentStatus, ProcessedWebhookEvent,
    CreateInvoiceRequest, CreateUserInvoiceRequest, CreateSubscriptionRequest, InvoiceScope,
    CheckoutCompletion, WebhookOutcome,
};
pub use message::{CaseMessage, CreateMessageRequest};
pub use visa::{VisaProgram, VisaCatalogue};
