//! Ticketeer SDK
//!
//! Shared library providing the ticket system capability trait, its data
//! types and the engine error type. Used by the engine and by anything that
//! wants to plug a different issue tracker into it.

/// Error types and handling
pub mod errors;

/// Ticket system capability trait and errors
pub mod ticket;

/// Ticket system data types
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, ErrorExt};
pub use ticket::{TicketError, TicketResult, TicketSystem};
pub use types::{
    normalize_issue_type, CommentAck, CreatedIssue, IssueComment, IssueSnapshot, NewIssue,
    TransitionAck,
};
