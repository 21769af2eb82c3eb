//! The access log writer: every RBAC decision gets exactly one durable
//! record, allow or deny.
//!
//! A bounded, fire-and-forget sink sitting behind the storage adapter's
//! `access_logs` collection. Deny records are written synchronously since
//! the audit trail for a denial is a security invariant; allow records are
//! queued and drained by a background worker, with the oldest queued allow
//! record evicted if the queue is full rather than blocking the caller.

pub mod sink;
pub mod writer;

pub use sink::AccessLogSink;
pub use writer::AccessLogWriter;
