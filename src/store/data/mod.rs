mod analytics;
mod channel;
mod contact;
mod conversation;
mod field;
mod flow;
mod job;
mod message;
mod session;
mod tag;

pub use analytics::{AnalyticsEvent, AnalyticsEventType};
pub use channel::Channel;
pub use contact::Contact;
pub use conversation::Conversation;
pub use field::{FieldDefinition, FieldValue};
pub use flow::Flow;
pub use job::{Job, JobStatus, RESUME_FLOW_JOB, ResumePayload, WakeReason};
pub use message::{Message, MessageDirection, MessageStatus};
pub use session::{CallFrame, Session, SessionStatus};
pub use tag::{ContactTag, Tag};
