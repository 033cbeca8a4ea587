//! Unread inbox polling for prospect replies.

pub mod inbox;

pub use inbox::{parse_reply, ImapInbox, InboundReply, InboxError, InboxPoller};
