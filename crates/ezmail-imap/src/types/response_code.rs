//! Response codes.

use super::{Capability, Flag, SeqNum, Uid, UidValidity};

/// Bracketed response code from a status response, e.g. `[UIDNEXT 4392]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// ALERT: human-readable message that must be shown to the user.
    Alert,
    /// AUTHENTICATIONFAILED (RFC 5530).
    AuthenticationFailed,
    /// CAPABILITY list sent inline.
    Capability(Vec<Capability>),
    /// NONEXISTENT: the mailbox does not exist (RFC 5530).
    NonExistent,
    /// PERMANENTFLAGS: flags that can be changed permanently.
    PermanentFlags(Vec<Flag>),
    /// READ-ONLY: mailbox selected as read-only.
    ReadOnly,
    /// READ-WRITE: mailbox selected as read-write.
    ReadWrite,
    /// TRYCREATE: mailbox doesn't exist, but can be created.
    TryCreate,
    /// UIDNEXT: next UID to be assigned.
    UidNext(Uid),
    /// UIDVALIDITY: unique identifier validity value.
    UidValidity(UidValidity),
    /// UNSEEN: first unseen message sequence number.
    Unseen(SeqNum),
    /// Any other code, by name.
    Unknown(String),
}
