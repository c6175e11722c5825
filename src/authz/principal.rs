use uuid::Uuid;

/// Caller identity as resolved by the authentication boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    /// No credentials, or credentials that failed verification.
    Anonymous,
    User(Uuid),
}

impl Identity {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Identity::Anonymous => None,
            Identity::User(id) => Some(*id),
        }
    }
}

impl From<Uuid> for Identity {
    fn from(user_id: Uuid) -> Self {
        Identity::User(user_id)
    }
}
