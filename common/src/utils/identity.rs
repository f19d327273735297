/// Supplies the id stamped onto each query. Authentication happens elsewhere;
/// this crate only records who asked.
pub trait IdentityProvider: Send + Sync {
    fn current_user_id(&self) -> String;
}

/// Fixed identity, used when no auth collaborator is wired in.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    user_id: String,
}

impl StaticIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> String {
        self.user_id.clone()
    }
}
