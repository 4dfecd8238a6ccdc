use std::sync::Arc;

use super::store::TokenStore;

/// Which sessions a destination admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Dashboard, upload, profile: authenticated sessions only.
    Protected,
    /// Login and signup: unauthenticated sessions only.
    PublicOnly,
}

/// Where the presentation layer should send the user instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Login,
    Dashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Redirect(Destination),
}

/// Read-only view over the token store for route guards.
#[derive(Clone)]
pub struct SessionGate {
    store: Arc<TokenStore>,
}

impl SessionGate {
    pub fn new(store: Arc<TokenStore>) -> Self {
        Self { store }
    }

    pub fn check(&self, access: Access) -> GateDecision {
        decide(access, self.store.is_authenticated())
    }

    /// Whether protected operations may proceed right now.
    pub fn can_proceed(&self) -> bool {
        self.check(Access::Protected) == GateDecision::Allow
    }
}

fn decide(access: Access, authenticated: bool) -> GateDecision {
    match (access, authenticated) {
        (Access::Protected, true) | (Access::PublicOnly, false) => GateDecision::Allow,
        (Access::Protected, false) => GateDecision::Redirect(Destination::Login),
        (Access::PublicOnly, true) => GateDecision::Redirect(Destination::Dashboard),
    }
}
