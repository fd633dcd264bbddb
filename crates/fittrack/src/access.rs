//! Route gating from the published [`AuthState`].

use fittrack_model::Role;

use crate::AuthState;

/// What a gated route should do for the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// The first reconciliation hasn't finished; show a loading view.
    Pending,
    /// Nobody is signed in.
    RedirectToLogin,
    /// Signed in, but without the required role.
    RedirectToHome,
    Allowed,
}

impl Access {
    /// Decides access to a route that needs a signed-in user and, if
    /// `required` is set, that role.
    pub fn evaluate(state: &AuthState, required: Option<Role>) -> Self {
        if !state.is_ready {
            return Self::Pending;
        }
        let Some(user) = &state.current_user else {
            return Self::RedirectToLogin;
        };
        match required {
            Some(role) if user.role != role => Self::RedirectToHome,
            _ => Self::Allowed,
        }
    }

    pub fn is_allowed(self) -> bool {
        self == Self::Allowed
    }

    /// The path to redirect to, if any.
    pub fn redirect_path(self) -> Option<&'static str> {
        match self {
            Self::RedirectToLogin => Some("/login"),
            Self::RedirectToHome => Some("/"),
            Self::Pending | Self::Allowed => None,
        }
    }
}
