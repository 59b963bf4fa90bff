use crate::{PrimaryKey, Role, TokenRequest, User};

/// What the signed-in user is allowed to do.
/// Resolved once per session from the user's role and passed down to every view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    user_id: PrimaryKey,
    role: Role,
}

impl Capabilities {
    pub fn for_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            role: user.role,
        }
    }

    pub fn user_id(&self) -> PrimaryKey {
        self.user_id
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins see every request, users only their own
    pub fn can_view_all_requests(&self) -> bool {
        self.is_admin()
    }

    pub fn can_review_requests(&self) -> bool {
        self.is_admin()
    }

    pub fn can_edit_settings(&self) -> bool {
        self.is_admin()
    }

    /// Admins may change the amount of any request, requesters only while it's pending
    pub fn can_edit_request(&self, request: &TokenRequest) -> bool {
        self.is_admin() || (request.user_id == self.user_id && request.is_pending())
    }
}
