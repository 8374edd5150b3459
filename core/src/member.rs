//! Members, roles and the explicit acting-user context.

use crate::error::{Error, Result};
use crate::ids::MemberId;
use serde::{Deserialize, Serialize};

/// Role a member holds in the system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Full administrator
    Admin,
    /// Approver of requests and tickets
    Responsable,
    /// Legislative member (titular or alternate)
    Senator,
    /// Office staff acting as a delegate
    Staff,
}

impl Role {
    /// Storage code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Responsable => "RESPONSABLE",
            Self::Senator => "SENADOR",
            Self::Staff => "FUNCIONARIO",
        }
    }

    /// Parse a storage code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an unknown code.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "ADMIN" => Ok(Self::Admin),
            "RESPONSABLE" => Ok(Self::Responsable),
            "SENADOR" => Ok(Self::Senator),
            "FUNCIONARIO" => Ok(Self::Staff),
            other => Err(Error::Validation(format!("unknown role: {other}"))),
        }
    }
}

/// Whether a member owns quota by right or substitutes for someone who does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberKind {
    /// Principal member owning a quota entitlement
    Titular,
    /// Substitute for the given titular
    Alternate {
        /// The titular this member substitutes for
        titular: MemberId,
    },
    /// Neither (staff, administrators)
    Other,
}

/// A member of the legislative body or its staff.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Identifier
    pub id: MemberId,
    /// Display name
    pub full_name: String,
    /// Contact address for notifications
    pub email: Option<String>,
    /// System role
    pub role: Role,
    /// Titular/alternate relationship
    pub kind: MemberKind,
    /// Delegate (encargado) allowed to act on this member's behalf
    pub delegate: Option<MemberId>,
    /// Inactive members receive no new quota
    pub active: bool,
}

impl Member {
    /// Create an active member with no delegate.
    #[must_use]
    pub fn new(full_name: impl Into<String>, role: Role, kind: MemberKind) -> Self {
        Self {
            id: MemberId::new(),
            full_name: full_name.into(),
            email: None,
            role,
            kind,
            delegate: None,
            active: true,
        }
    }

    /// Set the delegate.
    #[must_use]
    pub const fn with_delegate(mut self, delegate: MemberId) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Set the contact address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Whether this member owns quota by right.
    #[must_use]
    pub const fn is_titular(&self) -> bool {
        matches!(self.kind, MemberKind::Titular)
    }

    /// Whether this member is an alternate of `titular`.
    #[must_use]
    pub fn is_alternate_of(&self, titular: MemberId) -> bool {
        matches!(self.kind, MemberKind::Alternate { titular: t } if t == titular)
    }

    /// The titular whose quota this member draws on, if any.
    #[must_use]
    pub const fn quota_owner(&self) -> Option<MemberId> {
        match self.kind {
            MemberKind::Titular => Some(self.id),
            MemberKind::Alternate { titular } => Some(titular),
            MemberKind::Other => None,
        }
    }

    /// Whether `actor` may act on this member's behalf: the member itself,
    /// its delegate, or an administrator.
    #[must_use]
    pub fn can_be_represented_by(&self, actor: &Actor) -> bool {
        actor.member_id == self.id
            || self.delegate == Some(actor.member_id)
            || actor.is_administrator()
    }
}

/// The authenticated caller, passed explicitly to every operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Acting member
    pub member_id: MemberId,
    /// Acting member's role
    pub role: Role,
}

impl Actor {
    /// Create an actor.
    #[must_use]
    pub const fn new(member_id: MemberId, role: Role) -> Self {
        Self { member_id, role }
    }

    /// Actor for a loaded member.
    #[must_use]
    pub const fn of(member: &Member) -> Self {
        Self::new(member.id, member.role)
    }

    /// Admin or responsable: may approve, reject and manage tickets.
    #[must_use]
    pub const fn is_administrator(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Responsable)
    }

    /// Full administrator: may reset periods and revert transfers.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    /// Fail with [`Error::Forbidden`] unless the actor is an administrator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Forbidden`] naming the attempted `action`.
    pub fn require_administrator(&self, action: &str) -> Result<()> {
        if self.is_administrator() {
            Ok(())
        } else {
            Err(Error::Forbidden(format!("{action} requires an administrator")))
        }
    }

    /// Fail with [`Error::Forbidden`] unless the actor holds the admin role.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Forbidden`] naming the attempted `action`.
    pub fn require_admin(&self, action: &str) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(Error::Forbidden(format!("{action} requires the admin role")))
        }
    }
}
