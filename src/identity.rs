// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Caller identity and role claims.
//!
//! The engine never authenticates anyone. Callers arrive with an identity and
//! a role already verified by an external collaborator; this module only
//! models that claim and the elevated-role check.

use crate::base::UserId;
use crate::error::LoanError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role claim attached to a caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Librarian,
    #[default]
    User,
}

impl Role {
    /// Admins and librarians may view and act on loans of other users.
    pub fn is_elevated(self) -> bool {
        matches!(self, Role::Admin | Role::Librarian)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Librarian => "librarian",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = LoanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "librarian" => Ok(Role::Librarian),
            "user" => Ok(Role::User),
            other => Err(LoanError::invalid(format!("unknown role '{other}'"))),
        }
    }
}

/// A verified caller identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: UserId,
    pub username: String,
    pub role: Role,
    pub active: bool,
}

impl Caller {
    /// Creates an active caller.
    pub fn new(id: UserId, username: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            username: username.into(),
            role,
            active: true,
        }
    }

    /// Shorthand for an active caller with the plain `user` role.
    pub fn user(id: u32, username: impl Into<String>) -> Self {
        Self::new(UserId(id), username, Role::User)
    }

    /// Marks the caller as deactivated.
    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    /// Whether this caller may act on a loan owned by `owner`.
    pub fn can_act_for(&self, owner: UserId) -> bool {
        self.role.is_elevated() || self.id == owner
    }

    pub(crate) fn ensure_active(&self) -> Result<(), LoanError> {
        if self.active {
            Ok(())
        } else {
            Err(LoanError::Forbidden)
        }
    }
}
