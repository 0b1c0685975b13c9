/*
 * This file is part of the Obvia ERP.
 *
 * Copyright (C) 2025 Kovács Dávid <kapcsolat@kovacsdavid.dev>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Fixed role set a Principal is drawn from (§3). New on top of the teacher's
/// `Claims`, which carries no role at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Advisor,
    Technician,
    Accountant,
    Customer,
}

impl Role {
    /// Roles permitted to view and rearrange the board. Customers get neither
    /// — they have no operational reason to see other customers' cars.
    pub const BOARD_ROLES: &'static [Role] =
        &[Role::Owner, Role::Advisor, Role::Technician, Role::Accountant];

    /// Roles permitted to move an appointment between statuses.
    pub const MOVE_ROLES: &'static [Role] = &[Role::Owner, Role::Advisor, Role::Technician];

    pub fn allows(&self, required: &[Role]) -> bool {
        required.contains(self)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Owner => "owner",
            Role::Advisor => "advisor",
            Role::Technician => "technician",
            Role::Accountant => "accountant",
            Role::Customer => "customer",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "advisor" => Ok(Role::Advisor),
            "technician" => Ok(Role::Technician),
            "accountant" => Ok(Role::Accountant),
            "customer" => Ok(Role::Customer),
            other => Err(format!("unknown role {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_roles_exclude_customer() {
        assert!(!Role::Customer.allows(Role::BOARD_ROLES));
        assert!(Role::Owner.allows(Role::BOARD_ROLES));
    }

    #[test]
    fn move_roles_exclude_accountant() {
        assert!(!Role::Accountant.allows(Role::MOVE_ROLES));
        assert!(Role::Technician.allows(Role::MOVE_ROLES));
    }
}
