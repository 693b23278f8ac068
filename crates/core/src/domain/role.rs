use serde::{Deserialize, Serialize};

/// The closed set of staff roles the workflow engine recognises. Authorization
/// decisions compare these values, never free-form strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Employee,
    SalesAgent,
    SalesExecutive,
    GeneralManager,
    ManagingDirector,
    ExecutiveDirector,
    Cashier,
    StoreManager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::SalesAgent => "sales_agent",
            Self::SalesExecutive => "sales_executive",
            Self::GeneralManager => "general_manager",
            Self::ManagingDirector => "managing_director",
            Self::ExecutiveDirector => "executive_director",
            Self::Cashier => "cashier",
            Self::StoreManager => "store_manager",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "employee" => Some(Self::Employee),
            "sales_agent" => Some(Self::SalesAgent),
            "sales_executive" => Some(Self::SalesExecutive),
            "general_manager" => Some(Self::GeneralManager),
            "managing_director" => Some(Self::ManagingDirector),
            "executive_director" => Some(Self::ExecutiveDirector),
            "cashier" => Some(Self::Cashier),
            "store_manager" => Some(Self::StoreManager),
            _ => None,
        }
    }

    /// Human-readable form used in notifications and rendered documents.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Employee => "Employee",
            Self::SalesAgent => "Sales Agent",
            Self::SalesExecutive => "Sales Executive",
            Self::GeneralManager => "General Manager",
            Self::ManagingDirector => "Managing Director",
            Self::ExecutiveDirector => "Executive Director",
            Self::Cashier => "Cashier",
            Self::StoreManager => "Store Manager",
        }
    }
}

/// The server-validated acting identity for a single operation.
///
/// A principal is only ever built from a staff directory row, so the role
/// carried here is the stored one; callers cannot claim a role for
/// themselves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// A staff directory entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
}

impl StaffMember {
    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}
