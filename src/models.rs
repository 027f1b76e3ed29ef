use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Roles ---

/// Role
///
/// The two role ids recognised by the gate. Rows in `roles` with any other id can
/// exist, but such users are refused at login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub enum Role {
    Agent,
    Client,
}

impl Role {
    pub const AGENT_ID: i32 = 1;
    pub const CLIENT_ID: i32 = 2;

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            Self::AGENT_ID => Some(Role::Agent),
            Self::CLIENT_ID => Some(Role::Client),
            _ => None,
        }
    }

    pub fn id(self) -> i32 {
        match self {
            Role::Agent => Self::AGENT_ID,
            Role::Client => Self::CLIENT_ID,
        }
    }

    /// Landing page after login or a `/dashboard` hit.
    pub fn dashboard_path(self) -> &'static str {
        match self {
            Role::Agent => "/agent/dashboard",
            Role::Client => "/client/dashboard",
        }
    }
}

// --- Users & Agents ---

/// User
///
/// A `usuarios` row joined with its role display name. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: i32,
    pub code: Option<String>,
    pub username: String,
    pub email: String,
    pub role_id: i32,
    pub role_name: String,
}

/// Login candidate row: the user plus the stored Argon2 PHC string.
/// Stays inside the auth service; deliberately not `Serialize`.
#[derive(Clone, FromRow)]
pub struct UserCredentials {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: i32,
    pub role_name: String,
}

impl std::fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredentials")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("role_id", &self.role_id)
            .finish_non_exhaustive()
    }
}

/// Identity
///
/// The authenticated identity issued by a successful login and carried by the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Identity {
    pub user_id: i32,
    pub username: String,
    pub role_id: i32,
    pub role_name: String,
}

impl Identity {
    pub fn role(&self) -> Option<Role> {
        Role::from_id(self.role_id)
    }
}

impl From<User> for Identity {
    fn from(user: User) -> Self {
        Identity {
            user_id: user.id,
            username: user.username,
            role_id: user.role_id,
            role_name: user.role_name,
        }
    }
}

/// Agent
///
/// An `agentes` row: links an agent-role user to the agency staff table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Agent {
    pub id: i32,
    pub user_id: i32,
}

/// Validated input for creating a user. `password_hash` is already an Argon2 PHC string.
#[derive(Clone, PartialEq)]
pub struct NewUser {
    pub code: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

// --- Clients ---

/// Client
///
/// A `clientes` row enriched with the display names of its reference rows and the
/// linked username. The joined fields are `None` when the reference row is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Client {
    pub id: i32,
    pub user_id: Option<i32>,
    pub client_code: String,
    pub rut: String,
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub gender: String,
    pub insurance_type_id: i32,
    pub annual_income: f64,
    pub monthly_spend: f64,
    pub dependents: i32,
    pub system_classification_id: i32,
    pub agent_classification_id: i32,

    // Loaded through LEFT JOINs.
    pub insurance_type_name: Option<String>,
    pub system_classification: Option<String>,
    pub agent_classification: Option<String>,
    pub username: Option<String>,
}

/// ClientInput
///
/// The full, coerced field set written by an agent on create and on full update.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClientInput {
    pub client_code: String,
    pub user_id: i32,
    pub rut: String,
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub gender: String,
    pub insurance_type_id: i32,
    pub annual_income: f64,
    pub monthly_spend: f64,
    pub dependents: i32,
    pub system_classification_id: i32,
    pub agent_classification_id: i32,
}

/// ClientSelfUpdate
///
/// The only fields a client may change on their own record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClientSelfUpdate {
    pub address: String,
    pub phone: String,
    pub email: String,
    pub annual_income: f64,
    pub monthly_spend: f64,
    pub dependents: i32,
}

// --- Reference data ---

/// A row of one of the read-only lookup tables (insurance types, classifications).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct ReferenceItem {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ReferenceData {
    pub insurance_types: Vec<ReferenceItem>,
    pub system_classifications: Vec<ReferenceItem>,
    pub agent_classifications: Vec<ReferenceItem>,
}

// --- Page payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AgentDashboard {
    pub agent: Option<Agent>,
    pub clients: Vec<Client>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ClientListView {
    pub clients: Vec<Client>,
    pub reference: ReferenceData,
}

/// Data for the agent's create/edit client form. `client` is set when editing;
/// `users` lists the accounts a client record can be linked to.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ClientFormView {
    pub client: Option<Client>,
    pub reference: ReferenceData,
    pub users: Vec<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserFormView {
    pub roles: Vec<ReferenceItem>,
}

/// Error body of the JSON API routes.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ApiError {
    pub error: String,
}
