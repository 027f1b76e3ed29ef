//! Request handlers, grouped by the gate they sit behind.
//!
//! Page handlers answer with a rendered [`Page`](crate::session::Page) payload or a 303
//! redirect carrying flash messages. Every error is handled here at the handler
//! boundary; nothing below a handler decides what the user sees.

pub mod agent;
pub mod api;
pub mod client;
pub mod login;

use crate::{error::RepoError, models::ReferenceData, repository::Repository};

pub const CLIENT_NOT_FOUND: &str = "Client not found";
pub const NO_CLIENT_DATA: &str = "No client data found. Contact the administrator.";

/// Loads the three lookup tables used to populate form choices.
pub(crate) async fn load_reference(repo: &dyn Repository) -> Result<ReferenceData, RepoError> {
    let (insurance_types, system_classifications, agent_classifications) = tokio::try_join!(
        repo.list_insurance_types(),
        repo.list_system_classifications(),
        repo.list_agent_classifications(),
    )?;
    Ok(ReferenceData {
        insurance_types,
        system_classifications,
        agent_classifications,
    })
}
