/// Router Module Index
///
/// One router per access category. The category is enforced by the gate extractor
/// each handler takes, so these modules only group paths.

/// Login gateway, health check and the public reference API.
pub mod public;

/// Routes for any signed-in user, whatever the role.
pub mod authenticated;

/// Routes under `/agent`, every handler guarded by `AgentUser`.
pub mod agent;

/// Routes under `/client`, every handler guarded by `ClientUser`.
pub mod client;
