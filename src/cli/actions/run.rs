use crate::cli::{
    actions::{provision, server, Action},
    telemetry,
};
use anyhow::Result;

/// Run `action`, then flush exported spans whether it succeeded or not.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    let result = match action {
        Action::Server(args) => server::execute(args).await,
        Action::Provision(args) => provision::execute(args).await,
    };
    telemetry::shutdown_tracer();
    result
}
