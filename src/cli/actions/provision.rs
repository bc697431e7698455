use crate::{
    api::handlers::auth::hash_password,
    cli::actions::server::connect,
    store::{Credential, PgStore},
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub dsn: String,
    pub username: String,
    pub password: SecretString,
    pub bcrypt_cost: u32,
}

/// Hash the password and insert or replace the user's credential.
/// # Errors
/// Returns an error if hashing fails or the database is unreachable.
pub async fn execute(args: Args) -> Result<()> {
    let store = PgStore::new(connect(&args.dsn).await?);
    store.ensure_schema().await?;

    let password = args.password;
    let cost = args.bcrypt_cost;
    let password_hash =
        tokio::task::spawn_blocking(move || hash_password(password.expose_secret(), cost))
            .await
            .context("password hashing task failed")??;

    store
        .upsert_credential(&Credential {
            username: args.username.clone(),
            password_hash,
        })
        .await?;

    info!(username = %args.username, "credential provisioned");
    Ok(())
}
