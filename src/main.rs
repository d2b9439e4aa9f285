use adminboard::config::CONFIG;
use adminboard::rest::{CatalogStore, RestProfileStore, TableClient};
use adminboard::types::AuthSnapshot;
use adminboard::AuthClient;
use futures::StreamExt;
use mimalloc::MiMalloc;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &*CONFIG;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        backend_url = %cfg.backend_url,
        profiles_table = %cfg.profiles_table,
        session_db = %cfg.session_db_url.as_deref().unwrap_or("<memory>"),
        proxy = %cfg.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        auto_refresh = cfg.auto_refresh,
        loglevel = %cfg.loglevel
    );

    let auth = AuthClient::new(cfg).await?;
    let tables = TableClient::new(cfg)?.with_auth(auth.clone());
    let profiles = RestProfileStore::new(tables.clone(), cfg.profiles_table.clone());

    let controller = adminboard::spawn(Arc::new(auth.clone()), Arc::new(profiles)).await?;

    if auth.current_session().is_none() {
        match (cfg.email.as_deref(), cfg.password.as_deref()) {
            (Some(email), Some(password)) => {
                if let Err(e) = auth.sign_in_with_password(email, password).await {
                    warn!(email, error = %e, "sign-in failed");
                }
            }
            _ => info!("no stored session and no credentials configured; waiting signed out"),
        }
    }

    let snapshot = controller.wait_until_loaded().await?;
    if snapshot.session.is_some() {
        let catalog = CatalogStore::new(tables);
        match catalog.load().await {
            Ok((categories, products)) => info!(
                categories = categories.len(),
                products = products.len(),
                "catalog reachable"
            ),
            Err(e) => warn!(error = %e, "catalog fetch failed"),
        }
    }

    let mut changes = controller.changes();
    loop {
        tokio::select! {
            next = changes.next() => {
                let Some(snapshot) = next else { break };
                log_snapshot(&snapshot);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }

    controller.stop();
    Ok(())
}

fn log_snapshot(snapshot: &AuthSnapshot) {
    match snapshot.user.as_ref() {
        Some(user) => info!(
            user_id = %user.id,
            email = user.email().unwrap_or("-"),
            expires_at = ?snapshot.session.as_ref().and_then(|s| s.expires_at_utc()),
            "signed in"
        ),
        None if snapshot.loading => info!("loading session"),
        None => info!("signed out"),
    }
}
