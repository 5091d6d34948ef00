use crate::{
    api,
    gate::{
        audit::{AuditContext, LogStore, SecurityEvent},
        config::GateConfig,
        directory::{IdentityDirectory, IdentityRecord, MemoryDirectory},
        policy::Role,
        Pipeline,
    },
};
use anyhow::{anyhow, Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub token_secret: Option<String>,
    pub token_ttl_seconds: i64,
    pub token_issuer: String,
    pub pepper: Option<String>,
    pub auth_per_minute: u32,
    pub admin_per_minute: u32,
    pub general_per_minute: u32,
    pub bucket_idle_seconds: u64,
    pub max_buckets: usize,
    pub lockout_threshold: u32,
    pub public_paths: Vec<String>,
    pub rotation_path: String,
    pub seed_admin: String,
    pub seed_admin_password: Option<String>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the bootstrap administrator cannot be seeded or the
/// server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let mut config = GateConfig::new()
        .with_issuer(args.token_issuer.clone())
        .with_token_ttl_seconds(args.token_ttl_seconds)
        .with_lockout_threshold(args.lockout_threshold)
        .with_auth_per_minute(args.auth_per_minute)
        .with_admin_per_minute(args.admin_per_minute)
        .with_general_per_minute(args.general_per_minute)
        .with_bucket_idle_seconds(args.bucket_idle_seconds)
        .with_max_buckets(args.max_buckets)
        .with_rotation_path(args.rotation_path.clone());

    if let Some(secret) = &args.token_secret {
        config = config.with_signing_secret(SecretString::from(secret.as_str()));
    }

    if let Some(pepper) = &args.pepper {
        config = config.with_pepper(SecretString::from(pepper.as_str()));
    }

    for path in &args.public_paths {
        config = config.with_public_path(path.clone());
    }

    let directory: Arc<dyn IdentityDirectory> = Arc::new(MemoryDirectory::new());
    let pipeline = Arc::new(Pipeline::new(&config, directory, Arc::new(LogStore)));

    seed_admin(
        &pipeline,
        &args.seed_admin,
        args.seed_admin_password.as_deref(),
    )?;

    api::new(args.port, pipeline).await
}

/// Create the bootstrap administrator. The account always starts with a
/// pending credential rotation, so the bootstrap password works exactly once.
fn seed_admin(pipeline: &Pipeline, subject: &str, password: Option<&str>) -> Result<()> {
    let (password, generated) = match password {
        Some(given) => (given.to_string(), false),
        None => (one_time_password()?, true),
    };

    let credential = pipeline
        .passwords()
        .hash_master(&password)
        .map_err(|e| anyhow!("Could not hash the bootstrap credential: {e}"))?;

    let record = IdentityRecord::new(subject, credential, vec![Role::Admin, Role::User])
        .with_must_rotate(true);
    let subject = record.subject.clone();

    pipeline
        .directory()
        .create(record)
        .context("Could not create the bootstrap administrator")?;

    pipeline.audit().security_event(
        SecurityEvent::UserCreation,
        Some("system"),
        &AuditContext::default(),
        serde_json::json!({ "subject": subject, "roles": ["admin", "user"], "bootstrap": true }),
    );

    if generated {
        // One-time credential; the forced rotation retires it on first login.
        info!("Generated bootstrap password for '{subject}': {password}");
    } else {
        info!("Seeded bootstrap administrator '{subject}'");
    }

    Ok(())
}

fn one_time_password() -> Result<String> {
    let mut bytes = [0u8; 12];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| anyhow!("Could not draw randomness: {e}"))?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

fn log_startup_args(args: &Args) {
    let public_paths = if args.public_paths.is_empty() {
        "none".to_string()
    } else {
        args.public_paths.join(", ")
    };
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("token_secret_set", args.token_secret.is_some().to_string()),
        ("token_ttl_seconds", args.token_ttl_seconds.to_string()),
        ("token_issuer", args.token_issuer.clone()),
        ("pepper_set", args.pepper.is_some().to_string()),
        ("rate_auth", format!("{}/min", args.auth_per_minute)),
        ("rate_admin", format!("{}/min", args.admin_per_minute)),
        ("rate_general", format!("{}/min", args.general_per_minute)),
        (
            "bucket_idle_seconds",
            args.bucket_idle_seconds.to_string(),
        ),
        ("max_buckets", args.max_buckets.to_string()),
        ("lockout_threshold", args.lockout_threshold.to_string()),
        ("public_paths", public_paths),
        ("rotation_path", args.rotation_path.clone()),
        ("seed_admin", args.seed_admin.clone()),
        (
            "seed_admin_password_set",
            args.seed_admin_password.is_some().to_string(),
        ),
    ];
    log_entries("Startup configuration", &entries);
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!("{}\n\n{title}:", pordisto_banner());
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn pordisto_banner() -> String {
    let short_hash = short_commit(crate::GIT_COMMIT_HASH);
    PORDISTO_BANNER.replace(
        "{VERSION}",
        &format!(" - {} - {}", env!("CARGO_PKG_VERSION"), short_hash),
    )
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}

const PORDISTO_BANNER: &str = r"
   .=========.
   | .-----. |
   | |  o  | |
   | |  |  | |  P O R D I S T O {VERSION}
   | |  o  | |
   | '-----' |
   '========='";
