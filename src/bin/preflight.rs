use axum::body::Bytes;
use school_backoffice::domain::resource::tables;
use school_backoffice::infra::backend::{Backend, BackendMode};
use school_backoffice::infra::config::{AppConfig, BackendKind};
use school_backoffice::storage::database::SelectQuery;

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: cargo run --bin preflight -- [--check-storage]\n\
         \n\
         Requires env vars:\n\
           SUPABASE_URL, SUPABASE_ANON_KEY\n\
         Optional:\n\
           SUPABASE_SERVICE_ROLE_KEY, DATABASE_URL, STORAGE_BUCKET, APP_URL, BIND_ADDR\n\
         \n\
         --check-storage uploads and removes a small probe object in the bucket.\n"
    );
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage_and_exit();
    }
    let check_storage = args.iter().any(|a| a == "--check-storage");

    let config = AppConfig::from_env();
    println!("> Preflight:");
    println!("  BACKEND={}", match config.backend.kind {
        BackendKind::Hosted => "hosted",
        BackendKind::Memory => "memory",
    });
    println!("  STORAGE_BUCKET={}", config.backend.bucket);
    println!("  APP_URL={} (reset links land on {}/reset-password)", config.app_url, config.app_url);
    println!("  BIND_ADDR={}", config.bind_addr);
    println!(
        "  DATABASE_URL={}",
        if config.backend.database_url.is_some() { "set" } else { "unset (rows go through the REST API)" }
    );

    let missing = config.backend.missing();
    if !missing.is_empty() {
        return Err(anyhow::anyhow!("Missing required env vars: {}", missing.join(", ")));
    }

    let backend = Backend::from_config(&config.backend);
    if backend.mode == BackendMode::Unconfigured {
        return Err(anyhow::anyhow!("Backend is not configured"));
    }
    println!("  Mode: {}", backend.mode.as_str());

    // Every resource table should answer a one-row select.
    for table in tables::ALL {
        backend
            .db
            .select(table, &SelectQuery::all().range(0, 0).with_count())
            .await
            .map_err(|e| anyhow::anyhow!("Table `{}` is not readable: {}", table, e))?;
        println!("  Table {} is readable.", table);
    }

    if check_storage {
        let path = format!("preflight/probe-{}.txt", chrono::Utc::now().timestamp_millis());
        backend
            .storage
            .upload(&path, "text/plain", Bytes::from_static(b"preflight"))
            .await
            .map_err(|e| anyhow::anyhow!("Upload to bucket `{}` failed: {}", backend.storage.bucket(), e))?;
        println!("  Uploaded probe: {}", backend.storage.public_url(&path));
        let removed = backend
            .storage
            .remove(&[path.clone()])
            .await
            .map_err(|e| anyhow::anyhow!("Removing probe {} failed: {}", path, e))?;
        if removed.is_empty() {
            eprintln!("  Warning: bucket reported nothing removed for {}", path);
        } else {
            println!("  Probe removed.");
        }
    }

    println!("> Preflight OK.");
    Ok(())
}
