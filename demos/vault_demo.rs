//! End-to-end walk through the credential store on a throwaway directory

use futures::StreamExt;
use std::sync::Arc;
use tempfile::TempDir;
use tracing::info;

use vault_core::{CredentialRecord, CredentialStore, FilePreferences, Preferences, SettingsManager};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let temp_dir = TempDir::new()?;
    let storage_dir = temp_dir.path().to_path_buf();

    let settings = SettingsManager::new(&storage_dir);
    let prefs = FilePreferences::with_dir(storage_dir.clone(), &settings.get().store_name).await?;
    info!("Using {} at {:?}", prefs.backend_name(), prefs.file_path());

    let store = CredentialStore::with_settings(Arc::new(prefs), settings.get());

    let master = "correct horse battery staple";
    store
        .save_batch(
            master,
            &[
                CredentialRecord::with_note("example.com", "alice", "s3cret!", "personal"),
                CredentialRecord::new("bank.example", "alice", "0000-1111"),
            ],
        )
        .await?;

    println!("=== Decrypted entries ===");
    let mut entries = store.load_all(master).await?;
    while let Some(plaintext) = entries.next().await {
        println!("{}\n---", plaintext.expose());
    }

    let hits = store.search(master, "BANK").await?;
    println!("=== Search \"BANK\": {} match(es) ===", hits.len());

    println!("=== With the wrong master password ===");
    let visible = store.load_records("wrong").await?;
    println!("{} entries readable", visible.len());

    let report = store.re_encrypt_all(master, "new master").await?;
    println!(
        "=== Rotated master: {} re-encrypted, {} skipped ===",
        report.re_encrypted, report.skipped
    );

    let removed = store.delete("bank.example", "alice").await?;
    println!("Deleted bank.example/alice: {}", removed);

    for record in store.load_records("new master").await? {
        println!("{} / {}", record.site_name, record.username);
    }

    Ok(())
}
