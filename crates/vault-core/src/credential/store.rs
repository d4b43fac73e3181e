//! Credential store: seals records into envelopes and persists them

use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::types::{CredentialRecord, LookupKey, ReEncryptReport};
use crate::crypto::{decrypt, encrypt, SecretString};
use crate::error::Result;
use crate::settings::{VaultSettings, DEFAULT_KEY_PREFIX};
use crate::storage::Preferences;

/// Credential store
///
/// Stateless apart from the backend handle: the master password is passed to
/// every call and no derived key outlives the call that needed it.
pub struct CredentialStore {
    /// Persistence backend
    preferences: Arc<dyn Preferences>,
    /// Namespace prefix for record keys
    key_prefix: String,
}

impl CredentialStore {
    /// Create a store using the default record namespace
    pub fn new(preferences: Arc<dyn Preferences>) -> Self {
        Self {
            preferences,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    /// Create a store using the namespace from settings
    pub fn with_settings(preferences: Arc<dyn Preferences>, settings: &VaultSettings) -> Self {
        Self {
            preferences,
            key_prefix: settings.key_prefix.clone(),
        }
    }

    /// Build the lookup key for a site/username pair
    pub fn lookup_key(&self, site_name: &str, username: &str) -> LookupKey {
        LookupKey::new(&self.key_prefix, site_name, username)
    }

    /// Seal a record and store it, replacing any record with the same
    /// site/username pair
    ///
    /// The change is flushed before returning. If encryption fails nothing
    /// is written.
    pub async fn save(&self, master: &str, record: &CredentialRecord) -> Result<()> {
        let plaintext = Zeroizing::new(record.to_plaintext());
        let sealed = encrypt(plaintext.as_bytes(), master).await?;

        let key = self.lookup_key(&record.site_name, &record.username);
        self.preferences.put(key.as_str(), &sealed).await?;
        self.preferences.flush().await?;

        info!("Saved credential");
        Ok(())
    }

    /// Seal several records and store them with a single flush
    ///
    /// Every record is encrypted before anything is written, so an
    /// encryption failure leaves the store untouched.
    pub async fn save_batch(&self, master: &str, records: &[CredentialRecord]) -> Result<usize> {
        let mut sealed = Vec::with_capacity(records.len());
        for record in records {
            let plaintext = Zeroizing::new(record.to_plaintext());
            let envelope = encrypt(plaintext.as_bytes(), master).await?;
            sealed.push((self.lookup_key(&record.site_name, &record.username), envelope));
        }

        for (key, envelope) in &sealed {
            self.preferences.put(key.as_str(), envelope).await?;
        }
        self.preferences.flush().await?;

        info!("Saved {} credentials", sealed.len());
        Ok(sealed.len())
    }

    /// Lazily decrypt every record the master password can open
    ///
    /// The backend is enumerated once up front; each entry is decrypted only
    /// when the stream is polled for it. Entries that fail to decrypt (wrong
    /// password, corruption, foreign format) are skipped. The stream cannot be
    /// restarted; call again for a fresh enumeration.
    pub async fn load_all(&self, master: &str) -> Result<BoxStream<'static, SecretString>> {
        let candidates = self.record_entries().await?;
        let master = Arc::new(Zeroizing::new(master.to_owned()));

        let records = stream::iter(candidates).filter_map(move |(key, sealed)| {
            let master = Arc::clone(&master);
            async move {
                match decrypt(&sealed, &master).await {
                    Ok(plaintext) => Some(plaintext),
                    Err(e) => {
                        debug!("Skipping undecryptable entry {}: {}", key, e);
                        None
                    }
                }
            }
        });

        Ok(records.boxed())
    }

    /// Decrypt and parse every record the master password can open
    ///
    /// Entries that cannot be decrypted or do not follow the record template
    /// are skipped.
    pub async fn load_records(&self, master: &str) -> Result<Vec<CredentialRecord>> {
        let mut plaintexts = self.load_all(master).await?;

        let mut records = Vec::new();
        while let Some(plaintext) = plaintexts.next().await {
            match CredentialRecord::parse(plaintext.expose()) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping entry with unreadable template: {}", e),
            }
        }

        Ok(records)
    }

    /// Decrypted records whose text contains `query`, ignoring case
    ///
    /// Matches against the whole plaintext block, so site, username and note
    /// are all searchable. An empty query returns every decryptable record.
    pub async fn search(&self, master: &str, query: &str) -> Result<Vec<SecretString>> {
        let needle = Zeroizing::new(query.to_lowercase());

        let matches: Vec<SecretString> = self
            .load_all(master)
            .await?
            .filter(|plaintext| {
                let hit = needle.is_empty()
                    || Zeroizing::new(plaintext.expose().to_lowercase()).contains(needle.as_str());
                future::ready(hit)
            })
            .collect()
            .await;

        debug!("Search matched {} entries", matches.len());
        Ok(matches)
    }

    /// Delete the record for a site/username pair
    ///
    /// # Returns
    /// `true` if a record was removed, `false` if none existed
    pub async fn delete(&self, site_name: &str, username: &str) -> Result<bool> {
        let key = self.lookup_key(site_name, username);

        if !self.preferences.contains(key.as_str()).await? {
            debug!("No credential to delete: {}", key);
            return Ok(false);
        }

        self.preferences.delete(key.as_str()).await?;
        self.preferences.flush().await?;

        info!("Deleted credential");
        Ok(true)
    }

    /// Re-seal every record under a new master password
    ///
    /// Entries the old password cannot open are left as they are and
    /// counted as skipped. All new envelopes are prepared before any write.
    pub async fn re_encrypt_all(&self, old_master: &str, new_master: &str) -> Result<ReEncryptReport> {
        let candidates = self.record_entries().await?;

        let mut report = ReEncryptReport::default();
        let mut resealed = Vec::with_capacity(candidates.len());
        for (key, sealed) in candidates {
            let plaintext = match decrypt(&sealed, old_master).await {
                Ok(plaintext) => plaintext,
                Err(e) => {
                    debug!("Leaving entry {} untouched: {}", key, e);
                    report.skipped += 1;
                    continue;
                }
            };
            resealed.push((key, encrypt(plaintext.expose().as_bytes(), new_master).await?));
        }

        for (key, envelope) in &resealed {
            self.preferences.put(key, envelope).await?;
        }
        self.preferences.flush().await?;

        report.re_encrypted = resealed.len();
        info!(
            "Re-encrypted {} credentials ({} skipped)",
            report.re_encrypted, report.skipped
        );
        Ok(report)
    }

    /// Snapshot of entries under the record namespace with a non-blank value,
    /// ordered by key
    async fn record_entries(&self) -> Result<Vec<(String, String)>> {
        let all = self.preferences.get_all().await?;

        let entries: BTreeMap<String, String> = all
            .into_iter()
            .filter(|(key, value)| key.starts_with(&self.key_prefix) && !value.trim().is_empty())
            .collect();

        Ok(entries.into_iter().collect())
    }
}
