//! Credential record type definitions

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, VaultError};

const SITE_LABEL: &str = "Site: ";
const USERNAME_LABEL: &str = "Username: ";
const PASSWORD_LABEL: &str = "Password: ";
const NOTE_LABEL: &str = "Note: ";

// Labels written by earlier clients, which stored field values unescaped
const LEGACY_SITE_LABEL: &str = "网站: ";
const LEGACY_USERNAME_LABEL: &str = "用户名: ";
const LEGACY_PASSWORD_LABEL: &str = "密码: ";
const LEGACY_NOTE_LABEL: &str = "备注: ";
const LEGACY_SEPARATOR: &str = "------------------------";

/// Separator between site name and username inside a lookup key
pub const KEY_SEPARATOR: &str = "|";

/// One credential as entered by the user - zeroed when dropped
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct CredentialRecord {
    /// Website or service name
    pub site_name: String,
    /// Account name on that site
    pub username: String,
    /// The secret itself
    pub password: String,
    /// Free-form note
    pub note: String,
}

impl CredentialRecord {
    /// Create a record without a note
    pub fn new(site_name: &str, username: &str, password: &str) -> Self {
        Self::with_note(site_name, username, password, "")
    }

    pub fn with_note(site_name: &str, username: &str, password: &str, note: &str) -> Self {
        Self {
            site_name: site_name.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            note: note.to_string(),
        }
    }

    /// Render the plaintext template that gets sealed into an envelope
    ///
    /// One labelled line per field, in the order site, username, password,
    /// note. Backslashes and line breaks inside a field are escaped so the
    /// template always has exactly four lines.
    pub fn to_plaintext(&self) -> String {
        [
            (SITE_LABEL, &self.site_name),
            (USERNAME_LABEL, &self.username),
            (PASSWORD_LABEL, &self.password),
            (NOTE_LABEL, &self.note),
        ]
        .iter()
        .map(|(label, value)| format!("{}{}", label, escape_field(value)))
        .collect::<Vec<_>>()
        .join("\n")
    }

    /// Parse a plaintext template produced by [`to_plaintext`](Self::to_plaintext)
    ///
    /// Records sealed by earlier clients are accepted too: they use localized
    /// labels, keep field values verbatim, may omit the note line and may end
    /// with a dashed separator line.
    pub fn parse(plaintext: &str) -> Result<Self> {
        if plaintext.starts_with(LEGACY_SITE_LABEL) {
            return Self::parse_legacy(plaintext);
        }

        let mut lines = plaintext.split('\n');

        let site_name = unescape_field(read_field(lines.next(), SITE_LABEL)?)?;
        let username = unescape_field(read_field(lines.next(), USERNAME_LABEL)?)?;
        let password = unescape_field(read_field(lines.next(), PASSWORD_LABEL)?)?;
        let note = unescape_field(read_field(lines.next(), NOTE_LABEL)?)?;

        if lines.next().is_some() {
            return Err(VaultError::InvalidRecord(
                "Unexpected trailing lines".to_string(),
            ));
        }

        Ok(Self {
            site_name,
            username,
            password,
            note,
        })
    }

    fn parse_legacy(plaintext: &str) -> Result<Self> {
        let mut lines: Vec<&str> = plaintext.split('\n').collect();
        if lines.last() == Some(&LEGACY_SEPARATOR) {
            lines.pop();
        }
        if lines.len() > 4 {
            return Err(VaultError::InvalidRecord(
                "Unexpected trailing lines".to_string(),
            ));
        }

        let mut lines = lines.into_iter();
        let site_name = read_field(lines.next(), LEGACY_SITE_LABEL)?.to_string();
        let username = read_field(lines.next(), LEGACY_USERNAME_LABEL)?.to_string();
        let password = read_field(lines.next(), LEGACY_PASSWORD_LABEL)?.to_string();
        let note = match lines.next() {
            Some(line) => read_field(Some(line), LEGACY_NOTE_LABEL)?.to_string(),
            None => String::new(),
        };

        Ok(Self {
            site_name,
            username,
            password,
            note,
        })
    }
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("site_name", &self.site_name)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("note", &"[REDACTED]")
            .finish()
    }
}

fn read_field<'a>(line: Option<&'a str>, label: &str) -> Result<&'a str> {
    let line = line.ok_or_else(|| {
        VaultError::InvalidRecord(format!("Missing field {:?}", label.trim_end()))
    })?;
    line.strip_prefix(label).ok_or_else(|| {
        VaultError::InvalidRecord(format!("Expected field {:?}", label.trim_end()))
    })
}

fn escape_field(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_field(value: &str) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            _ => {
                return Err(VaultError::InvalidRecord(
                    "Invalid escape sequence".to_string(),
                ))
            }
        }
    }
    Ok(out)
}

/// Store key for one record: `prefix ++ site_name ++ "|" ++ username`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupKey(String);

impl LookupKey {
    pub fn new(prefix: &str, site_name: &str, username: &str) -> Self {
        Self(format!("{}{}{}{}", prefix, site_name, KEY_SEPARATOR, username))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LookupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of re-sealing every record under a new master password
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReEncryptReport {
    /// Entries now sealed under the new master password
    pub re_encrypted: usize,
    /// Entries left untouched because the old password could not open them
    pub skipped: usize,
}
