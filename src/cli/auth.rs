//! `auth` and `deauth`: write or remove the API key in the secret store.

use std::error::Error;
use std::io::{self, BufRead, Write};

use crate::cli::AppContext;
use crate::core::credentials::{API_KEY_PATH, NESTED_API_KEY_PATH};
use crate::core::secrets::{open_store, SecretStore, SecretStoreError};

/// Reads one line from `input` and returns it trimmed, or `None` when blank.
pub fn read_api_key<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<Option<String>> {
    write!(output, "Enter your OpenAI API key: ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let key = line.trim();
    Ok((!key.is_empty()).then(|| key.to_string()))
}

pub fn store_api_key(store: &dyn SecretStore, key: &str) -> Result<(), SecretStoreError> {
    store.store(API_KEY_PATH, key)
}

/// Removes the key from both places it may be stored. Returns whether
/// anything was removed.
pub fn remove_api_key(store: &dyn SecretStore) -> Result<bool, SecretStoreError> {
    let mut removed = false;
    for path in [API_KEY_PATH, NESTED_API_KEY_PATH] {
        removed |= store.remove(path)?;
    }
    Ok(removed)
}

/// Advice for store failures the user can act on.
pub fn store_error_hint(err: &SecretStoreError) -> Option<&'static str> {
    match err {
        SecretStoreError::Keyring(access) if access.is_recoverable() => Some(
            "The keyring is locked or unavailable. Unlock it and retry, \
or run 'expert-mode set secrets-backend file'.",
        ),
        _ => None,
    }
}

fn report_store_error(err: SecretStoreError) -> Box<dyn Error> {
    if let Some(hint) = store_error_hint(&err) {
        eprintln!("⚠️  {hint}");
    }
    Box::new(err)
}

pub fn run_auth(ctx: &AppContext) -> Result<(), Box<dyn Error>> {
    let store = open_store(&ctx.config);
    println!("Secret store: {}", store.describe());

    let stdin = io::stdin();
    let Some(key) = read_api_key(&mut stdin.lock(), &mut io::stdout())? else {
        eprintln!("⚠️  No key entered; nothing was stored.");
        std::process::exit(1);
    };

    store_api_key(store.as_ref(), &key).map_err(report_store_error)?;
    println!("✓ API key stored in {}", store.describe());
    Ok(())
}

pub fn run_deauth(ctx: &AppContext) -> Result<(), Box<dyn Error>> {
    let store = open_store(&ctx.config);
    if remove_api_key(store.as_ref()).map_err(report_store_error)? {
        println!("✅ API key removed from {}", store.describe());
    } else {
        println!("No stored API key found in {}", store.describe());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::keyring::KeyringAccessError;
    use crate::core::secrets::TomlSecretStore;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn reads_trimmed_key() {
        let mut input = Cursor::new(b"  sk-typed \n".to_vec());
        let mut output = Vec::new();
        let key = read_api_key(&mut input, &mut output).expect("io");
        assert_eq!(key.as_deref(), Some("sk-typed"));
        assert_eq!(output, b"Enter your OpenAI API key: ");

        let mut blank = Cursor::new(b"\n".to_vec());
        assert_eq!(read_api_key(&mut blank, &mut Vec::new()).expect("io"), None);
    }

    #[test]
    fn store_then_remove_both_locations() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("secrets.toml");
        fs::write(&path, "[openai]\napi_key = \"sk-nested\"\nother = \"keep\"\n").expect("write");
        let store = TomlSecretStore::new(&path);

        store_api_key(&store, "sk-top").expect("store");
        assert_eq!(
            store.lookup(API_KEY_PATH).expect("lookup").as_deref(),
            Some("sk-top")
        );

        assert!(remove_api_key(&store).expect("remove"));
        assert_eq!(store.lookup(API_KEY_PATH).expect("lookup"), None);
        assert_eq!(store.lookup(NESTED_API_KEY_PATH).expect("lookup"), None);
        assert_eq!(
            store.lookup(&["openai", "other"]).expect("lookup").as_deref(),
            Some("keep")
        );

        assert!(!remove_api_key(&store).expect("second remove"));
    }

    #[test]
    fn locked_keyring_gets_a_hint() {
        let locked = SecretStoreError::Keyring(KeyringAccessError::from(
            keyring::Error::NoStorageAccess(Box::new(io::Error::other("locked"))),
        ));
        assert!(store_error_hint(&locked)
            .is_some_and(|hint| hint.contains("secrets-backend file")));

        let corrupt = SecretStoreError::Keyring(KeyringAccessError::from(
            keyring::Error::BadEncoding(Vec::new()),
        ));
        assert_eq!(store_error_hint(&corrupt), None);
        assert_eq!(
            store_error_hint(&SecretStoreError::Unavailable("no dir".to_string())),
            None
        );
    }
}
