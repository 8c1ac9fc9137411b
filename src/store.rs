//! Flat JSON file holding every contact record.
//!
//! The whole document is read on every `load` and rewritten on every `save`.
//! There is no locking and no atomic rename: concurrent writers race and the
//! last one wins.
//!
//! Records that do not parse as a [`Contact`] are hidden from readers but
//! kept in the [`Document`], so a save writes them back untouched.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, warn};

use crate::contact::Contact;

#[derive(Debug, Deserialize)]
struct StoreFileIn {
    #[serde(default)]
    contactos: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct StoreFileOut<'a> {
    contactos: &'a [Slot],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
enum Slot {
    Contact(Contact),
    Unreadable(Value),
}

/// Every record in the file, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    slots: Vec<Slot>,
}

impl Document {
    pub fn contacts(&self) -> impl Iterator<Item = &Contact> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Contact(contact) => Some(contact),
            Slot::Unreadable(_) => None,
        })
    }

    pub fn contacts_mut(&mut self) -> impl Iterator<Item = &mut Contact> {
        self.slots.iter_mut().filter_map(|slot| match slot {
            Slot::Contact(contact) => Some(contact),
            Slot::Unreadable(_) => None,
        })
    }

    pub fn into_contacts(self) -> Vec<Contact> {
        self.slots
            .into_iter()
            .filter_map(|slot| match slot {
                Slot::Contact(contact) => Some(contact),
                Slot::Unreadable(_) => None,
            })
            .collect()
    }

    /// True if any record, readable or not, carries `id`.
    pub fn has_id(&self, id: i64) -> bool {
        self.slots.iter().any(|slot| match slot {
            Slot::Contact(contact) => contact.id == id,
            Slot::Unreadable(value) => value.get("id").is_some_and(|raw| raw_id_is(raw, id)),
        })
    }

    pub fn push(&mut self, contact: Contact) {
        self.slots.push(Slot::Contact(contact));
    }

    /// Keep the contacts matching `keep`; unreadable records always stay.
    /// Returns how many contacts were removed.
    pub fn retain(&mut self, mut keep: impl FnMut(&Contact) -> bool) -> usize {
        let before = self.slots.len();
        self.slots.retain(|slot| match slot {
            Slot::Contact(contact) => keep(contact),
            Slot::Unreadable(_) => true,
        });
        before - self.slots.len()
    }

    pub fn unreadable_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Unreadable(_)))
            .count()
    }
}

impl From<Vec<Contact>> for Document {
    fn from(contacts: Vec<Contact>) -> Self {
        Self {
            slots: contacts.into_iter().map(Slot::Contact).collect(),
        }
    }
}

fn raw_id_is(raw: &Value, id: i64) -> bool {
    match raw {
        Value::Number(n) => n.as_i64() == Some(id),
        Value::String(s) => s.trim().parse::<i64>().ok() == Some(id),
        _ => false,
    }
}

#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Readable records only. A missing or unreadable file is an empty store.
    pub async fn load(&self) -> Vec<Contact> {
        self.load_document().await.into_contacts()
    }

    /// Every record, for a load-mutate-save cycle.
    pub async fn load_document(&self) -> Document {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "store not readable, treating as empty");
                return Document::default();
            }
        };
        parse_document(&raw, &self.path)
    }

    /// Overwrite the file with `document`.
    pub async fn save(&self, document: &Document) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.with_context(|| {
                    format!("failed to create store directory {}", parent.display())
                })?;
            }
        }

        let body = serde_json::to_string_pretty(&StoreFileOut {
            contactos: &document.slots,
        })?;
        fs::write(&self.path, body)
            .await
            .with_context(|| format!("failed to write store file {}", self.path.display()))?;
        debug!(
            path = %self.path.display(),
            count = document.slots.len(),
            unreadable = document.unreadable_count(),
            "store saved"
        );
        Ok(())
    }
}

fn parse_document(raw: &str, path: &Path) -> Document {
    let file: StoreFileIn = match serde_json::from_str(raw) {
        Ok(file) => file,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "store file is not valid JSON, treating as empty");
            return Document::default();
        }
    };

    let mut slots = Vec::with_capacity(file.contactos.len());
    for (index, value) in file.contactos.into_iter().enumerate() {
        match serde_json::from_value::<Contact>(value.clone()) {
            Ok(contact) => slots.push(Slot::Contact(contact)),
            Err(err) => {
                warn!(path = %path.display(), index, error = %err, "keeping unreadable record as is");
                slots.push(Slot::Unreadable(value));
            }
        }
    }
    Document { slots }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Vec<Contact> {
        vec![
            Contact {
                id: 1,
                first_name: "Ana".into(),
                last_name: "Lopez".into(),
                phone: "+34 600111222".into(),
                favorite: false,
                image: None,
            },
            Contact {
                id: 2,
                first_name: "Beto".into(),
                last_name: "Ruiz".into(),
                phone: "+52 5512345678".into(),
                favorite: true,
                image: Some("https://example.com/beto.png".into()),
            },
        ]
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path().join("contacts.json"));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("contacts.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Store::new(&path).load().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path().join("nested").join("contacts.json"));
        store.save(&sample().into()).await.unwrap();
        assert_eq!(store.load().await, sample());
    }

    #[tokio::test]
    async fn test_on_disk_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("contacts.json");
        let store = Store::new(&path);
        store.save(&sample()[..1].to_vec().into()).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 1);
        let records = object["contactos"].as_array().unwrap();
        assert_eq!(records[0]["nombre"], "Ana");
        assert_eq!(records[0]["favorito"], false);
        assert!(raw.contains("\n  \"contactos\""));
    }

    #[tokio::test]
    async fn test_bad_records_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("contacts.json");
        std::fs::write(
            &path,
            r#"{"contactos":[{"id":"5","nombre":"Ana"},{"nombre":"sin id"},{"id":6,"nombre":"Beto","favorito":true}]}"#,
        )
        .unwrap();

        let loaded = Store::new(&path).load().await;
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, 5);
        assert!(!loaded[0].favorite);
        assert!(loaded[1].favorite);
    }

    const WITH_NAMELESS: &str = r#"{"contactos":[{"id":1,"apellido":"SinNombre","telefono":"+34 600000000","favorito":false},{"id":2,"nombre":"Ana"}]}"#;

    #[tokio::test]
    async fn test_unreadable_records_survive_a_save() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("contacts.json");
        std::fs::write(&path, WITH_NAMELESS).unwrap();
        let store = Store::new(&path);

        let mut document = store.load_document().await;
        assert_eq!(document.contacts().count(), 1);
        assert_eq!(document.unreadable_count(), 1);
        assert_eq!(document.retain(|c| c.id != 99), 0);
        store.save(&document).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        let records = value["contactos"].as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["apellido"], "SinNombre");
        assert!(records[0].get("nombre").is_none());
        assert_eq!(records[1]["nombre"], "Ana");
        assert_eq!(store.load().await.len(), 1);
    }

    #[tokio::test]
    async fn test_retain_never_drops_unreadable_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("contacts.json");
        std::fs::write(&path, WITH_NAMELESS).unwrap();

        let mut document = Store::new(&path).load_document().await;
        assert_eq!(document.retain(|_| false), 1);
        assert_eq!(document.contacts().count(), 0);
        assert_eq!(document.unreadable_count(), 1);
        assert!(document.has_id(1));
        assert!(!document.has_id(2));
    }
}
