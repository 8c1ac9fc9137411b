use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A single contact record, as stored on disk and sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: i64,
    #[serde(rename = "nombre")]
    pub first_name: String,
    #[serde(rename = "apellido", default)]
    pub last_name: String,
    #[serde(rename = "telefono", default)]
    pub phone: String,
    #[serde(rename = "favorito", default)]
    pub favorite: bool,
    /// Profile image URL, only present for records that carry one.
    #[serde(rename = "imagen", default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Body of a create request: everything the client supplies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContact {
    #[serde(rename = "nombre")]
    pub first_name: String,
    #[serde(rename = "apellido", default)]
    pub last_name: String,
    #[serde(rename = "telefono", default)]
    pub phone: String,
    #[serde(rename = "imagen", default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl NewContact {
    pub fn into_contact(self, id: i64) -> Contact {
        Contact {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            favorite: false,
            image: self.image,
        }
    }
}

impl Contact {
    pub fn display_name(&self) -> String {
        if self.last_name.is_empty() {
            self.first_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }

    /// Two-letter avatar: first letter of each name part.
    pub fn initials(&self) -> String {
        self.first_name
            .chars()
            .take(1)
            .chain(self.last_name.chars().take(1))
            .collect::<String>()
            .to_uppercase()
    }
}

/// How a record held by the controller relates to the service's copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Matches what the service last returned.
    Synced,
    /// Changed locally without confirmation from the service.
    Pending,
    /// Exists only in this session.
    LocalOnly,
}

impl SyncStatus {
    pub fn marker(self) -> &'static str {
        match self {
            SyncStatus::Synced => "",
            SyncStatus::Pending => "~",
            SyncStatus::LocalOnly => "+",
        }
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Pick an id for a new record: the current time in milliseconds, moved
/// forward until it does not clash with `taken`.
pub fn timestamp_id<F>(taken: F) -> i64
where
    F: Fn(i64) -> bool,
{
    let mut id = now_millis();
    while taken(id) {
        id += 1;
    }
    id
}

/// Random positive id within the range a JSON number holds exactly.
pub fn random_id() -> i64 {
    const MAX_SAFE: u64 = (1 << 53) - 1;
    let (high, _) = uuid::Uuid::new_v4().as_u64_pair();
    ((high % MAX_SAFE) + 1) as i64
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match Helper::deserialize(deserializer)? {
        Helper::Int(value) => Ok(value),
        Helper::Float(value) if value.fract() == 0.0 => Ok(value as i64),
        Helper::Float(value) => Err(D::Error::custom(format!("id {value} is not an integer"))),
        Helper::Text(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| D::Error::custom(format!("id `{text}` is not numeric"))),
    }
}
