//! In-memory application state behind the contact list UI.
//!
//! The controller owns the authoritative local copy of the contacts, the
//! search term, the confirmation modal and the add-view flag. The UI drives
//! it through commands and renders from the derived views (`filtered`,
//! `grouped`).
//!
//! Service calls are best-effort: local state is updated whether or not the
//! service confirms, and every record carries a [`SyncStatus`] saying how far
//! it may have drifted from the service's copy.

use anyhow::Result;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::client::ContactService;
use crate::contact::{now_millis, random_id, Contact, NewContact, SyncStatus};
use crate::countries::{self, Country, COUNTRIES};
use crate::search;
use crate::seed;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactEntry {
    pub contact: Contact,
    pub sync: SyncStatus,
}

impl ContactEntry {
    fn new(contact: Contact, sync: SyncStatus) -> Self {
        Self { contact, sync }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmModal {
    pub title: String,
    pub message: String,
    pub action: ConfirmAction,
}

/// Action to perform when the confirm modal is accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    /// Delete one contact
    DeleteContact { id: i64 },
    /// Unset the favorite flag of one contact
    RemoveFavorite { id: i64 },
    /// Unset every favorite flag (this session only)
    ClearFavorites,
    /// Drop every non-favorite contact (this session only)
    ClearOthers,
}

/// Visual weight of a confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmTone {
    Danger,
    Warning,
}

impl ConfirmAction {
    pub fn target(&self) -> Option<i64> {
        match self {
            ConfirmAction::DeleteContact { id } | ConfirmAction::RemoveFavorite { id } => {
                Some(*id)
            }
            ConfirmAction::ClearFavorites | ConfirmAction::ClearOthers => None,
        }
    }

    pub fn tone(&self) -> ConfirmTone {
        match self {
            ConfirmAction::DeleteContact { .. } | ConfirmAction::ClearOthers => ConfirmTone::Danger,
            ConfirmAction::RemoveFavorite { .. } | ConfirmAction::ClearFavorites => {
                ConfirmTone::Warning
            }
        }
    }
}

/// Filtered contacts split into the two list sections.
#[derive(Debug, Default)]
pub struct Grouped<'a> {
    pub favorites: Vec<&'a ContactEntry>,
    pub others: Vec<&'a ContactEntry>,
}

impl Grouped<'_> {
    pub fn len(&self) -> usize {
        self.favorites.len() + self.others.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn can_clear_favorites(&self) -> bool {
        !self.favorites.is_empty()
    }

    pub fn can_clear_others(&self) -> bool {
        !self.others.is_empty()
    }

    /// Favorites first, then the rest.
    pub fn iter(&self) -> impl Iterator<Item = &ContactEntry> + '_ {
        self.favorites.iter().chain(self.others.iter()).copied()
    }
}

/// Where the initial list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Service,
    Seed,
}

/// Values typed into the add-contact view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactForm {
    pub first_name: String,
    pub last_name: String,
    /// Index into [`COUNTRIES`]
    pub country: usize,
    pub digits: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("first name is required")]
    MissingName,

    #[error("phone number is required")]
    MissingPhone,

    #[error("phone number must have {required} digits for {country}")]
    PhoneLength { required: usize, country: String },
}

impl ContactForm {
    pub fn new(dial_code: &str) -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            country: countries::index_by_dial_code(dial_code),
            digits: String::new(),
        }
    }

    pub fn country(&self) -> &'static Country {
        COUNTRIES.get(self.country).unwrap_or(&COUNTRIES[0])
    }

    /// Check the entry and build the create request.
    pub fn validate(&self) -> Result<NewContact, FormError> {
        let country = self.country();
        if self.first_name.trim().is_empty() {
            return Err(FormError::MissingName);
        }
        let digits = countries::digits_only(&self.digits);
        if digits.is_empty() {
            return Err(FormError::MissingPhone);
        }
        if !country.accepts(&digits) {
            return Err(FormError::PhoneLength {
                required: country.digits,
                country: country.name.to_string(),
            });
        }
        Ok(NewContact {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: country.format_phone(&digits),
            image: None,
        })
    }
}

pub struct Controller<S: ContactService> {
    service: S,
    contacts: Vec<ContactEntry>,
    search: String,
    confirm_modal: Option<ConfirmModal>,
    add_view_open: bool,
    status: Option<String>,
}

impl<S: ContactService> Controller<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            contacts: Vec::new(),
            search: String::new(),
            confirm_modal: None,
            add_view_open: false,
            status: None,
        }
    }

    /// Initial fetch. Falls back to the bundled seed list when the service
    /// fails or has nothing.
    pub fn load(&mut self) -> LoadSource {
        match self.service.list() {
            Ok(list) if !list.is_empty() => {
                info!(count = list.len(), "loaded contacts from service");
                self.contacts = list
                    .into_iter()
                    .map(|c| ContactEntry::new(c, SyncStatus::Synced))
                    .collect();
                LoadSource::Service
            }
            Ok(_) => {
                info!("service has no contacts, showing seed list");
                self.use_seed();
                LoadSource::Seed
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "could not load contacts, showing seed list");
                self.use_seed();
                self.set_status("Service unreachable: showing sample contacts");
                LoadSource::Seed
            }
        }
    }

    fn use_seed(&mut self) {
        self.contacts = seed::seed_contacts()
            .into_iter()
            .map(|c| ContactEntry::new(c, SyncStatus::LocalOnly))
            .collect();
    }

    /// Replace the local list with the service's. Session-only changes are
    /// discarded. On failure the current list is kept.
    pub fn reload(&mut self) -> bool {
        match self.service.list() {
            Ok(list) => {
                self.contacts = list
                    .into_iter()
                    .map(|c| ContactEntry::new(c, SyncStatus::Synced))
                    .collect();
                self.set_status(format!("Reloaded {} contacts", self.contacts.len()));
                true
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "reload failed");
                self.set_status("Reload failed: service unreachable");
                false
            }
        }
    }

    pub fn contacts(&self) -> &[ContactEntry] {
        &self.contacts
    }

    pub fn get(&self, id: i64) -> Option<&ContactEntry> {
        self.contacts.iter().find(|e| e.contact.id == id)
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, text: impl Into<String>) {
        self.search = text.into();
    }

    pub fn filtered(&self) -> Vec<&ContactEntry> {
        let normalized = search::normalize_query(&self.search);
        self.contacts
            .iter()
            .filter(|e| search::matches(&e.contact, normalized.as_deref()))
            .collect()
    }

    pub fn grouped(&self) -> Grouped<'_> {
        let (favorites, others): (Vec<&ContactEntry>, Vec<&ContactEntry>) = self
            .filtered()
            .into_iter()
            .partition(|e| e.contact.favorite);
        Grouped { favorites, others }
    }

    pub fn confirm_modal(&self) -> Option<&ConfirmModal> {
        self.confirm_modal.as_ref()
    }

    pub fn add_view_open(&self) -> bool {
        self.add_view_open
    }

    pub fn open_add_view(&mut self) {
        self.add_view_open = true;
    }

    pub fn close_add_view(&mut self) {
        self.add_view_open = false;
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn set_status<M: Into<String>>(&mut self, message: M) {
        self.status = Some(message.into());
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    /// Records whose local state the service has not confirmed.
    pub fn unsynced_count(&self) -> usize {
        self.contacts
            .iter()
            .filter(|e| e.sync != SyncStatus::Synced)
            .count()
    }

    // -------------------------------------------------------------------------
    // Add contact
    // -------------------------------------------------------------------------

    /// Validate and create. Returns the id the new record got.
    pub fn submit_contact(&mut self, form: &ContactForm) -> Result<i64, FormError> {
        let request = form.validate()?;

        let id = match self.service.create(&request) {
            Ok(created) => {
                let id = created.id;
                self.contacts
                    .push(ContactEntry::new(created, SyncStatus::Synced));
                self.set_status("Contact added");
                id
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "create failed, keeping contact locally");
                let id = self.local_id();
                self.contacts
                    .push(ContactEntry::new(request.into_contact(id), SyncStatus::LocalOnly));
                self.set_status("Contact added locally: service unreachable");
                id
            }
        };

        self.add_view_open = false;
        Ok(id)
    }

    /// Timestamp id, or a random one if the timestamp is already used here.
    fn local_id(&self) -> i64 {
        let taken = |id: i64| self.contacts.iter().any(|e| e.contact.id == id);
        let mut id = now_millis();
        while taken(id) {
            id = random_id();
        }
        id
    }

    // -------------------------------------------------------------------------
    // Confirmation gate
    // -------------------------------------------------------------------------

    pub fn request_delete(&mut self, id: i64) {
        let Some(entry) = self.get(id) else {
            self.set_status(format!("No contact with id {id}"));
            return;
        };
        let name = entry.contact.display_name();
        self.open_modal(ConfirmModal {
            title: "DELETE CONTACT".to_string(),
            message: format!("Delete {name}? This cannot be undone."),
            action: ConfirmAction::DeleteContact { id },
        });
    }

    /// Favoriting applies at once; un-favoriting asks first.
    pub fn request_toggle_favorite(&mut self, id: i64) {
        let Some(entry) = self.get(id) else {
            self.set_status(format!("No contact with id {id}"));
            return;
        };
        if entry.contact.favorite {
            let name = entry.contact.display_name();
            self.open_modal(ConfirmModal {
                title: "REMOVE FAVORITE".to_string(),
                message: format!("Remove {name} from favorites?"),
                action: ConfirmAction::RemoveFavorite { id },
            });
        } else {
            self.toggle_favorite(id);
        }
    }

    pub fn request_clear_favorites(&mut self) {
        let count = self.contacts.iter().filter(|e| e.contact.favorite).count();
        if count == 0 {
            self.set_status("No favorites to clear");
            return;
        }
        self.open_modal(ConfirmModal {
            title: "CLEAR FAVORITES".to_string(),
            message: format!(
                "Remove all {count} contacts from favorites? This only affects the current session."
            ),
            action: ConfirmAction::ClearFavorites,
        });
    }

    pub fn request_clear_others(&mut self) {
        let count = self.contacts.iter().filter(|e| !e.contact.favorite).count();
        if count == 0 {
            self.set_status("No contacts to clear");
            return;
        }
        self.open_modal(ConfirmModal {
            title: "CLEAR CONTACTS".to_string(),
            message: format!(
                "Remove all {count} non-favorite contacts? They come back on reload."
            ),
            action: ConfirmAction::ClearOthers,
        });
    }

    // Last request wins.
    fn open_modal(&mut self, modal: ConfirmModal) {
        self.confirm_modal = Some(modal);
    }

    /// Run the pending action and close the modal.
    pub fn confirm(&mut self) {
        let Some(modal) = self.confirm_modal.take() else {
            return;
        };
        match modal.action {
            ConfirmAction::DeleteContact { id } => self.delete_contact(id),
            ConfirmAction::RemoveFavorite { id } => self.toggle_favorite(id),
            ConfirmAction::ClearFavorites => self.clear_favorites(),
            ConfirmAction::ClearOthers => self.clear_others(),
        }
    }

    pub fn cancel(&mut self) {
        self.confirm_modal = None;
    }

    // -------------------------------------------------------------------------
    // Actions
    // -------------------------------------------------------------------------

    fn delete_contact(&mut self, id: i64) {
        let remote = self.service.delete(id);
        self.contacts.retain(|e| e.contact.id != id);
        match remote {
            Ok(()) => self.set_status("Contact deleted"),
            Err(err) => {
                warn!(id, error = %format!("{err:#}"), "delete failed on service");
                self.set_status("Contact deleted locally: service unreachable");
            }
        }
    }

    /// The service only flips, so the wanted value comes from local state.
    /// When a session-only clear left the two sides apart, the first flip
    /// lands on the wrong value and a second one brings the service back
    /// in line.
    fn toggle_favorite(&mut self, id: i64) {
        let Some(wanted) = self
            .contacts
            .iter()
            .find(|e| e.contact.id == id)
            .map(|e| !e.contact.favorite)
        else {
            return;
        };

        let mut remote = self.service.toggle_favorite(id);
        if matches!(&remote, Ok(Some(updated)) if updated.favorite != wanted) {
            debug!(id, wanted, "service disagreed on favorite, flipping again");
            remote = self.service.toggle_favorite(id);
        }

        let Some(entry) = self.contacts.iter_mut().find(|e| e.contact.id == id) else {
            return;
        };

        match remote {
            Ok(Some(updated)) if updated.favorite == wanted => {
                entry.contact = updated;
                entry.sync = SyncStatus::Synced;
            }
            Ok(Some(_)) => {
                warn!(id, wanted, "service kept a different favorite value");
                entry.contact.favorite = wanted;
                entry.sync = SyncStatus::Pending;
            }
            Ok(None) => {
                warn!(id, "service does not know this contact");
                entry.contact.favorite = wanted;
                entry.sync = SyncStatus::LocalOnly;
            }
            Err(err) => {
                warn!(id, error = %format!("{err:#}"), "favorite toggle failed on service");
                entry.contact.favorite = wanted;
                if entry.sync == SyncStatus::Synced {
                    entry.sync = SyncStatus::Pending;
                }
            }
        }

        let message = if entry.contact.favorite {
            "Added to favorites"
        } else {
            "Removed from favorites"
        };
        self.set_status(message);
    }

    fn clear_favorites(&mut self) {
        let mut cleared = 0;
        for entry in self.contacts.iter_mut().filter(|e| e.contact.favorite) {
            entry.contact.favorite = false;
            if entry.sync == SyncStatus::Synced {
                entry.sync = SyncStatus::Pending;
            }
            cleared += 1;
        }
        info!(cleared, "favorites cleared for this session");
        self.set_status(format!(
            "Cleared {cleared} favorites for this session (reload restores them)"
        ));
    }

    fn clear_others(&mut self) {
        let before = self.contacts.len();
        self.contacts.retain(|e| e.contact.favorite);
        let removed = before - self.contacts.len();
        info!(removed, "non-favorite contacts cleared for this session");
        self.set_status(format!(
            "Removed {removed} contacts for this session (reload restores them)"
        ));
    }
}
