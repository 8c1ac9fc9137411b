use crate::contact::Contact;

// (id, first name, surname, phone, favorite)
const SEED: &[(i64, &str, &str, &str, bool)] = &[
    (1, "Ana", "Lopez", "+34 612345678", true),
    (2, "Beto", "Ruiz", "+52 5512345678", false),
    (3, "Carla", "Méndez", "+54 1145678901", false),
    (4, "Diego", "Fernández", "+56 912345678", false),
    (5, "Elena", "García", "+34 698765432", true),
    (6, "Fernando", "", "+57 3001234567", false),
];

/// Contacts shown when the service cannot provide any.
pub fn seed_contacts() -> Vec<Contact> {
    SEED.iter()
        .map(|&(id, first, last, phone, favorite)| Contact {
            id,
            first_name: first.to_string(),
            last_name: last.to_string(),
            phone: phone.to_string(),
            favorite,
            image: None,
        })
        .collect()
}
