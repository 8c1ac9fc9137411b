use crate::contact::Contact;

/// Normalize a string for case-insensitive matching.
pub fn normalize(s: &str) -> String {
    s.to_lowercase()
}

/// `None` for an empty query, which matches everything.
pub fn normalize_query(query: &str) -> Option<String> {
    if query.is_empty() {
        None
    } else {
        Some(normalize(query))
    }
}

/// Substring match against first name or surname.
pub fn matches(contact: &Contact, normalized: Option<&str>) -> bool {
    match normalized {
        None => true,
        Some(needle) => {
            normalize(&contact.first_name).contains(needle)
                || normalize(&contact.last_name).contains(needle)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::NewContact;

    fn contact(first: &str, last: &str) -> Contact {
        NewContact {
            first_name: first.into(),
            last_name: last.into(),
            phone: "+34 600000000".into(),
            image: None,
        }
        .into_contact(1)
    }

    #[test]
    fn test_empty_query_matches_all() {
        assert_eq!(normalize_query(""), None);
        assert!(matches(&contact("Ana", "Lopez"), None));
    }

    #[test]
    fn test_case_insensitive_first_or_last() {
        let ana = contact("Ana", "López");
        let q = normalize_query("LÓP");
        assert!(matches(&ana, q.as_deref()));
        assert!(matches(&ana, normalize_query("an").as_deref()));
        assert!(!matches(&ana, normalize_query("ana lópez").as_deref()));
        assert!(!matches(&ana, normalize_query("lopez").as_deref()));
    }

    #[test]
    fn test_phone_is_not_searched() {
        let ana = contact("Ana", "Lopez");
        assert!(!matches(&ana, normalize_query("600").as_deref()));
    }
}
