use crossterm::event::{Event, KeyCode, KeyEvent};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

use crate::controller::ContactForm;
use crate::countries::{self, Country, COUNTRIES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    FirstName,
    LastName,
    Country,
    Phone,
}

impl FormField {
    const ORDER: [FormField; 4] = [
        FormField::FirstName,
        FormField::LastName,
        FormField::Country,
        FormField::Phone,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FormField::FirstName => "NAME",
            FormField::LastName => "SURNAME",
            FormField::Country => "COUNTRY",
            FormField::Phone => "PHONE",
        }
    }

    fn position(self) -> usize {
        Self::ORDER.iter().position(|f| *f == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        Self::ORDER[(self.position() + 1) % Self::ORDER.len()]
    }

    fn prev(self) -> Self {
        Self::ORDER[(self.position() + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }
}

/// Input state of the add-contact view.
pub struct AddForm {
    pub focus: FormField,
    first_name: Input,
    last_name: Input,
    country: usize,
    phone: Input,
    pub error: Option<String>,
}

impl AddForm {
    pub fn new(dial_code: &str) -> Self {
        Self {
            focus: FormField::FirstName,
            first_name: Input::default(),
            last_name: Input::default(),
            country: countries::index_by_dial_code(dial_code),
            phone: Input::default(),
            error: None,
        }
    }

    pub fn focus_next(&mut self) {
        self.focus = self.focus.next();
    }

    pub fn focus_prev(&mut self) {
        self.focus = self.focus.prev();
    }

    pub fn country(&self) -> &'static Country {
        COUNTRIES.get(self.country).unwrap_or(&COUNTRIES[0])
    }

    /// Changing the country clears the phone number.
    pub fn cycle_country(&mut self, delta: isize) {
        let len = COUNTRIES.len() as isize;
        self.country = (self.country as isize + delta).rem_euclid(len) as usize;
        self.phone.reset();
        self.error = None;
    }

    pub fn value(&self, field: FormField) -> &str {
        match field {
            FormField::FirstName => self.first_name.value(),
            FormField::LastName => self.last_name.value(),
            FormField::Country => self.country().name,
            FormField::Phone => self.phone.value(),
        }
    }

    /// Cursor column inside the focused text field.
    pub fn visual_cursor(&self) -> Option<usize> {
        match self.focus {
            FormField::FirstName => Some(self.first_name.visual_cursor()),
            FormField::LastName => Some(self.last_name.visual_cursor()),
            FormField::Country => None,
            FormField::Phone => Some(self.phone.visual_cursor()),
        }
    }

    pub fn digit_count(&self) -> usize {
        self.phone.value().chars().count()
    }

    /// Feed a key to the focused text field. The phone field only takes
    /// digits, up to the selected country's length.
    pub fn handle_key_event(&mut self, key: KeyEvent) -> bool {
        let input = match self.focus {
            FormField::FirstName => &mut self.first_name,
            FormField::LastName => &mut self.last_name,
            FormField::Country => return false,
            FormField::Phone => {
                if let KeyCode::Char(c) = key.code {
                    if !c.is_ascii_digit() || self.digit_count() >= self.country().digits {
                        return true;
                    }
                }
                &mut self.phone
            }
        };
        let handled = input.handle_event(&Event::Key(key)).is_some();
        if handled {
            self.error = None;
        }
        handled
    }

    pub fn to_contact_form(&self) -> ContactForm {
        ContactForm {
            first_name: self.first_name.value().to_string(),
            last_name: self.last_name.value().to_string(),
            country: self.country,
            digits: countries::digits_only(self.phone.value()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn press(form: &mut AddForm, code: KeyCode) {
        form.handle_key_event(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_str(form: &mut AddForm, text: &str) {
        for c in text.chars() {
            press(form, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_phone_takes_digits_up_to_country_length() {
        let mut form = AddForm::new("+34");
        form.focus = FormField::Phone;
        type_str(&mut form, "6a1-2345678999");
        assert_eq!(form.value(FormField::Phone), "612345678");
        assert_eq!(form.digit_count(), 9);
    }

    #[test]
    fn test_country_change_clears_phone() {
        let mut form = AddForm::new("+34");
        form.focus = FormField::Phone;
        type_str(&mut form, "123");
        let before = form.country().name;
        form.cycle_country(1);
        assert_ne!(form.country().name, before);
        assert_eq!(form.value(FormField::Phone), "");

        form.cycle_country(-1);
        assert_eq!(form.country().name, before);
    }

    #[test]
    fn test_country_cycle_wraps() {
        let mut form = AddForm::new("+34");
        form.country = 0;
        form.cycle_country(-1);
        assert_eq!(form.country, COUNTRIES.len() - 1);
        form.cycle_country(1);
        assert_eq!(form.country, 0);
    }

    #[test]
    fn test_focus_cycles_through_fields() {
        let mut form = AddForm::new("+34");
        form.focus_prev();
        assert_eq!(form.focus, FormField::Phone);
        form.focus_next();
        form.focus_next();
        assert_eq!(form.focus, FormField::LastName);
    }

    #[test]
    fn test_contact_form_from_inputs() {
        let mut form = AddForm::new("+52");
        type_str(&mut form, "Beto");
        form.focus_next();
        type_str(&mut form, "Ruiz");
        let contact = form.to_contact_form();
        assert_eq!(contact.first_name, "Beto");
        assert_eq!(contact.last_name, "Ruiz");
        assert_eq!(contact.country().dial_code, "+52");
        assert_eq!(contact.digits, "");
    }
}
