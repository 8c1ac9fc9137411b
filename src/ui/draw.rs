use anyhow::Result;
use ratatui::backend::Backend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::line::NORMAL as LINE;
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use ratatui::{Frame, Terminal};
use tui_widgets::popup::Popup;

use crate::client::ContactService;
use crate::config::{FormKeys, RgbColor};
use crate::contact::SyncStatus;
use crate::controller::{ConfirmTone, ContactEntry};

use super::app::App;
use super::form::FormField;

const CONFIRM_HELP: &str = "Y/Enter: confirm  N/Esc: cancel";
const SEARCH_HELP: &str = "Type to filter  Enter/Esc: back to list";
const NAME_WIDTH: usize = 28;

pub fn render<B: Backend, S: ContactService>(
    terminal: &mut Terminal<B>,
    app: &mut App<'_, S>,
) -> Result<()> {
    terminal.draw(|frame| draw_frame(frame, app))?;
    Ok(())
}

fn draw_frame<S: ContactService>(frame: &mut Frame<'_>, app: &mut App<'_, S>) {
    let size = frame.area();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(size);

    draw_header(frame, layout[0], app);
    if app.controller.add_view_open() {
        draw_add_form(frame, layout[1], app);
    } else {
        draw_contacts(frame, layout[1], app);
    }
    draw_footer(frame, layout[2], app);
    draw_confirm_modal(frame, size, app);
}

fn draw_header<S: ContactService>(frame: &mut Frame<'_>, area: Rect, app: &App<'_, S>) {
    let style = header_text_style(app);
    let total = app.controller.contacts().len();
    let favorites = app
        .controller
        .contacts()
        .iter()
        .filter(|e| e.contact.favorite)
        .count();
    let line = Line::from(vec![
        Span::styled("AGENDA", style.add_modifier(Modifier::BOLD)),
        Span::raw("   "),
        Span::styled(format!("{total} contacts, {favorites} favorites"), style),
        Span::raw("   "),
        Span::styled(app.config().client.base_url.clone(), Style::default()),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

// =============================================================================
// Contact list
// =============================================================================

fn draw_contacts<S: ContactService>(frame: &mut Frame<'_>, area: Rect, app: &App<'_, S>) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(0)])
        .split(inner);

    draw_search_header(frame, layout[0], app, area.width);
    draw_contact_list(frame, layout[1], app);
}

fn draw_search_header<S: ContactService>(
    frame: &mut Frame<'_>,
    area: Rect,
    app: &App<'_, S>,
    outer_width: u16,
) {
    if area.width == 0 || area.height == 0 {
        return;
    }

    let label = "SEARCH: ";
    let value_style = if app.search_active {
        selection_style(app)
    } else {
        Style::default()
    };
    let line = Line::from(vec![
        Span::styled(label, header_text_style(app)),
        Span::styled(app.search_input.value().to_string(), value_style),
    ]);

    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(area);

    frame.render_widget(Paragraph::new(line), parts[0]);

    if app.search_active {
        let column = Span::raw(label).width() + app.search_input.visual_cursor();
        let x = parts[0].x.saturating_add(column as u16);
        frame.set_cursor_position((x, parts[0].y));
    }

    if area.height < 2 {
        return;
    }

    // Separator with connector characters: ├───┤
    let inner_width = outer_width.saturating_sub(2) as usize;
    let separator = format!(
        "{}{}{}",
        LINE.vertical_right,
        LINE.horizontal.repeat(inner_width),
        LINE.vertical_left
    );
    let separator_area = Rect {
        x: parts[1].x.saturating_sub(1),
        y: parts[1].y,
        width: outer_width,
        height: 1,
    };
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(separator, separator_style(app)))),
        separator_area,
    );
}

fn draw_contact_list<S: ContactService>(frame: &mut Frame<'_>, area: Rect, app: &App<'_, S>) {
    let grouped = app.controller.grouped();

    if grouped.is_empty() {
        let search = app.controller.search();
        let message = if search.is_empty() {
            format!(
                "No contacts yet. Press {} to add one.",
                hint(&app.config().keys.global.add)
            )
        } else {
            format!("No contacts match \"{search}\"")
        };
        render_centered(frame, area, &message);
        return;
    }

    let keys = &app.config().keys.list;
    let mut items: Vec<ListItem> = Vec::new();
    let mut selected_row = None;
    let mut index = 0;

    if !grouped.favorites.is_empty() {
        items.push(section_item(
            app,
            &format!("FAVORITES ({})", grouped.favorites.len()),
            grouped.can_clear_favorites().then(|| hint(&keys.clear_favorites)),
        ));
        for entry in &grouped.favorites {
            if index == app.selected {
                selected_row = Some(items.len());
            }
            items.push(contact_item(app, entry));
            index += 1;
        }
    }

    items.push(section_item(
        app,
        &format!("ALL CONTACTS ({})", grouped.others.len()),
        grouped.can_clear_others().then(|| hint(&keys.clear_others)),
    ));
    for entry in &grouped.others {
        if index == app.selected {
            selected_row = Some(items.len());
        }
        items.push(contact_item(app, entry));
        index += 1;
    }

    let mut state = ListState::default();
    state.select(selected_row);

    let list = List::new(items)
        .highlight_style(selection_style(app))
        .highlight_symbol(" ")
        .repeat_highlight_symbol(false);

    frame.render_stateful_widget(list, area, &mut state);
}

fn section_item<S: ContactService>(
    app: &App<'_, S>,
    title: &str,
    clear_key: Option<&str>,
) -> ListItem<'static> {
    let mut spans = vec![Span::styled(
        title.to_string(),
        header_text_style(app).add_modifier(Modifier::BOLD),
    )];
    if let Some(key) = clear_key {
        spans.push(Span::styled(
            format!("   [{key}: clear all]"),
            separator_style(app),
        ));
    }
    ListItem::new(Line::from(spans))
}

fn contact_item<S: ContactService>(app: &App<'_, S>, entry: &ContactEntry) -> ListItem<'static> {
    let contact = &entry.contact;
    let star = if contact.favorite { "★" } else { " " };
    let marker = entry.sync.marker();
    let name = truncate_value(&contact.display_name(), NAME_WIDTH);

    let sync_style = match entry.sync {
        SyncStatus::Synced => Style::default(),
        SyncStatus::Pending | SyncStatus::LocalOnly => Style::default().fg(Color::DarkGray),
    };

    ListItem::new(Line::from(vec![
        Span::styled(format!(" {star} "), favorite_style(app)),
        Span::raw(format!("{:<3}", contact.initials())),
        Span::raw(format!("{:<width$}  ", name, width = NAME_WIDTH)),
        Span::raw(contact.phone.clone()),
        Span::styled(format!(" {marker}"), sync_style),
    ]))
}

// =============================================================================
// Add contact
// =============================================================================

fn draw_add_form<S: ContactService>(frame: &mut Frame<'_>, area: Rect, app: &App<'_, S>) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app))
        .title(Span::styled(" NEW CONTACT ", header_text_style(app)));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let form = &app.add_form;
    let country = form.country();
    let label_width = 10;
    let mut lines: Vec<Line> = Vec::new();
    let mut cursor = None;

    for field in [
        FormField::FirstName,
        FormField::LastName,
        FormField::Country,
        FormField::Phone,
    ] {
        let focused = form.focus == field;
        let label_style = if focused {
            selection_style(app)
        } else {
            header_text_style(app)
        };
        let mut spans = vec![
            Span::styled(format!("{:<width$}", field.label(), width = label_width), label_style),
            Span::raw(" "),
        ];
        match field {
            FormField::Country => {
                spans.push(Span::raw(format!("< {} ({}) >", country.name, country.dial_code)));
            }
            FormField::Phone => {
                let prefix = format!("{} ", country.dial_code);
                if focused {
                    cursor = form
                        .visual_cursor()
                        .map(|c| (lines.len(), label_width + 1 + prefix.chars().count() + c));
                }
                spans.push(Span::styled(prefix, separator_style(app)));
                spans.push(Span::raw(form.value(field).to_string()));
                let counter_style = if form.digit_count() == country.digits {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                spans.push(Span::styled(
                    format!("   {} / {} digits", form.digit_count(), country.digits),
                    counter_style,
                ));
            }
            FormField::FirstName | FormField::LastName => {
                if focused {
                    cursor = form
                        .visual_cursor()
                        .map(|c| (lines.len(), label_width + 1 + c));
                }
                spans.push(Span::raw(form.value(field).to_string()));
            }
        }
        lines.push(Line::from(spans));
        lines.push(Line::from(""));
    }

    if let Some(error) = &form.error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
    }

    frame.render_widget(Paragraph::new(lines), inner);

    if let Some((row, column)) = cursor {
        let x = inner.x.saturating_add(column as u16);
        let y = inner.y.saturating_add(row as u16);
        if x < inner.right() && y < inner.bottom() {
            frame.set_cursor_position((x, y));
        }
    }
}

// =============================================================================
// Modal and footer
// =============================================================================

fn draw_confirm_modal<S: ContactService>(
    frame: &mut Frame<'_>,
    area: Rect,
    app: &mut App<'_, S>,
) {
    let Some(modal) = app.controller.confirm_modal() else {
        return;
    };

    let body = Text::from(vec![
        Line::from(modal.message.clone()),
        Line::from(""),
        Line::from(CONFIRM_HELP),
    ]);

    let border = match modal.action.tone() {
        ConfirmTone::Danger => Style::default().fg(Color::Red),
        ConfirmTone::Warning => favorite_style(app),
    };
    let title_line = Line::from(Span::styled(modal.title.clone(), border));
    let popup = Popup::new(body).title(title_line).border_style(border);

    frame.render_stateful_widget_ref(popup, area, &mut app.modal_popup);
}

fn draw_footer<S: ContactService>(frame: &mut Frame<'_>, area: Rect, app: &App<'_, S>) {
    let keys = &app.config().keys;
    let message = if app.controller.confirm_modal().is_some() {
        CONFIRM_HELP.to_string()
    } else if app.controller.add_view_open() {
        form_help(&keys.form, app.add_form.focus)
    } else if app.search_active {
        SEARCH_HELP.to_string()
    } else if let Some(status) = app.controller.status() {
        status.to_string()
    } else {
        format!(
            "{}: search  {}: add  {}: favorite  {}: delete  {}: reload  {}: quit",
            hint(&keys.global.search),
            hint(&keys.global.add),
            hint(&keys.list.favorite),
            hint(&keys.list.delete),
            hint(&keys.global.reload),
            hint(&keys.global.quit),
        )
    };

    let colors = app.ui_colors();
    let style = Style::default()
        .fg(color(colors.status_fg))
        .bg(color(colors.status_bg));

    let background = Block::default().style(Style::default().bg(color(colors.status_bg)));
    frame.render_widget(background, area);

    let unsynced = app.controller.unsynced_count();
    let right = if unsynced > 0 {
        format!("{unsynced} unsynced ")
    } else {
        String::new()
    };
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(right.len() as u16)])
        .split(area);

    frame.render_widget(Paragraph::new(message).style(style), chunks[0]);
    frame.render_widget(
        Paragraph::new(right)
            .style(style.add_modifier(Modifier::BOLD))
            .alignment(Alignment::Right),
        chunks[1],
    );
}

// =============================================================================
// Helpers
// =============================================================================

/// Country keys only act on the Country row, so the help says where.
fn form_help(keys: &FormKeys, focus: FormField) -> String {
    let country = if focus == FormField::Country {
        format!(
            "{}/{}: change country",
            hint(&keys.prev_country),
            hint(&keys.next_country)
        )
    } else {
        format!(
            "{}/{} on Country: change country",
            hint(&keys.prev_country),
            hint(&keys.next_country)
        )
    };
    format!(
        "{}/{}: field  {}  {}: save  {}: cancel",
        hint(&keys.next_field),
        hint(&keys.prev_field),
        country,
        hint(&keys.submit),
        hint(&keys.cancel),
    )
}

fn hint(bindings: &[String]) -> &str {
    bindings.first().map(String::as_str).unwrap_or("-")
}

fn render_centered(frame: &mut Frame<'_>, area: Rect, text: &str) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    let target = Rect {
        x: area.x,
        y: area.y + area.height / 2,
        width: area.width,
        height: 1,
    };
    frame.render_widget(
        Paragraph::new(text.to_string()).alignment(Alignment::Center),
        target,
    );
}

fn truncate_value(value: &str, max_len: usize) -> String {
    if value.chars().count() <= max_len {
        return value.to_string();
    }
    let kept: String = value.chars().take(max_len.saturating_sub(3)).collect();
    format!("{kept}...")
}

fn selection_style<S: ContactService>(app: &App<'_, S>) -> Style {
    let colors = app.ui_colors();
    Style::default()
        .fg(color(colors.selection_fg))
        .bg(color(colors.selection_bg))
}

fn border_style<S: ContactService>(app: &App<'_, S>) -> Style {
    Style::default().fg(color(app.ui_colors().border))
}

fn header_text_style<S: ContactService>(app: &App<'_, S>) -> Style {
    Style::default().fg(color(app.ui_colors().separator))
}

fn separator_style<S: ContactService>(app: &App<'_, S>) -> Style {
    Style::default().fg(color(app.ui_colors().separator))
}

fn favorite_style<S: ContactService>(app: &App<'_, S>) -> Style {
    Style::default().fg(color(app.ui_colors().favorite))
}

fn color(rgb: RgbColor) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_value() {
        assert_eq!(truncate_value("Ana", 10), "Ana");
        assert_eq!(truncate_value("Fernández Fernández", 10), "Fernánd...");
    }

    #[test]
    fn test_hint_uses_first_binding() {
        assert_eq!(hint(&["r".to_string(), "F5".to_string()]), "r");
        assert_eq!(hint(&[]), "-");
    }

    #[test]
    fn test_form_help_names_country_keys() {
        let keys = FormKeys::default();
        let on_name = form_help(&keys, FormField::FirstName);
        assert!(on_name.contains("Left/Right on Country: change country"));
        assert!(on_name.starts_with("Tab/Backtab: field"));

        let on_country = form_help(&keys, FormField::Country);
        assert!(on_country.contains("Left/Right: change country"));
        assert!(on_country.ends_with("Enter: save  Escape: cancel"));
    }
}
