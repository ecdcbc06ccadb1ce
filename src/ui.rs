use crate::models::{ArchivedMessage, Candidate, UnsubscribeAction};
use chrono::Local;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum View {
    #[default]
    Newsletters,
    Archived,
    Ignored,
}

impl View {
    pub fn next(self) -> Self {
        match self {
            View::Newsletters => View::Archived,
            View::Archived => View::Ignored,
            View::Ignored => View::Newsletters,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            View::Newsletters => View::Ignored,
            View::Archived => View::Newsletters,
            View::Ignored => View::Archived,
        }
    }
}

pub enum UIMode {
    Browsing,
    Authentication,
}

pub struct UIState {
    /// Persisted scan results, unfiltered. The ignore list is applied at
    /// render time so an unignore takes effect without a rescan.
    pub candidates: Vec<Candidate>,
    pub ignored: Vec<String>,
    pub archived: Vec<ArchivedMessage>,
    pub selected_newsletter: usize,
    pub selected_archived: usize,
    pub selected_ignored: usize,
    pub view: View,
    pub mode: UIMode,
    pub auth_url: Option<String>,
    pub status_message: Option<String>,
    pub scanning: bool,
    pub list_state: ListState,
}

impl Default for UIState {
    fn default() -> Self {
        Self {
            candidates: Vec::new(),
            ignored: Vec::new(),
            archived: Vec::new(),
            selected_newsletter: 0,
            selected_archived: 0,
            selected_ignored: 0,
            view: View::default(),
            mode: UIMode::Browsing,
            auth_url: None,
            status_message: None,
            scanning: false,
            list_state: ListState::default(),
        }
    }
}

impl UIState {
    /// Scan results minus ignored senders, in scan order.
    pub fn visible_candidates(&self) -> Vec<&Candidate> {
        self.candidates
            .iter()
            .filter(|c| !self.ignored.iter().any(|s| s == &c.sender))
            .collect()
    }

    pub fn selected_candidate(&self) -> Option<&Candidate> {
        self.visible_candidates()
            .get(self.selected_newsletter)
            .copied()
    }

    pub fn selected_archived_record(&self) -> Option<&ArchivedMessage> {
        self.archived.get(self.selected_archived)
    }

    pub fn selected_ignored_sender(&self) -> Option<&String> {
        self.ignored.get(self.selected_ignored)
    }

    fn current_list_len(&self) -> usize {
        match self.view {
            View::Newsletters => self.visible_candidates().len(),
            View::Archived => self.archived.len(),
            View::Ignored => self.ignored.len(),
        }
    }

    pub fn move_selection(&mut self, delta: isize) {
        let len = self.current_list_len();
        let selected = match self.view {
            View::Newsletters => &mut self.selected_newsletter,
            View::Archived => &mut self.selected_archived,
            View::Ignored => &mut self.selected_ignored,
        };
        if len == 0 {
            *selected = 0;
            return;
        }
        let next = selected.saturating_add_signed(delta);
        *selected = next.min(len - 1);
    }

    /// Call after any list reloads; selections must stay in bounds.
    pub fn clamp_selections(&mut self) {
        let visible = self.visible_candidates().len();
        if self.selected_newsletter >= visible {
            self.selected_newsletter = visible.saturating_sub(1);
        }
        if self.selected_archived >= self.archived.len() {
            self.selected_archived = self.archived.len().saturating_sub(1);
        }
        if self.selected_ignored >= self.ignored.len() {
            self.selected_ignored = self.ignored.len().saturating_sub(1);
        }
    }
}

/// One-word-per-action summary shown on each newsletter entry.
pub fn method_summary(actions: &[UnsubscribeAction]) -> String {
    actions
        .iter()
        .map(|a| match a {
            UnsubscribeAction::Web { .. } => "Web",
            UnsubscribeAction::Mail { .. } => "Email",
            UnsubscribeAction::ClickToTrigger => "Webmail only",
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn render(f: &mut Frame, state: &mut UIState) {
    if let UIMode::Authentication = state.mode {
        render_authentication(f, state);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(f.area());

    match state.view {
        View::Newsletters => render_newsletters(f, state, chunks[0]),
        View::Archived => render_archived(f, state, chunks[0]),
        View::Ignored => render_ignored(f, state, chunks[0]),
    }

    let help = match state.view {
        View::Newsletters => "s: scan  u/Enter: unsubscribe  i: ignore sender  Tab: next view  q: quit",
        View::Archived => "r/Enter: restore to inbox  Tab: next view  q: quit",
        View::Ignored => "d/Enter: unignore  Tab: next view  q: quit",
    };
    let footer = Paragraph::new(help)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, chunks[1]);
}

fn titled_block(title: &str, status: &Option<String>) -> Block<'static> {
    let title = match status {
        Some(status) => format!("{title} - {status}"),
        None => title.to_string(),
    };
    Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(Color::Gray))
}

fn render_newsletters(f: &mut Frame, state: &mut UIState, area: Rect) {
    let block = titled_block("Newsletters", &state.status_message);
    let visible = state.visible_candidates();

    if visible.is_empty() {
        let (text, style) = if state.scanning {
            (
                "⏳ Scanning inbox…".to_string(),
                Style::default().fg(Color::Yellow),
            )
        } else if state.candidates.is_empty() {
            (
                "No newsletters found.\n\nPress 's' to scan your inbox.".to_string(),
                Style::default().fg(Color::DarkGray),
            )
        } else {
            (
                "All found senders are ignored.".to_string(),
                Style::default().fg(Color::DarkGray),
            )
        };
        let empty = Paragraph::new(text)
            .block(block)
            .style(style)
            .wrap(ratatui::widgets::Wrap { trim: true });
        f.render_widget(empty, area);
        return;
    }

    let list_width = area.width.saturating_sub(2) as usize;
    let items: Vec<ListItem> = visible
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let style = if i == state.selected_newsletter {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let is_selected = i == state.selected_newsletter;
            let text = entry_lines(
                is_selected,
                list_width,
                &[
                    format!(" From: {}", c.sender),
                    format!(" Subj: {}", c.subject),
                    format!(" Via:  {}", method_summary(&c.actions)),
                ],
            );
            ListItem::new(text).style(style)
        })
        .collect();

    let len = visible.len();
    let selected = state.selected_newsletter;
    render_separated_list(f, state, area, block, items, len, selected);
}

fn render_archived(f: &mut Frame, state: &mut UIState, area: Rect) {
    let block = titled_block("Unsubscribed (archived)", &state.status_message);

    if state.archived.is_empty() {
        let empty = Paragraph::new("Nothing has been archived yet.")
            .block(block)
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(empty, area);
        return;
    }

    let list_width = area.width.saturating_sub(2) as usize;
    let items: Vec<ListItem> = state
        .archived
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let style = if i == state.selected_archived {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let when = r
                .archived_at
                .with_timezone(&Local)
                .format("%b %d %Y @ %-I:%M%p")
                .to_string();
            let text = entry_lines(
                i == state.selected_archived,
                list_width,
                &[
                    format!(" From: {}", r.sender),
                    format!(" Subj: {}", r.subject),
                    format!(" Moved: {}", when),
                ],
            );
            ListItem::new(text).style(style)
        })
        .collect();

    let len = state.archived.len();
    let selected = state.selected_archived;
    render_separated_list(f, state, area, block, items, len, selected);
}

fn render_ignored(f: &mut Frame, state: &mut UIState, area: Rect) {
    let block = titled_block("Ignored senders", &state.status_message);

    if state.ignored.is_empty() {
        let empty = Paragraph::new("No senders currently ignored.")
            .block(block)
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = state
        .ignored
        .iter()
        .enumerate()
        .map(|(i, sender)| {
            let style = if i == state.selected_ignored {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let indicator = if i == state.selected_ignored { "█" } else { " " };
            ListItem::new(format!("{indicator} {sender}")).style(style)
        })
        .collect();

    let list = List::new(items).block(block);
    state.list_state.select(Some(state.selected_ignored));
    f.render_stateful_widget(list, area, &mut state.list_state);
}

/// Three-line entries separated by a thin rule, selection marked with a bar
/// in the left gutter.
fn entry_lines(selected: bool, width: usize, lines: &[String]) -> String {
    let indicator = if selected { "█" } else { " " };
    let inner = width.saturating_sub(2);
    lines
        .iter()
        .map(|line| {
            let char_count = line.chars().count();
            let padded = if char_count > inner {
                let truncated: String = line.chars().take(inner.saturating_sub(3)).collect();
                format!("{truncated}...")
            } else {
                line.clone()
            };
            format!("{indicator}{padded}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_separated_list(
    f: &mut Frame,
    state: &mut UIState,
    area: Rect,
    block: Block<'static>,
    items: Vec<ListItem>,
    len: usize,
    selected: usize,
) {
    let separator_width = area.width.saturating_sub(4) as usize;
    let separator = "─".repeat(separator_width);
    let mut with_separators: Vec<ListItem> = Vec::new();
    for (i, item) in items.into_iter().enumerate() {
        with_separators.push(item);
        if i + 1 < len {
            with_separators
                .push(ListItem::new(separator.clone()).style(Style::default().fg(Color::DarkGray)));
        }
    }

    let list = List::new(with_separators).block(block);
    // Account for the separator rows when translating the selection.
    state.list_state.select(Some(selected * 2));
    f.render_stateful_widget(list, area, &mut state.list_state);
}

fn render_authentication(f: &mut Frame, state: &mut UIState) {
    let area = centered_rect(60, 40, f.area());
    f.render_widget(Clear, area);

    let block = Block::default()
        .title(" Authentication Required ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(6),
            Constraint::Length(4),
            Constraint::Min(0),
        ])
        .split(inner);

    let msg = Paragraph::new(
        "To scan your Gmail account, please visit the following URL in your browser and authorize the application:",
    )
    .wrap(ratatui::widgets::Wrap { trim: true });
    f.render_widget(msg, chunks[0]);

    if let Some(url) = &state.auth_url {
        let url_p = Paragraph::new(url.as_str())
            .style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::UNDERLINED),
            )
            .block(Block::default().borders(Borders::ALL).title(" URL "))
            .wrap(ratatui::widgets::Wrap { trim: false });
        f.render_widget(url_p, chunks[1]);
    }

    let footer = Paragraph::new(
        "Your default browser should have opened automatically. If not, copy the URL above.\n\nThe application will proceed once authorization completes.",
    )
    .style(Style::default().fg(Color::Gray))
    .wrap(ratatui::widgets::Wrap { trim: true });
    f.render_widget(footer, chunks[2]);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, sender: &str) -> Candidate {
        Candidate {
            id: id.into(),
            sender: sender.into(),
            subject: "subject".into(),
            actions: vec![UnsubscribeAction::Web {
                url: "https://a.example/u".into(),
            }],
        }
    }

    #[test]
    fn ignored_senders_are_filtered_from_view() {
        let mut state = UIState::default();
        state.candidates = vec![candidate("m1", "a@example.com"), candidate("m2", "b@example.com")];
        state.ignored = vec!["a@example.com".to_string()];

        let visible = state.visible_candidates();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "m2");

        // Unignoring makes the entry visible again without any rescan.
        state.ignored.clear();
        assert_eq!(state.visible_candidates().len(), 2);
    }

    #[test]
    fn method_summary_labels_each_action() {
        let actions = vec![
            UnsubscribeAction::Web {
                url: "https://a.example/u".into(),
            },
            UnsubscribeAction::Mail {
                url: "mailto:u@example.com".into(),
            },
            UnsubscribeAction::ClickToTrigger,
        ];
        assert_eq!(method_summary(&actions), "Web, Email, Webmail only");
    }

    #[test]
    fn selection_clamps_to_visible_list() {
        let mut state = UIState::default();
        state.candidates = vec![candidate("m1", "a"), candidate("m2", "b")];
        state.selected_newsletter = 1;

        state.candidates.pop();
        state.clamp_selections();
        assert_eq!(state.selected_newsletter, 0);
    }

    #[test]
    fn move_selection_stays_in_bounds() {
        let mut state = UIState::default();
        state.candidates = vec![candidate("m1", "a"), candidate("m2", "b")];
        state.move_selection(1);
        assert_eq!(state.selected_newsletter, 1);
        state.move_selection(1);
        assert_eq!(state.selected_newsletter, 1);
        state.move_selection(-1);
        state.move_selection(-1);
        assert_eq!(state.selected_newsletter, 0);
    }
}
