use chrono::{DateTime, Local, Utc};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, AppState, MenuSection};
use crate::modules::notifications::{Notification, NotificationKind};

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(0),
            Constraint::Length(4),
        ])
        .split(f.area());

    draw_header(f, chunks[0], app);

    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(20), Constraint::Percentage(80)])
        .split(chunks[1]);

    draw_menu(f, app, main_chunks[0]);

    match app.current_section {
        MenuSection::Dashboard => draw_dashboard(f, app, main_chunks[1]),
        MenuSection::Notifications => draw_notifications(f, app, main_chunks[1]),
        MenuSection::LeaveRequests => draw_leave_requests(f, app, main_chunks[1]),
    }

    draw_status(f, app, chunks[2]);

    if app.state == AppState::Input {
        draw_input_popup(f, app);
    } else if app.state == AppState::Confirm {
        draw_confirm_popup(f, app);
    } else if app.show_help {
        draw_help_popup(f);
    }
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let now = Local::now();
    let unread = app.notifications.unread_count();

    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(28)])
        .split(area);

    let mut greeting = vec![Span::styled(
        format!("Welcome back, {}!", app.identity.display_name()),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];
    if let Some(dept) = app.identity.department() {
        greeting.push(Span::styled(format!("  ({})", dept), Style::default().fg(Color::DarkGray)));
    }
    let welcome = Paragraph::new(vec![
        Line::from(greeting),
        Line::from(Span::styled(long_date(&now), Style::default().fg(Color::Gray))),
    ])
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(welcome, halves[0]);

    let badge_style = if unread > 0 {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    let badge = Paragraph::new(vec![
        Line::from(Span::styled(format!("🔔 {} unread", unread), badge_style)),
        Line::from(app.identity.login()),
    ])
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(badge, halves[1]);
}

fn draw_menu(f: &mut Frame, app: &App, area: Rect) {
    let unread = app.notifications.unread_count();
    let menu_items = vec![
        ("1", "Dashboard".to_string(), MenuSection::Dashboard),
        ("2", format!("Notifications ({})", unread), MenuSection::Notifications),
        ("3", "Leave Requests".to_string(), MenuSection::LeaveRequests),
    ];

    let items: Vec<ListItem> = menu_items
        .into_iter()
        .map(|(key, name, section)| {
            let style = if section == app.current_section {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!("{} {}", key, name)).style(style)
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .title("Menu")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );
    f.render_widget(list, area);
}

fn draw_dashboard(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let now = Utc::now();
    let recent = app.recent_notifications();
    if recent.is_empty() {
        let empty = Paragraph::new("No notifications yet")
            .block(Block::default().title("Recent Notifications").borders(Borders::ALL));
        f.render_widget(empty, chunks[0]);
    } else {
        let items: Vec<ListItem> = recent
            .iter()
            .enumerate()
            .map(|(i, n)| notification_item(n, i == app.selected_index, now))
            .collect();
        let list = List::new(items)
            .block(Block::default().title("Recent Notifications (Enter: mark read)").borders(Borders::ALL));
        f.render_widget(list, chunks[0]);
    }

    let leave = &app.leave_module;
    let summary = if leave.requests.is_empty() {
        "No leave requests this session. Press 'n' to file one.".to_string()
    } else {
        format!(
            "{} request{} filed this session, {} day{} in total",
            leave.requests.len(),
            if leave.requests.len() == 1 { "" } else { "s" },
            leave.total_days(),
            if leave.total_days() == 1 { "" } else { "s" }
        )
    };
    let summary = Paragraph::new(summary)
        .block(Block::default().title("Leave").borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    f.render_widget(summary, chunks[1]);
}

fn draw_notifications(f: &mut Frame, app: &App, area: Rect) {
    let list = app.notifications.notifications();
    if list.is_empty() {
        let empty = Paragraph::new("No notifications yet")
            .block(Block::default().title("Notifications").borders(Borders::ALL));
        f.render_widget(empty, area);
        return;
    }

    let chunks = if app.show_detail {
        Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(area)
    } else {
        Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(100)])
            .split(area)
    };

    // Windowed so the selection stays visible in long lists.
    let now = Utc::now();
    let window_height = chunks[0].height.saturating_sub(2) as usize;
    let start = app.selected_index.saturating_sub(window_height / 2);
    let end = usize::min(start + window_height, list.len());
    let items: Vec<ListItem> = list
        .iter()
        .enumerate()
        .skip(start)
        .take(end.saturating_sub(start))
        .map(|(i, n)| notification_item(n, i == app.selected_index, now))
        .collect();

    let title = format!(
        "Notifications {}/{} (Enter: read, a: read all, C: clear)",
        list.len(),
        app.notifications.retention()
    );
    let widget = List::new(items).block(Block::default().title(title).borders(Borders::ALL));
    f.render_widget(widget, chunks[0]);

    if app.show_detail {
        if let Some(n) = app.selected_notification() {
            let mut lines = vec![
                Line::from(Span::styled(n.title.as_str(), Style::default().add_modifier(Modifier::BOLD))),
                Line::from(format!(
                    "{} | {} | {}",
                    n.kind.as_str(),
                    n.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                    if n.read { "read" } else { "unread" }
                )),
                Line::from(""),
                Line::from(n.message.as_str()),
            ];
            if let Some(url) = &n.action_url {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(format!("→ {}", url), Style::default().fg(Color::Blue))));
            }
            let detail = Paragraph::new(lines)
                .block(Block::default().title("Details (t to toggle)").borders(Borders::ALL))
                .wrap(Wrap { trim: false });
            f.render_widget(detail, chunks[1]);
        }
    }
}

fn draw_leave_requests(f: &mut Frame, app: &App, area: Rect) {
    let requests = &app.leave_module.requests;
    if requests.is_empty() {
        let empty = Paragraph::new("No leave requests yet. Press 'n' to file one.")
            .block(Block::default().title("Leave Requests").borders(Borders::ALL));
        f.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = requests
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let style = if i == app.selected_index {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(
                "{} → {}  {:>3}d  {}  (filed {})",
                r.start,
                r.end,
                r.days(),
                r.reason,
                r.submitted_at.format("%H:%M")
            ))
            .style(style)
        })
        .collect();
    let list = List::new(items)
        .block(Block::default().title("Leave Requests (n: new)").borders(Borders::ALL));
    f.render_widget(list, area);
}

fn notification_item(n: &Notification, selected: bool, now: DateTime<Utc>) -> ListItem<'static> {
    let mut style = if selected {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    if n.read && !selected {
        style = style.fg(Color::DarkGray);
    }
    ListItem::new(format!(
        "{} {} [{}] {} - {}",
        if n.read { " " } else { "●" },
        kind_icon(n.kind),
        relative_time(n.created_at, now),
        n.title,
        n.message
    ))
    .style(style)
}

fn kind_icon(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Error => "❌",
        NotificationKind::Warning => "⚠️",
        NotificationKind::Success => "✅",
        NotificationKind::Info => "ℹ️",
    }
}

/// Short age label: `just now`, `5m ago`, `2h ago`, `3d ago`, then a date.
pub fn relative_time(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(ts);
    if age.num_minutes() < 1 {
        "just now".to_string()
    } else if age.num_hours() < 1 {
        format!("{}m ago", age.num_minutes())
    } else if age.num_days() < 1 {
        format!("{}h ago", age.num_hours())
    } else if age.num_days() < 7 {
        format!("{}d ago", age.num_days())
    } else {
        ts.with_timezone(&Local).format("%b %-d").to_string()
    }
}

/// e.g. `Monday, October 19, 2026`.
pub fn long_date(now: &DateTime<Local>) -> String {
    now.format("%A, %B %-d, %Y").to_string()
}

fn draw_status(f: &mut Frame, app: &App, area: Rect) {
    let help_text = match app.state {
        AppState::Normal => "q: Quit | Tab/1-3: Section | ↑↓/jk: Navigate | Enter: Mark read | a: Read all | C: Clear | n: Leave request | ?: Help",
        AppState::Input => "Enter: Submit | Esc: Cancel | Type your input",
        AppState::Confirm => "y: Yes | n: No | Esc: Cancel",
    };

    let status = Paragraph::new(vec![
        Line::from(app.status_message.as_str()),
        Line::from(help_text),
    ])
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(status, area);
}

fn draw_input_popup(f: &mut Frame, app: &App) {
    let area = centered_rect(60, 20, f.area());
    let input_text = format!("{}{}", app.input_prompt, app.input_buffer);
    let input = Paragraph::new(input_text)
        .block(
            Block::default()
                .title("Input")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow)),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(ratatui::widgets::Clear, area);
    f.render_widget(input, area);
}

fn draw_confirm_popup(f: &mut Frame, app: &App) {
    let area = centered_rect(50, 15, f.area());
    let confirm = Paragraph::new(app.confirm_message.as_str())
        .block(
            Block::default()
                .title("Confirm")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(ratatui::widgets::Clear, area);
    f.render_widget(confirm, area);
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

fn draw_help_popup(f: &mut Frame) {
    let area = centered_rect(70, 70, f.area());
    let help = "Absentra Help\n\nKeys:\n  q: Quit\n  Tab/Shift-Tab: Next/Previous section\n  1-3: Jump to section\n  j/k or ↑/↓: Navigate\n  PgUp/PgDn, Home/End: Page/Jump\n  Enter: Mark notification as read\n  a: Mark all as read\n  C: Clear all notifications\n  t: Toggle details\n  n: New leave request (start|end|reason)\n  ?: Toggle this help";

    let paragraph = Paragraph::new(help)
        .block(
            Block::default()
                .title("Help")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(ratatui::widgets::Clear, area);
    f.render_widget(paragraph, area);
}
