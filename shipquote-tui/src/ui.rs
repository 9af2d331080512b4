use std::time::Duration;

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
};

use crate::app::{App, Field, Screen};

pub(crate) fn draw(frame: &mut Frame<'_>, app: &App) {
    let area = frame.area();

    // Outer layout: title, main content, status line
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(4),
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [header_area, content_area, status_area] = chunks else {
        return;
    };

    let header = Paragraph::new(format!(
        "{} · delivery quotes from {}",
        app.health.store, app.health.origin
    ))
    .block(Block::default().borders(Borders::ALL).title("shipquote"));
    frame.render_widget(header, *header_area);

    match app.screen {
        Screen::QuoteForm => draw_quote_form(frame, app, *content_area),
        Screen::QuoteView => draw_quote_view(frame, app, *content_area),
        Screen::Services => draw_services(frame, app, *content_area),
    }

    let nav_hint = match app.screen {
        Screen::QuoteForm => "Type to edit · Tab switch field · Enter quote · F2 services · Ctrl-C quit",
        Screen::QuoteView => "Esc/←/b back to form · F2 services · q/Ctrl-C quit",
        Screen::Services => "↑/↓ move · Space/Enter toggle · r refresh · Esc back · q/Ctrl-C quit",
    };

    let message = if app.is_loading {
        Some("Quoting…".to_owned())
    } else {
        app.error_message.clone().or_else(|| app.info_message.clone())
    };

    let status_style = if app.error_message.is_some() {
        Style::default().fg(Color::Red)
    } else if app.is_loading {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    let health = &app.health;
    let health_line = format!(
        "{}/{} requests in the last minute · {} cached addresses · up {}",
        health.requests_last_minute,
        health.rate_limit,
        health.cache_size,
        format_uptime(health.uptime)
    );

    let mut lines = vec![Line::from(health_line)];
    lines.push(match message {
        Some(msg) => Line::from(format!("{msg} · {nav_hint}")),
        None => Line::from(nav_hint),
    });

    let status = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(status_style)
        .wrap(Wrap { trim: true });

    frame.render_widget(status, *status_area);
}

fn draw_quote_form(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // address
            Constraint::Length(3), // area
            Constraint::Min(0),    // hints
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [address_area, commune_area, hint_area] = chunks else {
        return;
    };

    let field_style = |field: Field| {
        if app.focus == field {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        }
    };

    let address = Paragraph::new(app.address_input.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(field_style(Field::Address))
            .title("Address (street and number)"),
    );
    frame.render_widget(address, *address_area);

    let commune = Paragraph::new(app.area_input.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(field_style(Field::Area))
            .title("Area (commune)"),
    );
    frame.render_widget(commune, *commune_area);

    let zones = if app.special_zones.is_empty() {
        "none".to_owned()
    } else {
        app.special_zones.join(", ")
    };
    let hint = Paragraph::new(format!("Special rates apply in: {zones}"))
        .block(Block::default().borders(Borders::ALL).title("Special zones"))
        .wrap(Wrap { trim: true });
    frame.render_widget(hint, *hint_area);
}

fn draw_quote_view(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let Some(response) = &app.response else {
        let paragraph = Paragraph::new("No quote yet. Fill in the form and press Enter.")
            .block(Block::default().borders(Borders::ALL).title("Quotes"));
        frame.render_widget(paragraph, area);
        return;
    };

    let distance = response
        .distance
        .map_or_else(|| "-".to_owned(), |distance| format!("{distance} km"));
    let title = format!(
        "Quotes {} · {distance} (Esc/←/b to go back)",
        response.reference_id
    );

    if response.quotes.is_empty() {
        let paragraph = Paragraph::new("No service is available for this destination right now.")
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        return;
    }

    let rows = response.quotes.iter().map(|quote| {
        let style = if quote.special {
            Style::default().fg(Color::Green)
        } else {
            Style::default()
        };
        Row::new(vec![
            Cell::from(quote.service_name.clone()),
            Cell::from(format_clp(quote.price)),
            Cell::from(quote.delivery_time.clone()),
            Cell::from(quote.description.clone()),
        ])
        .style(style)
    });

    let column_widths = [
        Constraint::Length(20),
        Constraint::Length(10),
        Constraint::Length(20),
        Constraint::Min(20),
    ];

    let table = Table::new(rows, column_widths)
        .header(
            Row::new(vec!["Service", "Price", "Delivery", "Zone"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().borders(Borders::ALL).title(title))
        .column_spacing(1);

    frame.render_widget(table, area);
}

fn draw_services(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let rows = app.services.iter().map(|service| {
        let style = if service.enabled {
            Style::default()
        } else {
            Style::default().fg(Color::DarkGray)
        };
        Row::new(vec![
            Cell::from(service.code.to_string()),
            Cell::from(service.name.clone()),
            Cell::from(if service.enabled { "on" } else { "off" }),
            Cell::from(if service.available_now { "yes" } else { "no" }),
            Cell::from(service.description.clone()),
        ])
        .style(style)
    });

    let column_widths = [
        Constraint::Length(12),
        Constraint::Length(20),
        Constraint::Length(8),
        Constraint::Length(10),
        Constraint::Min(20),
    ];

    let table = Table::new(rows, column_widths)
        .header(
            Row::new(vec!["Code", "Name", "Enabled", "Now", "Description"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Services (Space to enable/disable)"),
        )
        .row_highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .column_spacing(1);

    let mut state = TableState::default();
    if !app.services.is_empty() {
        state.select(Some(app.service_list_index));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

/// Chilean peso amount with dot thousands separators, e.g. `$12.500`.
fn format_clp(price: u32) -> String {
    let digits = price.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (idx, digit) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    format!("${grouped}")
}

fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else {
        format!("{minutes}m {seconds:02}s")
    }
}
