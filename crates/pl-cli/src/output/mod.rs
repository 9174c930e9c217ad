//! Terminal output helpers

use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use std::io::Write;
use tabled::{settings::Style, Table, Tabled};

use pl_coordinator::ConnectionSnapshot;
use pl_core::{ConnectionEvent, TransportKind};

/// Render the connection flags as a table
pub fn format_snapshot(address: &str, snapshot: &ConnectionSnapshot) -> String {
    #[derive(Tabled)]
    struct TransportRow {
        #[tabled(rename = "TRANSPORT")]
        transport: &'static str,
        #[tabled(rename = "DEVICE")]
        device: String,
        #[tabled(rename = "STATE")]
        state: &'static str,
    }

    let rows: Vec<TransportRow> = [
        TransportKind::Socket,
        TransportKind::Shell,
        TransportKind::Framebuffer,
    ]
    .into_iter()
    .map(|kind| TransportRow {
        transport: kind.as_str(),
        device: address.to_string(),
        state: if snapshot.get(kind) {
            "connected"
        } else {
            "disconnected"
        },
    })
    .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// One line per event, either plain text or a JSON object
pub fn format_event(event: &ConnectionEvent, json: bool) -> String {
    if json {
        return serde_json::to_string(event).unwrap_or_else(|_| event.to_string());
    }
    event.to_string()
}

fn print_tagged(mut out: impl Write, color: Color, tag: &str, msg: &str) {
    let _ = crossterm::execute!(
        out,
        SetForegroundColor(color),
        Print(tag),
        Print(" "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Green check on stdout
pub fn print_success(msg: &str) {
    print_tagged(std::io::stdout(), Color::Green, "✓", msg);
}

/// Red cross on stderr
pub fn print_error(msg: &str) {
    print_tagged(std::io::stderr(), Color::Red, "✗", msg);
}

/// Yellow warning on stderr
pub fn print_warning(msg: &str) {
    print_tagged(std::io::stderr(), Color::Yellow, "⚠", msg);
}

/// Cyan info on stdout
pub fn print_info(msg: &str) {
    print_tagged(std::io::stdout(), Color::Cyan, "ℹ", msg);
}
