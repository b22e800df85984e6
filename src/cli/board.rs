//! Terminal view of the published readings.

use super::ui;
use crate::core::{QuoteCoordinator, ReadingState, RefreshListener, StatePublisher};
use comfy_table::Cell;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Latest state of every reading, in the order they were first published.
#[derive(Default)]
pub struct Board {
    states: Mutex<Vec<ReadingState>>,
    print_on_refresh: bool,
}

impl Board {
    pub fn new(print_on_refresh: bool) -> Self {
        Self {
            states: Mutex::new(Vec::new()),
            print_on_refresh,
        }
    }

    fn states(&self) -> MutexGuard<'_, Vec<ReadingState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Vec<ReadingState> {
        self.states().clone()
    }

    /// Drops readings that are no longer exposed.
    pub fn retain_ids(&self, unique_ids: &[String]) {
        self.states().retain(|s| unique_ids.contains(&s.unique_id));
    }

    pub fn display_as_table(&self, title: &str) -> String {
        let states = self.snapshot();

        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Reading"),
            ui::header_cell("Value"),
            ui::header_cell("Price"),
            ui::header_cell("Amount"),
            ui::header_cell("Status"),
        ]);

        for state in &states {
            let unit = state.unit.clone();
            table.add_row(vec![
                Cell::new(&state.name),
                ui::format_optional_cell(state.value, |v| format!("{v} {unit}")),
                ui::format_optional_cell(state.attributes.get("price"), |p| p.clone()),
                ui::format_optional_cell(state.attributes.get("amount"), |a| a.clone()),
                ui::status_cell(state.available),
            ]);
        }

        format!(
            "{}\n\n{}",
            ui::style_text(title, ui::StyleType::Title),
            table
        )
    }
}

impl StatePublisher for Board {
    fn write_state(&self, state: ReadingState) {
        debug!(unique_id = %state.unique_id, value = ?state.value, "Reading updated");
        let mut states = self.states();
        match states.iter_mut().find(|s| s.unique_id == state.unique_id) {
            Some(existing) => *existing = state,
            None => states.push(state),
        }
    }
}

impl RefreshListener for Board {
    fn on_refresh(&self, coordinator: &QuoteCoordinator) {
        if !self.print_on_refresh {
            return;
        }
        let mut title = format!("Prices in {}", coordinator.display_currency());
        if let Some(snapshot) = coordinator.snapshot() {
            title.push_str(&format!(
                " (as of {})",
                snapshot.fetched_at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
        }
        println!("{}", self.display_as_table(&title));
        if let Some(error) = coordinator.last_error() {
            println!("{}", ui::style_text(&error.to_string(), ui::StyleType::Error));
        }
    }
}
