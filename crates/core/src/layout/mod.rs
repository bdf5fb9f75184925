//! Slots of one frame → Gantt layout model.

mod colors;

pub use colors::JobColors;

use serde::{Deserialize, Serialize};

use crate::model::{Iteration, Slot};

/// Bars narrower than this fraction of the schedule extent get no label.
pub const LABEL_MIN_FRACTION: f64 = 0.008;

/// Background hint for a machine row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowBand {
    Even,
    Odd,
}

impl RowBand {
    fn for_index(index: usize) -> Self {
        if index % 2 == 0 { Self::Even } else { Self::Odd }
    }
}

/// One job bar (plus its setup overlay) on a machine row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub job: u32,
    pub previous_job: Option<u32>,
    pub start: i64,
    pub end: i64,
    pub setup: i64,
    /// Start of the setup overlay `[setup_start, start)`, if any.
    pub setup_start: Option<i64>,
    pub color: usize,
    pub show_label: bool,
}

impl Bar {
    pub fn has_setup(&self) -> bool {
        self.setup_start.is_some()
    }

    pub fn width(&self) -> i64 {
        self.end.saturating_sub(self.start)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineRow {
    pub machine: u32,
    pub band: RowBand,
    /// Ordered by `(start, end, job)`.
    pub bars: Vec<Bar>,
}

/// Drawable view of one frame. Never aliases the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutModel {
    pub iteration: Option<Iteration>,
    /// Ascending machine id.
    pub rows: Vec<MachineRow>,
    pub colors: JobColors,
    /// Latest end time over all slots; the horizontal extent.
    pub max_end: i64,
}

impl LayoutModel {
    /// Placeholder shown before the first frame arrives.
    pub fn empty() -> Self {
        Self {
            iteration: None,
            rows: Vec::new(),
            colors: JobColors::new(),
            max_end: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn bar_count(&self) -> usize {
        self.rows.iter().map(|r| r.bars.len()).sum()
    }

    pub fn row(&self, machine: u32) -> Option<&MachineRow> {
        self.rows.iter().find(|r| r.machine == machine)
    }

    pub fn bars(&self) -> impl Iterator<Item = (&MachineRow, &Bar)> {
        self.rows
            .iter()
            .flat_map(|row| row.bars.iter().map(move |bar| (row, bar)))
    }
}

/// Lay out `slots` as a Gantt chart.
///
/// New job ids take the next palette slot in `colors`; that is the only
/// state this function changes. Overlapping slots are drawn as given.
pub fn layout(slots: &[Slot], colors: &mut JobColors) -> LayoutModel {
    if slots.is_empty() {
        return LayoutModel::empty();
    }

    let mut machines: Vec<u32> = slots.iter().map(|s| s.machine).collect();
    machines.sort_unstable();
    machines.dedup();

    let max_end = slots.iter().map(|s| s.end).max().unwrap_or(0);
    colors.assign_all(slots);

    let label_threshold = max_end as f64 * LABEL_MIN_FRACTION;

    let mut rows: Vec<MachineRow> = machines
        .iter()
        .enumerate()
        .map(|(index, &machine)| MachineRow {
            machine,
            band: RowBand::for_index(index),
            bars: Vec::new(),
        })
        .collect();

    for slot in slots {
        let Ok(row_index) = machines.binary_search(&slot.machine) else {
            continue;
        };
        rows[row_index].bars.push(Bar {
            job: slot.job,
            previous_job: slot.previous_job,
            start: slot.start,
            end: slot.end,
            setup: slot.setup,
            setup_start: slot.setup_start(),
            color: colors.get(slot.job).unwrap_or_default(),
            show_label: slot.duration() as f64 > label_threshold,
        });
    }

    for row in &mut rows {
        row.bars.sort_by_key(|b| (b.start, b.end, b.job));
    }

    LayoutModel {
        iteration: slots.first().map(|s| s.iteration),
        rows,
        colors: colors.clone(),
        max_end,
    }
}
