use std::path::Path;

use chrono::{TimeZone, Utc};
use rust_xlsxwriter::{Workbook, XlsxError};

use crate::models::{Entry, LotteryState, Place};
use crate::round::Podium;

fn format_ts(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Writes the podium and the entry list (with who already won) to an xlsx file.
pub fn write_results(path: &Path, state: Option<&LotteryState>, entries: &[Entry]) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let winners = state.map(|s| s.winners.as_slice()).unwrap_or_default();

    // 1. Podium
    let podium = Podium::from_winners(winners);
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Podium")?;
    worksheet.write_string(0, 0, "Place")?;
    worksheet.write_string(0, 1, "Name")?;
    worksheet.write_string(0, 2, "Prize")?;
    worksheet.write_string(0, 3, "Won At (UTC)")?;

    let rows = [
        (Place::First, &podium.first),
        (Place::Second, &podium.second),
        (Place::Third, &podium.third),
    ];
    for (i, (place, winner)) in rows.iter().enumerate() {
        let row = (i + 1) as u32;
        worksheet.write_string(row, 0, place.label())?;
        if let Some(w) = winner {
            worksheet.write_string(row, 1, &w.name)?;
            worksheet.write_string(row, 2, &w.prize_label)?;
            worksheet.write_string(row, 3, &format_ts(w.won_at))?;
        }
    }

    // 2. Entries
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Entries")?;
    worksheet.write_string(0, 0, "Name")?;
    worksheet.write_string(0, 1, "Tickets")?;
    worksheet.write_string(0, 2, "Status")?;

    for (i, entry) in entries.iter().enumerate() {
        let row = (i + 1) as u32;
        let status = winners
            .iter()
            .find(|w| w.entry_id == entry.id)
            .map_or("remaining", |w| w.place.label());
        worksheet.write_string(row, 0, &entry.name)?;
        worksheet.write_number(row, 1, entry.tickets as f64)?;
        worksheet.write_string(row, 2, status)?;
    }

    workbook.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Winner;

    #[test]
    fn writes_a_workbook() {
        let entries: Vec<Entry> = ["ann", "ben", "cy", "dee"]
            .into_iter()
            .map(|n| Entry {
                id: n.into(),
                name: n.into(),
                tickets: 2,
                created_at: 0,
            })
            .collect();
        let mut state = LotteryState::ready(Some(0));
        state
            .record_winner(Winner {
                place: Place::Third,
                entry_id: "cy".into(),
                name: "cy".into(),
                prize_label: "Mug".into(),
                won_at: 1_700_000_000_000,
            })
            .unwrap();

        let path = std::env::temp_dir().join(format!("lottery-export-{}.xlsx", uuid::Uuid::new_v4()));
        write_results(&path, Some(&state), &entries).unwrap();
        let size = std::fs::metadata(&path).unwrap().len();
        assert!(size > 0);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn timestamps_render_in_utc() {
        assert_eq!(format_ts(0), "1970-01-01 00:00:00");
    }
}
