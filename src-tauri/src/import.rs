use serde::Deserialize;

use crate::models::Entry;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportError {
    #[error("No valid rows (name non-empty, tickets >= 1)")]
    NoValidRows,
}

/// One parsed CSV row as handed over by the front end.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRow {
    pub name: String,
    pub tickets: String,
}

fn parse_tickets(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|n| *n >= 1)
}

/// Turns raw rows into entries: names are trimmed, rows without a name or
/// with tickets that are not an integer >= 1 are dropped, and repeated names
/// collapse into one entry with the tickets summed, in first-seen order.
pub fn entries_from_rows<I>(rows: I, now: i64) -> Result<Vec<Entry>, ImportError>
where
    I: IntoIterator<Item = ImportRow>,
{
    let mut merged: Vec<(String, i64)> = Vec::new();
    for row in rows {
        let name = row.name.trim();
        if name.is_empty() {
            continue;
        }
        let Some(tickets) = parse_tickets(&row.tickets) else {
            continue;
        };
        match merged.iter_mut().find(|(n, _)| n.as_str() == name) {
            Some((_, total)) => *total = total.saturating_add(tickets),
            None => merged.push((name.to_string(), tickets)),
        }
    }

    if merged.is_empty() {
        return Err(ImportError::NoValidRows);
    }

    Ok(merged
        .into_iter()
        .map(|(name, tickets)| Entry {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            tickets,
            created_at: now,
        })
        .collect())
}
