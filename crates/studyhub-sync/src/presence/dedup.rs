//! Presence deduplication.
//!
//! The store never deduplicates community records: every tab, device, and
//! reconnect race can leave its own record per username. The canonical
//! per-user view is computed here on every feed change and never stored.

use std::collections::HashMap;

use serde_json::Value;

use studyhub_entity::presence::CommunityPresenceRecord;

/// Parse the raw community feed subtree (connection id → record).
///
/// Malformed entries — in particular records with no username — are
/// discarded so a bad write cannot take down the aggregate view.
pub fn parse_feed(snapshot: Option<&Value>) -> Vec<CommunityPresenceRecord> {
    let Some(map) = snapshot.and_then(Value::as_object) else {
        return Vec::new();
    };
    map.values()
        .filter_map(|raw| serde_json::from_value(raw.clone()).ok())
        .collect()
}

/// Collapse raw records into one canonical record per username.
///
/// Within a username group the canonical record is an Online member if any
/// exists, otherwise the member with the greatest last-seen. Output is
/// display-ordered: online users first, then by descending last-seen.
pub fn canonical_roster(records: Vec<CommunityPresenceRecord>) -> Vec<CommunityPresenceRecord> {
    let mut by_username: HashMap<String, CommunityPresenceRecord> = HashMap::new();

    for record in records {
        match by_username.get_mut(&record.username) {
            None => {
                by_username.insert(record.username.clone(), record);
            }
            Some(current) => {
                if wins_over(&record, current) {
                    *current = record;
                }
            }
        }
    }

    let mut roster: Vec<CommunityPresenceRecord> = by_username.into_values().collect();
    roster.sort_by(|a, b| {
        b.is_online()
            .cmp(&a.is_online())
            .then_with(|| b.last_seen.cmp(&a.last_seen))
            .then_with(|| a.username.cmp(&b.username))
    });
    roster
}

/// Online wins; between equals, most recent last-seen wins.
fn wins_over(candidate: &CommunityPresenceRecord, current: &CommunityPresenceRecord) -> bool {
    match (candidate.is_online(), current.is_online()) {
        (true, false) => true,
        (false, true) => false,
        _ => candidate.last_seen > current.last_seen,
    }
}
