use std::collections::BTreeMap;

use super::repo_types::TimesheetRecord;
use crate::{state::AppState, videos::services::parse_blob_name};

/// Attaches each stored video to its date, creating bare records for dates
/// that only have videos.
pub fn attach_videos(
    mut records: BTreeMap<String, TimesheetRecord>,
    blob_names: &[String],
) -> BTreeMap<String, TimesheetRecord> {
    for record in records.values_mut() {
        record.videos.clear();
    }
    for name in blob_names {
        let Some((date, slot)) = parse_blob_name(name) else {
            continue;
        };
        records
            .entry(date.to_string())
            .or_default()
            .videos
            .insert(slot.key(), name.clone());
    }
    records
}

pub async fn load_all(st: &AppState) -> anyhow::Result<BTreeMap<String, TimesheetRecord>> {
    let records = st.records.list_all().await?;
    let names = st.videos.list().await?;
    Ok(attach_videos(records, &names))
}

/// Empties both stores; records go first.
pub async fn clear_all(st: &AppState) -> anyhow::Result<()> {
    st.records.delete_all().await?;
    st.videos.delete_all().await?;
    Ok(())
}
