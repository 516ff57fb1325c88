use crate::engine::{SyncEngine, SyncReport};
use rusqlite::Connection;
use serde::Deserialize;
use testhub_core::constants::PUSH_MIN_DAYS_BEFORE;
use testhub_core::error::SyncError;
use testhub_core::time::parse_iso8601;
use testhub_remote::RemoteSource;
use time::{Date, Duration, OffsetDateTime};
use tracing::{info, warn};

/// The subset of a push notification the sync needs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushPayload {
    #[serde(default)]
    pub commits: Vec<PushedCommit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushedCommit {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl PushPayload {
    /// Parsed commit timestamps; unparseable ones are skipped.
    pub fn timestamps(&self) -> Vec<OffsetDateTime> {
        self.commits
            .iter()
            .filter_map(|c| {
                let parsed = c.timestamp.as_deref().and_then(parse_iso8601);
                if parsed.is_none() {
                    warn!(id = ?c.id, timestamp = ?c.timestamp, "Unparseable push timestamp");
                }
                parsed
            })
            .collect()
    }
}

/// Lookback covering every pushed commit: whole days between `today` and one
/// hour before the earliest timestamp, never less than the push minimum.
pub fn days_before_for_push(timestamps: &[OffsetDateTime], today: Date) -> i64 {
    let Some(earliest) = timestamps.iter().min() else {
        return PUSH_MIN_DAYS_BEFORE;
    };
    let start = (*earliest - Duration::hours(1)).date();
    (today - start).whole_days().max(PUSH_MIN_DAYS_BEFORE)
}

impl<R: RemoteSource + ?Sized> SyncEngine<'_, R> {
    /// Full sync sized to cover the commits of a push.
    pub fn sync_for_push(
        &self,
        conn: &mut Connection,
        payload: &PushPayload,
    ) -> Result<SyncReport, SyncError> {
        let days_before =
            days_before_for_push(&payload.timestamps(), OffsetDateTime::now_utc().date());
        info!(commits = payload.commits.len(), days_before, "Syncing for push");
        self.sync_tree(conn, None, false, days_before)
    }
}
