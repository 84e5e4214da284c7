//! JSON-lines rendering of user snapshots.

use std::io::{self, Write};

use serde::Serialize;

use crate::engine::{Engine, QueryError};
use crate::model::{Caller, UserSnapshot};
use crate::store::AccountStore;

#[derive(Debug, Serialize)]
struct Report<'a> {
    user: &'a str,
    #[serde(flatten)]
    snapshot: &'a UserSnapshot,
}

/// Snapshot every account, ascending by username.
pub fn snapshots<S: AccountStore>(
    engine: &Engine<S>,
) -> Result<Vec<(String, UserSnapshot)>, QueryError> {
    engine
        .accounts()?
        .into_iter()
        .map(|user| {
            let snapshot = engine.user_snapshot(&Caller::new(user.as_str()))?;
            Ok::<_, QueryError>((user, snapshot))
        })
        .collect()
}

/// Write one JSON object per account, one per line.
pub fn write_snapshots<'a>(
    mut writer: impl Write,
    snapshots: impl IntoIterator<Item = &'a (String, UserSnapshot)>,
) -> io::Result<()> {
    for (user, snapshot) in snapshots {
        serde_json::to_writer(&mut writer, &Report { user, snapshot })?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}
