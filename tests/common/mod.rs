#![allow(dead_code)]

use std::cell::Cell;

use wavesearch::db::models::NewSegment;
use wavesearch::db::store::{Row, Statement, Store};
use wavesearch::db::Database;
use wavesearch::error::StoreError;

/// Eight segments across three stations. Ids follow slice order.
///
/// | id | station | state | dt                  | text
/// |----|---------|-------|---------------------|------------------------------------------
/// | 1  | KAWC    | AZ    | 2024-01-01 08:00:00 | election results are coming in
/// | 2  | KAWC    | AZ    | 2024-01-01 08:00:00 | county results show a close race
/// | 3  | KAWC    | AZ    | 2024-01-01 08:01:00 | weather
/// | 4  | KVOI    | AZ    | 2024-01-02 09:00:00 | election turnout (no speaker)
/// | 5  | KVOI    | AZ    | 2024-01-02 09:00:00 | final election results
/// | 6  | WBAI    | NY    | 2024-01-15 12:00:00 | city council election results
/// | 7  | WBAI    | NY    | 2024-02-03 18:30:00 | traffic
/// | 8  | KAWC    | AZ    | 2024-02-10 07:00:00 | election night coverage
pub fn seeded_db() -> Database {
    let rows: [(&str, &str, Option<&str>, &str, &str); 8] = [
        ("KAWC", "AZ", Some("SPEAKER_00"), "2024-01-01 08:00:00", "Good morning, election results are coming in"),
        ("KAWC", "AZ", Some("SPEAKER_01"), "2024-01-01 08:00:00", "The county results show a close race"),
        ("KAWC", "AZ", Some("SPEAKER_00"), "2024-01-01 08:01:00", "Weather today is sunny"),
        ("KVOI", "AZ", None, "2024-01-02 09:00:00", "Election officials report high turnout"),
        ("KVOI", "AZ", Some("SPEAKER_02"), "2024-01-02 09:00:00", "Final election results expected tonight"),
        ("WBAI", "NY", Some("SPEAKER_00"), "2024-01-15 12:00:00", "City council election results announced"),
        ("WBAI", "NY", Some("SPEAKER_01"), "2024-02-03 18:30:00", "Traffic update on the bridge"),
        ("KAWC", "AZ", Some("SPEAKER_00"), "2024-02-10 07:00:00", "Election night coverage continues"),
    ];

    let segments: Vec<NewSegment> = rows
        .iter()
        .enumerate()
        .map(|(i, (station, state, speaker, dt, text))| NewSegment {
            station: station.to_string(),
            state: state.to_string(),
            speaker: speaker.map(str::to_string),
            dt: dt.to_string(),
            start_time: i as f64 * 5.0,
            end_time: i as f64 * 5.0 + 4.0,
            text: text.to_string(),
        })
        .collect();

    let db = Database::open_in_memory().unwrap();
    db.insert_segments(&segments).unwrap();
    db
}

/// Forwards to another store and counts round trips.
pub struct Counting<'a, S: Store> {
    pub inner: &'a S,
    pub calls: Cell<usize>,
}

impl<'a, S: Store> Counting<'a, S> {
    pub fn new(inner: &'a S) -> Self {
        Counting {
            inner,
            calls: Cell::new(0),
        }
    }
}

impl<S: Store> Store for Counting<'_, S> {
    fn query(&self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        self.calls.set(self.calls.get() + 1);
        self.inner.query(statement)
    }
}

/// Fails every query.
pub struct Broken;

impl Store for Broken {
    fn query(&self, _statement: &Statement) -> Result<Vec<Row>, StoreError> {
        Err(StoreError::Unavailable("disk on fire: /var/lib/secret.db".into()))
    }
}

/// Forwards the first `ok` queries, then fails every one after.
pub struct FailAfter<'a, S: Store> {
    pub inner: &'a S,
    pub ok: usize,
    pub calls: Cell<usize>,
}

impl<'a, S: Store> FailAfter<'a, S> {
    pub fn new(inner: &'a S, ok: usize) -> Self {
        FailAfter {
            inner,
            ok,
            calls: Cell::new(0),
        }
    }
}

impl<S: Store> Store for FailAfter<'_, S> {
    fn query(&self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        let n = self.calls.get();
        self.calls.set(n + 1);
        if n >= self.ok {
            return Err(StoreError::Unavailable("connection reset by peer".into()));
        }
        self.inner.query(statement)
    }
}
