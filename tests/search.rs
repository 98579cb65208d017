mod common;

use common::{seeded_db, Broken, Counting};
use wavesearch::error::SearchError;
use wavesearch::search::context::ContextExpander;
use wavesearch::search::filters::{Limits, MultiValue, RawFilters, Scalar};
use wavesearch::search::{BucketCount, Engine};

fn ids(page: &wavesearch::search::SearchPage) -> Vec<i64> {
    page.results.iter().map(|r| r.id).collect()
}

fn filters_with_limit(limit: i64, offset: i64) -> RawFilters {
    RawFilters {
        limit: Some(Scalar::Int(limit)),
        offset: Some(Scalar::Int(offset)),
        ..Default::default()
    }
}

fn buckets(pairs: &[(&str, i64)]) -> Vec<BucketCount> {
    pairs
        .iter()
        .map(|(label, count)| BucketCount {
            label: label.to_string(),
            count: *count,
        })
        .collect()
}

#[test]
fn vocabularies_are_distinct_and_sorted() {
    let db = seeded_db();
    let session = db.session().unwrap();
    let engine = Engine::new(&session, Limits::default(), ContextExpander::default());

    let vocab = engine.vocabularies().unwrap();
    assert_eq!(vocab.stations, vec!["KAWC", "KVOI", "WBAI"]);
    assert_eq!(vocab.states, vec!["AZ", "NY"]);
}

#[test]
fn empty_filter_returns_everything_unranked_newest_first() {
    let db = seeded_db();
    let session = db.session().unwrap();
    let engine = Engine::new(&session, Limits::default(), ContextExpander::default());

    let page = engine.search(&RawFilters::default()).unwrap();
    assert_eq!(page.count, 8);
    // Equal datetimes fall back to ascending id.
    assert_eq!(ids(&page), vec![8, 7, 6, 4, 5, 3, 1, 2]);
    assert!(page.results.iter().all(|r| r.rank.is_none()));
}

#[test]
fn ascending_sort_is_chronological_with_id_tiebreak() {
    let db = seeded_db();
    let session = db.session().unwrap();
    let engine = Engine::new(&session, Limits::default(), ContextExpander::default());

    let raw = RawFilters {
        sort: Some("ASC".into()),
        ..Default::default()
    };
    let first = engine.search(&raw).unwrap();
    assert_eq!(ids(&first), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(engine.search(&raw).unwrap(), first);
}

#[test]
fn text_station_and_date_filters_combine() {
    let db = seeded_db();
    let session = db.session().unwrap();
    let engine = Engine::new(&session, Limits::default(), ContextExpander::default());

    let raw = RawFilters {
        q: Some("election, results".into()),
        station: Some(MultiValue::One("KAWC|KVOI".into())),
        start_date: Some("2024-01-01".into()),
        end_date: Some("2024-01-31".into()),
        ..Default::default()
    };
    let page = engine.search(&raw).unwrap();
    assert_eq!(page.count, 2);
    assert_eq!(ids(&page), vec![5, 1]);
    assert!(page.results.iter().all(|r| r.rank.is_some()));
    assert_eq!(page.results[1].snippet, "Good morning, election results are coming in");
}

#[test]
fn prefix_words_and_speaker_filter() {
    let db = seeded_db();
    let session = db.session().unwrap();
    let engine = Engine::new(&session, Limits::default(), ContextExpander::default());

    let raw = RawFilters {
        q: Some("elect*".into()),
        speaker: Some(MultiValue::Many(vec!["SPEAKER_00".into()])),
        sort: Some("asc".into()),
        ..Default::default()
    };
    let page = engine.search(&raw).unwrap();
    assert_eq!(ids(&page), vec![1, 6, 8]);
}

#[test]
fn count_matches_the_unpaged_result_size() {
    let db = seeded_db();
    let session = db.session().unwrap();
    let engine = Engine::new(&session, Limits::default(), ContextExpander::default());

    let cases = [
        RawFilters::default(),
        RawFilters {
            q: Some("election".into()),
            ..Default::default()
        },
        RawFilters {
            state: Some(MultiValue::One("NY".into())),
            ..Default::default()
        },
        RawFilters {
            q: Some("results".into()),
            start_date: Some("2024-01-02".into()),
            end_date: Some("2024-12-31".into()),
            ..Default::default()
        },
        RawFilters {
            station: Some(MultiValue::One("NOPE".into())),
            ..Default::default()
        },
    ];

    for mut raw in cases {
        raw.limit = Some(Scalar::Int(100));
        let page = engine.search(&raw).unwrap();
        assert_eq!(page.count, page.results.len() as i64, "{raw:?}");
    }
}

#[test]
fn pages_partition_the_full_result() {
    let db = seeded_db();
    let session = db.session().unwrap();
    let engine = Engine::new(&session, Limits::default(), ContextExpander::default());

    let full = ids(&engine.search(&filters_with_limit(100, 0)).unwrap());
    let mut stitched = Vec::new();
    for offset in [0, 3, 6] {
        let page = engine.search(&filters_with_limit(3, offset)).unwrap();
        assert_eq!(page.count, 8);
        stitched.extend(ids(&page));
    }
    assert_eq!(stitched, full);
}

#[test]
fn offset_past_the_end_keeps_the_total() {
    let db = seeded_db();
    let session = db.session().unwrap();
    let engine = Engine::new(&session, Limits::default(), ContextExpander::default());

    let page = engine.search(&filters_with_limit(10, 20)).unwrap();
    assert_eq!(page.count, 8);
    assert!(page.results.is_empty());
}

#[test]
fn oversized_limit_is_capped() {
    let db = seeded_db();
    let session = db.session().unwrap();
    let limits = Limits {
        max_limit: 3,
        ..Limits::default()
    };
    let engine = Engine::new(&session, limits, ContextExpander::default());

    let page = engine.search(&filters_with_limit(500, 0)).unwrap();
    assert_eq!(page.results.len(), 3);
    assert_eq!(page.count, 8);
}

#[test]
fn aggregates_bucket_by_station_month_and_week() {
    let db = seeded_db();
    let session = db.session().unwrap();
    let engine = Engine::new(&session, Limits::default(), ContextExpander::default());
    let all = RawFilters::default();

    assert_eq!(
        engine.aggregate(&all, Some("station")).unwrap(),
        buckets(&[("KAWC", 4), ("KVOI", 2), ("WBAI", 2)])
    );
    assert_eq!(
        engine.aggregate(&all, Some("month")).unwrap(),
        buckets(&[("2024-01", 6), ("2024-02", 2)])
    );
    assert_eq!(
        engine.aggregate(&all, Some("week")).unwrap(),
        buckets(&[("2024-01", 5), ("2024-03", 1), ("2024-05", 1), ("2024-06", 1)])
    );
}

#[test]
fn aggregate_honors_filters_and_defaults_to_date() {
    let db = seeded_db();
    let session = db.session().unwrap();
    let engine = Engine::new(&session, Limits::default(), ContextExpander::default());

    let raw = RawFilters {
        q: Some("election".into()),
        ..Default::default()
    };
    let expected = buckets(&[
        ("2024-01-01", 1),
        ("2024-01-02", 2),
        ("2024-01-15", 1),
        ("2024-02-10", 1),
    ]);
    assert_eq!(engine.aggregate(&raw, None).unwrap(), expected);
    assert_eq!(engine.aggregate(&raw, Some("fortnight")).unwrap(), expected);
}

#[test]
fn context_walks_ids_and_truncates_at_the_edges() {
    let db = seeded_db();
    let session = db.session().unwrap();
    let engine = Engine::new(&session, Limits::default(), ContextExpander::default());
    let seg_ids = |segs: Vec<wavesearch::db::models::Segment>| -> Vec<i64> {
        segs.iter().map(|s| s.id).collect()
    };

    assert_eq!(seg_ids(engine.context(5, "before", Some(2)).unwrap()), vec![3, 4]);
    assert_eq!(seg_ids(engine.context(5, "AFTER", Some(2)).unwrap()), vec![6, 7]);
    assert!(engine.context(1, "before", Some(5)).unwrap().is_empty());
    assert_eq!(seg_ids(engine.context(7, "after", Some(5)).unwrap()), vec![8]);

    let mut around = seg_ids(engine.context(4, "before", Some(3)).unwrap());
    around.push(4);
    around.extend(seg_ids(engine.context(4, "after", Some(3)).unwrap()));
    assert_eq!(around, vec![1, 2, 3, 4, 5, 6, 7]);
}

#[test]
fn context_for_a_missing_anchor_is_empty() {
    let db = seeded_db();
    let session = db.session().unwrap();
    let engine = Engine::new(&session, Limits::default(), ContextExpander::default());

    assert!(engine.context(999, "after", None).unwrap().is_empty());
}

#[test]
fn context_can_stay_on_the_anchor_station() {
    let db = seeded_db();
    let session = db.session().unwrap();
    let engine = Engine::new(&session, Limits::default(), ContextExpander::new(true));

    let after: Vec<i64> = engine
        .context(3, "after", Some(5))
        .unwrap()
        .iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(after, vec![8]);
}

#[test]
fn invalid_input_never_reaches_the_store() {
    let db = seeded_db();
    let session = db.session().unwrap();
    let counting = Counting::new(&session);
    let engine = Engine::new(&counting, Limits::default(), ContextExpander::default());

    let bad_query = RawFilters {
        q: Some("drop; table".into()),
        ..Default::default()
    };
    let unparsable_date = RawFilters {
        start_date: Some("yesterday".into()),
        end_date: Some("2024-01-31".into()),
        ..Default::default()
    };

    assert!(engine.search(&bad_query).unwrap_err().is_validation());
    assert!(engine.search(&unparsable_date).unwrap_err().is_validation());
    assert!(engine.aggregate(&bad_query, Some("week")).unwrap_err().is_validation());
    assert!(engine.context(5, "sideways", None).unwrap_err().is_validation());
    assert!(engine.context(5, "before", Some(0)).unwrap_err().is_validation());
    assert!(engine.context(5, "before", Some(21)).unwrap_err().is_validation());
    assert_eq!(counting.calls.get(), 0);
}

#[test]
fn store_failures_are_reported_without_detail() {
    let engine = Engine::new(&Broken, Limits::default(), ContextExpander::default());

    let err = engine.search(&RawFilters::default()).unwrap_err();
    assert!(matches!(err, SearchError::Store { operation: "search" }));
    assert_eq!(err.to_string(), "search failed");

    let err = engine.context(1, "after", None).unwrap_err();
    assert_eq!(err.to_string(), "context failed");
    assert!(!err.to_string().contains("secret"));
}

#[test]
fn lone_date_bound_is_ignored() {
    let db = seeded_db();
    let session = db.session().unwrap();
    let engine = Engine::new(&session, Limits::default(), ContextExpander::default());

    let raw = RawFilters {
        start_date: Some("2024-02-01".into()),
        ..Default::default()
    };
    assert_eq!(engine.search(&raw).unwrap().count, 8);
}

#[test]
fn inflected_words_match_their_stem() {
    let db = seeded_db();
    let session = db.session().unwrap();
    let engine = Engine::new(&session, Limits::default(), ContextExpander::default());
    let count = |q: &str| {
        let raw = RawFilters {
            q: Some(q.into()),
            ..Default::default()
        };
        engine.search(&raw).unwrap().count
    };

    assert_eq!(count("election"), 5);
    assert_eq!(count("elections"), 5);
    assert_eq!(count("result"), 4);
}

#[test]
fn stray_punctuation_does_not_empty_the_query() {
    let db = seeded_db();
    let session = db.session().unwrap();
    let engine = Engine::new(&session, Limits::default(), ContextExpander::default());
    let count = |q: &str| {
        let raw = RawFilters {
            q: Some(q.into()),
            ..Default::default()
        };
        engine.search(&raw).unwrap().count
    };

    assert_eq!(count("election, ."), 5);
    assert_eq!(count("election - results"), 3);
    // Nothing searchable left: no text filter at all.
    assert_eq!(count("-"), 8);
}

#[test]
fn session_is_released_after_an_engine_error() {
    let db = seeded_db();
    {
        let session = db.session().unwrap();
        let engine = Engine::new(&session, Limits::default(), ContextExpander::default());
        let bad = RawFilters {
            q: Some("(".into()),
            ..Default::default()
        };
        assert!(engine.search(&bad).is_err());
        assert!(engine.context(1, "after", Some(99)).is_err());
    }

    let session = db.session().unwrap();
    let engine = Engine::new(&session, Limits::default(), ContextExpander::default());
    assert_eq!(engine.search(&RawFilters::default()).unwrap().count, 8);
}
