mod common;

use std::sync::Arc;

use annotool::context::AppContext;
use annotool::resource::Persistable;
use annotool::tracks::{Tracks, TracksEvent};
use common::{rest_context, track, CountingSource};

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Five tracks; "2" and "4" belong to the current user
fn setup(max_visible: usize) -> (Tracks, Arc<CountingSource>) {
    let ctx = rest_context();
    let source = CountingSource::new();
    let mut tracks = Tracks::new(Arc::clone(&ctx), source.clone(), "videos/1/tracks")
        .with_max_visible(max_visible);
    tracks.reset(vec![
        track(&ctx, "1", "9"),
        track(&ctx, "2", "7"),
        track(&ctx, "3", "9"),
        track(&ctx, "4", "7"),
        track(&ctx, "5", "9"),
    ]);
    (tracks, source)
}

fn assert_flags_match(tracks: &Tracks) {
    for t in tracks.iter() {
        let listed = tracks
            .visible_tracks()
            .iter()
            .any(|id| Some(id.as_str()) == t.id());
        assert_eq!(t.visible, listed, "visible flag of track {:?}", t.id());
    }
}

#[tokio::test]
async fn show_truncates_the_tail_beyond_the_cap() {
    let (mut tracks, _) = setup(3);

    tracks
        .show_tracks(Some(&ids(&["5", "1", "4", "2", "3"])), false)
        .await;

    assert_eq!(tracks.visible_tracks(), ids(&["5", "1", "4"]).as_slice());
    assert_flags_match(&tracks);
}

#[tokio::test]
async fn show_below_the_cap_keeps_input_order() {
    let (mut tracks, _) = setup(3);

    tracks.show_tracks(Some(&ids(&["4", "2"])), false).await;

    assert_eq!(tracks.visible_tracks(), ids(&["4", "2"]).as_slice());
}

#[tokio::test]
async fn unbounded_cap_shows_everything() {
    let ctx = rest_context();
    let mut tracks = Tracks::new(Arc::clone(&ctx), CountingSource::new(), "videos/1/tracks");
    tracks.reset((1..=30).map(|i| track(&ctx, &i.to_string(), "9")).collect());
    let all: Vec<String> = (1..=30).map(|i| i.to_string()).collect();

    tracks.show_tracks(Some(&all), false).await;

    assert_eq!(tracks.max_visible(), usize::MAX);
    assert_eq!(tracks.visible_tracks().len(), 30);
}

#[tokio::test]
async fn hide_after_show_leaves_nothing_visible() {
    let (mut tracks, _) = setup(3);
    let shown = ids(&["1", "2", "3"]);

    tracks.show_tracks(Some(&shown), false).await;
    tracks.hide_tracks(&shown);

    assert!(tracks.visible_tracks().is_empty());
    assert_flags_match(&tracks);
}

#[tokio::test]
async fn hiding_invisible_tracks_is_ignored() {
    let (mut tracks, _) = setup(3);
    tracks.show_tracks(Some(&ids(&["1"])), false).await;

    tracks.hide_tracks(&ids(&["3", "unknown"]));

    assert_eq!(tracks.visible_tracks(), ids(&["1"]).as_slice());
}

#[tokio::test]
async fn annotations_are_fetched_once_per_track() {
    let (mut tracks, source) = setup(3);

    tracks.show_tracks(Some(&ids(&["1", "2"])), false).await;
    tracks.hide_tracks(&ids(&["1"]));
    tracks.show_tracks(Some(&ids(&["1"])), true).await;
    tracks.show_tracks(Some(&ids(&["3"])), false).await;
    tracks.show_tracks(Some(&ids(&["1", "2", "3"])), false).await;

    assert_eq!(source.loads("1"), 1);
    assert_eq!(source.loads("2"), 1);
    assert_eq!(source.loads("3"), 1);
    assert_eq!(source.loads("4"), 0);

    let first = tracks.get("1").unwrap();
    assert!(first.annotations_loaded);
    assert_eq!(first.annotations.len(), 1);
}

#[tokio::test]
async fn failed_fetch_is_retried_on_next_show() {
    let (mut tracks, source) = setup(3);
    source.fail_for("1");

    tracks.show_tracks(Some(&ids(&["1"])), false).await;
    assert_eq!(tracks.visible_tracks(), ids(&["1"]).as_slice());
    assert!(!tracks.get("1").unwrap().annotations_loaded);

    source.recover();
    tracks.hide_tracks(&ids(&["1"]));
    tracks.show_tracks(Some(&ids(&["1"])), false).await;

    assert_eq!(source.loads("1"), 2);
    assert!(tracks.get("1").unwrap().annotations_loaded);
}

#[tokio::test]
async fn keep_previous_retains_what_fits() {
    let (mut tracks, _) = setup(3);
    tracks.show_tracks(Some(&ids(&["1", "2"])), false).await;

    tracks.show_tracks(Some(&ids(&["3", "4"])), true).await;

    assert_eq!(tracks.visible_tracks(), ids(&["1", "3", "4"]).as_slice());
    assert!(!tracks.get("2").unwrap().visible);
    assert_flags_match(&tracks);
}

#[tokio::test]
async fn keep_previous_with_full_request_replaces_everything() {
    let (mut tracks, _) = setup(2);
    tracks.show_tracks(Some(&ids(&["1", "2"])), false).await;

    tracks.show_tracks(Some(&ids(&["3", "4", "5"])), true).await;

    assert_eq!(tracks.visible_tracks(), ids(&["3", "4"]).as_slice());
}

#[tokio::test]
async fn show_without_tracks_is_a_no_op() {
    let (mut tracks, _) = setup(3);
    tracks.show_tracks(Some(&ids(&["1"])), false).await;
    let mut events = tracks.subscribe();

    tracks.show_tracks(None, false).await;

    assert_eq!(tracks.visible_tracks(), ids(&["1"]).as_slice());
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn rapid_calls_settle_on_the_last_request() {
    let (mut tracks, _) = setup(3);

    tracks.show_tracks(Some(&ids(&["1", "2"])), false).await;
    tracks.show_tracks(Some(&ids(&["3"])), false).await;
    tracks.show_tracks(Some(&ids(&["5", "4"])), false).await;

    assert_eq!(tracks.visible_tracks(), ids(&["5", "4"]).as_slice());
    assert_flags_match(&tracks);
}

#[tokio::test]
async fn overlapping_calls_follow_the_new_order() {
    let (mut tracks, source) = setup(3);

    tracks.show_tracks(Some(&ids(&["2"])), false).await;
    tracks.show_tracks(Some(&ids(&["1", "2"])), false).await;
    assert_eq!(tracks.visible_tracks(), ids(&["1", "2"]).as_slice());

    tracks.show_tracks(Some(&ids(&["3", "2", "1"])), false).await;
    assert_eq!(tracks.visible_tracks(), ids(&["3", "2", "1"]).as_slice());

    assert_eq!(source.loads("2"), 1);
    assert_flags_match(&tracks);
}

#[tokio::test]
async fn unknown_ids_are_skipped() {
    let (mut tracks, _) = setup(3);

    tracks.show_tracks_by_id(&ids(&["42", "2", "1"])).await;

    assert_eq!(tracks.visible_tracks(), ids(&["2", "1"]).as_slice());
}

#[tokio::test]
async fn selection_prefers_first_visible_own_track() {
    let (mut tracks, _) = setup(4);

    tracks.show_tracks(Some(&ids(&["1", "4", "2"])), false).await;
    assert_eq!(tracks.selected().and_then(|t| t.id()), Some("4"));

    // Still visible, so the selection sticks.
    tracks.show_tracks(Some(&ids(&["2"])), true).await;
    assert_eq!(tracks.selected().and_then(|t| t.id()), Some("4"));

    tracks.hide_tracks(&ids(&["4"]));
    assert_eq!(tracks.selected().and_then(|t| t.id()), Some("2"));

    tracks.show_tracks(Some(&ids(&["3"])), false).await;
    assert!(tracks.selected().is_none());
}

#[tokio::test]
async fn manual_selection_requires_visibility() {
    let (mut tracks, _) = setup(3);
    tracks.show_tracks(Some(&ids(&["1", "3"])), false).await;

    assert!(tracks.select("2").is_err());
    tracks.select("3").unwrap();
    assert_eq!(tracks.selected().and_then(|t| t.id()), Some("3"));
}

#[tokio::test]
async fn visibility_changes_are_broadcast() {
    let (mut tracks, _) = setup(3);
    let mut events = tracks.subscribe();

    tracks.show_tracks(Some(&ids(&["1", "2"])), false).await;

    assert_eq!(
        events.try_recv().unwrap(),
        TracksEvent::Selected(Some("2".to_string()))
    );
    assert_eq!(
        events.try_recv().unwrap(),
        TracksEvent::Visibility(ids(&["1", "2"]))
    );
}

#[tokio::test]
async fn adding_own_track_shows_it_next_to_visible_ones() {
    let (mut tracks, _) = setup(3);
    let ctx = rest_context();
    tracks.show_tracks(Some(&ids(&["1", "3"])), false).await;

    tracks.add(track(&ctx, "6", "7")).await.unwrap();
    tracks.add(track(&ctx, "8", "9")).await.unwrap();

    assert_eq!(tracks.visible_tracks(), ids(&["1", "3", "6"]).as_slice());
    assert!(!tracks.get("8").unwrap().visible);
    assert_eq!(
        tracks.get("6").unwrap().annotations_url().as_deref(),
        Some("videos/1/tracks/6/annotations")
    );
}

#[tokio::test]
async fn adding_requires_a_saved_track() {
    let (mut tracks, _) = setup(3);
    let unsaved = annotool::resource::Track::from_attributes(
        &common::attrs(serde_json::json!({"name": "draft"})),
        &AppContext::default(),
    )
    .unwrap();

    assert!(tracks.add(unsaved).await.is_err());
    let ctx = rest_context();
    assert!(tracks.add(track(&ctx, "1", "7")).await.is_err());
}

#[tokio::test]
async fn removing_a_visible_track_hides_it() {
    let (mut tracks, _) = setup(3);
    tracks.show_tracks(Some(&ids(&["1", "2"])), false).await;

    let removed = tracks.remove("2").unwrap();

    assert_eq!(removed.id(), Some("2"));
    assert_eq!(tracks.visible_tracks(), ids(&["1"]).as_slice());
    assert_eq!(tracks.len(), 4);
    assert!(tracks.remove("2").is_none());
}
