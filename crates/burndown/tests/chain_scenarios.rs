//! End-to-end chain scenarios, run against every store backend.
//!
//! Each scenario is written once, generic over the store, and instantiated
//! for `MemoryStore` and `SqliteStore` at the bottom of the file.

use burndown::store::{MemoryStore, SqliteStore, Store};
use burndown::{
    Backlog, BacklogConfig, BacklogError, ConflictReason, ErrorClass, NextId, StoryBuilder,
    StructuralError,
};
use burndown_testkit::{all_layouts, changed, next, sid, Expect, FaultyStore, TestFixture};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn backlog<S: Store>(fixture: &TestFixture<S>) -> Backlog<S> {
    Backlog::from_shared(fixture.shared(), BacklogConfig::default())
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenarios
// ─────────────────────────────────────────────────────────────────────────────

async fn empty_circle_starts_chain<S: Store>(fixture: TestFixture<S>) {
    let backlog = backlog(&fixture);

    let story = backlog
        .insert(StoryBuilder::new(fixture.circle.clone()).summary("first").build())
        .await
        .unwrap();

    assert!(story.is_first_story);
    assert_eq!(story.next_id, NextId::Last);
    assert_eq!(fixture.order().await.unwrap(), [story.id.to_string()]);
}

async fn insert_before_head_takes_flag<S: Store>(fixture: TestFixture<S>) {
    let backlog = backlog(&fixture);
    fixture.seed(&["s1"]).await.unwrap();
    let before = fixture.snapshot().await.unwrap();

    let s2 = backlog
        .insert(fixture.new_story("s2").before(&sid("s1")).build())
        .await
        .unwrap();

    assert!(s2.is_first_story);
    assert_eq!(s2.next_id, next("s1"));
    assert!(!fixture.story("s1").await.unwrap().is_first_story);
    assert_eq!(fixture.order().await.unwrap(), ["s2", "s1"]);

    // Only the new story and the old head's flag changed.
    let after = fixture.snapshot().await.unwrap();
    assert_eq!(changed(&before, &after), ["s1", "s2"]);
    assert_eq!(after[&sid("s1")].next_id, before[&sid("s1")].next_id);
}

async fn competing_inserts_both_land<S: Store>(fixture: TestFixture<S>) {
    let backlog = backlog(&fixture);
    fixture.seed(&["s1", "s2"]).await.unwrap();

    // Both callers asked for the slot before s2.
    let s3 = backlog
        .insert(fixture.new_story("s3").before(&sid("s2")).build())
        .await
        .unwrap();
    let s4 = backlog
        .insert(fixture.new_story("s4").before(&sid("s2")).build())
        .await
        .unwrap();

    assert_eq!(s4.next_id, s3.as_next());
    assert_eq!(fixture.order().await.unwrap(), ["s4", "s3", "s1", "s2"]);
    assert_eq!(fixture.heads().await.unwrap(), ["s4"]);
}

async fn move_relinks_three_stories<S: Store>(fixture: TestFixture<S>) {
    let backlog = backlog(&fixture);
    fixture.seed(&["s1", "s2", "s3", "s4"]).await.unwrap();
    let before = fixture.snapshot().await.unwrap();

    let moved = backlog.move_story(&sid("s2"), next("s4")).await.unwrap();

    assert_eq!(moved.next_id, next("s4"));
    assert_eq!(fixture.order().await.unwrap(), ["s1", "s3", "s2", "s4"]);

    let after = fixture.snapshot().await.unwrap();
    assert_eq!(changed(&before, &after), ["s1", "s2", "s3"]);
}

async fn converging_pointers_are_broken<S: Store>(fixture: TestFixture<S>) {
    let backlog = backlog(&fixture);
    fixture.seed(&["s1", "s2", "s3"]).await.unwrap();
    assert!(!backlog.is_broken(&fixture.circle).await.unwrap());

    fixture.point("s1", next("s3")).await.unwrap();

    assert!(backlog.is_broken(&fixture.circle).await.unwrap());
    let err = backlog.check(&fixture.circle).await.unwrap_err();
    assert!(matches!(
        err,
        BacklogError::Structural(StructuralError::ConvergingPointers { .. })
    ));
    assert_eq!(err.class(), ErrorClass::NeedsRepair);
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

async fn validation_is_idempotent<S: Store>(fixture: TestFixture<S>) {
    let backlog = backlog(&fixture);
    fixture.seed(&["a", "b", "c", "d"]).await.unwrap();
    let before = fixture.snapshot().await.unwrap();

    for _ in 0..3 {
        assert!(!backlog.is_broken(&fixture.circle).await.unwrap());
        backlog.check(&fixture.circle).await.unwrap();
    }
    assert_eq!(fixture.snapshot().await.unwrap(), before);
}

async fn single_collision_lands_before_competitor<S: Store>(fixture: TestFixture<S>) {
    let backlog = backlog(&fixture);
    fixture.seed(&["a", "b"]).await.unwrap();

    // `a` already points at `b`, so the new story goes in front of `a`.
    let story = backlog
        .insert(fixture.new_story("n").before(&sid("b")).build())
        .await
        .unwrap();

    assert_eq!(story.next_id, next("a"));
    assert_eq!(fixture.order().await.unwrap(), ["n", "a", "b"]);
}

async fn multi_collision_mutates_nothing<S: Store>(fixture: TestFixture<S>) {
    let backlog = backlog(&fixture);
    fixture.seed(&["a", "b", "c"]).await.unwrap();
    fixture.point("a", next("c")).await.unwrap();
    let before = fixture.snapshot().await.unwrap();

    let err = backlog
        .insert(fixture.new_story("n").before(&sid("c")).build())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BacklogError::Conflict {
            reason: ConflictReason::MultipleCandidates,
            ..
        }
    ));
    assert!(err.is_retryable());
    assert_eq!(fixture.snapshot().await.unwrap(), before);
}

async fn layouts_are_judged_in_store<S: Store>(fixture: TestFixture<S>) {
    let backlog = backlog(&fixture);

    for (i, layout) in all_layouts().into_iter().enumerate() {
        let circle = burndown::CircleId::new(format!("layout-{}", i)).unwrap();
        let scoped = fixture.in_circle(circle.clone());
        scoped.place(&layout).await.unwrap();

        match (&layout.expect, backlog.backlog(&circle).await) {
            (Expect::Order(order), Ok(stories)) => {
                let got: Vec<&str> = stories.iter().map(|s| s.id.as_str()).collect();
                assert_eq!(&got, order, "{}", layout.name);
            }
            (Expect::Broken(kind), Err(BacklogError::Structural(err))) => {
                assert!(kind.matches(&err), "{}: got {:?}", layout.name, err);
            }
            (expect, got) => panic!("{}: expected {:?}, got {:?}", layout.name, expect, got),
        }

        // Story ids are global, so clear the layout before the next one.
        for story in scoped.stories().await.unwrap() {
            fixture.store.delete_story(&story.id, &story.revision).await.unwrap();
        }
    }
}

async fn archive_and_repair<S: Store>(fixture: TestFixture<S>) {
    let backlog = backlog(&fixture);
    fixture.seed(&["a", "b", "c"]).await.unwrap();

    let archive = backlog.archive_story(&sid("b")).await.unwrap();
    assert_eq!(archive.story_id, sid("b"));
    assert_eq!(fixture.order().await.unwrap(), ["a", "c"]);
    assert_eq!(backlog.archives(&fixture.circle, 5).await.unwrap().len(), 1);

    // A bare remove leaves a dangling pointer for the repair path.
    let c = fixture.story("c").await.unwrap();
    backlog.remove_story(&c).await.unwrap();
    assert!(backlog.is_broken(&fixture.circle).await.unwrap());

    backlog.fix_story(&sid("a"), NextId::Last).await.unwrap();
    assert_eq!(fixture.order().await.unwrap(), ["a"]);
}

async fn insert_into_other_circle_is_rejected<S: Store>(fixture: TestFixture<S>) {
    let backlog = backlog(&fixture);
    let other = fixture.in_circle(burndown::CircleId::new("j").unwrap());
    other.seed(&["j1", "j2"]).await.unwrap();
    fixture.seed(&["k1"]).await.unwrap();
    let mine = fixture.snapshot().await.unwrap();
    let theirs = other.snapshot().await.unwrap();

    for target in ["j1", "j2"] {
        let err = backlog
            .insert(fixture.new_story("k2").before(&sid(target)).build())
            .await
            .unwrap_err();
        assert!(matches!(err, BacklogError::NotFound(_)), "{}: {:?}", target, err);
    }

    assert_eq!(fixture.snapshot().await.unwrap(), mine);
    assert_eq!(other.snapshot().await.unwrap(), theirs);
    assert_eq!(fixture.heads().await.unwrap(), ["k1"]);
    assert_eq!(other.heads().await.unwrap(), ["j1"]);

    // The repair path refuses the same pointer.
    let err = backlog.fix_story(&sid("k1"), next("j1")).await.unwrap_err();
    assert!(matches!(err, BacklogError::NotFound(_)));
    assert_eq!(fixture.order().await.unwrap(), ["k1"]);
}

async fn insert_before_missing_story_writes_nothing<S: Store>(fixture: TestFixture<S>) {
    let backlog = backlog(&fixture);
    fixture.seed(&["a", "b"]).await.unwrap();
    let before = fixture.snapshot().await.unwrap();

    let err = backlog
        .insert(fixture.new_story("n").before(&sid("gone")).build())
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::NotFound);
    assert_eq!(fixture.snapshot().await.unwrap(), before);
}

async fn tail_insert_on_long_chain<S: Store>(fixture: TestFixture<S>) {
    let backlog = backlog(&fixture);
    let names: Vec<String> = (0..20).map(|i| format!("s{}", i)).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    fixture.seed(&refs).await.unwrap();

    let tail = backlog
        .insert(fixture.new_story("t").at_tail().build())
        .await
        .unwrap();
    let deep = backlog
        .insert(fixture.new_story("d").before(&sid("s19")).build())
        .await
        .unwrap();

    // Both cascade all the way up past twenty competitors.
    assert!(deep.is_first_story);
    assert_eq!(deep.next_id, tail.as_next());
    let order = fixture.order().await.unwrap();
    assert_eq!(order.len(), 22);
    assert_eq!(&order[..3], ["d", "t", "s0"]);
}

macro_rules! on_every_store {
    ($($scenario:ident),* $(,)?) => {
        mod memory {
            use super::*;
            $(
                #[tokio::test]
                async fn $scenario() {
                    init_tracing();
                    super::$scenario(TestFixture::new()).await;
                }
            )*
        }

        mod sqlite {
            use super::*;
            $(
                #[tokio::test]
                async fn $scenario() {
                    init_tracing();
                    let store = SqliteStore::open_memory().unwrap();
                    super::$scenario(TestFixture::with_store(store)).await;
                }
            )*
        }
    };
}

on_every_store!(
    empty_circle_starts_chain,
    insert_before_head_takes_flag,
    competing_inserts_both_land,
    move_relinks_three_stories,
    converging_pointers_are_broken,
    validation_is_idempotent,
    single_collision_lands_before_competitor,
    multi_collision_mutates_nothing,
    layouts_are_judged_in_store,
    archive_and_repair,
    insert_into_other_circle_is_rejected,
    insert_before_missing_story_writes_nothing,
    tail_insert_on_long_chain,
);

// ─────────────────────────────────────────────────────────────────────────────
// Failure Windows
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn interrupted_move_is_detected_and_repairable() {
    init_tracing();
    let fixture = TestFixture::with_store(FaultyStore::new(MemoryStore::new()));
    let backlog = backlog(&fixture);
    fixture.seed(&["s1", "s2", "s3", "s4"]).await.unwrap();

    // The first write (s1 closes the gap) lands; moving s2 itself fails.
    fixture.store.fail_updates_after(1);
    let err = backlog.move_story(&sid("s2"), next("s4")).await.unwrap_err();
    assert!(matches!(err, BacklogError::Store(_)));
    assert_eq!(fixture.store.updates(), 1);

    assert!(backlog.is_broken(&fixture.circle).await.unwrap());
    assert_eq!(fixture.story("s3").await.unwrap().next_id, next("s4"));

    fixture.store.disarm();
    backlog.fix_story(&sid("s1"), next("s2")).await.unwrap();
    assert_eq!(fixture.order().await.unwrap(), ["s1", "s2", "s3", "s4"]);
}

#[tokio::test]
async fn interrupted_head_fixup_leaves_no_head() {
    init_tracing();
    let fixture = TestFixture::with_store(FaultyStore::new(MemoryStore::new()));
    let backlog = backlog(&fixture);
    fixture.seed(&["s1"]).await.unwrap();

    // Clearing the old head's flag succeeds, setting the new one fails.
    fixture.store.fail_updates_after(1);
    let result = backlog
        .insert(fixture.new_story("s0").before(&sid("s1")).build())
        .await;
    assert!(result.is_err());

    let err = backlog.check(&fixture.circle).await.unwrap_err();
    assert!(matches!(
        err,
        BacklogError::Structural(StructuralError::NoHead { .. })
    ));
}

#[tokio::test]
async fn failed_detach_writes_no_archive() {
    init_tracing();
    let fixture = TestFixture::with_store(FaultyStore::new(MemoryStore::new()));
    let backlog = backlog(&fixture);
    fixture.seed(&["a", "b", "c"]).await.unwrap();

    // Relinking `a` past `b` is the first write, and it fails.
    fixture.store.fail_updates_after(0);
    assert!(backlog.archive_story(&sid("b")).await.is_err());

    assert!(backlog.archives(&fixture.circle, 5).await.unwrap().is_empty());
    assert_eq!(fixture.order().await.unwrap(), ["a", "b", "c"]);

    fixture.store.disarm();
    backlog.archive_story(&sid("b")).await.unwrap();
    assert_eq!(backlog.archives(&fixture.circle, 5).await.unwrap().len(), 1);
    assert_eq!(fixture.order().await.unwrap(), ["a", "c"]);
}

#[tokio::test]
async fn stale_view_collides_instead_of_overwriting() {
    init_tracing();
    let fixture = TestFixture::new();
    let backlog = backlog(&fixture);
    fixture.seed(&["s1"]).await.unwrap();

    // A caller holding an old copy of the head tries to remove it after
    // another caller has inserted in front of it.
    let stale = fixture.story("s1").await.unwrap();
    backlog
        .insert(fixture.new_story("s0").before(&sid("s1")).build())
        .await
        .unwrap();

    let err = backlog.remove_story(&stale).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(fixture.order().await.unwrap(), ["s0", "s1"]);
}

#[tokio::test]
async fn chain_survives_reopening_the_database() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("burndown.db");

    {
        let fixture = TestFixture::with_store(SqliteStore::open(&path).unwrap());
        let backlog = backlog(&fixture);
        fixture.seed(&["a", "b", "c"]).await.unwrap();
        backlog.move_story(&sid("c"), next("a")).await.unwrap();
    }

    let fixture = TestFixture::with_store(SqliteStore::open(&path).unwrap());
    assert_eq!(fixture.order().await.unwrap(), ["c", "a", "b"]);
}
