//! Integration tests for the bin lifecycle and quota accounting.

use chrono::{Duration, Utc};

use drive_core::ErrorKind;
use drive_core::traits::storage::{BINNED_TAG, object_key};
use drive_database::DriveStore;
use drive_entity::permission::Access;
use drive_entity::share::SharePolicies;
use drive_worker::{BinSweepJob, JobExecutionError, ScheduledJob};

use crate::helpers::TestApp;

#[tokio::test]
async fn test_bin_sweep_reclaims_quota_and_shares() {
    let app = TestApp::new(10_000);
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;

    let uploaded = app
        .upload(
            &alice,
            alice.drive_id,
            &[
                ("photos", None),
                ("photos/a.jpg", Some(3_000)),
                ("photos/b.jpg", Some(2_000)),
                ("keep.txt", Some(100)),
            ],
        )
        .await;
    let photos = uploaded["photos"].id;
    let a = uploaded["photos/a.jpg"].id;
    assert_eq!(app.services.quota.get_free_space(alice.user_id).await.unwrap(), 4_900);

    app.services
        .shares
        .apply_share(
            &alice,
            photos,
            SharePolicies {
                can_read_users: vec![bob.user_id],
                can_edit_users: Vec::new(),
            },
        )
        .await
        .unwrap();
    assert_eq!(app.store.share_count().await, 1);

    app.services.bin.move_to_bin(&alice, &[photos]).await.unwrap();
    assert_eq!(app.services.access.resolve_access(bob.user_id, a).await.unwrap(), Access::None);
    assert_eq!(
        app.storage.tag(&object_key(alice.user_id, a), BINNED_TAG).await.as_deref(),
        Some("true")
    );

    // Nothing is old enough yet.
    let report = app.services.bin.sweep_expired(Utc::now()).await.unwrap();
    assert_eq!(report.entries_removed, 0);
    assert_eq!(app.store.share_count().await, 1);

    let later = Utc::now() + app.config.drive.bin_retention().unwrap() + Duration::minutes(1);
    let report = app.services.bin.sweep_expired(later).await.unwrap();
    assert_eq!(report.records_removed, 3);
    assert_eq!(report.entries_removed, 3);
    assert_eq!(report.bytes_reclaimed, 5_000);
    assert_eq!(report.shares_removed, 1);

    assert_eq!(app.services.quota.get_free_space(alice.user_id).await.unwrap(), 9_900);
    assert!(app.store.find_entry(a).await.unwrap().is_none());
    assert!(app.services.bin.list_bin(&alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_restore_after_parent_was_binned() {
    let app = TestApp::new(10_000);
    let alice = app.signup("alice").await;
    let uploaded = app
        .upload(&alice, alice.drive_id, &[("P", None), ("P/e.txt", Some(10))])
        .await;
    let p = uploaded["P"].id;
    let e = uploaded["P/e.txt"].id;

    app.services.bin.move_to_bin(&alice, &[e]).await.unwrap();
    let restored = app.services.bin.restore(&alice, &[e], false).await.unwrap();
    assert_eq!(restored[0].parent_id, Some(p));

    app.services.bin.move_to_bin(&alice, &[e]).await.unwrap();
    app.services.bin.move_to_bin(&alice, &[p]).await.unwrap();
    let restored = app.services.bin.restore(&alice, &[e], false).await.unwrap();
    assert_eq!(restored[0].parent_id, Some(alice.drive_id));

    let err = app.services.bin.restore(&alice, &[e], false).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InconsistentState);
}

#[tokio::test]
async fn test_tag_failures_do_not_fail_binning() {
    let app = TestApp::new(10_000);
    let alice = app.signup("alice").await;
    let uploaded = app.upload(&alice, alice.drive_id, &[("f.bin", Some(5))]).await;
    let f = uploaded["f.bin"].id;

    app.storage.fail_tagging(true);
    app.services.bin.move_to_bin(&alice, &[f]).await.unwrap();
    assert_eq!(app.services.bin.list_bin(&alice).await.unwrap().len(), 1);
    assert_eq!(app.storage.tag(&object_key(alice.user_id, f), BINNED_TAG).await, None);

    let report = app.services.bin.purge(&alice, &[f]).await.unwrap();
    assert_eq!(report.bytes_reclaimed, 5);
    assert_eq!(app.services.quota.get_free_space(alice.user_id).await.unwrap(), 10_000);
}

#[tokio::test]
async fn test_failed_sweep_batch_spares_other_owners_and_retries() {
    let (app, faults) = TestApp::with_faults(10_000);
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    let a = app.upload(&alice, alice.drive_id, &[("a.txt", Some(300))]).await["a.txt"].id;
    let b = app.upload(&bob, bob.drive_id, &[("b.txt", Some(200))]).await["b.txt"].id;
    app.services.bin.move_to_bin(&alice, &[a]).await.unwrap();
    app.services.bin.move_to_bin(&bob, &[b]).await.unwrap();
    faults.fail_user(Some(bob.user_id)).await;

    let later = Utc::now() + app.config.drive.bin_retention().unwrap() + Duration::minutes(1);
    let report = app.services.bin.sweep_expired(later).await.unwrap();
    assert_eq!(report.failed_batches, 1);
    assert_eq!(report.entries_removed, 1);
    assert_eq!(report.bytes_reclaimed, 300);

    assert!(app.store.find_entry(a).await.unwrap().is_none());
    assert!(app.store.find_bin_record(a).await.unwrap().is_none());
    assert_eq!(app.services.quota.get_free_space(alice.user_id).await.unwrap(), 10_000);

    // Bob's batch rolled back as a whole.
    assert!(app.store.find_entry(b).await.unwrap().is_some());
    assert!(app.store.find_bin_record(b).await.unwrap().is_some());
    assert_eq!(app.services.quota.get_free_space(bob.user_id).await.unwrap(), 9_800);

    app.store
        .backdate_bin_record(b, Utc::now() - Duration::days(4))
        .await
        .unwrap();
    let job = BinSweepJob::new(app.services.bin.clone(), "0 0 * * * *");
    let err = job.run().await.unwrap_err();
    assert!(matches!(err, JobExecutionError::Transient(_)));
    assert!(app.store.find_bin_record(b).await.unwrap().is_some());

    // The next tick picks the batch up again.
    faults.fail_user(None).await;
    let summary = job.run().await.unwrap();
    assert_eq!(summary["entries_removed"], 1);
    assert_eq!(summary["bytes_reclaimed"], 200);
    assert!(app.store.find_entry(b).await.unwrap().is_none());
    assert_eq!(app.services.quota.get_free_space(bob.user_id).await.unwrap(), 10_000);
}
