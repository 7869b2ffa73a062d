//! Integration tests for accounts, uploads, sharing, and moves.

use drive_core::ErrorKind;
use drive_entity::entry::ListFilter;
use drive_entity::permission::Access;
use drive_entity::share::SharePolicies;
use drive_service::{LoginRequest, MoveItem, MoveRequest, UploadName};

use crate::helpers::TestApp;

#[tokio::test]
async fn test_login_and_username_lookup() {
    let app = TestApp::new(1_000_000);
    let alice = app.signup("alice").await;

    let token = app
        .services
        .users
        .login(LoginRequest {
            username: "alice".to_string(),
            password: "alice-password".to_string(),
        })
        .await
        .unwrap();
    let ctx = app.services.authenticate(&token.token).await.unwrap();
    assert_eq!(ctx.user_id, alice.user_id);
    assert_eq!(ctx.drive_id, alice.drive_id);

    assert_eq!(
        app.services.users.username_to_id("alice").await.unwrap(),
        alice.user_id
    );
    let err = app.services.authenticate("Bearer garbage").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authentication);
}

#[tokio::test]
async fn test_upload_share_and_collaborate() {
    let app = TestApp::new(1_000_000);
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    let carol = app.signup("carol").await;

    let uploaded = app
        .upload(
            &alice,
            alice.drive_id,
            &[
                ("project", None),
                ("project/specs", None),
                ("project/specs/design.pdf", Some(4_000)),
                ("project/readme.md", Some(500)),
            ],
        )
        .await;
    let project = uploaded["project"].id;
    let specs = uploaded["project/specs"].id;
    let design = uploaded["project/specs/design.pdf"].id;
    assert!(uploaded["project/readme.md"].upload.is_some());

    let bob_id = app.services.users.username_to_id("bob").await.unwrap();
    app.services
        .shares
        .apply_share(
            &alice,
            project,
            SharePolicies {
                can_read_users: Vec::new(),
                can_edit_users: vec![bob_id],
            },
        )
        .await
        .unwrap();

    let shared = app
        .services
        .hierarchy
        .list_shared_entries(&bob, ListFilter::All)
        .await
        .unwrap();
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].id, project);

    // Bob works inside the shared folder.
    let notes = app.services.hierarchy.create_folder(&bob, specs, "notes").await.unwrap();
    let access = app.services.access.resolve_access(alice.user_id, notes).await.unwrap();
    assert_eq!(access, Access::Owner);
    let url = app.services.hierarchy.download_url(&bob, design).await.unwrap();
    assert_eq!(url.method, "GET");

    // Carol sees nothing.
    let err = app
        .services
        .hierarchy
        .list_children(&carol, project, ListFilter::All, false)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Refused);

    let names = [UploadName {
        name: "readme.md".to_string(),
        is_directory: false,
    }];
    assert!(!app.services.quota.can_upload(&bob, project, &names, 10).await.unwrap());
}

#[tokio::test]
async fn test_move_between_folders_is_all_or_nothing() {
    let app = TestApp::new(1_000_000);
    let alice = app.signup("alice").await;
    let uploaded = app
        .upload(
            &alice,
            alice.drive_id,
            &[
                ("inbox", None),
                ("archive", None),
                ("inbox/a.txt", Some(1)),
                ("inbox/b.txt", Some(1)),
                ("archive/b.txt", Some(1)),
            ],
        )
        .await;
    let inbox = uploaded["inbox"].id;
    let archive = uploaded["archive"].id;
    let item = |path: &str| MoveItem {
        id: uploaded[path].id,
        parent_id: inbox,
        name: None,
    };

    let err = app
        .services
        .hierarchy
        .move_entries(
            &alice,
            MoveRequest {
                entries: vec![item("inbox/a.txt"), item("inbox/b.txt")],
                new_parent_id: archive,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Collision);

    let archived = app
        .services
        .hierarchy
        .list_children(&alice, archive, ListFilter::FilesOnly, false)
        .await
        .unwrap();
    assert_eq!(archived.len(), 1);
}
