//! Case workflow against a real database
//!
//! Skipped when no database is available.

mod helpers;

use assert_matches::assert_matches;
use serde_json::json;
use serial_test::serial;
use helpers::*;
use VisaPilot::models::document::{CreateDocumentRequest, DocumentStatus};
use VisaPilot::models::user::{User, UserRole};
use VisaPilot::services::cases::{EditCaseInput, NewCaseInput};
use VisaPilot::VisaPilotError;

fn new_case(visa_type: &str) -> NewCaseInput {
    NewCaseInput {
        case_type: "work".to_string(),
        visa_type: visa_type.to_string(),
        country_of_origin: Some("India".to_string()),
        target_visa_date: None,
    }
}

fn unlinked_document(case_id: uuid::Uuid, owner: &User, title: &str) -> CreateDocumentRequest {
    CreateDocumentRequest {
        case_id,
        checklist_item_id: None,
        title: title.to_string(),
        description: None,
        file_path: format!("{}/abc-{}", case_id, title.replace(' ', "_")),
        file_name: title.to_string(),
        file_size: 2048,
        mime_type: Some("application/pdf".to_string()),
        uploaded_by: owner.id,
        status: DocumentStatus::Pending,
    }
}

#[tokio::test]
#[serial]
async fn test_create_case_is_get_or_create() {
    let Some(ctx) = TestContext::with_database().await else { return };
    let client = ctx.db().create_user("client@example.com", UserRole::Client).await;

    let first = ctx.services.case_service.create_case(&client, new_case("skilled_worker")).await.unwrap();
    let second = ctx.services.case_service.create_case(&client, new_case("student")).await.unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.view.detail.case.id, second.view.detail.case.id);
    assert_eq!(second.view.detail.case.visa_type, "skilled_worker");
    assert_eq!(ctx.db().count_records("cases").await.unwrap(), 1);

    let templates = ctx.services.database.checklist.templates_for("skilled_worker").await.unwrap();
    let titles: Vec<_> = first.view.detail.checklist.iter().map(|item| item.title.clone()).collect();
    let expected: Vec<_> = templates.iter().map(|template| template.title.clone()).collect();
    assert_eq!(titles, expected);
}

#[tokio::test]
#[serial]
async fn test_create_case_over_http_reports_created() {
    let Some(ctx) = TestContext::with_database().await else { return };
    let client = ctx.db().create_user("http-client@example.com", UserRole::Client).await;
    let token = ctx.token_for(&client);
    let body = json!({ "case_type": "study", "visa_type": "student" });

    let (status, first) = ctx.send(json_request("POST", "/api/cases", Some(&token), Some(body.clone()))).await;
    assert_eq!(status, 201, "unexpected body {}", first);
    assert_eq!(first["created"], true);

    let (status, second) = ctx.send(json_request("POST", "/api/cases", Some(&token), Some(body))).await;
    assert_eq!(status, 200);
    assert_eq!(second["created"], false);
    assert_eq!(first["id"], second["id"]);

    let (status, mine) = ctx.send(json_request("GET", "/api/cases", Some(&token), None)).await;
    assert_eq!(status, 200);
    assert_eq!(mine["id"], first["id"]);
    assert!(mine["personalization"].is_string());
}

#[tokio::test]
#[serial]
async fn test_admin_cannot_open_case_and_unknown_visa_rejected() {
    let Some(ctx) = TestContext::with_database().await else { return };
    let admin = ctx.db().create_user("staff@example.com", UserRole::Admin).await;
    let client = ctx.db().create_user("client2@example.com", UserRole::Client).await;

    assert_matches!(
        ctx.services.case_service.create_case(&admin, new_case("student")).await,
        Err(VisaPilotError::PermissionDenied(_))
    );
    assert_matches!(
        ctx.services.case_service.create_case(&client, new_case("space_tourism")).await,
        Err(VisaPilotError::InvalidInput(_))
    );
    assert_matches!(
        ctx.services.case_service.my_case(&client).await,
        Err(VisaPilotError::NotFound { .. })
    );
}

#[tokio::test]
#[serial]
async fn test_regeneration_replaces_checklist_in_template_order() {
    let Some(ctx) = TestContext::with_database().await else { return };
    let client = ctx.db().create_user("switcher@example.com", UserRole::Client).await;

    let created = ctx.services.case_service.create_case(&client, new_case("skilled_worker")).await.unwrap();
    let case_id = created.view.detail.case.id;
    let first_item = created.view.detail.checklist[0].id;
    ctx.services.database.checklist.set_completed(first_item, true).await.unwrap();

    let edited = ctx.services.case_service.edit_case(&client, case_id, EditCaseInput {
        visa_type: Some("family".to_string()),
        regenerate_checklist: true,
        ..EditCaseInput::default()
    }).await.unwrap();

    let templates = ctx.services.database.checklist.templates_for("family").await.unwrap();
    let items = &edited.detail.checklist;
    assert_eq!(edited.detail.case.visa_type, "family");
    assert_eq!(items.len(), templates.len());
    for (item, template) in items.iter().zip(&templates) {
        assert_eq!(item.title, template.title);
        assert_eq!(item.order_index, template.order_index);
        assert!(!item.completed);
    }
}

#[tokio::test]
#[serial]
async fn test_edit_without_regeneration_keeps_checklist() {
    let Some(ctx) = TestContext::with_database().await else { return };
    let client = ctx.db().create_user("keeper@example.com", UserRole::Client).await;

    let created = ctx.services.case_service.create_case(&client, new_case("student")).await.unwrap();
    let before: Vec<_> = created.view.detail.checklist.iter().map(|item| item.id).collect();

    let edited = ctx.services.case_service.edit_case(&client, created.view.detail.case.id, EditCaseInput {
        visa_type: Some("family".to_string()),
        ..EditCaseInput::default()
    }).await.unwrap();

    let after: Vec<_> = edited.detail.checklist.iter().map(|item| item.id).collect();
    assert_eq!(before, after);
}

#[tokio::test]
#[serial]
async fn test_checklist_completion_needs_matching_document() {
    let Some(ctx) = TestContext::with_database().await else { return };
    let client = ctx.db().create_user("gate@example.com", UserRole::Client).await;
    let created = ctx.services.case_service.create_case(&client, new_case("skilled_worker")).await.unwrap();
    let case_id = created.view.detail.case.id;
    let passport = created.view.detail.checklist.iter()
        .find(|item| item.title == "Valid Passport")
        .expect("template seeded")
        .clone();

    ctx.services.database.documents.create(unlinked_document(case_id, &client, "Bank Statement.pdf")).await.unwrap();
    assert_matches!(
        ctx.services.case_service.toggle_item(&client, passport.id, true).await,
        Err(VisaPilotError::Conflict(_))
    );
    let unchanged = ctx.services.database.checklist.find_item(passport.id).await.unwrap().unwrap();
    assert!(!unchanged.completed);

    ctx.services.database.documents.create(unlinked_document(case_id, &client, "My Valid Passport Scan.pdf")).await.unwrap();
    let completed = ctx.services.case_service.toggle_item(&client, passport.id, true).await.unwrap();
    assert!(completed.completed);
    assert!(completed.completed_at.is_some());

    let reopened = ctx.services.case_service.toggle_item(&client, passport.id, false).await.unwrap();
    assert!(!reopened.completed);
    assert!(reopened.completed_at.is_none());
}

#[tokio::test]
#[serial]
async fn test_linked_document_satisfies_item() {
    let Some(ctx) = TestContext::with_database().await else { return };
    let client = ctx.db().create_user("linked@example.com", UserRole::Client).await;
    let created = ctx.services.case_service.create_case(&client, new_case("student")).await.unwrap();
    let case_id = created.view.detail.case.id;
    let item = created.view.detail.checklist[1].clone();

    let mut request = unlinked_document(case_id, &client, "scan-0001.pdf");
    request.checklist_item_id = Some(item.id);
    ctx.services.database.documents.create(request).await.unwrap();

    let completed = ctx.services.case_service.toggle_item(&client, item.id, true).await.unwrap();
    assert!(completed.completed);
}

#[tokio::test]
#[serial]
async fn test_messages_are_scoped_to_case_members() {
    let Some(ctx) = TestContext::with_database().await else { return };
    let client = ctx.db().create_user("writer@example.com", UserRole::Client).await;
    let stranger = ctx.db().create_user("stranger@example.com", UserRole::Client).await;
    let admin = ctx.db().create_user("reviewer@example.com", UserRole::Admin).await;
    let case_id = ctx.services.case_service.create_case(&client, new_case("student")).await.unwrap().view.detail.case.id;

    ctx.services.case_service.post_message(&client, case_id, "First question").await.unwrap();
    ctx.services.case_service.post_message(&admin, case_id, "Answer").await.unwrap();

    let thread = ctx.services.case_service.list_messages(&client, case_id).await.unwrap();
    let contents: Vec<_> = thread.iter().map(|message| message.content.as_str()).collect();
    assert_eq!(contents, vec!["First question", "Answer"]);

    assert_matches!(
        ctx.services.case_service.list_messages(&stranger, case_id).await,
        Err(VisaPilotError::PermissionDenied(_))
    );
    assert_matches!(
        ctx.services.case_service.post_message(&client, case_id, &"a".repeat(4001)).await,
        Err(VisaPilotError::InvalidInput(_))
    );
}
