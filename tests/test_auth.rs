//! Sign-in gating, role permissions, confirmation tokens and password recovery.

mod common;

use common::{job, row_id, TestApp, TestResult, ADMIN_EMAIL, APP_URL, EDITOR_EMAIL, PASSWORD, VIEWER_EMAIL};
use serde_json::{json, Value};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn protected_routes_need_a_valid_session() -> TestResult {
    let app = TestApp::spawn().await?;

    let health = app.client.get(app.url("/health")).send().await?;
    assert_eq!(health.status(), 200);

    let resp = app.client.get(app.url("/api/resources/jobs")).send().await?;
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await?;
    assert_eq!(body["success"], false);

    let resp = app
        .client
        .get(app.url("/auth/me"))
        .bearer_auth("not-a-real-token")
        .send()
        .await?;
    assert_eq!(resp.status(), 401);

    let bad = app
        .client
        .post(app.url("/auth/sign-in"))
        .json(&json!({ "email": ADMIN_EMAIL, "password": "wrong-password" }))
        .send()
        .await?;
    assert_eq!(bad.status(), 401);

    let malformed = app
        .client
        .post(app.url("/auth/sign-in"))
        .json(&json!({ "email": "not-an-email", "password": PASSWORD }))
        .send()
        .await?;
    assert_eq!(malformed.status(), 400);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn me_reports_role_permissions() -> TestResult {
    let app = TestApp::spawn().await?;

    let token = app.sign_in(EDITOR_EMAIL).await?;
    let (status, me) = app.get(&token, "/auth/me").await?;
    assert_eq!(status, 200);
    assert_eq!(me["data"]["permissions"]["role"], "Editor");
    assert_eq!(me["data"]["permissions"]["can_edit"], true);
    assert_eq!(me["data"]["permissions"]["can_delete"], false);

    let (status, _) = app.post_json(&token, "/auth/sign-out", &json!({})).await?;
    assert_eq!(status, 200);
    let (status, _) = app.get(&token, "/auth/me").await?;
    assert_eq!(status, 401);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn roles_limit_what_can_be_changed() -> TestResult {
    let app = TestApp::spawn().await?;
    let admin = app.admin().await?;
    let editor = app.sign_in(EDITOR_EMAIL).await?;
    let viewer = app.sign_in(VIEWER_EMAIL).await?;

    let (status, _) = app.get(&viewer, "/api/resources/jobs").await?;
    assert_eq!(status, 200);
    let (status, body) = app
        .post_json(&viewer, "/api/resources/jobs", &job("Clerk", "Office"))
        .await?;
    assert_eq!(status, 403);
    assert_eq!(body["notice"]["level"], "error");

    let (status, created) = app
        .post_json(&editor, "/api/resources/jobs", &job("Clerk", "Office"))
        .await?;
    assert_eq!(status, 201);
    let id = row_id(&created["data"]);

    let (status, _) = app
        .post_json(&editor, "/api/resources/jobs/actions", &json!({ "type": "delete", "id": id }))
        .await?;
    assert_eq!(status, 403);

    let (status, _) = app.get(&editor, "/api/resources/users-roles").await?;
    assert_eq!(status, 403);
    let (status, users) = app.get(&admin, "/api/resources/users-roles").await?;
    assert_eq!(status, 200);
    assert_eq!(users["data"]["total"], 3);

    let (status, _) = app.get(&admin, "/api/resources/no-such-screen").await?;
    assert_eq!(status, 404);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn confirmation_tokens_are_single_use_and_owned() -> TestResult {
    let app = TestApp::spawn().await?;
    let admin = app.admin().await?;

    let (_, created) = app
        .post_json(&admin, "/api/resources/jobs", &job("Driver", "Transport"))
        .await?;
    let id = row_id(&created["data"]);

    let (status, opened) = app
        .post_json(&admin, "/api/resources/jobs/actions", &json!({ "type": "delete", "id": id }))
        .await?;
    assert_eq!(status, 200);
    assert_eq!(opened["data"]["prompt"]["title"], "Delete job?");
    assert_eq!(opened["data"]["prompt"]["variant"], "danger");
    let token = opened["data"]["token"].as_str().unwrap_or_default().to_string();

    // Opening changes nothing.
    let (status, _) = app.get(&admin, &format!("/api/resources/jobs/{}", id)).await?;
    assert_eq!(status, 200);

    // Another account cannot use it, and the attempt does not burn it.
    let other = app.sign_in(EDITOR_EMAIL).await?;
    let (status, _) = app
        .post_json(&other, &format!("/api/actions/{}/confirm", token), &json!({}))
        .await?;
    assert_eq!(status, 404);

    let (status, _) = app
        .post_json(&admin, &format!("/api/actions/{}/cancel", token), &json!({}))
        .await?;
    assert_eq!(status, 200);
    let (status, _) = app
        .post_json(&admin, &format!("/api/actions/{}/confirm", token), &json!({}))
        .await?;
    assert_eq!(status, 404);
    let (status, _) = app.get(&admin, &format!("/api/resources/jobs/{}", id)).await?;
    assert_eq!(status, 200);

    let (status, _) = app
        .confirm_action(&admin, "jobs", json!({ "type": "delete", "id": id }))
        .await?;
    assert_eq!(status, 200);
    let (status, _) = app.get(&admin, &format!("/api/resources/jobs/{}", id)).await?;
    assert_eq!(status, 404);

    let (status, body) = app
        .post_json(&admin, "/api/resources/jobs/actions", &json!({ "type": "bulk_delete", "ids": [] }))
        .await?;
    assert_eq!(status, 400);
    assert_eq!(body["notice"]["message"], "No rows selected");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn password_reset_through_the_emailed_link() -> TestResult {
    let app = TestApp::spawn().await?;

    let resp = app
        .client
        .post(app.url("/auth/forgot-password"))
        .json(&json!({ "email": VIEWER_EMAIL }))
        .send()
        .await?;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await?;
    assert_eq!(body["data"]["redirect_to"], format!("{}/reset-password", APP_URL));

    let sent = app.memory.auth.sent_recoveries().await;
    assert_eq!(sent.len(), 1);
    let access_token = sent[0].access_token.clone();

    let mismatch = app
        .client
        .post(app.url("/auth/reset-password"))
        .json(&json!({
            "access_token": access_token,
            "type": "recovery",
            "password": "new-password-1",
            "confirm_password": "new-password-2"
        }))
        .send()
        .await?;
    assert_eq!(mismatch.status(), 400);

    let wrong_type = app
        .client
        .post(app.url("/auth/reset-password"))
        .json(&json!({
            "access_token": access_token,
            "type": "signup",
            "password": "new-password-1",
            "confirm_password": "new-password-1"
        }))
        .send()
        .await?;
    assert_eq!(wrong_type.status(), 401);

    let ok = app
        .client
        .post(app.url("/auth/reset-password"))
        .json(&json!({
            "access_token": access_token,
            "type": "recovery",
            "password": "new-password-1",
            "confirm_password": "new-password-1"
        }))
        .send()
        .await?;
    assert_eq!(ok.status(), 200);
    let body: Value = ok.json().await?;
    assert_eq!(body["notice"]["message"], "Password updated successfully");

    let signed_in = app
        .client
        .post(app.url("/auth/sign-in"))
        .json(&json!({ "email": VIEWER_EMAIL, "password": "new-password-1" }))
        .send()
        .await?;
    assert_eq!(signed_in.status(), 200);
    Ok(())
}
