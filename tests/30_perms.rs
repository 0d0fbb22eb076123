mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

/// Signs up a user and returns (cookie, user key).
async fn signup(app: &axum::Router, username: &str) -> Result<(String, String)> {
    let res = common::send(
        app,
        "POST",
        "/auth/signup",
        Some(&json!({"username": username, "password": "secret"})),
        None,
    )
    .await?;
    assert_eq!(res.status, StatusCode::CREATED);
    let cookie = common::session_cookie(&res).expect("signup sets the session cookie");
    Ok((cookie, common::key_of(&res.body)))
}

#[tokio::test]
async fn anonymous_queries_are_negative_not_errors() -> Result<()> {
    let app = common::app();
    let res = common::send(&app, "GET", "/hasperm/admin", None, None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["granted"], false);

    let res = common::send(&app, "GET", "/memberof/acme", None, None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["member"], false);
    Ok(())
}

#[tokio::test]
async fn membership_grants_memberof_and_its_perms() -> Result<()> {
    let app = common::app();
    let (cookie, alice) = signup(&app, "alice").await?;

    let company = common::send(&app, "POST", "/companies", Some(&json!({"name": "Acme"})), None).await?;
    let company_key = common::key_of(&company.body);

    let membership = common::send(
        &app,
        "POST",
        "/memberships",
        Some(&json!({"user": alice, "company": company_key, "perms": ["billing"]})),
        None,
    )
    .await?;
    assert_eq!(membership.status, StatusCode::CREATED);

    let res = common::send(
        &app,
        "GET",
        &format!("/memberof/{}", company_key),
        None,
        Some(&cookie),
    )
    .await?;
    assert_eq!(res.body["member"], true);

    // A company the user never joined, including one that does not exist
    let res = common::send(&app, "GET", "/memberof/other-co", None, Some(&cookie)).await?;
    assert_eq!(res.body["member"], false);

    let res = common::send(&app, "GET", "/hasperm/billing", None, Some(&cookie)).await?;
    assert_eq!(res.body["granted"], true);
    let res = common::send(&app, "GET", "/hasperm/admin", None, Some(&cookie)).await?;
    assert_eq!(res.body["granted"], false);

    // Another user sees none of it
    let (bob_cookie, _) = signup(&app, "bob").await?;
    let res = common::send(
        &app,
        "GET",
        &format!("/memberof/{}", company_key),
        None,
        Some(&bob_cookie),
    )
    .await?;
    assert_eq!(res.body["member"], false);
    let res = common::send(&app, "GET", "/hasperm/billing", None, Some(&bob_cookie)).await?;
    assert_eq!(res.body["granted"], false);
    Ok(())
}

#[tokio::test]
async fn user_level_perms_grant_directly() -> Result<()> {
    let app = common::app();
    let res = common::send(
        &app,
        "POST",
        "/auth/signup",
        Some(&json!({"username": "root", "password": "secret", "perms": ["admin"]})),
        None,
    )
    .await?;
    assert_eq!(res.status, StatusCode::CREATED);
    let cookie = common::session_cookie(&res).unwrap();

    let res = common::send(&app, "GET", "/hasperm/admin", None, Some(&cookie)).await?;
    assert_eq!(res.body["granted"], true);
    let res = common::send(&app, "GET", "/hasperm/superadmin", None, Some(&cookie)).await?;
    assert_eq!(res.body["granted"], false);
    Ok(())
}
