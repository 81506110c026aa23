//! End-to-end flows against PostgreSQL. Run with
//! `TEST_DATABASE_URL=postgres://... cargo test -- --ignored`.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{unique_phone, TestApp};
use debt_service::{
    services::{NewStore, Role},
    utils::{hash_password, Password},
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

async fn create_store(app: &TestApp, password: &str) -> (Uuid, String) {
    let login = format!("store-{}", Uuid::new_v4().simple());
    let hashed = hash_password(&Password::new(password)).unwrap();
    let store = app
        .state
        .db
        .create_store(&NewStore {
            login: login.clone(),
            hashed_password: hashed.into_string(),
            full_name: "Corner Shop".to_string(),
            phone_number: unique_phone(),
            email: None,
            image: None,
            wallet: Decimal::ZERO,
        })
        .await
        .unwrap();
    (store.id, login)
}

async fn create_debtor(app: &TestApp, token: &str, phone: &str) -> (StatusCode, Value) {
    app.post(
        "/debtor",
        Some(token),
        json!({
            "full_name": "Aziz Karimov",
            "phone_number": phone,
            "address": "Tashkent, Chilonzor 5",
        }),
    )
    .await
}

fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

#[tokio::test]
#[ignore]
async fn debtor_phone_numbers_are_unique() {
    let app = TestApp::with_database().await;
    let (store_id, _) = create_store(&app, "store-pass").await;
    let token = app.token(store_id, Role::Store);

    let first_phone = unique_phone();
    let (status, first) = create_debtor(&app, &token, &first_phone).await;
    assert_eq!(status, StatusCode::CREATED);
    let first_id = first["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = create_debtor(&app, &token, &first_phone).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Phone number already registered");

    let second_phone = unique_phone();
    let (status, second) = create_debtor(&app, &token, &second_phone).await;
    assert_eq!(status, StatusCode::CREATED);
    let second_id = second["data"]["id"].as_str().unwrap().to_string();

    // Own number is fine, another debtor's number is not.
    let (status, _) = app
        .patch(
            &format!("/debtor/{}", first_id),
            Some(&token),
            json!({ "phone_number": first_phone }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .patch(
            &format!("/debtor/{}", second_id),
            Some(&token),
            json!({ "phone_number": first_phone }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Phone number already registered");

    let (status, found) = app
        .get(&format!("/debtor/by-phone/{}", second_phone), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["data"]["id"], second_id.as_str());
}

#[tokio::test]
#[ignore]
async fn other_stores_rows_look_missing() {
    let app = TestApp::with_database().await;
    let (owner, _) = create_store(&app, "store-pass").await;
    let (intruder, _) = create_store(&app, "store-pass").await;

    let (_, debtor) = create_debtor(&app, &app.token(owner, Role::Store), &unique_phone()).await;
    let debtor_id = debtor["data"]["id"].as_str().unwrap();

    let (status, _) = app
        .get(
            &format!("/debtor/{}", debtor_id),
            Some(&app.token(intruder, Role::Store)),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .get(
            &format!("/debtor/{}", debtor_id),
            Some(&app.token(Uuid::new_v4(), Role::Admin)),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[ignore]
async fn statistics_follow_debts_and_payments() {
    let app = TestApp::with_database().await;
    let (store_id, _) = create_store(&app, "store-pass").await;
    let token = app.token(store_id, Role::Store);

    // Empty store
    let (status, menu) = app
        .get(&format!("/store/{}/main-menu", store_id), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(menu["data"]["debtors_count"], 0);
    assert_eq!(decimal(&menu["data"]["total_debts"]), Decimal::ZERO);

    let (status, due) = app
        .get(
            &format!("/store/{}/due-payments?date=2024-03-15", store_id),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&due["data"]["totalAmount"]), Decimal::ZERO);
    assert_eq!(due["data"]["duePayments"], json!([]));

    // One debt: January 2024, six months of 100
    let (_, debtor) = create_debtor(&app, &token, &unique_phone()).await;
    let debtor_id = debtor["data"]["id"].as_str().unwrap().to_string();
    let (status, debt) = app
        .post(
            "/debt",
            Some(&token),
            json!({
                "debtor_id": debtor_id,
                "debt_sum": "600",
                "debt_period": 6,
                "debt_date": "2024-01-10T00:00:00Z",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let debt_id = debt["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(decimal(&debt["data"]["month_sum"]), Decimal::from(100));

    let (_, due) = app
        .get(
            &format!("/store/{}/due-payments?date=2024-03-15", store_id),
            Some(&token),
        )
        .await;
    assert_eq!(decimal(&due["data"]["totalAmount"]), Decimal::from(100));
    assert_eq!(due["data"]["duePayments"][0]["debtorName"], "Aziz Karimov");

    let (_, due) = app
        .get(
            &format!("/store/{}/due-payments?date=2024-08-15", store_id),
            Some(&token),
        )
        .await;
    assert_eq!(due["data"]["duePayments"], json!([]));

    let (_, menu) = app
        .get(&format!("/store/{}/main-menu", store_id), Some(&token))
        .await;
    assert_eq!(menu["data"]["debtors_count"], 1);
    assert_eq!(decimal(&menu["data"]["total_debts"]), Decimal::from(600));

    let (_, late) = app
        .get(&format!("/store/{}/late-payments", store_id), Some(&token))
        .await;
    assert!(late["data"]["lateDebts"].as_i64().unwrap() > 0);

    // Paying in full clears the late count and the remaining balance
    let (status, _) = app
        .post(
            "/payment",
            Some(&token),
            json!({ "debt_id": debt_id, "sum": "600", "type": "any_sum" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, late) = app
        .get(&format!("/store/{}/late-payments", store_id), Some(&token))
        .await;
    assert_eq!(late["data"]["lateDebts"], 0);

    let (_, summary) = app
        .get(&format!("/debtor/{}/total-debt", debtor_id), Some(&token))
        .await;
    assert_eq!(decimal(&summary["data"]["total_paid"]), Decimal::from(600));
    assert_eq!(decimal(&summary["data"]["remaining"]), Decimal::ZERO);

    let (status, deleted) = app
        .delete(&format!("/payment/debt/{}", debt_id), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["data"]["deleted_count"], 1);
}

#[tokio::test]
#[ignore]
async fn store_signin_refresh_and_logout() {
    let app = TestApp::with_database().await;
    let (_, login) = create_store(&app, "store-pass").await;

    let (status, _) = app
        .post("/store/signin", None, json!({ "login": login, "password": "wrong-pass" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let response = tower::ServiceExt::oneshot(
        app.router.clone(),
        common::request(
            "POST",
            "/store/signin",
            None,
            Some(json!({ "login": login, "password": "store-pass" })),
        ),
    )
    .await
    .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(set_cookie.starts_with("refresh_token_store="));
    assert!(set_cookie.contains("HttpOnly"));
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    let refresh = |cookie: String| {
        Request::builder()
            .method("POST")
            .uri("/store/refresh-token")
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    };

    let (status, body) = app.send(refresh(cookie.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["token_type"], "Bearer");

    // Rotated: the old refresh token is spent
    let (status, _) = app.send(refresh(cookie)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn main_and_extra_numbers_share_one_namespace() {
    let app = TestApp::with_database().await;
    let (store_id, _) = create_store(&app, "store-pass").await;
    let token = app.token(store_id, Role::Store);

    let a_phone = unique_phone();
    let (_, a) = create_debtor(&app, &token, &a_phone).await;
    let a_id = a["data"]["id"].as_str().unwrap().to_string();

    let (_, b) = create_debtor(&app, &token, &unique_phone()).await;
    let b_id = b["data"]["id"].as_str().unwrap().to_string();

    // Another debtor's main number cannot become an extra number.
    let (status, body) = app
        .post(
            "/debtor/phones",
            Some(&token),
            json!({ "debtor_id": b_id, "phone_number": a_phone }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Phone number already registered");

    let b_extra = unique_phone();
    let (status, _) = app
        .post(
            "/debtor/phones",
            Some(&token),
            json!({ "debtor_id": b_id, "phone_number": b_extra }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // An extra number cannot become a main number, on create or update.
    let (status, body) = create_debtor(&app, &token, &b_extra).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Phone number already registered");

    let (status, _) = app
        .patch(
            &format!("/debtor/{}", a_id),
            Some(&token),
            json!({ "phone_number": b_extra }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Promoting one's own extra number is allowed.
    let (status, _) = app
        .patch(
            &format!("/debtor/{}", b_id),
            Some(&token),
            json!({ "phone_number": b_extra }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

fn image_upload(uri: &str, token: &str) -> Request<Body> {
    let boundary = "debt-service-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"face.png\"\r\n\
         Content-Type: image/png\r\n\r\nnot-really-a-png\r\n--{b}--\r\n",
        b = boundary
    );
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
#[ignore]
async fn shared_image_files_survive_until_the_last_reference() {
    let app = TestApp::with_database().await;
    let (store_id, _) = create_store(&app, "store-pass").await;
    let (other_store, _) = create_store(&app, "store-pass").await;
    let token = app.token(store_id, Role::Store);
    let other_token = app.token(other_store, Role::Store);

    let (_, a) = create_debtor(&app, &token, &unique_phone()).await;
    let a_id = a["data"]["id"].as_str().unwrap().to_string();
    let (_, b) = create_debtor(&app, &token, &unique_phone()).await;
    let b_id = b["data"]["id"].as_str().unwrap().to_string();

    let (status, uploaded) = app
        .send(image_upload(&format!("/debtor/{}/image", a_id), &token))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let key = uploaded["data"]["image"].as_str().unwrap().to_string();
    let file = std::path::Path::new(&app.state.config.uploads.dir).join(&key);
    assert!(file.exists());

    // Another store may not attach the key at all.
    let (_, foreign) = create_debtor(&app, &other_token, &unique_phone()).await;
    let (status, _) = app
        .post(
            "/debtor/images",
            Some(&other_token),
            json!({ "debtor_id": foreign["data"]["id"], "image": key }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, attached) = app
        .post(
            "/debtor/images",
            Some(&token),
            json!({ "debtor_id": b_id, "image": key }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let b_image_id = attached["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .delete(&format!("/debtor/images/{}", b_image_id), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(file.exists(), "debtor A still references the file");

    let (_, a_now) = app.get(&format!("/debtor/{}", a_id), Some(&token)).await;
    assert_eq!(a_now["data"]["image"], key.as_str());

    let (status, _) = app.delete(&format!("/debtor/{}", a_id), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!file.exists());
}
