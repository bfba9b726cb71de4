//! End-to-end API tests: the real router and middleware over mocked
//! repositories and a temp-dir image store.

use axum::http::{StatusCode, header};
use axum_test::TestServer;
use axum_test::multipart::{MultipartForm, Part};
use serde_json::Value;
use tempfile::tempdir;

use tradepost_model::{CategoryId, Condition, ListingId};

use crate::routes::create_router;
use crate::tests::support::{
    TEST_TOKEN, TestDb, child_category, listing, number_attribute, read_only_context,
    seller_context, test_state, user,
};

fn session_cookie() -> (header::HeaderName, String) {
    (header::COOKIE, format!("tradepost_session={TEST_TOKEN}"))
}

fn server(db: TestDb, images_dir: &tempfile::TempDir) -> TestServer {
    TestServer::new(create_router(test_state(db, images_dir))).unwrap()
}

#[tokio::test]
async fn test_mutations_require_a_session() {
    let images_dir = tempdir().unwrap();
    let server = server(TestDb::new(), &images_dir);

    let response = server.post("/api/v1/listings").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server.delete("/api/v1/listings/1").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_category_listings_attribute_filter() {
    let mut db = TestDb::new();
    db.categories
        .expect_get_category()
        .returning(|_| Ok(Some(child_category(5, "Laptops"))));
    db.categories
        .expect_attributes_for_category()
        .returning(|_| Ok(vec![number_attribute(3, "RAM", "GB")]));
    db.listings.expect_listings_for_category().returning(|_| {
        Ok(vec![
            listing(1, 1, 100, Condition::New),
            listing(2, 1, 200, Condition::New),
        ])
    });
    db.listings
        .expect_attribute_values_for_listings()
        .returning(|_| {
            Ok([
                (ListingId(1), [(tradepost_model::AttributeId(3), "8".to_string())].into()),
                (ListingId(2), [(tradepost_model::AttributeId(3), "16".to_string())].into()),
            ]
            .into())
        });

    let images_dir = tempdir().unwrap();
    let server = server(db, &images_dir);

    let response = server.get("/api/v1/categories/5/listings?attr_3=16").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["category"], "Laptops");
    assert_eq!(body["count"], 1);
    assert_eq!(body["listings"].as_array().unwrap().len(), 1);
    assert_eq!(body["listings"][0]["id"], 2);
    assert_eq!(body["attributes"][0]["attribute"]["name"], "RAM");
}

#[tokio::test]
async fn test_category_listings_page_overflow() {
    let mut db = TestDb::new();
    db.categories
        .expect_get_category()
        .returning(|_| Ok(Some(child_category(5, "Laptops"))));
    db.categories
        .expect_attributes_for_category()
        .returning(|_| Ok(vec![]));
    db.listings.expect_listings_for_category().returning(|_| {
        Ok(vec![
            listing(1, 1, 100, Condition::New),
            listing(2, 1, 200, Condition::New),
            listing(3, 1, 300, Condition::Used),
        ])
    });
    db.listings
        .expect_attribute_values_for_listings()
        .returning(|_| Ok(Default::default()));

    let images_dir = tempdir().unwrap();
    let server = server(db, &images_dir);

    let response = server.get("/api/v1/categories/5/listings?page=2").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["count"], 3);
    assert_eq!(body["listings"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_category_listings_sorted_by_price() {
    let mut db = TestDb::new();
    db.categories
        .expect_get_category()
        .returning(|_| Ok(Some(child_category(5, "Laptops"))));
    db.categories
        .expect_attributes_for_category()
        .returning(|_| Ok(vec![]));
    db.listings.expect_listings_for_category().returning(|_| {
        Ok(vec![
            listing(1, 1, 300, Condition::New),
            listing(2, 1, 100, Condition::New),
            listing(3, 1, 200, Condition::New),
        ])
    });
    db.listings
        .expect_attribute_values_for_listings()
        .returning(|_| Ok(Default::default()));

    let images_dir = tempdir().unwrap();
    let server = server(db, &images_dir);

    let response = server.get("/api/v1/categories/5/listings?sortBy=price").await;
    response.assert_status_ok();

    let body: Value = response.json();
    let sums: Vec<i64> = body["listings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["sum"].as_i64().unwrap())
        .collect();
    assert_eq!(sums, vec![100, 200, 300]);
}

#[tokio::test]
async fn test_unknown_category_is_not_found() {
    let mut db = TestDb::new();
    db.categories.expect_get_category().returning(|_| Ok(None));

    let images_dir = tempdir().unwrap();
    let server = server(db, &images_dir);

    let response = server.get("/api/v1/categories/999/listings").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bad_query_params_rejected() {
    let mut db = TestDb::new();
    db.categories
        .expect_get_category()
        .returning(|_| Ok(Some(child_category(5, "Laptops"))));

    let images_dir = tempdir().unwrap();
    let server = server(db, &images_dir);

    let response = server.get("/api/v1/categories/5/listings?condition=mint").await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server.get("/api/v1/categories/5/listings?page=0").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

fn laptop_multipart() -> MultipartForm {
    MultipartForm::new()
        .add_text("title", "ThinkPad X1")
        .add_text("description", "Lightly used")
        .add_text("sum", "500")
        .add_text("categoryId", "5")
        .add_text("condition", "new")
        .add_text("attr_3", "16")
}

fn expect_laptop_category(db: &mut TestDb) {
    db.categories
        .expect_attributes_for_category()
        .returning(|_| Ok(vec![number_attribute(3, "RAM", "GB")]));
    db.categories
        .expect_get_category()
        .returning(|_| Ok(Some(child_category(5, "Laptops"))));
}

#[tokio::test]
async fn test_create_listing_round_trip() {
    let mut db = TestDb::new();
    db.authenticate(user(1), seller_context(1));
    expect_laptop_category(&mut db);
    db.listings
        .expect_create_listing()
        .withf(|draft, owner_id, _| {
            draft.category_id == CategoryId(5)
                && draft.attributes.len() == 1
                && draft.attributes[0].value == "16"
                && owner_id.as_i64() == 1
        })
        .returning(|_, _, _| Ok(ListingId(42)));

    let images_dir = tempdir().unwrap();
    let server = server(db, &images_dir);

    let (name, value) = session_cookie();
    let response = server
        .post("/api/v1/listings")
        .add_header(name, value)
        .multipart(laptop_multipart())
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["id"], 42);
}

#[tokio::test]
async fn test_create_listing_with_image_upload() {
    let mut db = TestDb::new();
    db.authenticate(user(1), seller_context(1));
    expect_laptop_category(&mut db);
    db.listings
        .expect_create_listing()
        .withf(|_, _, images| images.len() == 1)
        .returning(|_, _, _| Ok(ListingId(42)));

    let images_dir = tempdir().unwrap();
    let server = server(db, &images_dir);

    let form = laptop_multipart().add_part(
        "images",
        Part::bytes(vec![0xFF, 0xD8, 0xFF, 0xE0, 9, 9])
            .file_name("photo.jpg")
            .mime_type("image/jpeg"),
    );

    let (name, value) = session_cookie();
    let response = server
        .post("/api/v1/listings")
        .add_header(name, value)
        .multipart(form)
        .await;

    response.assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn test_create_listing_read_only_role_is_forbidden() {
    let mut db = TestDb::new();
    db.authenticate(user(1), read_only_context(1));

    let images_dir = tempdir().unwrap();
    let server = server(db, &images_dir);

    let (name, value) = session_cookie();
    let response = server
        .post("/api/v1/listings")
        .add_header(name, value)
        .multipart(laptop_multipart())
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_listing_validation_errors() {
    let mut db = TestDb::new();
    db.authenticate(user(1), seller_context(1));
    db.categories
        .expect_attributes_for_category()
        .returning(|_| Ok(vec![number_attribute(3, "RAM", "GB")]));

    let images_dir = tempdir().unwrap();
    let server = server(db, &images_dir);

    let form = MultipartForm::new()
        .add_text("description", "Lightly used")
        .add_text("sum", "-5")
        .add_text("categoryId", "5")
        .add_text("condition", "new")
        .add_text("attr_3", "plenty");

    let (name, value) = session_cookie();
    let response = server
        .post("/api/v1/listings")
        .add_header(name, value)
        .multipart(form)
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["error"]["fields"]["title"][0], "Required");
    assert_eq!(body["error"]["fields"]["sum"][0], "Must be 0 or greater");
    assert_eq!(body["error"]["fields"]["attr_3"][0], "Must be a number");
}

#[tokio::test]
async fn test_update_by_non_owner_is_forbidden() {
    let mut db = TestDb::new();
    db.authenticate(user(1), seller_context(1));
    db.listings
        .expect_get_listing()
        .returning(|_| Ok(Some(listing(9, 2, 100, Condition::New))));

    let images_dir = tempdir().unwrap();
    let server = server(db, &images_dir);

    let (name, value) = session_cookie();
    let response = server
        .put("/api/v1/listings/9")
        .add_header(name, value)
        .multipart(laptop_multipart())
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_delete_listing_as_owner() {
    let mut db = TestDb::new();
    db.authenticate(user(1), seller_context(1));
    db.listings
        .expect_get_listing()
        .returning(|_| Ok(Some(listing(9, 1, 100, Condition::New))));
    db.listings.expect_delete_listing().returning(|_| Ok(true));

    let images_dir = tempdir().unwrap();
    let server = server(db, &images_dir);

    let (name, value) = session_cookie();
    let response = server
        .delete("/api/v1/listings/9")
        .add_header(name, value)
        .await;

    response.assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_image_serve_headers_and_404() {
    let images_dir = tempdir().unwrap();
    let store = crate::images::store::ImageStore::new(images_dir.path());
    let key = store.put(vec![0x89, b'P', b'N', b'G', 0, 0]).await.unwrap();

    let server = server(TestDb::new(), &images_dir);

    let response = server.get(&format!("/api/v1/images/{key}")).await;
    response.assert_status_ok();
    assert_eq!(response.header(header::CONTENT_TYPE), "image/png");
    assert_eq!(
        response.header(header::CACHE_CONTROL),
        "public, max-age=31536000, immutable"
    );

    let response = server.get("/api/v1/images/missing-key").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_sets_session_cookie() {
    let mut db = TestDb::new();
    db.users.expect_get_user_by_email().returning(|_| Ok(None));
    db.users
        .expect_create_user()
        .withf(|email, name, hash, role| {
            email == "jane@example.com"
                && name == "Jane"
                && hash.starts_with("$argon2")
                && role == "user"
        })
        .returning(|_, _, _, _| Ok(user(1)));
    db.sessions
        .expect_create_session()
        .returning(|_, _, _| Ok(()));

    let images_dir = tempdir().unwrap();
    let server = server(db, &images_dir);

    let response = server
        .post("/api/v1/auth/register")
        .json(&serde_json::json!({
            "email": "Jane@Example.com",
            "name": "Jane",
            "password": "correct horse",
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert!(!body["token"].as_str().unwrap().is_empty());
    assert_eq!(body["user"]["email"], "user1@example.com");

    let cookie = response.header(header::SET_COOKIE);
    let cookie = cookie.to_str().unwrap();
    assert!(cookie.starts_with("tradepost_session="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let mut db = TestDb::new();
    db.users
        .expect_get_user_by_email()
        .returning(|_| Ok(Some(user(1))));

    let images_dir = tempdir().unwrap();
    let server = server(db, &images_dir);

    let response = server
        .post("/api/v1/auth/register")
        .json(&serde_json::json!({
            "email": "user1@example.com",
            "name": "Jane",
            "password": "correct horse",
        }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_logout_revokes_the_session() {
    let mut db = TestDb::new();
    db.authenticate(user(1), seller_context(1));
    db.sessions.expect_revoke_session().returning(|_| Ok(()));

    let images_dir = tempdir().unwrap();
    let server = server(db, &images_dir);

    let (name, value) = session_cookie();
    let response = server
        .post("/api/v1/auth/logout")
        .add_header(name, value)
        .await;

    response.assert_status_ok();
    let cookie = response.header(header::SET_COOKIE);
    assert!(cookie.to_str().unwrap().contains("Max-Age=0"));
}

#[tokio::test]
async fn test_me_returns_roles_and_permissions() {
    let mut db = TestDb::new();
    db.authenticate(user(1), seller_context(1));

    let images_dir = tempdir().unwrap();
    let server = server(db, &images_dir);

    let (name, value) = session_cookie();
    let response = server.get("/api/v1/users/me").add_header(name, value).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["user"]["id"], 1);
    assert_eq!(body["roles"][0]["name"], "user");
    assert!(
        body["roles"][0]["permissions"]
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p["action"] == "create" && p["entity"] == "listing" && p["access"] == "own")
    );
}
