// Integration tests for `ApiClient` using wiremock.
#![allow(clippy::unwrap_used)]

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use roomsync_api::models::CreateBookingRequest;
use roomsync_api::{ApiClient, Error, OAuthProvider};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ApiClient) {
    let server = MockServer::start().await;
    let base = Url::parse(&format!("{}/api/v1/", server.uri())).unwrap();
    let client = ApiClient::with_client(reqwest::Client::new(), base);
    (server, client)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ── Rooms ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_rooms() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/room/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "pk": 42, "name": "Seaside loft", "country": "Korea", "city": "Busan",
                "price": 120, "rating": 4.8, "is_owner": false,
                "photos": [{ "pk": 1, "file": "https://img.example/1", "description": "view" }]
            },
            { "pk": 7, "name": "Cabin", "price": 60, "rating": "No Reviews" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let rooms = client.list_rooms().await.unwrap();

    assert_eq!(rooms.len(), 2);
    assert_eq!(rooms[0].pk, 42);
    assert_eq!(rooms[0].city, "Busan");
    assert_eq!(rooms[0].cover_photo().unwrap().file, "https://img.example/1");
    assert_eq!(rooms[1].rating, None);
}

#[tokio::test]
async fn test_get_room_detail_and_reviews() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/room/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pk": 42, "name": "Seaside loft", "price": 120, "rooms": 2, "toilets": 1,
            "owner": { "username": "host", "name": "Hana" },
            "amenities": [{ "name": "Wi-Fi", "description": "fast" }],
            "category": { "pk": 1, "name": "Apartment", "kind": "rooms" },
            "is_owner": true, "is_liked": false, "photos": []
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/room/42/reviews"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "user": { "username": "guest" }, "payload": "Lovely", "rating": 5 }
        ])))
        .mount(&server)
        .await;

    let room = client.get_room(42).await.unwrap();
    assert_eq!(room.owner.unwrap().display_name(), "Hana");
    assert_eq!(room.amenities[0].name, "Wi-Fi");
    assert!(room.is_owner);

    let reviews = client.room_reviews(42).await.unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].payload, "Lovely");
}

#[tokio::test]
async fn test_missing_room_is_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/room/999"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
        .mount(&server)
        .await;

    let err = client.get_room(999).await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 404, .. }), "got {err:?}");
}

#[tokio::test]
async fn test_malformed_payload_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/category"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client.list_categories().await.unwrap_err();
    match err {
        Error::Deserialization { body, .. } => assert_eq!(body, "<html>oops</html>"),
        other => panic!("expected Deserialization, got {other:?}"),
    }
}

// ── Auth ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_me_anonymous_is_authentication_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/auth/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Authentication credentials were not provided."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.me().await.unwrap_err();
    assert!(
        matches!(err, Error::Authentication { status: 401, .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_me_empty_body_is_no_user() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/auth/me"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    assert_eq!(client.me().await.unwrap(), None);
}

#[tokio::test]
async fn test_me_returns_user() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "username": "hana", "email": "hana@example.com", "is_host": true
        })))
        .mount(&server)
        .await;

    let user = client.me().await.unwrap().unwrap();
    assert_eq!(user.username, "hana");
    assert!(user.is_host);
}

#[tokio::test]
async fn test_login_sends_credentials_and_csrf() {
    let (server, client) = setup().await;
    client.set_csrf_token("tok-123");

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .and(header("X-CSRFToken", "tok-123"))
        .and(body_json(json!({ "email": "hana@example.com", "password": "hunter2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "welcome", "user": { "username": "hana" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client
        .login("hana@example.com", &SecretString::from("hunter2".to_owned()))
        .await
        .unwrap();
    assert_eq!(resp.user.unwrap().username, "hana");
}

#[tokio::test]
async fn test_oauth_login_posts_code_to_provider_path() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/kakao"))
        .and(body_json(json!({ "code": "abc" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client.oauth_login(OAuthProvider::Kakao, "abc").await.unwrap();
    assert!(resp.user.is_none());
}

#[tokio::test]
async fn test_logout_without_csrf_is_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/logout"))
        .respond_with(ResponseTemplate::new(403).set_body_string("CSRF Failed"))
        .mount(&server)
        .await;

    let err = client.logout().await.unwrap_err();
    match err {
        Error::Authentication { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "CSRF Failed");
        }
        other => panic!("expected Authentication, got {other:?}"),
    }
}

// ── Media ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_photo_upload_pipeline() {
    let (server, client) = setup().await;
    client.set_csrf_token("tok");

    Mock::given(method("POST"))
        .and(path("/api/v1/media/photos/get-url"))
        .and(header("X-CSRFToken", "tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "img-1",
            "uploadURL": format!("{}/direct/img-1", server.uri()),
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/direct/img-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "id": "img-1" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/room/42/photo"))
        .and(body_json(json!({
            "description": "front",
            "file": "https://cdn.example/img-1/public",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pk": 9, "file": "https://cdn.example/img-1/public", "description": "front"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let target = client.get_upload_url().await.unwrap();
    let uploaded = client
        .upload_image(&target.upload_url, "front.jpg", vec![0xFF, 0xD8, 0xFF])
        .await
        .unwrap();
    assert_eq!(uploaded.result.id, "img-1");

    let photo = client
        .create_photo(42, "front", "https://cdn.example/img-1/public")
        .await
        .unwrap();
    assert_eq!(photo.pk, Some(9));
}

// ── Bookings ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_check_booking_formats_dates() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/room/42/booking/check"))
        .and(query_param("check_in", "2025-06-01"))
        .and(query_param("check_out", "2025-06-03"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": false })))
        .expect(1)
        .mount(&server)
        .await;

    let availability = client
        .check_booking(42, date(2025, 6, 1), date(2025, 6, 3))
        .await
        .unwrap();
    assert!(!availability.ok);
}

#[tokio::test]
async fn test_create_booking_rejected_dates() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/room/42/booking"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "non_field_errors": ["Those (or some) of those dates are already taken."]
        })))
        .mount(&server)
        .await;

    let body = CreateBookingRequest {
        check_in: date(2025, 6, 1),
        check_out: date(2025, 6, 3),
        guests: 2,
    };
    let err = client.create_booking(42, &body).await.unwrap_err();
    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 400);
            assert!(message.contains("already taken"), "message: {message}");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_keeps_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/room/amenity"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client.list_amenities().await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 503, .. }), "got {err:?}");
}
