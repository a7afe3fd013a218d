//! HTTP round trips through the boundary endpoints over the in-memory store.

use std::sync::Arc;

use actix_web::http::{StatusCode, header};
use actix_web::{App, test as actix_test, web};
use rstest::rstest;
use serde_json::{Value, json};
use uuid::Uuid;

use city_boundaries::domain::scoring::ScoringPolicy;
use city_boundaries::inbound::http::boundaries::configure;
use city_boundaries::inbound::http::state::HttpState;
use city_boundaries::outbound::memory::InMemoryBoundaryRepository;

mod support;

use support::{fixture_service, lyon_candidates};

fn http_state() -> HttpState {
    let service = fixture_service(
        lyon_candidates(),
        Arc::new(InMemoryBoundaryRepository::new()),
        ScoringPolicy::default(),
    );
    HttpState::new(Arc::new(service))
}

macro_rules! boundary_app {
    () => {
        actix_test::init_service(
            App::new()
                .app_data(web::Data::new(http_state()))
                .service(web::scope("/api/v1").configure(configure)),
        )
        .await
    };
}

fn base(city: Uuid) -> String {
    format!("/api/v1/cities/{city}/boundaries")
}

#[rstest]
#[actix_rt::test]
async fn search_select_inspect_and_delete() {
    let app = boundary_app!();
    let city = Uuid::new_v4();

    let search = actix_test::TestRequest::post()
        .uri(&format!("{}/search", base(city)))
        .set_json(json!({
            "cityName": "Lyon",
            "country": "France",
            "countryCode": "fr",
            "storeCandidates": true
        }))
        .to_request();
    let body: Value = actix_test::call_and_read_body_json(&app, search).await;
    assert_eq!(body["state"], "candidatesLoaded");
    assert_eq!(body["storedCount"], 2);
    assert_eq!(body["discarded"], 1);
    assert_eq!(body["candidates"][0]["osmId"], "120965");
    assert_eq!(body["candidates"][0]["bounds"][0], json!([45.70, 4.77]));
    assert_eq!(body["suggested"]["osmId"], "120965");
    assert!(body["selected"].is_null());
    assert!(body["providerError"].is_null());

    let list = actix_test::TestRequest::get().uri(&base(city)).to_request();
    let listed: Value = actix_test::call_and_read_body_json(&app, list).await;
    let way_id = listed["boundaries"]
        .as_array()
        .expect("boundary list")
        .iter()
        .find(|row| row["osmType"] == "way")
        .and_then(|row| row["id"].as_str())
        .expect("stored way")
        .to_owned();

    let select = actix_test::TestRequest::put()
        .uri(&format!("{}/selected", base(city)))
        .insert_header(("x-authenticated-user", "editor@example.org"))
        .set_json(json!({ "boundaryId": way_id }))
        .to_request();
    let selected: Value = actix_test::call_and_read_body_json(&app, select).await;
    assert_eq!(selected["id"], way_id.as_str());
    assert_eq!(selected["isSelected"], true);

    let list = actix_test::TestRequest::get().uri(&base(city)).to_request();
    let listed: Value = actix_test::call_and_read_body_json(&app, list).await;
    assert_eq!(listed["state"], "selected");
    let selected_rows = listed["boundaries"]
        .as_array()
        .expect("boundary list")
        .iter()
        .filter(|row| row["isSelected"] == true)
        .count();
    assert_eq!(selected_rows, 1);

    let current = actix_test::TestRequest::get()
        .uri(&format!("{}/selected", base(city)))
        .to_request();
    let current: Value = actix_test::call_and_read_body_json(&app, current).await;
    assert_eq!(current["selected"]["id"], way_id.as_str());

    let bounds = actix_test::TestRequest::get()
        .uri(&format!("{}/{way_id}/bounds", base(city)))
        .to_request();
    let bounds: Value = actix_test::call_and_read_body_json(&app, bounds).await;
    assert_eq!(bounds["polygon"]["type"], "Polygon");

    let injected = actix_test::TestRequest::get()
        .uri(&format!(
            "{}/{way_id}/geojson?filename=a%0D%0ASet-Cookie:%20x.geojson",
            base(city)
        ))
        .to_request();
    let response = actix_test::call_service(&app, injected).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(header::CONTENT_DISPOSITION).is_none());
    assert!(response.headers().get(header::SET_COOKIE).is_none());

    let download = actix_test::TestRequest::get()
        .uri(&format!("{}/{way_id}/geojson", base(city)))
        .to_request();
    let response = actix_test::call_service(&app, download).await;
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .expect("attachment header")
        .to_owned();
    assert!(disposition.contains(&format!("boundary-{way_id}.geojson")));
    let geometry: Value =
        serde_json::from_slice(&actix_test::read_body(response).await).expect("geojson body");
    assert_eq!(geometry["type"], "Polygon");

    let delete = actix_test::TestRequest::delete()
        .uri(&format!("{}/{way_id}", base(city)))
        .to_request();
    let response = actix_test::call_service(&app, delete).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let list = actix_test::TestRequest::get().uri(&base(city)).to_request();
    let listed: Value = actix_test::call_and_read_body_json(&app, list).await;
    assert_eq!(listed["state"], "candidatesLoaded");
    assert_eq!(listed["boundaries"].as_array().map(Vec::len), Some(1));
}

#[rstest]
#[actix_rt::test]
async fn candidate_selection_persists_and_auto_select_keeps_it() {
    let app = boundary_app!();
    let city = Uuid::new_v4();

    let search = actix_test::TestRequest::post()
        .uri(&format!("{}/search", base(city)))
        .set_json(json!({ "cityName": "Lyon", "country": "France" }))
        .to_request();
    let body: Value = actix_test::call_and_read_body_json(&app, search).await;
    assert_eq!(body["state"], "candidatesLoaded");
    let mut way = body["candidates"]
        .as_array()
        .expect("candidates")
        .iter()
        .find(|candidate| candidate["osmType"] == "way")
        .cloned()
        .expect("way candidate");
    if let Some(fields) = way.as_object_mut() {
        fields.remove("score");
        fields.remove("bounds");
    }

    let select = actix_test::TestRequest::put()
        .uri(&format!("{}/selected", base(city)))
        .set_json(json!({
            "candidate": way,
            "query": { "cityName": "Lyon", "country": "France" }
        }))
        .to_request();
    let selected: Value = actix_test::call_and_read_body_json(&app, select).await;
    assert_eq!(selected["osmId"], "25870231");

    let search = actix_test::TestRequest::post()
        .uri(&format!("{}/search", base(city)))
        .set_json(json!({ "cityName": "Lyon", "country": "France", "autoSelect": true }))
        .to_request();
    let body: Value = actix_test::call_and_read_body_json(&app, search).await;
    assert_eq!(body["state"], "selected");
    assert_eq!(body["selected"]["osmId"], "25870231");
}

#[rstest]
#[case::unknown_boundary(
    actix_test::TestRequest::put().set_json(json!({ "boundaryId": Uuid::nil().to_string() })),
    "/selected",
    StatusCode::NOT_FOUND
)]
#[case::bad_country_code(
    actix_test::TestRequest::post().set_json(json!({
        "cityName": "Lyon",
        "country": "France",
        "countryCode": "FRA"
    })),
    "/search",
    StatusCode::BAD_REQUEST
)]
#[case::blank_city_name(
    actix_test::TestRequest::post().set_json(json!({ "cityName": " ", "country": "France" })),
    "/search",
    StatusCode::BAD_REQUEST
)]
#[case::missing_boundary(
    actix_test::TestRequest::get(),
    "/00000000-0000-0000-0000-000000000000/bounds",
    StatusCode::NOT_FOUND
)]
#[actix_rt::test]
async fn rejected_requests_use_error_envelope(
    #[case] request: actix_test::TestRequest,
    #[case] suffix: &str,
    #[case] expected: StatusCode,
) {
    let app = boundary_app!();
    let city = Uuid::new_v4();

    let request = request
        .uri(&format!("{}{suffix}", base(city)))
        .to_request();
    let response = actix_test::call_service(&app, request).await;

    assert_eq!(response.status(), expected);
    let body: Value = actix_test::read_body_json(response).await;
    assert!(body["code"].is_string());
    assert!(body["message"].is_string());
}
