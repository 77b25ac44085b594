mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::{Value, json};
use std::sync::Arc;

fn property(id: i64, title: &str, price: f64, location: &str, kind: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "price": price,
        "latitude": -15.39,
        "longitude": 28.32,
        "location": location,
        "type": kind,
        "landlord_id": "landlord-1",
    })
}

/// Eight properties seeded oldest to newest; only 2 and 5 have images.
fn catalogue() -> Arc<FakeBackend> {
    let backend = FakeBackend::new();
    backend.add_user("landlord-1", "owner@example.com", "pw", Some("landlord"));
    backend.seed(
        "properties",
        vec![
            property(1, "Bedsitter", 800.0, "Lusaka", "apartment"),
            property(2, "Shared flat", 650.0, "Lusaka", "shared"),
            property(3, "Hostel bed", 400.0, "Kabwe", "hostel"),
            property(4, "Garden flat", 1800.0, "Lusaka", "apartment"),
            property(5, "Town house", 2500.0, "Ndola", "apartment"),
            property(6, "Room", 950.0, "Lusaka", "shared"),
            property(7, "Bunk", 300.0, "Kabwe", "hostel"),
            property(8, "Loft", 1200.0, "Lusaka", "apartment"),
        ],
    );
    backend.seed(
        "property_images",
        vec![
            json!({ "property_id": 2, "storage_path": "landlord-1/2/1-0-a.png", "is_primary": true }),
            json!({ "property_id": 2, "storage_path": "landlord-1/2/1-1-b.png", "is_primary": false }),
            json!({ "property_id": 5, "storage_path": "landlord-1/5/1-0-c.png", "is_primary": true,
                    "public_url": "https://storage.test/properties/landlord-1/5/1-0-c.png" }),
        ],
    );
    backend.seed(
        "amenities",
        vec![
            json!({ "id": 1, "name": "WiFi" }),
            json!({ "id": 2, "name": "Water" }),
            json!({ "id": 3, "name": "Parking" }),
        ],
    );
    backend.seed(
        "property_amenities",
        vec![
            json!({ "property_id": 5, "amenity_id": 3 }),
            json!({ "property_id": 5, "amenity_id": 1 }),
        ],
    );
    backend
}

fn ids(page: &Value) -> Vec<i64> {
    page["properties"]
        .as_array()
        .map(|cards| cards.iter().filter_map(|c| c["id"].as_i64()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn unfiltered_listings_are_newest_first_with_images() {
    let app = app(catalogue());
    let resp = get(&app, "/properties", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = json_body(resp).await;

    assert_eq!(ids(&page), vec![8, 7, 6, 5, 4, 3, 2, 1]);
    assert_eq!(page["empty_message"], Value::Null);

    let cards = page["properties"].as_array().unwrap();
    let card = |id: i64| cards.iter().find(|c| c["id"] == id).unwrap();
    assert_eq!(
        card(2)["image_url"],
        "https://storage.test/properties/landlord-1/2/1-0-a.png"
    );
    assert_eq!(card(1)["image_url"], "/placeholder.svg");
    assert_eq!(card(4)["price_label"], "ZMW 1800/month");
    assert_eq!(card(4)["href"], "/properties/4");
}

#[tokio::test]
async fn price_range_is_inclusive() {
    let app = app(catalogue());
    let resp = get(&app, "/properties?price_min=650&price_max=1200", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = json_body(resp).await;
    assert_eq!(ids(&page), vec![8, 6, 2, 1]);

    for card in page["properties"].as_array().unwrap() {
        let price = card["price"].as_f64().unwrap();
        assert!((650.0..=1200.0).contains(&price), "{price}");
    }
}

#[tokio::test]
async fn camel_case_price_params_are_accepted() {
    let app = app(catalogue());
    let page = json_body(get(&app, "/properties?priceMin=2000", None).await).await;
    assert_eq!(ids(&page), vec![5]);
}

#[tokio::test]
async fn location_and_type_filters_combine() {
    let app = app(catalogue());
    let page = json_body(get(&app, "/properties?location=Lusaka&type=shared", None).await).await;
    assert_eq!(ids(&page), vec![6, 2]);
}

#[tokio::test]
async fn type_all_and_blank_fields_mean_no_filter() {
    let app = app(catalogue());
    let page = json_body(
        get(
            &app,
            "/properties?type=all&location=&price_min=&price_max=",
            None,
        )
        .await,
    )
    .await;
    assert_eq!(ids(&page).len(), 8);
}

#[tokio::test]
async fn no_matches_carries_the_empty_message() {
    let app = app(catalogue());
    let page = json_body(get(&app, "/properties?location=Livingstone", None).await).await;
    assert!(ids(&page).is_empty());
    assert_eq!(page["empty_message"], "No properties found.");
}

#[tokio::test]
async fn bad_price_filter_is_a_validation_error() {
    let app = app(catalogue());
    let resp = get(&app, "/properties?price_min=cheap", None).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(resp).await;
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn home_shows_the_six_newest() {
    let app = app(catalogue());
    let resp = get(&app, "/", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = json_body(resp).await;
    assert_eq!(ids(&page), vec![8, 7, 6, 5, 4, 3]);
}

#[tokio::test]
async fn detail_lists_amenities_and_landlord() {
    let app = app(catalogue());
    let resp = get(&app, "/properties/5", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let detail = json_body(resp).await;

    assert_eq!(detail["title"], "Town house");
    assert_eq!(detail["amenities"], json!(["Parking", "WiFi"]));
    assert_eq!(
        detail["image_url"],
        "https://storage.test/properties/landlord-1/5/1-0-c.png"
    );
    assert_eq!(detail["description"], "No description available");
    assert_eq!(detail["address"], "Location set on map");
    assert_eq!(detail["price_label"], "ZMW 2500/month");
    assert_eq!(detail["landlord"]["name"], "landlord landlord-1");
    assert_eq!(detail["landlord"]["contact_href"], "mailto:owner@example.com");
    assert_eq!(detail["back_href"], "/properties");
}

#[tokio::test]
async fn detail_without_images_uses_the_placeholder() {
    let app = app(catalogue());
    let detail = json_body(get(&app, "/properties/1", None).await).await;
    assert_eq!(detail["image_url"], "https://via.placeholder.com/800x400");
    assert_eq!(detail["amenities"], json!([]));
}

#[tokio::test]
async fn unknown_property_is_not_found() {
    let app = app(catalogue());
    let resp = get(&app, "/properties/999", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn id_the_table_rejects_is_not_found() {
    let app = app(catalogue());
    let resp = get(&app, "/properties/not-a-number", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = json_body(resp).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn amenity_catalogue_is_public() {
    let app = app(catalogue());
    let resp = get(&app, "/amenities", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let list = json_body(resp).await;
    assert_eq!(list.as_array().map(Vec::len), Some(3));
}
