/// Integration tests with mocked external APIs
/// Tests the backend client and third-party lookups without hitting real services
use parking_fines::errors::AppError;
use parking_fines::integrations::api_client::FinesApiClient;
use parking_fines::integrations::lookups::{
    MunicipalityImageService, VehicleRegistryService, VEHICLE_RESOURCE_ID,
};
use parking_fines::models::CheckRequest;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_fetch_municipalities() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/municipalities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "municipalities": [
                {"name": "עיריית ערד", "id": "arad", "initials": "ער", "color": "#aa3300"},
                {"name": "עיריית שדרות", "id": "sderot", "initials": "שד", "color": "#0033aa"}
            ]
        })))
        .mount(&mock_server)
        .await;

    let client = FinesApiClient::new(&mock_server.uri(), Duration::from_secs(5)).unwrap();
    let municipalities = client.fetch_municipalities().await.unwrap();

    assert_eq!(municipalities.len(), 2);
    assert_eq!(municipalities[0].id, "arad");
    assert_eq!(municipalities[1].initials, "שד");
}

#[tokio::test]
async fn test_fetch_municipalities_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/municipalities"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let client = FinesApiClient::new(&mock_server.uri(), Duration::from_secs(5)).unwrap();
    let err = client.fetch_municipalities().await.unwrap_err();

    assert_eq!(err.to_string(), "server error 500");
}

#[tokio::test]
async fn test_check_error_detail() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/check"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(serde_json::json!({"detail": "invalid id"})),
        )
        .mount(&mock_server)
        .await;

    let client = FinesApiClient::new(&mock_server.uri(), Duration::from_secs(5)).unwrap();
    let err = client
        .check(&CheckRequest::new("1", "1234567", None))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "invalid id");
}

#[tokio::test]
async fn test_unreachable_backend_is_connection_error() {
    // Port 9 (discard) is not expected to accept HTTP connections
    let client = FinesApiClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
    let err = client
        .open_check_stream(&CheckRequest::new("123456782", "1234567", None))
        .await
        .unwrap_err();

    assert!(matches!(err.root(), AppError::Connection(_)));
    assert!(err
        .to_string()
        .starts_with("Check stream request for car 1234567 failed: Connection error:"));
}

#[tokio::test]
async fn test_vehicle_lookup_success() {
    let mock_server = MockServer::start().await;

    let mock_response = serde_json::json!({
        "success": true,
        "result": {
            "records": [{
                "mispar_rechev": 1234567,
                "tozeret_nm": "טויוטה יפן",
                "kinuy_mishari": "COROLLA",
                "degem_nm": "ZRE181L",
                "ramat_gimur": "SUN",
                "shnat_yitzur": 2016,
                "tzeva_rechev": "לבן",
                "sug_delek_nm": "בנזין",
                "baalut": "פרטי",
                "degem_manoa": "1ZR",
                "mivchan_acharon_dt": "2025-05-20",
                "tokef_dt": "2026-05-19",
                "moed_aliya_lakvish": "2016-4",
                "zmig_kidmi": "205/55R16",
                "zmig_ahori": "205/55R16",
                "misgeret": "JTNKU3JE00J012345"
            }]
        }
    });

    Mock::given(method("GET"))
        .and(path("/api/3/action/datastore_search"))
        .and(query_param("resource_id", VEHICLE_RESOURCE_ID))
        .and(query_param("filters", r#"{"mispar_rechev":1234567}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(&mock_response))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = VehicleRegistryService::with_base_url(&mock_server.uri()).unwrap();
    let vehicle = service.lookup("1234567").await.unwrap();

    assert!(vehicle.found);
    assert_eq!(vehicle.car_number, Some(1234567));
    assert_eq!(vehicle.model.as_deref(), Some("COROLLA"));
    assert_eq!(vehicle.year, Some(2016));
    assert_eq!(vehicle.test_expiry.as_deref(), Some("2026-05-19"));

    // Second lookup is served from cache (mock expects exactly one call)
    let cached = service.lookup("1234567").await.unwrap();
    assert_eq!(cached, vehicle);
}

#[tokio::test]
async fn test_vehicle_lookup_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/3/action/datastore_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "result": {"records": []}
        })))
        .mount(&mock_server)
        .await;

    let service = VehicleRegistryService::with_base_url(&mock_server.uri()).unwrap();
    let err = service.lookup("9999999").await.unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_vehicle_registry_outage_opens_circuit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/3/action/datastore_search"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let service = VehicleRegistryService::with_base_url(&mock_server.uri()).unwrap();
    for plate in ["1000001", "1000002", "1000003"] {
        let err = service.lookup(plate).await.unwrap_err();
        assert!(matches!(err, AppError::ExternalApiError(_)));
    }

    let err = service.lookup("1000004").await.unwrap_err();
    assert!(matches!(err, AppError::CircuitOpen(_)));
}

#[tokio::test]
async fn test_municipality_images_batch_lookup() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("titles", "בית שמש|שוהם"))
        .and(query_param("prop", "pageimages"))
        .and(query_param("pithumbsize", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "query": {
                "pages": {
                    "101": {
                        "title": "בית שמש",
                        "thumbnail": {"source": "https://upload.example/beit-shemesh.png"}
                    },
                    "-1": {"title": "שוהם", "missing": ""}
                }
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service =
        MunicipalityImageService::with_api_url(&format!("{}/w/api.php", mock_server.uri()))
            .unwrap();
    let names = vec![
        "עיריית בית שמש".to_string(),
        "מועצה מקומית שוהם".to_string(),
        "עיריית שדרות".to_string(),
    ];
    let images = service.fetch_images(&names).await;

    assert_eq!(images.len(), 2);
    assert_eq!(
        images["עיריית בית שמש"],
        "https://upload.example/beit-shemesh.png"
    );
    assert!(images["עיריית שדרות"].contains("sderot"));
    assert!(!images.contains_key("מועצה מקומית שוהם"));
}

#[tokio::test]
async fn test_municipality_images_failure_keeps_overrides() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let service =
        MunicipalityImageService::with_api_url(&format!("{}/w/api.php", mock_server.uri()))
            .unwrap();
    let names = vec!["עיריית הרצליה".to_string(), "עיריית בית שמש".to_string()];

    let images = service.fetch_images(&names).await;
    assert_eq!(images.len(), 1);
    assert!(images.contains_key("עיריית הרצליה"));

    let err = service.lookup_thumbnails(&names[1..]).await.unwrap_err();
    assert!(matches!(err, AppError::ExternalApiError(_)));
}
