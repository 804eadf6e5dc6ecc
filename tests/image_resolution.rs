//! Image and availability-domain resolution behaviour.

use std::time::Duration;

use ocimachine::client::{ApiError, ClientError, OciClient};
use ocimachine::test_support::{ScriptedApi, image};

const COMPARTMENT: &str = "ocid1.compartment.oc1..node";

fn fast_client(api: ScriptedApi) -> OciClient<ScriptedApi> {
    OciClient::new(api)
        .with_poll_interval(Duration::from_millis(1))
        .with_wait_timeout(Duration::from_millis(50))
        .with_page_retry_backoff(Duration::from_millis(1))
}

#[tokio::test]
async fn resolution_matches_case_insensitively() {
    let api = ScriptedApi::new();
    api.push_image_page(
        vec![image("ocid1.image.oc1..match", "oracle-linux-7.7", 8)],
        None,
    );
    let client = fast_client(api);
    let resolved = client
        .resolve_image_id(COMPARTMENT, "Oracle-Linux-7.7")
        .await
        .expect("image should resolve");
    assert_eq!(resolved, "ocid1.image.oc1..match");
}

#[tokio::test]
async fn resolution_returns_the_most_recent_match() {
    // Pages arrive sorted by creation time descending, so the first match in
    // page order is the newest one.
    let api = ScriptedApi::new();
    api.push_image_page(
        vec![
            image("ocid1.image.oc1..newest", "Oracle-Linux-7.7", 20),
            image("ocid1.image.oc1..older", "Oracle-Linux-7.7", 2),
        ],
        None,
    );
    let client = fast_client(api);
    let resolved = client
        .resolve_image_id(COMPARTMENT, "Oracle-Linux-7.7")
        .await
        .expect("image should resolve");
    assert_eq!(resolved, "ocid1.image.oc1..newest");
}

#[tokio::test]
async fn resolution_walks_pages_until_a_match() {
    let api = ScriptedApi::new();
    api.push_image_page(
        vec![image("ocid1.image.oc1..other", "Some-Other-Image", 22)],
        Some("page-2"),
    );
    api.push_image_page(
        vec![image("ocid1.image.oc1..match", "Oracle-Linux-7.7", 21)],
        None,
    );
    let client = fast_client(api);
    let resolved = client
        .resolve_image_id(COMPARTMENT, "Oracle-Linux-7.7")
        .await
        .expect("image should resolve");
    assert_eq!(resolved, "ocid1.image.oc1..match");
    assert_eq!(client.api().list_images_calls(), 2);
}

#[tokio::test]
async fn resolution_stops_at_the_first_matching_page() {
    let api = ScriptedApi::new();
    api.push_image_page(
        vec![image("ocid1.image.oc1..match", "Oracle-Linux-7.7", 23)],
        Some("page-2"),
    );
    let client = fast_client(api);
    client
        .resolve_image_id(COMPARTMENT, "Oracle-Linux-7.7")
        .await
        .expect("image should resolve");
    assert_eq!(client.api().list_images_calls(), 1);
}

#[tokio::test]
async fn absent_images_fail_with_an_error_naming_the_request() {
    let api = ScriptedApi::new();
    api.push_image_page(
        vec![image("ocid1.image.oc1..other", "Some-Other-Image", 7)],
        None,
    );
    let client = fast_client(api);
    let error = client
        .resolve_image_id(COMPARTMENT, "Oracle-Linux-9.9")
        .await
        .expect_err("resolution should fail");
    assert!(matches!(error, ClientError::ImageNotFound { .. }));
    assert!(
        error.to_string().contains("Oracle-Linux-9.9"),
        "error should name the requested image: {error}"
    );
}

#[tokio::test]
async fn empty_name_fails_validation_before_any_listing() {
    let client = fast_client(ScriptedApi::new());
    let error = client
        .resolve_image_id(COMPARTMENT, "")
        .await
        .expect_err("resolution should fail");
    assert!(matches!(error, ClientError::Validation(_)));
    assert_eq!(client.api().list_images_calls(), 0);
}

#[tokio::test]
async fn page_reads_retry_transport_failures_then_succeed() {
    let api = ScriptedApi::new();
    api.push_image_page_error(ApiError::Transport {
        message: String::from("connection reset"),
    });
    api.push_image_page(
        vec![image("ocid1.image.oc1..match", "Oracle-Linux-7.7", 9)],
        None,
    );
    let client = fast_client(api);
    let resolved = client
        .resolve_image_id(COMPARTMENT, "Oracle-Linux-7.7")
        .await
        .expect("retry should recover");
    assert_eq!(resolved, "ocid1.image.oc1..match");
    assert_eq!(client.api().list_images_calls(), 2);
}

#[tokio::test]
async fn abbreviated_domain_resolves_to_the_qualified_name() {
    let api = ScriptedApi::new();
    api.push_availability_domains(&["xx-region-AD-1", "xx-region-AD-2"]);
    let client = fast_client(api);
    let resolved = client
        .resolve_availability_domain(COMPARTMENT, "AD-1")
        .await
        .expect("domain should resolve");
    assert_eq!(resolved, "xx-region-AD-1");
}

#[tokio::test]
async fn lower_case_requests_match_after_uppercasing() {
    let api = ScriptedApi::new();
    api.push_availability_domains(&["xx-region-AD-1", "xx-region-AD-2"]);
    let client = fast_client(api);
    let resolved = client
        .resolve_availability_domain(COMPARTMENT, "ad-2")
        .await
        .expect("domain should resolve");
    assert_eq!(resolved, "xx-region-AD-2");
}

#[tokio::test]
async fn the_last_matching_domain_wins() {
    let api = ScriptedApi::new();
    api.push_availability_domains(&["first-AD-1-a", "second-AD-1-b"]);
    let client = fast_client(api);
    let resolved = client
        .resolve_availability_domain(COMPARTMENT, "AD-1")
        .await
        .expect("domain should resolve");
    assert_eq!(resolved, "second-AD-1-b");
}

#[tokio::test]
async fn unresolved_domains_fall_back_to_the_literal_input() {
    let api = ScriptedApi::new();
    api.push_availability_domains(&["xx-region-AD-1", "xx-region-AD-2"]);
    let client = fast_client(api);
    let resolved = client
        .resolve_availability_domain(COMPARTMENT, "AD-9")
        .await
        .expect("fallback should not error");
    assert_eq!(resolved, "AD-9");
}
