//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("inmo_http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).expect("metric can be created");
    pub static ref HTTP_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "inmo_http_request_duration_seconds",
            "HTTP request duration in seconds"
        ).buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "endpoint"]
    ).expect("metric can be created");

    // Auth Metrics
    pub static ref AUTH_EVENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("inmo_auth_events_total", "Authentication and authorization outcomes"),
        &["event"]
    ).expect("metric can be created");

    // Domain Metrics
    pub static ref USERS_CREATED_TOTAL: IntCounter = IntCounter::new(
        "inmo_users_created_total",
        "Users created through the identity provider"
    ).expect("metric can be created");
    pub static ref LISTINGS_CREATED_TOTAL: IntCounter = IntCounter::new(
        "inmo_listings_created_total",
        "Listings created"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("inmo_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
            .expect("HTTP_REQUESTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
            .expect("HTTP_REQUEST_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(AUTH_EVENTS_TOTAL.clone()))
            .expect("AUTH_EVENTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(USERS_CREATED_TOTAL.clone()))
            .expect("USERS_CREATED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(LISTINGS_CREATED_TOTAL.clone()))
            .expect("LISTINGS_CREATED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}

/// Count an authentication outcome (`login`, `token_missing`, `token_invalid`, `forbidden`, ...).
pub fn record_auth_event(event: &str) {
    AUTH_EVENTS_TOTAL.with_label_values(&[event]).inc();
}
