// Prometheus metrics for the grading API

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, Encoder, Histogram,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    pub static ref GRADES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "agrolab_grades_total",
        "Graded submissions by exercise and verdict",
        &["exercise", "verdict"]
    )
    .expect("agrolab_grades_total is a valid metric");
    pub static ref GRADE_DURATION: Histogram = register_histogram!(
        "agrolab_grade_duration_seconds",
        "Wall-clock time to grade one submission",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("agrolab_grade_duration_seconds is a valid metric");
    pub static ref REJECTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "agrolab_grade_rejections_total",
        "Grading requests refused before running",
        &["reason"]
    )
    .expect("agrolab_grade_rejections_total is a valid metric");
    pub static ref POOL_WAITING: IntGauge = register_int_gauge!(
        "agrolab_pool_waiting",
        "Requests queued for a sandbox slot"
    )
    .expect("agrolab_pool_waiting is a valid metric");
    pub static ref POOL_AVAILABLE: IntGauge = register_int_gauge!(
        "agrolab_pool_available",
        "Free sandbox slots"
    )
    .expect("agrolab_pool_available is a valid metric");
}

/// Register every metric up front so /metrics lists them before first use
pub fn init() {
    lazy_static::initialize(&GRADES_TOTAL);
    lazy_static::initialize(&GRADE_DURATION);
    lazy_static::initialize(&REJECTIONS_TOTAL);
    lazy_static::initialize(&POOL_WAITING);
    lazy_static::initialize(&POOL_AVAILABLE);
}

pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
