#![allow(clippy::expect_used)]

use lazy_static::lazy_static;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ==== Detection Resolver Metrics ====
    pub static ref RESOLVER_PLATES: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "plate_resolver_plates_total",
                "Plate detections seen by the resolver, by outcome",
            ),
            &["outcome"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref RESOLVER_CONFLICTS_REPAIRED: IntCounter = {
        let metric = IntCounter::new(
            "plate_resolver_conflicts_repaired_total",
            "Plate claims removed from vehicles during conflict repair",
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    // ==== Segmentation Metrics ====
    pub static ref SEGMENTATION_GLYPHS: IntCounter = {
        let metric = IntCounter::new(
            "plate_segmentation_glyphs_total",
            "Glyphs isolated from plate crops",
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref SEGMENTATION_DURATION: Histogram = {
        let metric = Histogram::with_opts(
            HistogramOpts::new(
                "plate_segmentation_duration_seconds",
                "Time spent segmenting one plate crop",
            )
            .buckets(vec![0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25]),
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    // ==== Recognition Metrics ====
    pub static ref CORRECTOR_SUBSTITUTIONS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "plate_corrector_substitutions_total",
                "Forbidden vehicle-code characters replaced, by original character",
            ),
            &["original"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref IMAGES_PROCESSED: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "plate_reader_images_total",
                "Images run through the reader, by status",
            ),
            &["status"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };
}

/// Helper function to encode metrics in the Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e))
    })
}
