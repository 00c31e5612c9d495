#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub description: &'static str,
}

pub const GET_ATTRS_DURATION: MetricDef = MetricDef {
    name: "serializer.get_attrs.duration",
    metric_type: MetricType::Histogram,
    description: "Duration of one get_attrs pass in seconds. Tagged with stage.",
};

pub const GET_ATTRS_BATCH_SIZE: MetricDef = MetricDef {
    name: "serializer.get_attrs.batch_size",
    metric_type: MetricType::Histogram,
    description: "Number of projects in one get_attrs batch",
};

pub const FEATURE_FALLBACK_EVALUATIONS: MetricDef = MetricDef {
    name: "serializer.features.fallback_evaluations",
    metric_type: MetricType::Counter,
    description: "Per-flag fallback evaluations taken because the batch path had no answer",
};

pub const ALL_METRICS: &[MetricDef] = &[
    GET_ATTRS_DURATION,
    GET_ATTRS_BATCH_SIZE,
    FEATURE_FALLBACK_EVALUATIONS,
];
