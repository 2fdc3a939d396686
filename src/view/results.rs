//! View over the `results` collection

use crate::cel::Type;

use super::{ConstantValue, MessageType, View, RECORD_TYPES};

/// Collection name of the results view
pub const RESULTS_VIEW: &str = "results";

/// Message type of `summary`
pub const SUMMARY_MESSAGE: &str = "tekton.results.v1alpha2.RecordSummary";

/// Summary status values
const SUMMARY_STATUSES: &[(&str, i32)] = &[
    ("UNKNOWN", 0),
    ("SUCCESS", 1),
    ("FAILURE", 2),
    ("TIMEOUT", 3),
    ("CANCELLED", 4),
];

/// Build the results view
pub fn results() -> View {
    let summary = MessageType::new(SUMMARY_MESSAGE)
        .field("record", Type::String)
        .field("type", Type::String)
        .field("start_time", Type::Timestamp)
        .field("end_time", Type::Timestamp)
        .field("status", Type::Int)
        .field("annotations", Type::map(Type::String, Type::String));

    let mut builder = View::builder(RESULTS_VIEW)
        .field("parent", Type::String)
        .field("uid", Type::String)
        .field("annotations", Type::map(Type::String, Type::String))
        .field("summary", Type::message(SUMMARY_MESSAGE))
        .field("create_time", Type::Timestamp)
        .field("update_time", Type::Timestamp)
        .message(summary);

    for (name, value) in SUMMARY_STATUSES {
        builder = builder.constant(name, ConstantValue::Int32(*value));
    }
    for (name, value) in RECORD_TYPES {
        builder = builder.constant(name, ConstantValue::String(value.to_string()));
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_view_fields() {
        let view = results();
        assert_eq!(view.name(), "results");
        assert_eq!(view.resolve("summary").unwrap().ty, Type::message(SUMMARY_MESSAGE));
        assert_eq!(view.resolve("update_time").unwrap().column, "updated_time");
        assert_eq!(
            view.message(SUMMARY_MESSAGE).unwrap().field_type("status"),
            Some(&Type::Int)
        );
    }

    #[test]
    fn test_results_view_constants() {
        let view = results();
        assert_eq!(view.constant("CANCELLED"), Some(&ConstantValue::Int32(4)));
        assert_eq!(
            view.constant("PIPELINE_RUN"),
            Some(&ConstantValue::String("tekton.dev/v1.PipelineRun".into()))
        );
    }
}
