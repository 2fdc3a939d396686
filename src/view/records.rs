//! View over the `records` collection

use crate::cel::Type;

use super::{ConstantValue, View, RECORD_TYPES};

/// Collection name of the records view
pub const RECORDS_VIEW: &str = "records";

/// Build the records view
pub fn records() -> View {
    let mut builder = View::builder(RECORDS_VIEW)
        .field("parent", Type::String)
        .field("result_name", Type::String)
        .field("name", Type::String)
        .field("uid", Type::String)
        .field("data_type", Type::String)
        .field("data", Type::Dyn)
        .field("create_time", Type::Timestamp)
        .field("update_time", Type::Timestamp);

    for (name, value) in RECORD_TYPES {
        builder = builder.constant(name, ConstantValue::String(value.to_string()));
    }

    builder.build()
}
