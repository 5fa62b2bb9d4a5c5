use crate::entity::PropertyType;
use serde_json::{json, Value};

/// Authoritative source-type -> Avro-type mapping. Returns the *unwrapped* field type;
/// nullability (the `["null", T]` union) is applied by the caller, since it's a property of the
/// field, not of the type itself.
pub fn avro_type(ty: PropertyType) -> Value {
    match ty {
        PropertyType::Bool => json!("boolean"),
        PropertyType::Int32 | PropertyType::Int16 | PropertyType::UInt8 => json!("int"),
        PropertyType::Int64 => json!("long"),
        PropertyType::Float32 => json!("float"),
        PropertyType::Float64 => json!("double"),
        PropertyType::String | PropertyType::Char => json!("string"),
        PropertyType::Bytes => json!("bytes"),
        PropertyType::Decimal(precision_scale) => {
            let (precision, scale) = precision_scale.unwrap_or((18, 4));
            json!({
                "type": "bytes",
                "logicalType": "decimal",
                "precision": precision,
                "scale": scale,
            })
        }
        PropertyType::Timestamp | PropertyType::TimestampWithOffset => json!({
            "type": "long",
            "logicalType": "timestamp-millis",
        }),
        PropertyType::Uuid => json!({
            "type": "string",
            "logicalType": "uuid",
        }),
    }
}

/// Wraps `field_type` in a nullable union when `nullable` is set, otherwise returns it as-is.
pub fn apply_nullability(field_type: Value, nullable: bool) -> Value {
    if nullable {
        json!(["null", field_type])
    } else {
        field_type
    }
}

/// KSQL column-type mapping for `CREATE STREAM`/`CREATE TABLE`.
pub fn ksql_type(ty: PropertyType) -> String {
    match ty {
        PropertyType::Int32 | PropertyType::Int16 | PropertyType::UInt8 => "INT".to_owned(),
        PropertyType::Int64 => "BIGINT".to_owned(),
        PropertyType::Float32 | PropertyType::Float64 => "DOUBLE".to_owned(),
        PropertyType::Bool => "BOOLEAN".to_owned(),
        PropertyType::String | PropertyType::Char | PropertyType::Uuid => "VARCHAR".to_owned(),
        PropertyType::Timestamp | PropertyType::TimestampWithOffset => "TIMESTAMP".to_owned(),
        PropertyType::Decimal(Some((p, s))) => format!("DECIMAL({}, {})", p, s),
        PropertyType::Decimal(None) => "DECIMAL".to_owned(),
        PropertyType::Bytes => "VARCHAR".to_owned(),
    }
}
