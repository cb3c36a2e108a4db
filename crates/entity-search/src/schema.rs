//! JSON schemas embedded in agent instructions

use serde_json::{json, Map, Value};

const SCHEMA_DIALECT: &str = "http://json-schema.org/draft-07/schema#";

fn string() -> Value {
    json!({"type": "string"})
}

fn date() -> Value {
    json!({"type": "string", "format": "date-time"})
}

/// Closed object schema; every listed property is required
fn object(properties: &[(&str, Value)]) -> Value {
    let required: Vec<&str> = properties.iter().map(|(name, _)| *name).collect();
    let properties: Map<String, Value> = properties
        .iter()
        .map(|(name, schema)| (name.to_string(), schema.clone()))
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

fn document(mut root: Value) -> Value {
    root["$schema"] = json!(SCHEMA_DIALECT);
    root
}

/// Schema for a full registry record, wrapped in `businessEntity`
pub fn record_schema() -> Value {
    let entity_information = object(&[
        ("entityName", string()),
        ("entityNumber", string()),
        ("entityType", string()),
        ("entitySubtype", string()),
        ("formationDate", date()),
        ("profession", string()),
        ("formationEffectiveDate", date()),
        ("entityStatus", string()),
        ("renewByDate", date()),
        ("entityStatusDetails", string()),
        ("lastRenewedDate", date()),
        ("statusUpdatedOn", date()),
        ("expirationDate", date()),
    ]);
    let registered_agent = object(&[
        ("name", string()),
        ("registeredAgentType", string()),
        ("streetAddress", string()),
        ("lastUpdated", date()),
    ]);
    let principal = object(&[
        ("title", string()),
        ("name", string()),
        ("address", string()),
        ("lastUpdated", date()),
    ]);
    let address_information = object(&[
        ("physicalAddress", string()),
        ("physicalAddressUpdatedDate", string()),
        ("mailingAddress", string()),
        ("mailingAddressUpdatedDate", string()),
    ]);
    let service_of_process = object(&[
        ("serviceOfProcessName", string()),
        ("lastUpdated", date()),
        ("serviceOfProcessAddress", string()),
    ]);

    document(object(&[(
        "businessEntity",
        object(&[
            ("entityInformation", entity_information),
            ("registeredAgent", registered_agent),
            ("principalInformation", json!({"type": "array", "items": principal})),
            ("addressInformation", address_information),
            ("serviceOfProcessInformation", service_of_process),
        ]),
    )]))
}

/// Schema the agent answers with when the registry search matched nothing
pub fn no_result_schema() -> Value {
    document(object(&[
        ("searchCriteria", object(&[("name", string())])),
        ("noResults", json!({"type": "boolean"})),
    ]))
}
