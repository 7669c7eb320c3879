//! Derives requested operations from an inbound NGSI request.
//!
//! Every entity the request names contributes an operation, and the matcher
//! has to permit all of them:
//! - the identifier in the path segment after `entities`
//! - each identifier in the `ids` query parameter
//! - each entity in a JSON body (array, or a single object with `type`)
//!
//! A bare `type` query parameter with no identifier anywhere addresses every
//! entity of that type (`*`). Anything that cannot be mapped yields no
//! operations, which the matcher treats as a denial.

use ishare_pep_sdk::{InboundRequest, RequestedOperation, WILDCARD};
use serde_json::Value;

const ENTITIES_SEGMENT: &str = "entities";
const NGSI_LD_URN_PREFIX: &str = "urn:ngsi-ld:";

/// Derive the operations a request performs.
#[must_use]
pub fn normalize(request: &InboundRequest) -> Vec<RequestedOperation> {
    let action = request.action();

    let Some(mut ops) = from_target(request, &action) else {
        return Vec::new();
    };

    if let Some(body) = request.body.as_deref() {
        match from_body(body, &action) {
            BodyOperations::Entities(body_ops) => ops.extend(body_ops),
            BodyOperations::Malformed => return Vec::new(),
            BodyOperations::NotEntities => {}
        }
    }

    ops
}

/// Whether any path segment is `.` or `..`, literally or percent-encoded.
///
/// URL resolution collapses such segments, so the path a backend finally
/// sees would differ from the one that was authorized.
#[must_use]
pub fn has_dot_segments(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}

enum BodyOperations {
    Entities(Vec<RequestedOperation>),
    /// Body is not JSON, or an entity batch contains an entry without a type.
    Malformed,
    /// Valid JSON that does not describe entities (e.g. an attribute patch).
    NotEntities,
}

fn from_body(body: &[u8], action: &str) -> BodyOperations {
    let Ok(json) = serde_json::from_slice::<Value>(body) else {
        return BodyOperations::Malformed;
    };

    match &json {
        Value::Array(entities) => entities
            .iter()
            .map(|entity| entity_operation(entity, action))
            .collect::<Option<Vec<_>>>()
            .map_or(BodyOperations::Malformed, BodyOperations::Entities),
        Value::Object(_) => entity_operation(&json, action)
            .map_or(BodyOperations::NotEntities, |op| BodyOperations::Entities(vec![op])),
        _ => BodyOperations::NotEntities,
    }
}

fn entity_operation(entity: &Value, action: &str) -> Option<RequestedOperation> {
    let entity_type = entity.get("type")?.as_str()?;
    if entity_type.is_empty() {
        return None;
    }
    let id = entity
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .unwrap_or(WILDCARD);
    Some(RequestedOperation::new(entity_type, id, action))
}

/// `None` signals a request that addresses something but cannot be decoded,
/// or whose parts disagree on an entity's type.
fn from_target(request: &InboundRequest, action: &str) -> Option<Vec<RequestedOperation>> {
    let mut types: Vec<String> = Vec::new();
    let mut ids: Vec<String> = Vec::new();

    if let Some(query) = request.query.as_deref() {
        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            match &*name {
                "type" if types.is_empty() => types = split_list(&value),
                "ids" if ids.is_empty() => ids = split_list(&value),
                _ => {}
            }
        }
    }

    if let Some(id) = path_identifier(&request.path)? {
        ids.insert(0, id);
    }

    if ids.is_empty() {
        return Some(
            types
                .into_iter()
                .map(|t| RequestedOperation::new(t, WILDCARD, action))
                .collect(),
        );
    }

    ids.into_iter()
        .map(|id| {
            let resolved = entity_type(&id, &types)?;
            Some(RequestedOperation::new(resolved, id, action))
        })
        .collect()
}

/// Type of the entity `id` names.
///
/// An NGSI-LD URN carries its own type, which must then be among the queried
/// types (if any). A plain identifier needs exactly one queried type.
fn entity_type(id: &str, types: &[String]) -> Option<String> {
    match (urn_type(id), types) {
        (Some(embedded), []) => Some(embedded.to_owned()),
        (Some(embedded), listed) => listed
            .iter()
            .any(|t| t == embedded)
            .then(|| embedded.to_owned()),
        (None, [single]) => Some(single.clone()),
        (None, _) => None,
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Identifier in the path segment following `entities`, percent-decoded.
///
/// Outer `None` means the segment could not be decoded.
fn path_identifier(path: &str) -> Option<Option<String>> {
    let mut segments = path.split('/');
    if !segments.any(|segment| segment == ENTITIES_SEGMENT) {
        return Some(None);
    }
    match segments.next().filter(|segment| !segment.is_empty()) {
        None => Some(None),
        Some(raw) => urlencoding::decode(raw)
            .ok()
            .map(|decoded| Some(decoded.into_owned())),
    }
}

/// Entity type embedded in an NGSI-LD URN (`urn:ngsi-ld:<Type>:<id>`).
fn urn_type(id: &str) -> Option<&str> {
    let prefix = id.get(..NGSI_LD_URN_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(NGSI_LD_URN_PREFIX) {
        return None;
    }
    let (entity_type, rest) = id[NGSI_LD_URN_PREFIX.len()..].split_once(':')?;
    (!entity_type.is_empty() && !rest.is_empty()).then_some(entity_type)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use http::Method;
    use serde_json::json;

    use super::*;

    fn op(resource_type: &str, id: &str, action: &str) -> RequestedOperation {
        RequestedOperation::new(resource_type, id, action)
    }

    #[test]
    fn path_identifier_with_type_query() {
        let req = InboundRequest::new(Method::GET, "/path/entities/urn:ngsi-ld:SoilSensor:1111")
            .with_query("type=SoilSensor");

        assert_eq!(
            normalize(&req),
            vec![op("SoilSensor", "urn:ngsi-ld:SoilSensor:1111", "GET")]
        );
    }

    #[test]
    fn path_identifier_without_type_uses_urn() {
        let req = InboundRequest::new(Method::GET, "/entities/urn:ngsi-ld:Tractor:1111");

        assert_eq!(
            normalize(&req),
            vec![op("Tractor", "urn:ngsi-ld:Tractor:1111", "GET")]
        );
    }

    #[test]
    fn percent_encoded_path_identifier_is_decoded() {
        let req = InboundRequest::new(Method::GET, "/entities/urn%3Angsi-ld%3ASoilSensor%3A1");

        assert_eq!(
            normalize(&req),
            vec![op("SoilSensor", "urn:ngsi-ld:SoilSensor:1", "GET")]
        );
    }

    #[test]
    fn ids_query_yields_one_operation_per_identifier() {
        let req = InboundRequest::new(Method::GET, "/path/entities/").with_query(
            "ids=urn:ngsi-ld:SoilSensor:1111,urn:ngsi-ld:SoilSensor:2222&type=SoilSensor",
        );

        assert_eq!(
            normalize(&req),
            vec![
                op("SoilSensor", "urn:ngsi-ld:SoilSensor:1111", "GET"),
                op("SoilSensor", "urn:ngsi-ld:SoilSensor:2222", "GET"),
            ]
        );
    }

    #[test]
    fn type_only_addresses_all_entities() {
        let req = InboundRequest::new(Method::GET, "/entities").with_query("type=SoilSensor");

        assert_eq!(normalize(&req), vec![op("SoilSensor", "*", "GET")]);
    }

    #[test]
    fn multiple_types_without_ids() {
        let req = InboundRequest::new(Method::GET, "/entities")
            .with_query("type=SoilSensor,TemperatureSensor");

        assert_eq!(
            normalize(&req),
            vec![
                op("SoilSensor", "*", "GET"),
                op("TemperatureSensor", "*", "GET"),
            ]
        );
    }

    #[test]
    fn batch_body_yields_operation_per_entity() {
        let body = json!([
            { "id": "urn:ngsi-ld:TemperatureSensor:002", "type": "TemperatureSensor" },
            { "id": "urn:ngsi-ld:TemperatureSensor:003", "type": "TemperatureSensor" },
        ]);
        let req = InboundRequest::new(Method::PATCH, "/path/entityOperations/upsert")
            .with_body(serde_json::to_vec(&body).unwrap());

        assert_eq!(
            normalize(&req),
            vec![
                op("TemperatureSensor", "urn:ngsi-ld:TemperatureSensor:002", "PATCH"),
                op("TemperatureSensor", "urn:ngsi-ld:TemperatureSensor:003", "PATCH"),
            ]
        );
    }

    #[test]
    fn body_entity_without_id_is_wildcard() {
        let req = InboundRequest::new(Method::POST, "/entities")
            .with_body(br#"{ "type": "SoilSensor" }"#.to_vec());

        assert_eq!(normalize(&req), vec![op("SoilSensor", "*", "POST")]);
    }

    #[test]
    fn batch_entry_without_type_is_malformed() {
        let body = json!([
            { "id": "urn:ngsi-ld:TemperatureSensor:002", "type": "TemperatureSensor" },
            { "id": "urn:ngsi-ld:TemperatureSensor:003" },
        ]);
        let req = InboundRequest::new(Method::PATCH, "/entityOperations/upsert")
            .with_body(serde_json::to_vec(&body).unwrap());

        assert!(normalize(&req).is_empty());
    }

    #[test]
    fn non_json_body_is_malformed() {
        let req = InboundRequest::new(Method::PATCH, "/entities/urn:ngsi-ld:SoilSensor:1")
            .with_body(b"temperature=21".to_vec());

        assert!(normalize(&req).is_empty());
    }

    #[test]
    fn attribute_patch_body_falls_back_to_path() {
        let req = InboundRequest::new(Method::PATCH, "/entities/urn:ngsi-ld:SoilSensor:1/attrs")
            .with_body(br#"{ "temperature": { "type": "Property", "value": 21 } }"#.to_vec());

        assert_eq!(
            normalize(&req),
            vec![op("SoilSensor", "urn:ngsi-ld:SoilSensor:1", "PATCH")]
        );
    }

    #[test]
    fn path_identifier_is_kept_alongside_ids_query() {
        let req = InboundRequest::new(Method::GET, "/entities/urn:ngsi-ld:Tractor:1111")
            .with_query("ids=urn:ngsi-ld:SoilSensor:1");

        assert_eq!(
            normalize(&req),
            vec![
                op("Tractor", "urn:ngsi-ld:Tractor:1111", "GET"),
                op("SoilSensor", "urn:ngsi-ld:SoilSensor:1", "GET"),
            ]
        );
    }

    #[test]
    fn type_query_disagreeing_with_urn_is_unrecognized() {
        let req = InboundRequest::new(Method::GET, "/entities/urn:ngsi-ld:Tractor:1111")
            .with_query("type=SoilSensor");

        assert!(normalize(&req).is_empty());
    }

    #[test]
    fn ids_outside_queried_types_are_unrecognized() {
        let req = InboundRequest::new(Method::GET, "/entities")
            .with_query("type=SoilSensor&ids=urn:ngsi-ld:SoilSensor:1,urn:ngsi-ld:Tractor:2");

        assert!(normalize(&req).is_empty());
    }

    #[test]
    fn plain_identifier_takes_single_queried_type() {
        let req = InboundRequest::new(Method::GET, "/entities/sensor-1").with_query("type=SoilSensor");

        assert_eq!(normalize(&req), vec![op("SoilSensor", "sensor-1", "GET")]);
    }

    #[test]
    fn object_body_is_added_to_path_entity() {
        let body = json!({
            "id": "urn:ngsi-ld:TemperatureSensor:1",
            "type": "TemperatureSensor",
            "temperature": { "type": "Property", "value": 21 },
        });
        let req = InboundRequest::new(Method::PATCH, "/entities/urn:ngsi-ld:Tractor:1111/attrs")
            .with_body(serde_json::to_vec(&body).unwrap());

        assert_eq!(
            normalize(&req),
            vec![
                op("Tractor", "urn:ngsi-ld:Tractor:1111", "PATCH"),
                op("TemperatureSensor", "urn:ngsi-ld:TemperatureSensor:1", "PATCH"),
            ]
        );
    }

    #[test]
    fn array_body_is_added_to_path_entity() {
        let body = json!([{ "id": "urn:ngsi-ld:SoilSensor:2", "type": "SoilSensor" }]);
        let req = InboundRequest::new(Method::POST, "/entities/urn:ngsi-ld:Tractor:1111")
            .with_body(serde_json::to_vec(&body).unwrap());

        assert_eq!(
            normalize(&req),
            vec![
                op("Tractor", "urn:ngsi-ld:Tractor:1111", "POST"),
                op("SoilSensor", "urn:ngsi-ld:SoilSensor:2", "POST"),
            ]
        );
    }

    #[test]
    fn dot_segments_are_detected() {
        assert!(has_dot_segments("/public/../entities/x"));
        assert!(has_dot_segments("/public/./x"));
        assert!(has_dot_segments("/public/%2e%2E/entities"));
        assert!(has_dot_segments("/public/.%2e/entities"));
        assert!(has_dot_segments("/public/..\\entities"));
        assert!(has_dot_segments("/.."));
    }

    #[test]
    fn dots_inside_segments_are_fine() {
        assert!(!has_dot_segments("/public/logo.png"));
        assert!(!has_dot_segments("/public/.well-known/x"));
        assert!(!has_dot_segments("/entities/urn:ngsi-ld:SoilSensor:1..2"));
        assert!(!has_dot_segments("/"));
    }

    #[test]
    fn identifier_without_resolvable_type_is_unrecognized() {
        let req = InboundRequest::new(Method::GET, "/entities/plain-id");
        assert!(normalize(&req).is_empty());
    }

    #[test]
    fn request_without_entity_information_is_unrecognized() {
        let req = InboundRequest::new(Method::GET, "/version");
        assert!(normalize(&req).is_empty());
    }

    #[test]
    fn urn_type_extraction() {
        assert_eq!(urn_type("urn:ngsi-ld:SoilSensor:1"), Some("SoilSensor"));
        assert_eq!(urn_type("URN:NGSI-LD:SoilSensor:1"), Some("SoilSensor"));
        assert_eq!(urn_type("urn:ngsi-ld:SoilSensor"), None);
        assert_eq!(urn_type("urn:other:SoilSensor:1"), None);
        assert_eq!(urn_type("short"), None);
    }
}
