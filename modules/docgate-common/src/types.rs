use serde_json::{Map, Value};

/// A stored document: a flat JSON object keyed by field name.
pub type Document = Map<String, Value>;

/// Field carrying the resource id in inbound request bodies.
pub const ID_FIELD: &str = "id";
/// Field the store keys documents by.
pub const DOCUMENT_ID_FIELD: &str = "_id";
/// Field recording the subject that created a document.
pub const OWNER_FIELD: &str = "userId";

// --- Resource families ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceFamily {
    User,
    Blog,
}

impl ResourceFamily {
    pub const ALL: [ResourceFamily; 2] = [ResourceFamily::User, ResourceFamily::Blog];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceFamily::User => "user",
            ResourceFamily::Blog => "blog",
        }
    }

    pub fn schema(self) -> FamilySchema {
        match self {
            ResourceFamily::User => FamilySchema {
                family: self,
                collection: "users",
                title_field: "name",
                nested_field: "blogs",
            },
            ResourceFamily::Blog => FamilySchema {
                family: self,
                collection: "blogs",
                title_field: "title",
                nested_field: "comments",
            },
        }
    }
}

impl std::fmt::Display for ResourceFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-family document shape. Injected into the gateway (required fields)
/// and the persistence workers (collection, server-populated fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilySchema {
    pub family: ResourceFamily,
    pub collection: &'static str,
    /// Required on CREATE alongside `id`.
    pub title_field: &'static str,
    /// Ordered collection of nested replies, created empty.
    pub nested_field: &'static str,
}

impl FamilySchema {
    /// Build the document stored for a CREATE.
    ///
    /// Caller fields are kept except `id`, which moves to `_id`. Server
    /// populated fields always overwrite caller-supplied values.
    pub fn build_document(&self, resource_id: &ResourceId, payload: &Document, owner: &str) -> Document {
        let mut doc: Document = payload
            .iter()
            .filter(|(k, _)| k.as_str() != ID_FIELD)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        doc.insert(
            DOCUMENT_ID_FIELD.to_string(),
            Value::String(resource_id.to_string()),
        );
        doc.insert(OWNER_FIELD.to_string(), Value::String(owner.to_string()));
        doc.insert(self.nested_field.to_string(), Value::Array(Vec::new()));
        doc
    }
}

// --- Resource ids ---

/// Non-empty resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId(String);

impl ResourceId {
    /// Returns `None` for empty or whitespace-only ids.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// --- Operation messages ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    Read,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Create => write!(f, "CREATE"),
            OperationKind::Read => write!(f, "READ"),
        }
    }
}

/// What a worker is asked to do. Only CREATE carries a caller, so a
/// mutating message without an authenticated subject cannot be built.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Create { payload: Document, caller_id: String },
    Read,
}

/// Request forwarded from the gateway to a worker. Lives for one dispatch
/// round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationMessage {
    pub resource_id: ResourceId,
    pub operation: Operation,
}

impl OperationMessage {
    pub fn create(resource_id: ResourceId, payload: Document, caller_id: impl Into<String>) -> Self {
        Self {
            resource_id,
            operation: Operation::Create {
                payload,
                caller_id: caller_id.into(),
            },
        }
    }

    pub fn read(resource_id: ResourceId) -> Self {
        Self {
            resource_id,
            operation: Operation::Read,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self.operation {
            Operation::Create { .. } => OperationKind::Create,
            Operation::Read => OperationKind::Read,
        }
    }

    pub fn caller_id(&self) -> Option<&str> {
        match &self.operation {
            Operation::Create { caller_id, .. } => Some(caller_id),
            Operation::Read => None,
        }
    }
}

// --- Worker results ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStatus {
    Ok,
    Error,
}

/// Outcome of one operation. `data` is set for OK, `message` for ERROR.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerResult {
    pub status: ResultStatus,
    pub resource_id: ResourceId,
    pub data: Option<Document>,
    pub message: Option<String>,
}

impl WorkerResult {
    pub fn ok(resource_id: ResourceId, data: Document) -> Self {
        Self {
            status: ResultStatus::Ok,
            resource_id,
            data: Some(data),
            message: None,
        }
    }

    pub fn error(resource_id: ResourceId, message: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Error,
            resource_id,
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResultStatus::Ok
    }
}

// --- Claims ---

/// Verified caller identity. Consumed once per mutating request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSet {
    pub subject_id: String,
    pub token_valid: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(raw: &str) -> ResourceId {
        ResourceId::parse(raw).unwrap()
    }

    #[test]
    fn resource_id_rejects_blank() {
        assert!(ResourceId::parse("").is_none());
        assert!(ResourceId::parse("   ").is_none());
        assert_eq!(ResourceId::parse("b1").unwrap().as_str(), "b1");
    }

    #[test]
    fn blog_document_matches_stored_shape() {
        let payload = json!({"id": "b1", "title": "Hello"});
        let doc = ResourceFamily::Blog.schema().build_document(
            &id("b1"),
            payload.as_object().unwrap(),
            "u42",
        );
        assert_eq!(
            serde_json::Value::Object(doc),
            json!({"_id": "b1", "title": "Hello", "userId": "u42", "comments": []})
        );
    }

    #[test]
    fn server_fields_override_caller_fields() {
        let payload = json!({"id": "b1", "title": "Hi", "userId": "spoofed", "comments": ["x"]});
        let doc = ResourceFamily::Blog.schema().build_document(
            &id("b1"),
            payload.as_object().unwrap(),
            "u42",
        );
        assert_eq!(doc["userId"], json!("u42"));
        assert_eq!(doc["comments"], json!([]));
    }

    #[test]
    fn user_schema_requires_name() {
        let schema = ResourceFamily::User.schema();
        assert_eq!(schema.title_field, "name");
        assert_eq!(schema.collection, "users");
    }

    #[test]
    fn caller_present_only_on_create() {
        let create = OperationMessage::create(id("b1"), Document::new(), "u42");
        let read = OperationMessage::read(id("b1"));
        assert_eq!(create.kind(), OperationKind::Create);
        assert_eq!(create.caller_id(), Some("u42"));
        assert_eq!(read.kind(), OperationKind::Read);
        assert_eq!(read.caller_id(), None);
    }

    #[test]
    fn worker_result_carries_one_of_data_or_message() {
        let err = WorkerResult::error(id("x"), "not found");
        assert_eq!(err.status, ResultStatus::Error);
        assert!(err.data.is_none());
        assert_eq!(err.message.as_deref(), Some("not found"));

        let ok = WorkerResult::ok(id("x"), Document::new());
        assert!(ok.is_ok());
        assert!(ok.message.is_none());
    }
}
