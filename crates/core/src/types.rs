/// Loosely-shaped JSON object returned by provider endpoints.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;
