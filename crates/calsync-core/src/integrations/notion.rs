//! Notion database client implementing [`RecordStore`].

use reqwest::{Method, RequestBuilder};
use serde_json::{json, Map, Value};

use super::traits::{Filter, Query, RecordStore};
use super::transport::Transport;
use super::types::{DatabaseInfo, PropertySet, PropertyValue, StoredRecord};
use crate::error::{CoreError, Result};

const NOTION_VERSION: &str = "2022-06-28";
const NOTION_API: &str = "https://api.notion.com/v1";
const QUERY_PAGE_SIZE: u32 = 100;

pub struct NotionClient {
    transport: Transport,
    api_token: String,
    base_url: String,
}

impl NotionClient {
    pub fn new(transport: Transport, api_token: &str) -> Self {
        Self {
            transport,
            api_token: api_token.to_string(),
            base_url: NOTION_API.to_string(),
        }
    }

    /// Point the client at a different API root (tests, proxies).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.transport
            .http()
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_token)
            .header("Notion-Version", NOTION_VERSION)
    }

    fn send(&self, request: RequestBuilder) -> Result<Value> {
        self.transport.block_on(async {
            let resp = request.send().await?;
            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(CoreError::integration(
                    "notion",
                    format!("Notion API error (HTTP {status}): {text}"),
                ));
            }
            Ok::<Value, CoreError>(resp.json::<Value>().await?)
        })
    }
}

impl RecordStore for NotionClient {
    fn query(&self, database_id: &str, query: &Query) -> Result<Vec<StoredRecord>> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "page_size": QUERY_PAGE_SIZE });
            if let Some(filter) = &query.filter {
                body["filter"] = encode_filter(filter);
            }
            if let Some(property) = &query.sort_ascending {
                body["sorts"] = json!([{ "property": property, "direction": "ascending" }]);
            }
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }

            let resp = self.send(
                self.request(Method::POST, &format!("/databases/{database_id}/query"))
                    .json(&body),
            )?;

            if let Some(results) = resp["results"].as_array() {
                records.extend(results.iter().filter_map(decode_page));
            }

            match (resp["has_more"].as_bool(), resp["next_cursor"].as_str()) {
                (Some(true), Some(next)) => cursor = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(records)
    }

    fn create(&self, database_id: &str, properties: &PropertySet) -> Result<String> {
        let body = json!({
            "parent": { "database_id": database_id },
            "properties": encode_properties(properties),
        });
        let resp = self.send(self.request(Method::POST, "/pages").json(&body))?;
        resp["id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| CoreError::integration("notion", "created page has no id"))
    }

    fn update(&self, record_id: &str, properties: &PropertySet) -> Result<()> {
        let body = json!({ "properties": encode_properties(properties) });
        self.send(
            self.request(Method::PATCH, &format!("/pages/{record_id}"))
                .json(&body),
        )?;
        Ok(())
    }

    fn retrieve_database(&self, database_id: &str) -> Result<DatabaseInfo> {
        let resp = self.send(self.request(Method::GET, &format!("/databases/{database_id}")))?;
        let title = plain_text(&resp["title"]);
        Ok(DatabaseInfo {
            id: resp["id"].as_str().unwrap_or(database_id).to_string(),
            title: Some(title).filter(|t| !t.trim().is_empty()),
        })
    }
}

fn rich_text(content: &str) -> Value {
    if content.is_empty() {
        json!([])
    } else {
        json!([{ "text": { "content": content } }])
    }
}

/// Encode one property value into the Notion page-property shape.
pub fn encode_property(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Title(s) => json!({ "title": rich_text(s) }),
        PropertyValue::RichText(s) => json!({ "rich_text": rich_text(s) }),
        PropertyValue::Date(Some(d)) => json!({ "date": { "start": d } }),
        PropertyValue::Date(None) => json!({ "date": null }),
        PropertyValue::Select(Some(name)) => json!({ "select": { "name": name } }),
        PropertyValue::Select(None) => json!({ "select": null }),
        PropertyValue::Number(n) => json!({ "number": n }),
        PropertyValue::Checkbox(b) => json!({ "checkbox": b }),
        PropertyValue::Relation(ids) => {
            let ids: Vec<Value> = ids.iter().map(|id| json!({ "id": id })).collect();
            json!({ "relation": ids })
        }
    }
}

fn encode_properties(properties: &PropertySet) -> Value {
    let map: Map<String, Value> = properties
        .iter()
        .map(|(name, value)| (name.clone(), encode_property(value)))
        .collect();
    Value::Object(map)
}

fn plain_text(fragments: &Value) -> String {
    fragments
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| {
                    p["plain_text"]
                        .as_str()
                        .or_else(|| p["text"]["content"].as_str())
                })
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// Decode a Notion page-property object. Unsupported types yield `None`.
pub fn decode_property(value: &Value) -> Option<PropertyValue> {
    let decoded = match value["type"].as_str()? {
        "title" => PropertyValue::Title(plain_text(&value["title"])),
        "rich_text" => PropertyValue::RichText(plain_text(&value["rich_text"])),
        "date" => PropertyValue::Date(value["date"]["start"].as_str().map(String::from)),
        "select" => PropertyValue::Select(value["select"]["name"].as_str().map(String::from)),
        "status" => PropertyValue::Select(value["status"]["name"].as_str().map(String::from)),
        "number" => PropertyValue::Number(value["number"].as_f64()),
        "checkbox" => PropertyValue::Checkbox(value["checkbox"].as_bool().unwrap_or(false)),
        "relation" => PropertyValue::Relation(
            value["relation"]
                .as_array()
                .map(|ids| {
                    ids.iter()
                        .filter_map(|r| r["id"].as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default(),
        ),
        _ => return None,
    };
    Some(decoded)
}

fn decode_page(page: &Value) -> Option<StoredRecord> {
    let id = page["id"].as_str()?.to_string();
    let properties = page["properties"]
        .as_object()
        .map(|props| {
            props
                .iter()
                .filter_map(|(name, v)| decode_property(v).map(|p| (name.clone(), p)))
                .collect()
        })
        .unwrap_or_default();

    Some(StoredRecord {
        id,
        archived: page["archived"].as_bool().unwrap_or(false),
        properties,
    })
}

/// Encode a filter into Notion's database-query filter object.
pub fn encode_filter(filter: &Filter) -> Value {
    match filter {
        Filter::Equals { property, value } => {
            let condition = match value {
                PropertyValue::Title(s) | PropertyValue::RichText(s) => json!({ "equals": s }),
                PropertyValue::Date(d) | PropertyValue::Select(d) => json!({ "equals": d }),
                PropertyValue::Number(n) => json!({ "equals": n }),
                PropertyValue::Checkbox(b) => json!({ "equals": b }),
                PropertyValue::Relation(ids) => {
                    json!({ "contains": ids.first().cloned().unwrap_or_default() })
                }
            };
            let mut obj = Map::new();
            obj.insert("property".into(), json!(property));
            obj.insert(value.kind().as_str().into(), condition);
            Value::Object(obj)
        }
        Filter::IsEmpty { property, kind } => {
            let mut obj = Map::new();
            obj.insert("property".into(), json!(property));
            obj.insert(kind.as_str().into(), json!({ "is_empty": true }));
            Value::Object(obj)
        }
        Filter::OnOrAfter { property, date } => json!({
            "property": property,
            "date": { "on_or_after": date },
        }),
        Filter::And(conditions) => {
            json!({ "and": conditions.iter().map(encode_filter).collect::<Vec<_>>() })
        }
    }
}
