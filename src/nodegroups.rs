//! Nodegroup and node lookups.
//!
//! Thin helpers over the same pipeline as [`Client::get`] and
//! [`Client::post`]. Each one calls a read-only endpoint whose path comes
//! from the `paths` configuration section, then pulls one field out of the
//! decoded body. A missing field fails the call it belongs to.

use crate::metadata::{EndpointType, RequestMetadata};
use crate::{params::Params, Client, Error, JsonObject, Response, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

const DETAILS_MISSING: &str = "Details field not in API output";
const RECORDS_MISSING: &str = "Records field not in API output";

/// Optional filters for [`Client::get_nodegroups_from_node`].
///
/// # Examples
///
/// ```
/// use nodegroups_client::NodegroupQuery;
///
/// let query = NodegroupQuery::new().app("deploy").nodegroup_re("^web-");
/// assert_eq!(query.app.as_deref(), Some("deploy"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodegroupQuery {
    /// Only nodegroups used by this app, in the app's configured order.
    pub app: Option<String>,
    /// Only nodegroups whose name matches this regular expression.
    pub nodegroup_re: Option<String>,
}

impl NodegroupQuery {
    /// Creates a query with no filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the result to nodegroups used by `app`.
    pub fn app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    /// Restricts the result to nodegroups matching `pattern`.
    pub fn nodegroup_re(mut self, pattern: impl Into<String>) -> Self {
        self.nodegroup_re = Some(pattern.into());
        self
    }

    fn form(&self, node: &str) -> Params {
        let mut form = Params::new().with("node", node);
        if let Some(app) = &self.app {
            form.insert("app", app.as_str());
        }
        if let Some(pattern) = &self.nodegroup_re {
            form.insert("nodegroup_re", pattern.as_str());
        }
        form
    }

    fn query(&self) -> Params {
        if self.app.is_some() {
            Params::new().with("sortDir", "asc").with("sortField", "order")
        } else {
            Params::new()
        }
    }
}

#[derive(Debug, Deserialize)]
struct NodeRecord {
    node: String,
}

#[derive(Debug, Deserialize)]
struct NodegroupRecord {
    nodegroup: String,
}

impl Client {
    /// Fetches the details of a nodegroup.
    ///
    /// Returns the `details` field of the response.
    pub async fn get_nodegroup(&self, nodegroup: &str) -> Result<Response<Value>> {
        let path = self.endpoint_path("get_nodegroup")?;
        let metadata = RequestMetadata::get(EndpointType::ReadOnly, path)
            .with_query(Params::new().with("nodegroup", nodegroup));

        self.call_and_project(metadata, |mut output| {
            output
                .remove("details")
                .ok_or_else(|| Error::MissingField(DETAILS_MISSING.to_string()))
        })
        .await
    }

    /// Lists the nodegroups containing `node`, in the order the API returns them.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use nodegroups_client::{Client, NodegroupQuery};
    ///
    /// # async fn example() -> Result<(), nodegroups_client::Error> {
    /// let client = Client::builder().build()?;
    ///
    /// let groups = client
    ///     .get_nodegroups_from_node("web01.example.com", &NodegroupQuery::new().app("deploy"))
    ///     .await?;
    /// for group in groups.iter() {
    ///     println!("{}", group);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_nodegroups_from_node(
        &self,
        node: &str,
        query: &NodegroupQuery,
    ) -> Result<Response<Vec<String>>> {
        let path = self.endpoint_path("list_nodegroups_from_nodes")?;
        let metadata = RequestMetadata::post(EndpointType::ReadOnly, path)
            .with_form(query.form(node))
            .with_query(query.query());

        self.call_and_project(metadata, |output| {
            Ok(records::<NodegroupRecord>(output)?
                .into_iter()
                .map(|r| r.nodegroup)
                .collect())
        })
        .await
    }

    /// Lists the nodes matched by a nodegroup expression.
    ///
    /// The expression is sent percent-encoded, so a leading `@` reaches the
    /// server as `%40` and cannot be mistaken for a file upload.
    pub async fn get_nodes_from_expression(&self, expression: &str) -> Result<Response<Vec<String>>> {
        let path = self.endpoint_path("list_nodes")?;
        let metadata = RequestMetadata::post(EndpointType::ReadOnly, path)
            .with_form(Params::new().with("expression", expression));

        self.call_and_project(metadata, node_names).await
    }

    /// Lists the nodes of a nodegroup.
    pub async fn get_nodes_from_nodegroup(&self, nodegroup: &str) -> Result<Response<Vec<String>>> {
        let path = self.endpoint_path("list_nodes")?;
        let metadata = RequestMetadata::get(EndpointType::ReadOnly, path)
            .with_query(Params::new().with("nodegroup", nodegroup));

        self.call_and_project(metadata, node_names).await
    }
}

fn node_names(output: JsonObject) -> Result<Vec<String>> {
    Ok(records::<NodeRecord>(output)?
        .into_iter()
        .map(|r| r.node)
        .collect())
}

fn records<R: DeserializeOwned>(mut output: JsonObject) -> Result<Vec<R>> {
    let records = output
        .remove("records")
        .ok_or_else(|| Error::MissingField(RECORDS_MISSING.to_string()))?;

    serde_json::from_value(records)
        .map_err(|e| Error::MissingField(format!("Malformed records in API output: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> JsonObject {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_node_names_keep_order() {
        let output = object(json!({
            "status": "200",
            "records": [{"node": "b"}, {"node": "a"}, {"node": "c", "extra": 1}],
        }));

        assert_eq!(node_names(output).unwrap(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_missing_records() {
        let output = object(json!({"status": "200"}));

        let err = node_names(output).unwrap_err();
        assert_eq!(err.to_string(), "Records field not in API output");
        assert_eq!(err.status_code(), "500");
    }

    #[test]
    fn test_malformed_records() {
        let output = object(json!({"status": "200", "records": [{"host": "a"}]}));

        let err = records::<NodeRecord>(output).unwrap_err();
        assert!(err.to_string().starts_with("Malformed records in API output"));
    }

    #[test]
    fn test_query_params_without_app() {
        let query = NodegroupQuery::new().nodegroup_re("^db");

        assert_eq!(query.form("db01").encode(), "node=db01&nodegroup_re=%5Edb");
        assert!(query.query().is_empty());
    }

    #[test]
    fn test_query_params_with_app() {
        let query = NodegroupQuery::new().app("deploy");

        assert_eq!(query.form("web01").encode(), "node=web01&app=deploy");
        assert_eq!(query.query().encode(), "sortDir=asc&sortField=order");
    }
}
