//! # nodegroups-client - a client for the nodegroups API
//!
//! The nodegroups API manages named collections of nodes. This crate builds
//! GET and POST requests against a configured read-only (`ro`) or read-write
//! (`rw`) base URI, checks the JSON responses, and offers typed helpers for
//! the common lookups.
//!
//! ## Quick Start
//!
//! ```no_run
//! use nodegroups_client::{Client, NodegroupQuery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), nodegroups_client::Error> {
//!     let client = Client::builder()
//!         .config_file("/usr/local/etc/nodegroups_client/config.ini")
//!         .build()?;
//!
//!     let nodes = client.get_nodes_from_nodegroup("web").await?;
//!     println!("web: {:?}", nodes.data);
//!
//!     let groups = client
//!         .get_nodegroups_from_node("web01.example.com", &NodegroupQuery::new())
//!         .await?;
//!     println!("web01 is in {:?}", groups.data);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Configuration is a tree of strings. Compiled-in defaults are layered
//! with an INI file and then with overrides from code, see
//! [`config::merge`] for the rules.
//!
//! ```ini
//! useragent = ops-tool/1.0
//!
//! [uri]
//! ro = https://nodegroups.example.com/api
//! rw = https://nodegroups-master.example.com/api
//!
//! [ssl]
//! verifypeer = 1
//! cainfo = /etc/ssl/certs/internal-ca.pem
//!
//! [transport]
//! timeout = 10
//! ```
//!
//! ## Error Handling
//!
//! Every call either returns a [`Response`] or an [`Error`] whose text and
//! [`Error::status_code`] describe the failure. The client also remembers its
//! most recent call:
//!
//! ```no_run
//! use nodegroups_client::Client;
//!
//! # async fn example() -> Result<(), nodegroups_client::Error> {
//! let client = Client::builder().build()?;
//!
//! if client.get_nodegroup("web").await.is_err() {
//!     eprintln!("failed ({}): {}", client.last_status(), client.last_error());
//!     eprintln!("raw body: {}", client.last_raw_body());
//! }
//! # Ok(())
//! # }
//! ```

mod client;
pub mod config;
mod error;
pub mod headers;
pub mod ini;
pub mod metadata;
mod nodegroups;
pub mod params;
mod response;
pub mod transport;

pub use client::{Client, ClientBuilder};
pub use error::{Error, Result, CLIENT_FAILURE_STATUS};
pub use headers::ResponseHeaders;
pub use metadata::EndpointType;
pub use nodegroups::NodegroupQuery;
pub use params::{ParamValue, Params};
pub use response::{CallRecord, Response};

/// A decoded JSON object.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;
