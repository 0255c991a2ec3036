//! Lists the members of a nodegroup and the nodegroups of a node.
//!
//! Reads the usual configuration file unless `--uri` is given.
//!
//! Run with: `cargo run --example list_nodes -- web web01.example.com`
//! or: `cargo run --example list_nodes -- --uri https://ng.example.com/api web web01`

use nodegroups_client::{Client, EndpointType, Error, NodegroupQuery};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter("nodegroups_client=debug,list_nodes=info")
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();

    let mut builder = Client::builder();
    if args.first().map(String::as_str) == Some("--uri") && args.len() > 1 {
        let uri = args.remove(1);
        args.remove(0);
        builder = builder.base_uri(EndpointType::ReadOnly, uri);
    }
    let client = builder.build()?;

    let nodegroup = args.first().cloned().unwrap_or_else(|| "web".to_string());
    let node = args.get(1).cloned();

    println!("=== Nodes in {} ===", nodegroup);
    match client.get_nodes_from_nodegroup(&nodegroup).await {
        Ok(nodes) => {
            for node in nodes.iter() {
                println!("{}", node);
            }
            println!("Request latency: {:?}", nodes.latency);
        }
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            println!("Lookup failed ({}): {}", e.status_code(), e);
            println!("Raw body: {}", client.last_raw_body());
        }
    }
    println!();

    println!("=== Expression @{} ===", nodegroup);
    match client
        .get_nodes_from_expression(&format!("@{}", nodegroup))
        .await
    {
        Ok(nodes) => println!("{} node(s)", nodes.len()),
        Err(e) => println!("Lookup failed ({}): {}", client.last_status(), e),
    }
    println!();

    if let Some(node) = node {
        println!("=== Nodegroups containing {} ===", node);
        let groups = client
            .get_nodegroups_from_node(&node, &NodegroupQuery::new())
            .await;
        match groups {
            Ok(groups) => println!("{}", groups.join(", ")),
            Err(e) => println!("Lookup failed ({}): {}", e.status_code(), e),
        }
    }

    Ok(())
}
