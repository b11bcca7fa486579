//! Change-event notification documents.
//!
//! A data-tree change event is serialized into one namespaced
//! `<notification>` document with a `<data-change-event>` entry per
//! affected path. Paths are rendered as slash-separated prefixed QNames;
//! prefixes are resolved per document, generating a random 4-letter
//! prefix whenever a namespace has no binding yet (regenerating on
//! collision; only uniqueness within the document matters).

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use xmltree::EmitterConfig;

use super::{ChangedNode, DataChangeEvent, DataPath, QualifiedName};
use crate::error::{ConfsyncError, Result};

/// NETCONF notification namespace.
pub const NOTIFICATION_NS: &str = "urn:ietf:params:xml:ns:netconf:notification:1.0";

/// Controller remote-service namespace for data-changed notifications.
pub const REMOTE_NS: &str = "urn:opendaylight:params:xml:ns:yang:controller:md:sal:remote";

/// Datastore a change applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Store {
    /// Configuration datastore.
    Config,
    /// Operational datastore.
    Operation,
}

impl Store {
    fn value(self) -> &'static str {
        match self {
            Store::Config => "config",
            Store::Operation => "operation",
        }
    }
}

/// Kind of change applied to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Node was created.
    Created,
    /// Node was updated.
    Updated,
    /// Node was deleted.
    Deleted,
}

impl Operation {
    fn value(self) -> &'static str {
        match self {
            Operation::Created => "created",
            Operation::Updated => "updated",
            Operation::Deleted => "deleted",
        }
    }
}

/// Serialize a change event into the notification document.
pub fn serialize_change_event(
    event: &DataChangeEvent,
    event_time: DateTime<Utc>,
) -> Result<String> {
    let mut out = String::with_capacity(512);
    out.push_str(&format!("<notification xmlns=\"{NOTIFICATION_NS}\">"));
    out.push_str(&format!(
        "<eventTime>{}</eventTime>",
        event_time.to_rfc3339_opts(SecondsFormat::Secs, false)
    ));
    out.push_str(&format!(
        "<data-changed-notification xmlns=\"{REMOTE_NS}\">"
    ));

    write_nodes(&mut out, &event.created_config, Store::Config, Operation::Created)?;
    write_nodes(
        &mut out,
        &event.created_operational,
        Store::Operation,
        Operation::Created,
    )?;
    // Updated sets are emitted only when the matching created set is empty
    if event.created_config.is_empty() {
        write_nodes(&mut out, &event.updated_config, Store::Config, Operation::Updated)?;
    }
    if event.created_operational.is_empty() {
        write_nodes(
            &mut out,
            &event.updated_operational,
            Store::Operation,
            Operation::Updated,
        )?;
    }
    write_paths(&mut out, &event.removed_config, Store::Config, Operation::Deleted);
    write_paths(
        &mut out,
        &event.removed_operational,
        Store::Operation,
        Operation::Deleted,
    );

    out.push_str("</data-changed-notification></notification>");
    Ok(out)
}

fn write_nodes(
    out: &mut String,
    nodes: &[ChangedNode],
    store: Store,
    operation: Operation,
) -> Result<()> {
    for node in nodes {
        write_event_entry(out, &node.path, store, operation, node.data.as_ref())?;
    }
    Ok(())
}

fn write_paths(out: &mut String, paths: &[DataPath], store: Store, operation: Operation) {
    for path in paths {
        // Removed entries carry no data, so this cannot fail
        let _ = write_event_entry(out, path, store, operation, None);
    }
}

fn write_event_entry(
    out: &mut String,
    path: &DataPath,
    store: Store,
    operation: Operation,
    data: Option<&xmltree::Element>,
) -> Result<()> {
    out.push_str("<data-change-event>");

    let (text, bindings) = render_path(path);
    out.push_str("<path");
    for (prefix, namespace) in &bindings {
        out.push_str(&format!(" xmlns:{prefix}=\"{}\"", escape_attr(namespace)));
    }
    out.push('>');
    out.push_str(&escape_text(&text));
    out.push_str("</path>");

    out.push_str(&format!("<store>{}</store>", store.value()));
    out.push_str(&format!("<operation>{}</operation>", operation.value()));

    if let Some(data) = data {
        out.push_str("<data>");
        out.push_str(&serialize_element(data)?);
        out.push_str("</data>");
    }

    out.push_str("</data-change-event>");
    Ok(())
}

/// Render a path as prefixed-QName text, returning the prefix bindings
/// used, in first-use order.
fn render_path(path: &DataPath) -> (String, Vec<(String, String)>) {
    let mut prefixes: HashMap<String, String> = HashMap::new();
    let mut bindings: Vec<(String, String)> = Vec::new();
    let mut text = String::new();

    for segment in &path.0 {
        text.push('/');
        write_qname(&mut text, &segment.name, &mut prefixes, &mut bindings);
        for (key, value) in &segment.keys {
            text.push('[');
            write_qname(&mut text, key, &mut prefixes, &mut bindings);
            text.push_str("='");
            text.push_str(value);
            text.push_str("']");
        }
        if let Some(value) = &segment.value {
            text.push_str("[.='");
            text.push_str(value);
            text.push_str("']");
        }
    }

    (text, bindings)
}

fn write_qname(
    text: &mut String,
    name: &QualifiedName,
    prefixes: &mut HashMap<String, String>,
    bindings: &mut Vec<(String, String)>,
) {
    let prefix = match prefixes.get(&name.namespace) {
        Some(prefix) => prefix.clone(),
        None => {
            let generated = generate_prefix(prefixes);
            prefixes.insert(name.namespace.clone(), generated.clone());
            bindings.push((generated.clone(), name.namespace.clone()));
            generated
        }
    };
    text.push_str(&prefix);
    text.push(':');
    text.push_str(&name.local_name);
}

/// Draw 4-letter lowercase prefixes until one is unused in this document.
fn generate_prefix(prefixes: &HashMap<String, String>) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let candidate: String = (0..4)
            .map(|_| char::from(b'a' + rng.gen_range(0..26)))
            .collect();
        if !prefixes.values().any(|p| p == &candidate) {
            return candidate;
        }
    }
}

fn serialize_element(element: &xmltree::Element) -> Result<String> {
    let mut out = Vec::new();
    let config = EmitterConfig::new().write_document_declaration(false);
    element
        .write_with_config(&mut out, config)
        .map_err(|e| ConfsyncError::Notification(format!("cannot serialize change data: {e}")))?;
    String::from_utf8(out)
        .map_err(|e| ConfsyncError::Notification(format!("change data not UTF-8: {e}")))
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}
