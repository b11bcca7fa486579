//! NETCONF protocol messages.
//!
//! A [`NetconfMessage`] wraps one XML document: a hello, an rpc request
//! built from an embedded template, or an rpc-reply received from the
//! server. Builders cover the three requests the push engine sends
//! (edit-config, commit, close-session) plus the hello pair; reply
//! inspection classifies ok / error / version-conflict outcomes.

use std::fmt;

use xmltree::{Element, EmitterConfig, XMLNode};

use super::capabilities::CapabilitySet;
use crate::error::{ConfsyncError, Result};

/// NETCONF base namespace, used by hello and rpc envelopes.
pub const NETCONF_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

const EDIT_CONFIG_TEMPLATE: &str = include_str!("../resources/edit_config.xml");
const COMMIT_TEMPLATE: &str = include_str!("../resources/commit.xml");
const CLOSE_SESSION_TEMPLATE: &str = include_str!("../resources/close_session.xml");

/// One NETCONF message: an XML document plus typed accessors.
#[derive(Debug, Clone)]
pub struct NetconfMessage {
    root: Element,
}

impl NetconfMessage {
    /// Wrap an already-built document.
    pub fn from_root(root: Element) -> Self {
        Self { root }
    }

    /// Parse a document from raw bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let root = Element::parse(bytes)?;
        Ok(Self { root })
    }

    /// Root element of the document.
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Serialize the document to XML text, no declaration.
    pub fn to_xml(&self) -> Result<String> {
        let mut out = Vec::new();
        let config = EmitterConfig::new().write_document_declaration(false);
        self.root
            .write_with_config(&mut out, config)
            .map_err(|e| ConfsyncError::Parse(format!("cannot serialize message: {e}")))?;
        String::from_utf8(out)
            .map_err(|e| ConfsyncError::Parse(format!("serialized message not UTF-8: {e}")))
    }

    /// Build the client hello declaring the given capabilities.
    pub fn client_hello(capabilities: &CapabilitySet) -> Self {
        Self::hello_document(capabilities, None)
    }

    /// Build a server hello with capabilities and an assigned session id.
    pub fn server_hello(capabilities: &CapabilitySet, session_id: u64) -> Self {
        Self::hello_document(capabilities, Some(session_id))
    }

    fn hello_document(capabilities: &CapabilitySet, session_id: Option<u64>) -> Self {
        let mut xml = String::new();
        xml.push_str(&format!("<hello xmlns=\"{NETCONF_NS}\"><capabilities>"));
        for uri in capabilities.iter() {
            xml.push_str("<capability>");
            xml.push_str(&escape_text(uri));
            xml.push_str("</capability>");
        }
        xml.push_str("</capabilities>");
        if let Some(id) = session_id {
            xml.push_str(&format!("<session-id>{id}</session-id>"));
        }
        xml.push_str("</hello>");
        let root = Element::parse(xml.as_bytes()).expect("hello document is well-formed");
        Self { root }
    }

    /// Whether this document is a hello message.
    pub fn is_hello(&self) -> bool {
        self.root.name == "hello" && self.root.namespace.as_deref() == Some(NETCONF_NS)
    }

    /// Capability set declared by a hello message.
    pub fn capabilities(&self) -> Option<CapabilitySet> {
        let caps = self.root.get_child(("capabilities", NETCONF_NS))?;
        let set = caps
            .children
            .iter()
            .filter_map(XMLNode::as_element)
            .filter(|el| el.name == "capability")
            .filter_map(|el| el.get_text().map(|t| t.trim().to_string()))
            .collect();
        Some(set)
    }

    /// Session identifier assigned in a server hello.
    pub fn session_id(&self) -> Option<u64> {
        self.root
            .get_child(("session-id", NETCONF_NS))?
            .get_text()?
            .trim()
            .parse()
            .ok()
    }

    /// Build an edit-config request from the embedded template, replacing
    /// the `<config/>` placeholder's content with the children of
    /// `payload`. Children are cloned wholesale, so their namespace
    /// bindings travel with them.
    pub fn edit_config(payload: &Element) -> Result<Self> {
        let mut root = parse_template(EDIT_CONFIG_TEMPLATE, "edit_config.xml")?;
        let config = root
            .get_mut_child(("edit-config", NETCONF_NS))
            .and_then(|edit| edit.get_mut_child(("config", NETCONF_NS)))
            .ok_or_else(|| {
                ConfsyncError::Parse("edit-config template is missing the config placeholder".into())
            })?;
        config.children.clear();
        for child in payload.children.iter().filter(|n| n.as_element().is_some()) {
            config.children.push(child.clone());
        }
        Ok(Self { root })
    }

    /// Build a commit request from the embedded template.
    pub fn commit() -> Result<Self> {
        Ok(Self {
            root: parse_template(COMMIT_TEMPLATE, "commit.xml")?,
        })
    }

    /// Build a close-session request from the embedded template.
    pub fn close_session() -> Result<Self> {
        Ok(Self {
            root: parse_template(CLOSE_SESSION_TEMPLATE, "close_session.xml")?,
        })
    }

    /// The message-id attribute of an rpc or rpc-reply document.
    pub fn message_id(&self) -> Option<&str> {
        self.root.attributes.get("message-id").map(String::as_str)
    }

    /// Stamp the message-id attribute on an rpc request.
    pub fn set_message_id(&mut self, id: u64) {
        self.root
            .attributes
            .insert("message-id".to_string(), id.to_string());
    }

    /// Whether this document is an rpc-reply.
    pub fn is_rpc_reply(&self) -> bool {
        self.root.name == "rpc-reply"
    }

    /// Build an ok reply, as a server would.
    pub fn ok_reply(message_id: &str) -> Self {
        let xml = format!("<rpc-reply xmlns=\"{NETCONF_NS}\" message-id=\"{message_id}\"><ok/></rpc-reply>");
        let root = Element::parse(xml.as_bytes()).expect("ok reply is well-formed");
        Self { root }
    }

    /// Build an error reply carrying one rpc-error.
    pub fn error_reply(message_id: &str, error_tag: &str, app_tag: Option<&str>, message: &str) -> Self {
        let mut xml = format!("<rpc-reply xmlns=\"{NETCONF_NS}\" message-id=\"{message_id}\"><rpc-error>");
        xml.push_str("<error-type>application</error-type>");
        xml.push_str(&format!("<error-tag>{}</error-tag>", escape_text(error_tag)));
        if let Some(app_tag) = app_tag {
            xml.push_str(&format!("<error-app-tag>{}</error-app-tag>", escape_text(app_tag)));
        }
        xml.push_str(&format!("<error-message>{}</error-message>", escape_text(message)));
        xml.push_str("</rpc-error></rpc-reply>");
        let root = Element::parse(xml.as_bytes()).expect("error reply is well-formed");
        Self { root }
    }

    /// Inspect an rpc-reply for its success/error status.
    pub fn reply_status(&self) -> ReplyStatus {
        if self.root.get_child(("ok", NETCONF_NS)).is_some() || self.root.get_child("ok").is_some()
        {
            return ReplyStatus::Ok;
        }
        let error = self
            .root
            .children
            .iter()
            .filter_map(XMLNode::as_element)
            .find(|el| el.name == "rpc-error");
        let Some(error) = error else {
            // A reply with neither ok nor rpc-error is treated as a
            // malformed failure; the whole body is the diagnostic.
            return ReplyStatus::Error(ReplyError {
                error_tag: None,
                app_tag: None,
                message: None,
                body: self.to_xml().unwrap_or_default(),
            });
        };
        let text_of = |name: &str| {
            error
                .get_child((name, NETCONF_NS))
                .or_else(|| error.get_child(name))
                .and_then(Element::get_text)
                .map(|t| t.trim().to_string())
        };
        ReplyStatus::Error(ReplyError {
            error_tag: text_of("error-tag"),
            app_tag: text_of("error-app-tag"),
            message: text_of("error-message"),
            body: self.to_xml().unwrap_or_default(),
        })
    }
}

impl fmt::Display for NetconfMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_xml() {
            Ok(xml) => write!(f, "{xml}"),
            Err(_) => write!(f, "<unserializable message>"),
        }
    }
}

/// Outcome of inspecting an rpc-reply.
#[derive(Debug, Clone)]
pub enum ReplyStatus {
    /// The reply carries `<ok/>`.
    Ok,
    /// The reply carries an error payload.
    Error(ReplyError),
}

/// Machine-readable error payload of a failed rpc-reply.
#[derive(Debug, Clone)]
pub struct ReplyError {
    /// The rpc-error error-tag, when present.
    pub error_tag: Option<String>,
    /// The rpc-error error-app-tag, when present.
    pub app_tag: Option<String>,
    /// The rpc-error error-message, when present.
    pub message: Option<String>,
    /// Full reply body, for operator diagnostics.
    pub body: String,
}

/// error-app-tag the config subsystem uses for optimistic-lock failures.
pub const OPTIMISTIC_LOCK_APP_TAG: &str = "optimistic-lock-failed";

impl ReplyError {
    /// Whether this error is a version/optimistic-lock conflict, the one
    /// error class the push engine retries.
    pub fn is_version_conflict(&self) -> bool {
        if self.app_tag.as_deref() == Some(OPTIMISTIC_LOCK_APP_TAG) {
            return true;
        }
        self.message
            .as_deref()
            .map(|m| m.to_ascii_lowercase().contains("conflicting version"))
            .unwrap_or(false)
    }
}

fn parse_template(template: &str, name: &str) -> Result<Element> {
    Element::parse(template.as_bytes())
        .map_err(|e| ConfsyncError::Parse(format!("error in embedded resource {name}: {e}")))
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
