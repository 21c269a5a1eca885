//! I/O 支持：网描述（摄取约定）及其 JSON/RON/PNML 序列化接口。
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::net::core::Net;
use crate::net::structure::Weight;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ron error: {0}")]
    Ron(#[from] ron::Error),
    #[error("ron error: {0}")]
    RonSpanned(#[from] ron::error::SpannedError),
    #[error("xml error: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("pnml error: {0}")]
    Pnml(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Plain-data form of a net as an external parser hands it over.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetDescription {
    #[serde(default)]
    pub places: Vec<PlaceDescription>,
    #[serde(default)]
    pub transitions: Vec<TransitionDescription>,
    #[serde(default)]
    pub arcs: Vec<ArcDescription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceDescription {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tokens: Weight,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionDescription {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArcDescription {
    pub source: String,
    pub target: String,
}

impl Net {
    /// Builds a net from its description. Arcs whose endpoints are not a
    /// place/transition pair are skipped with a warning.
    pub fn from_description(description: &NetDescription) -> Net {
        let mut net = Net::empty();
        for place in &description.places {
            let name = place.name.as_deref().unwrap_or(&place.id);
            net.add_place(place.id.as_str(), name, place.tokens);
        }
        for transition in &description.transitions {
            let name = transition.name.as_deref().unwrap_or(&transition.id);
            net.add_transition(transition.id.as_str(), name);
        }
        for arc in &description.arcs {
            if net.add_arc(&arc.source, &arc.target).is_none() {
                log::warn!(
                    "ignoring arc {} -> {}: not a place/transition pair",
                    arc.source,
                    arc.target
                );
            }
        }
        net
    }

    pub fn to_description(&self) -> NetDescription {
        let places = self
            .places
            .iter()
            .map(|place| PlaceDescription {
                id: place.id.clone(),
                name: Some(place.name.clone()),
                tokens: place.tokens,
            })
            .collect();
        let transitions = self
            .transitions
            .iter()
            .map(|transition| TransitionDescription {
                id: transition.id.clone(),
                name: Some(transition.name.clone()),
            })
            .collect();
        let mut arcs = Vec::new();
        for transition in self.transition_ids() {
            let t_id = &self.transitions[transition].id;
            for place in self.preset(transition) {
                arcs.push(ArcDescription {
                    source: self.places[place].id.clone(),
                    target: t_id.clone(),
                });
            }
            for place in self.postset(transition) {
                arcs.push(ArcDescription {
                    source: t_id.clone(),
                    target: self.places[place].id.clone(),
                });
            }
        }
        NetDescription {
            places,
            transitions,
            arcs,
        }
    }
}

pub fn to_json_string<T>(value: &T) -> Result<String, IoError>
where
    T: Serialize,
{
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn from_json_str<T>(s: &str) -> Result<T, IoError>
where
    T: DeserializeOwned,
{
    Ok(serde_json::from_str(s)?)
}

pub fn to_ron_string<T>(value: &T) -> Result<String, IoError>
where
    T: Serialize,
{
    let mut pretty = PrettyConfig::default();
    pretty.new_line = "\n".into();
    Ok(ron::ser::to_string_pretty(value, pretty)?)
}

pub fn from_ron_str<T>(s: &str) -> Result<T, IoError>
where
    T: DeserializeOwned,
{
    Ok(ron::from_str(s)?)
}

/// PNML place/transition nets.
///
/// Elements are matched by local name, so both the core-model namespace and
/// un-namespaced documents are accepted. Places and transitions may sit in
/// nested `<page>`s; an absent `initialMarking` means zero tokens.
pub mod pnml {
    use roxmltree::{Document, Node};

    use super::{ArcDescription, IoError, NetDescription, PlaceDescription, TransitionDescription};
    use crate::net::structure::Weight;

    pub const NAMESPACE: &str = "http://www.pnml.org/version-2009/grammar/pnmlcoremodel";

    fn is(node: &Node<'_, '_>, tag: &str) -> bool {
        node.is_element() && node.tag_name().name() == tag
    }

    fn child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
        node.children().find(|child| is(child, tag))
    }

    /// Text of the `<tag><text>..</text></tag>` label under `node`.
    fn label<'a>(node: Node<'a, '_>, tag: &str) -> Option<&'a str> {
        child(node, tag)
            .and_then(|label| child(label, "text"))
            .and_then(|text| text.text())
            .map(str::trim)
    }

    fn attribute(node: Node<'_, '_>, name: &str) -> Result<String, IoError> {
        node.attribute(name).map(str::to_string).ok_or_else(|| {
            IoError::Pnml(format!(
                "<{}> at byte {} has no `{name}` attribute",
                node.tag_name().name(),
                node.range().start
            ))
        })
    }

    pub fn read_pnml(content: &str) -> Result<NetDescription, IoError> {
        let document = Document::parse(content)?;
        let net = document
            .descendants()
            .find(|node| is(node, "net"))
            .ok_or_else(|| IoError::Pnml("no <net> element".into()))?;

        let mut description = NetDescription::default();
        for node in net.descendants() {
            if is(&node, "place") {
                let id = attribute(node, "id")?;
                let tokens = match label(node, "initialMarking") {
                    Some(text) => text.parse::<Weight>().map_err(|err| {
                        IoError::Pnml(format!(
                            "place `{id}`: invalid initial marking `{text}`: {err}"
                        ))
                    })?,
                    None => 0,
                };
                description.places.push(PlaceDescription {
                    name: label(node, "name").map(str::to_string),
                    id,
                    tokens,
                });
            } else if is(&node, "transition") {
                let id = attribute(node, "id")?;
                description.transitions.push(TransitionDescription {
                    name: label(node, "name").map(str::to_string),
                    id,
                });
            } else if is(&node, "arc") {
                description.arcs.push(ArcDescription {
                    source: attribute(node, "source")?,
                    target: attribute(node, "target")?,
                });
            }
        }
        log::debug!(
            "pnml: {} places, {} transitions, {} arcs",
            description.places.len(),
            description.transitions.len(),
            description.arcs.len()
        );
        Ok(description)
    }

    fn escape(text: &str) -> String {
        let mut escaped = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '&' => escaped.push_str("&amp;"),
                '<' => escaped.push_str("&lt;"),
                '>' => escaped.push_str("&gt;"),
                '"' => escaped.push_str("&quot;"),
                '\'' => escaped.push_str("&apos;"),
                c => escaped.push(c),
            }
        }
        escaped
    }

    fn push_name(out: &mut String, name: Option<&str>) {
        if let Some(name) = name {
            out.push_str(&format!("<name><text>{}</text></name>", escape(name)));
        }
    }

    pub fn to_pnml_string(description: &NetDescription) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str(&format!(
            "<pnml xmlns=\"{NAMESPACE}\">\n  <net id=\"net\" type=\"{NAMESPACE}\">\n    <page id=\"page\">\n"
        ));
        for place in &description.places {
            out.push_str(&format!("      <place id=\"{}\">", escape(&place.id)));
            push_name(&mut out, place.name.as_deref());
            if place.tokens > 0 {
                out.push_str(&format!(
                    "<initialMarking><text>{}</text></initialMarking>",
                    place.tokens
                ));
            }
            out.push_str("</place>\n");
        }
        for transition in &description.transitions {
            out.push_str(&format!("      <transition id=\"{}\">", escape(&transition.id)));
            push_name(&mut out, transition.name.as_deref());
            out.push_str("</transition>\n");
        }
        for (i, arc) in description.arcs.iter().enumerate() {
            out.push_str(&format!(
                "      <arc id=\"a{i}\" source=\"{}\" target=\"{}\"/>\n",
                escape(&arc.source),
                escape(&arc.target)
            ));
        }
        out.push_str("    </page>\n  </net>\n</pnml>\n");
        out
    }
}

/// Serialization formats accepted for net descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Ron,
    Pnml,
}

impl Format {
    /// Guesses the format from the file extension, defaulting to JSON.
    pub fn from_path(path: &Path) -> Format {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("ron") => Format::Ron,
            Some(ext) if ext.eq_ignore_ascii_case("pnml") => Format::Pnml,
            _ => Format::Json,
        }
    }
}

pub fn read_description<P: AsRef<Path>>(path: P, format: Format) -> Result<NetDescription, IoError> {
    let mut file = File::open(path)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    match format {
        Format::Json => from_json_str(&content),
        Format::Ron => from_ron_str(&content),
        Format::Pnml => pnml::read_pnml(&content),
    }
}

pub fn write_description<P: AsRef<Path>>(
    path: P,
    description: &NetDescription,
    format: Format,
) -> Result<(), IoError> {
    let content = match format {
        Format::Json => to_json_string(description)?,
        Format::Ron => to_ron_string(description)?,
        Format::Pnml => pnml::to_pnml_string(description),
    };
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
